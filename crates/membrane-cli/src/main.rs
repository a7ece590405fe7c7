//! Membrane CLI - render and inspect waveguide mesh simulations.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "membrane")]
#[command(author, version, about = "2D waveguide mesh membrane simulator", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scene to a WAV file
    Render(commands::render::RenderArgs),

    /// Show derived parameters and mesh statistics for a scene
    Info(commands::info::InfoArgs),

    /// Find spectral peaks in a render and match them to membrane modes
    Analyze(commands::analyze::AnalyzeArgs),

    /// Write the default scene as a TOML file
    InitConfig(commands::init_config::InitConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Analyze(args) => commands::analyze::run(args),
        Commands::InitConfig(args) => commands::init_config::run(args),
    }
}
