//! Write the reference scene to a TOML file as a starting point.

use clap::Args;
use membrane_config::MembraneConfig;
use std::path::PathBuf;

#[derive(Args)]
pub struct InitConfigArgs {
    /// Destination scene file
    #[arg(default_value = "membrane.toml")]
    pub file: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitConfigArgs) -> anyhow::Result<()> {
    if args.file.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.file.display()
        );
    }

    MembraneConfig::default().save(&args.file)?;
    println!("Wrote {}", args.file.display());
    Ok(())
}
