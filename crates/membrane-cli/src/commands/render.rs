//! Offline render command.

use super::common::{ListenerArg, SceneArgs, db};
use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use membrane_config::ExcitationKind;
use membrane_core::{RenderError, RenderHandle, ThreadPool};
use membrane_io::{load_excitation, write_render};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output WAV file
    #[arg(short, long, default_value = "mesh.wav")]
    output: PathBuf,

    /// Render length in seconds
    #[arg(short, long)]
    seconds: Option<f32>,

    /// Listener type
    #[arg(short, long, value_enum)]
    listener: Option<ListenerArg>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = args.scene.load()?;
    if let Some(seconds) = args.seconds {
        config.render.seconds = seconds;
    }
    if let Some(listener) = args.listener {
        config.listener.kind = listener.into();
    }

    let settings = if config.excitation.kind == ExcitationKind::File {
        let path = config
            .excitation
            .file
            .as_ref()
            .context("file excitation without a file")?;
        let excitation = load_excitation(path, config.sample_rate())
            .with_context(|| format!("loading excitation {}", path.display()))?;
        config.build_render_with(excitation)
    } else {
        config.build_render()?
    };
    let mesh = config.build_mesh().context("building mesh")?;

    let derived = config.derived();
    println!(
        "Rendering {:.2}s at {} Hz",
        settings.seconds, config.mesh.sample_rate
    );
    println!(
        "  {:?} mesh {}x{}, {} junctions, {} rimguides",
        config.mesh.topology,
        derived.grid_size.0,
        derived.grid_size.1,
        mesh.junction_count(),
        mesh.rimguide_count()
    );
    println!("  Fundamental: {:.1} Hz", derived.fundamental_hz);
    println!("  Listener: {:?}", config.listener.kind);
    if !args.quiet {
        println!("\nPress Ctrl+C to cancel...\n");
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% ({eta})")?
                .progress_chars("##-"),
        );
        pb
    };

    let pool = ThreadPool::new(1);
    let handle = RenderHandle::spawn(&pool, mesh, settings);

    let result = loop {
        if interrupted.load(Ordering::SeqCst) {
            handle.cancel();
        }
        pb.set_position((handle.progress() * 100.0) as u64);
        if let Some(result) = handle.try_result() {
            break result;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let output = match result {
        Ok(output) => output,
        Err(RenderError::Cancelled) => {
            pb.abandon_with_message("cancelled");
            println!("\nRender cancelled, nothing written.");
            return Ok(());
        }
        Err(e) => return Err(e).context("render failed"),
    };
    pb.finish_with_message("done");

    println!("\nStats:");
    println!("  Runtime: {:.2}s", output.runtime.as_secs_f32());
    println!("  Realtime factor: {:.2}x", output.realtime_factor());
    println!(
        "  RMS {:.1} dB, Peak {:.1} dB",
        db(output.rms()),
        db(output.peak())
    );

    write_render(&args.output, &output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("\nWrote {}", args.output.display());

    Ok(())
}
