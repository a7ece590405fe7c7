//! Display the quantities a scene derives and the mesh it builds.

use super::common::SceneArgs;
use anyhow::Context;
use clap::Args;
use membrane_config::{DerivedParams, MembraneConfig};
use serde::Serialize;

/// Describe a scene without rendering it.
#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SceneReport<'a> {
    config: &'a MembraneConfig,
    derived: DerivedParams,
    junctions: usize,
    rimguides: usize,
    boundary: usize,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let config = args.scene.load()?;
    let derived = config.derived();
    let mesh = config.build_mesh().context("building mesh")?;

    let report = SceneReport {
        config: &config,
        derived,
        junctions: mesh.junction_count(),
        rimguides: mesh.rimguide_count(),
        boundary: mesh.boundary_count(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (lx, ly) = derived.grid_size;
    println!("Topology:      {:?}", config.mesh.topology);
    println!("Shape:         {:?}", config.mesh.shape);
    println!("Sample Rate:   {} Hz", config.mesh.sample_rate);
    println!("Wave Speed:    {:.2} m/s", derived.wave_speed);
    println!("Spacing:       {:.2} mm", derived.sample_distance * 1000.0);
    println!("Fundamental:   {:.1} Hz", derived.fundamental_hz);
    println!(
        "Edge Damping:  pole {:.4}, {:.3} samples delay",
        derived.friction_coeff, derived.friction_delay
    );
    println!("Grid:          {lx} x {ly} ({} cells)", derived.grid_cells());
    println!(
        "Junctions:     {} ({} on the boundary)",
        report.junctions, report.boundary
    );
    println!("Rimguides:     {}", report.rimguides);
    println!("Threads:       {}", mesh.threads());

    Ok(())
}
