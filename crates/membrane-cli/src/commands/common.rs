//! Shared CLI helpers used across multiple commands.

use anyhow::Context;
use clap::{Args, ValueEnum};
use membrane_config::{ListenerKind, MembraneConfig, TopologyKind};
use std::path::PathBuf;

/// Scene selection and overrides shared by `render` and `info`.
#[derive(Args)]
pub struct SceneArgs {
    /// Scene file (TOML); the reference scene when omitted
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Junction lattice
    #[arg(long, value_enum)]
    pub topology: Option<TopologyArg>,

    /// Worker threads for large meshes
    #[arg(long)]
    pub threads: Option<usize>,

    /// Clamp the junction at the center
    #[arg(long)]
    pub clamp_center: bool,
}

impl SceneArgs {
    /// Load the scene file (or the default scene) and apply the overrides.
    pub fn load(&self) -> anyhow::Result<MembraneConfig> {
        let mut config = match &self.config {
            Some(path) => MembraneConfig::load(path)
                .with_context(|| format!("loading scene {}", path.display()))?,
            None => MembraneConfig::default(),
        };

        if let Some(topology) = self.topology {
            config.mesh.topology = topology.into();
        }
        if let Some(threads) = self.threads {
            config.mesh.threads = threads;
        }
        if self.clamp_center {
            config.physics.clamp_center = true;
        }

        config.validate().context("invalid scene")?;
        Ok(config)
    }
}

/// Junction lattice on the command line.
#[derive(Clone, Copy, ValueEnum)]
pub enum TopologyArg {
    /// Four neighbors per junction
    Rectilinear,
    /// Six neighbors per junction
    Triangular,
}

impl From<TopologyArg> for TopologyKind {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::Rectilinear => TopologyKind::Rectilinear,
            TopologyArg::Triangular => TopologyKind::Triangular,
        }
    }
}

/// Listener type on the command line.
#[derive(Clone, Copy, ValueEnum)]
pub enum ListenerArg {
    /// Every active junction
    All,
    /// Boundary junctions
    Boundary,
    /// The output tap
    Point,
    /// Junctions within the configured radius
    Zone,
}

impl From<ListenerArg> for ListenerKind {
    fn from(arg: ListenerArg) -> Self {
        match arg {
            ListenerArg::All => ListenerKind::All,
            ListenerArg::Boundary => ListenerKind::Boundary,
            ListenerArg::Point => ListenerKind::Point,
            ListenerArg::Zone => ListenerKind::Zone,
        }
    }
}

/// Level in dBFS, floored at -120.
pub fn db(linear: f32) -> f32 {
    membrane_core::linear_to_db(linear).max(-120.0)
}
