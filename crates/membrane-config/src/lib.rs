//! Scene configuration for membrane waveguide simulations.
//!
//! A scene file describes one simulation: membrane outline and lattice,
//! material, boundary stages, delay modulation, excitation, listener and
//! render length. This crate loads and saves scenes as TOML, validates
//! them, derives the physical quantities and assembles a ready
//! [`membrane_core::Mesh2D`] plus [`membrane_core::RenderSettings`].
//!
//! # Features
//!
//! - **Scene files**: [`MembraneConfig::load`], [`MembraneConfig::save`]
//! - **Validation**: [`MembraneConfig::validate`] names the offending field
//! - **Derived parameters**: [`MembraneConfig::derived`] returns wave speed,
//!   junction spacing, fundamental, damping pole and grid size
//! - **Assembly**: [`MembraneConfig::build_mesh`], [`MembraneConfig::build_render`]
//!
//! # Example
//!
//! ```rust
//! use membrane_config::MembraneConfig;
//!
//! let config = MembraneConfig::from_toml(r#"
//!     [mesh]
//!     topology = "rectilinear"
//!     shape = { kind = "circle", radius = 0.08 }
//!
//!     [render]
//!     seconds = 0.01
//! "#).unwrap();
//!
//! let derived = config.derived();
//! assert!(derived.fundamental_hz > 400.0);
//!
//! let mut mesh = config.build_mesh().unwrap();
//! let settings = config.build_render().unwrap();
//! let never = std::sync::atomic::AtomicBool::new(false);
//! let output = membrane_core::render(&mut mesh, &settings, |_| {}, &never).unwrap();
//! assert_eq!(output.samples.len(), settings.len());
//! ```

mod assemble;
mod derived;
mod error;
mod scene;

/// Range checks for scene fields.
pub mod validation;

pub use derived::DerivedParams;
pub use error::ConfigError;
pub use scene::{
    ExcitationKind, ExcitationSection, ListenerKind, ListenerSection, MembraneConfig, MeshSection,
    ModulationKind, ModulationSection, PhysicsSection, RenderSection, RimguideSection,
    ShapeConfig, TapsSection, TopologyKind,
};
pub use validation::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
