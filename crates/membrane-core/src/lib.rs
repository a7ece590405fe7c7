//! Membrane Core - 2D digital waveguide mesh simulation
//!
//! This crate models vibrating membranes and plates as a grid of scattering
//! junctions joined by unit delays. Boundary junctions are terminated by
//! rimguides that carry the edge reflection, its loss and its dispersion.
//! An impulse injected at one junction propagates sample by sample and is
//! picked up at another junction or by a virtual microphone.
//!
//! # Core Abstractions
//!
//! ## Mesh
//!
//! - [`Mesh2D`] - Junction arena, wiring, boundaries and the tick loop
//! - [`Topology`] - Rectilinear (4-port) or triangular (6-port) lattice
//! - [`Junction`] - One scattering node
//! - [`PassMode`] - Fused or explicit scatter/delay passes
//! - [`ThreadPool`] - Worker pool with batch barriers for large meshes
//!
//! ## Boundaries
//!
//! - [`Rimguide`] - Fractional delay, damping and optional nonlinear stages
//! - [`RimguideInfo`] - Boundary configuration shared by a mesh
//! - [`Shape`] - Circle or rectangle outline for masks and projection
//! - [`ModulationPlan`] - Time-varying rimguide delays
//!
//! ## Output
//!
//! - [`Listener`] - Sums junction pressures with air propagation delay
//! - [`render()`] / [`RenderHandle`] - Offline render, blocking or on a pool
//! - [`Excitation`] - Dirac, raised cosine or arbitrary samples
//!
//! ## Primitives
//!
//! - [`AllpassDelay`] - Allpass-interpolated fractional delay
//! - [`Allpass`], [`NonlinearAllpass`] - First-order lattice allpass filters
//! - [`OnePole`], [`EnvelopeFollower`], [`DcBlocker`], [`SineLfo`]
//! - [`wave_math`] - Wave speed, junction spacing, fundamentals, damping
//!
//! # Example
//!
//! ```rust
//! use membrane_core::{Mesh2D, RimguideInfo, Shape, wave_math};
//!
//! let fs = 11025.0;
//! let c = wave_math::wave_speed(3325.0, 0.262);
//! let sd = wave_math::sample_distance(c, fs);
//! let radius = 0.1;
//!
//! let (lx, ly) = wave_math::grid_size(radius, sd, wave_math::TRIANGULAR_VERTICAL_SCALER);
//! let mut mesh = Mesh2D::triangular(lx, ly, sd);
//! let mask = mesh.mask_for_radius(wave_math::max_radius(radius, 0.0, sd, 1.5));
//! mesh.init(&mask);
//! mesh.init_boundary(&RimguideInfo {
//!     shape: Shape::Circle { radius },
//!     wave_speed: c,
//!     sample_rate: fs,
//!     ..RimguideInfo::default()
//! });
//!
//! let out: Vec<f32> = (0..64).map(|n| mesh.tick(if n == 0 { 1.0 } else { 0.0 })).collect();
//! assert!(out.iter().all(|s| s.is_finite()));
//! ```
//!
//! # Design Principles
//!
//! - **Arena storage**: neighbors are indices, not references
//! - **One engine**: topologies differ only in static tables
//! - **Barrier-synchronized passes**: no per-junction locking
//! - **Degrade, don't fail**: configuration mistakes are logged and ignored

pub mod allpass;
pub mod dc_blocker;
pub mod delay;
pub mod envelope;
pub mod excitation;
pub mod geometry;
pub mod junction;
pub mod lfo;
pub mod listener;
pub mod math;
pub mod mesh;
pub mod modulation;
pub mod one_pole;
pub mod render;
pub mod rimguide;
pub mod shape;
pub mod thread_pool;
pub mod topology;
pub mod wave_math;

// Re-export main types at crate root
pub use allpass::{Allpass, NonlinearAllpass};
pub use dc_blocker::DcBlocker;
pub use delay::{AllpassDelay, MIN_DELAY};
pub use envelope::EnvelopeFollower;
pub use excitation::{Excitation, raised_cosine};
pub use geometry::{Grid, Vec2, Vec3};
pub use junction::Junction;
pub use lfo::SineLfo;
pub use listener::{Listener, ListenerInfo, ListenerType};
pub use math::{db_to_linear, delay_capacity, flush_denormal, hz_to_omega, linear_to_db, omega_to_hz};
pub use mesh::{
    DEFAULT_MULTITHREAD_THRESHOLD, DEFAULT_THREADS, JunctionSnapshot, Mesh2D, PassMode,
};
pub use modulation::{ModulationMode, ModulationPlan, ModulationSource, Xorshift32};
pub use one_pole::OnePole;
pub use render::{
    RenderError, RenderHandle, RenderOutput, RenderSettings, default_listener_gain, render,
};
pub use rimguide::{Rimguide, RimguideInfo};
pub use shape::Shape;
pub use thread_pool::{Task, ThreadPool};
pub use topology::{Direction, MAX_PORTS, Topology};
