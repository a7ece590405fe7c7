//! Scene file format.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use membrane_core::{Excitation, ListenerType, ModulationMode, Shape, Topology, Vec3};

use crate::error::ConfigError;

/// A complete simulation scene: geometry, material, boundary, excitation,
/// listener and render length.
///
/// Every section and every field is optional in the file; missing values
/// take the reference scene defaults (a 0.32 m triangular drum head at
/// 11025 Hz struck in the middle).
///
/// # TOML Format
///
/// ```toml
/// [mesh]
/// topology = "triangular"
/// sample_rate = 11025
/// shape = { kind = "circle", radius = 0.32 }
///
/// [physics]
/// tension = 3325.0
/// density = 0.262
/// decay = 25.0
/// clamp_center = true
///
/// [excitation]
/// kind = "raised_cosine"
/// frequency = 100.0
///
/// [listener]
/// kind = "boundary"
/// position = [-0.4, 0.0, 0.8]
///
/// [render]
/// seconds = 2.0
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MembraneConfig {
    /// Grid shape, lattice and threading
    pub mesh: MeshSection,
    /// Material and damping
    pub physics: PhysicsSection,
    /// Optional rimguide stages
    pub rimguide: RimguideSection,
    /// Time-varying rimguide delays
    pub modulation: ModulationSection,
    /// Input signal
    pub excitation: ExcitationSection,
    /// Virtual microphone
    pub listener: ListenerSection,
    /// Render length and post-processing
    pub render: RenderSection,
    /// Input and output tap positions
    pub taps: TapsSection,
}

impl MembraneConfig {
    /// Load a scene from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a scene from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the scene to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the scene to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Sample rate as a float.
    pub fn sample_rate(&self) -> f32 {
        self.mesh.sample_rate as f32
    }
}

// ============================================================================
// Mesh
// ============================================================================

/// Outline of the simulated surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeConfig {
    /// Circular membrane
    Circle {
        /// Radius in meters
        radius: f32,
    },
    /// Rectangular plate
    Rectangle {
        /// Extent along x in meters
        length: f32,
        /// Extent along y in meters
        width: f32,
    },
}

impl Default for ShapeConfig {
    fn default() -> Self {
        ShapeConfig::Circle { radius: 0.32 }
    }
}

impl From<ShapeConfig> for Shape {
    fn from(shape: ShapeConfig) -> Self {
        match shape {
            ShapeConfig::Circle { radius } => Shape::Circle { radius },
            ShapeConfig::Rectangle { length, width } => Shape::Rectangle { length, width },
        }
    }
}

/// Junction lattice.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Four neighbors per junction
    Rectilinear,
    /// Six neighbors per junction
    #[default]
    Triangular,
}

impl From<TopologyKind> for Topology {
    fn from(kind: TopologyKind) -> Self {
        match kind {
            TopologyKind::Rectilinear => Topology::Rectilinear,
            TopologyKind::Triangular => Topology::Triangular,
        }
    }
}

/// `[mesh]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeshSection {
    /// Membrane outline
    pub shape: ShapeConfig,
    /// Junction lattice
    pub topology: TopologyKind,
    /// Simulation rate in Hz
    pub sample_rate: u32,
    /// Worker threads, also the number of arena partitions
    pub threads: usize,
    /// Grid size above which ticks run on the worker pool
    pub multithread_threshold: usize,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            shape: ShapeConfig::default(),
            topology: TopologyKind::default(),
            sample_rate: 11025,
            threads: membrane_core::DEFAULT_THREADS,
            multithread_threshold: membrane_core::DEFAULT_MULTITHREAD_THRESHOLD,
        }
    }
}

// ============================================================================
// Physics and boundary
// ============================================================================

/// `[physics]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsSection {
    /// Membrane tension in N/m
    pub tension: f32,
    /// Areal density in kg/m²
    pub density: f32,
    /// Edge loss in dB per second (circle)
    pub decay: f32,
    /// Frequency in Hz at which the decay is matched; defaults to the fundamental
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff_hz: Option<f32>,
    /// Damping pole used directly for rectangular plates
    pub filter_pole: f32,
    /// Smallest rimguide delay in samples, floored at 1.5
    pub min_rimguide_delay: f32,
    /// Phase-inverting (clamped) edge instead of a free edge
    pub solid_boundary: bool,
    /// Clamp the junction at the origin
    pub clamp_center: bool,
}

impl Default for PhysicsSection {
    fn default() -> Self {
        Self {
            tension: 3325.0,
            density: 0.262,
            decay: 25.0,
            cutoff_hz: None,
            filter_pole: 0.6,
            min_rimguide_delay: 1.5,
            solid_boundary: true,
            clamp_center: false,
        }
    }
}

/// `[rimguide]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RimguideSection {
    /// Stretch the delay with the reflected wave's envelope
    pub pitch_bend: bool,
    /// Pitch-bend depth
    pub pitch_bend_amount: f32,
    /// Blend a square-law term into the reflection
    pub square_law: bool,
    /// Square-law blend factor
    pub nonlinear_factor: f32,
    /// Run reflections through a sign-dependent allpass
    pub nonlinear_allpass: bool,
    /// `[positive, negative]` coefficients of the nonlinear allpass
    pub nonlinear_allpass_coeffs: [f32; 2],
    /// Run reflections through the diffusion chain
    pub diffusion: bool,
    /// One first-order allpass per coefficient
    pub diffusion_coeffs: Vec<f32>,
}

impl Default for RimguideSection {
    fn default() -> Self {
        Self {
            pitch_bend: false,
            pitch_bend_amount: 0.0,
            square_law: false,
            nonlinear_factor: 0.1,
            nonlinear_allpass: false,
            nonlinear_allpass_coeffs: [0.0, 0.0],
            diffusion: false,
            diffusion_coeffs: Vec::new(),
        }
    }
}

/// Distribution of delay modulators over the rimguides.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModulationKind {
    /// Every rimguide in lockstep
    #[default]
    Sync,
    /// Phase staggered per rimguide
    PhaseOffset,
    /// Random frequency per rimguide
    Random,
    /// Random frequency and depth per rimguide
    RandomFreqAndAmp,
}

impl From<ModulationKind> for ModulationMode {
    fn from(kind: ModulationKind) -> Self {
        match kind {
            ModulationKind::Sync => ModulationMode::Sync,
            ModulationKind::PhaseOffset => ModulationMode::PhaseOffset,
            ModulationKind::Random => ModulationMode::Random,
            ModulationKind::RandomFreqAndAmp => ModulationMode::RandomFreqAndAmp,
        }
    }
}

/// `[modulation]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModulationSection {
    /// Attach modulators at build time
    pub enabled: bool,
    /// Distribution mode
    pub mode: ModulationKind,
    /// Oscillator frequency in Hz
    pub frequency: f32,
    /// Depth in samples of delay
    pub amplitude: f32,
    /// Phase step per rimguide in cycles
    pub phase_offset: f32,
    /// Relative frequency spread
    pub random_freq: f32,
    /// Relative depth spread
    pub random_amp: f32,
    /// PRNG seed
    pub seed: u32,
}

impl Default for ModulationSection {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ModulationKind::Sync,
            frequency: 1.0,
            amplitude: 1.0,
            phase_offset: 0.0,
            random_freq: 1.0,
            random_amp: 1.0,
            seed: 0x1234_5678,
        }
    }
}

// ============================================================================
// Excitation, listener, render
// ============================================================================

/// Input signal kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExcitationKind {
    /// Unit impulse
    Dirac,
    /// One raised cosine period
    #[default]
    RaisedCosine,
    /// Samples loaded from a WAV file
    File,
}

/// `[excitation]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExcitationSection {
    /// Signal kind
    pub kind: ExcitationKind,
    /// Raised cosine frequency in Hz
    pub frequency: f32,
    /// Scale applied to every sample
    pub amplitude: f32,
    /// WAV file for [`ExcitationKind::File`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for ExcitationSection {
    fn default() -> Self {
        Self {
            kind: ExcitationKind::RaisedCosine,
            frequency: 100.0,
            amplitude: 1.0,
            file: None,
        }
    }
}

impl ExcitationSection {
    /// The excitation signal, or `None` for a file excitation whose samples
    /// the caller has to load.
    pub fn signal(&self) -> Option<Excitation> {
        match self.kind {
            ExcitationKind::Dirac => Some(Excitation::Dirac),
            ExcitationKind::RaisedCosine => Some(Excitation::RaisedCosine {
                frequency: self.frequency,
            }),
            ExcitationKind::File => None,
        }
    }
}

/// Listener source selection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    /// Every active junction
    #[default]
    All,
    /// Boundary junctions
    Boundary,
    /// The output tap
    Point,
    /// Junctions within `radius` of the listener
    Zone,
}

impl From<ListenerKind> for ListenerType {
    fn from(kind: ListenerKind) -> Self {
        match kind {
            ListenerKind::All => ListenerType::All,
            ListenerKind::Boundary => ListenerType::Boundary,
            ListenerKind::Point => ListenerType::Point,
            ListenerKind::Zone => ListenerType::Zone,
        }
    }
}

/// `[listener]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenerSection {
    /// Source selection
    pub kind: ListenerKind,
    /// Position in meters, mesh in the `z = 0` plane
    pub position: [f32; 3],
    /// Zone radius in meters
    pub radius: f32,
    /// Output gain for summing listeners; unset picks a per-kind default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<f32>,
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            kind: ListenerKind::All,
            position: [-0.4, 0.0, 0.8],
            radius: 0.1,
            gain: None,
        }
    }
}

impl ListenerSection {
    /// Position as a vector.
    pub fn position(&self) -> Vec3 {
        let [x, y, z] = self.position;
        Vec3::new(x, y, z)
    }
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSection {
    /// Duration in seconds
    pub seconds: f32,
    /// Run the output through a DC blocker
    pub dc_blocker: bool,
    /// DC blocker pole radius
    pub dc_blocker_coeff: f32,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            seconds: 1.0,
            dc_blocker: false,
            dc_blocker_coeff: 0.995,
        }
    }
}

/// `[taps]` section. Positions are normalized grid coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TapsSection {
    /// Excitation point
    pub input: [f32; 2],
    /// Pickup point
    pub output: [f32; 2],
}

impl Default for TapsSection {
    fn default() -> Self {
        Self {
            input: [0.5, 0.5],
            output: [0.5, 0.5],
        }
    }
}
