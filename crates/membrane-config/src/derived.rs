//! Physical quantities derived from a scene.
//!
//! | Quantity | Circle | Rectangle |
//! |----------|--------|-----------|
//! | fundamental | (0,1) Bessel mode | (1,1) mode |
//! | damping pole | matched to `decay` at the cutoff | `filter_pole` |
//! | inclusion outline | [`max_radius`](membrane_core::wave_math::max_radius) | [`max_dimensions`](membrane_core::wave_math::max_dimensions) |
//! | grid | covers the inclusion circle | covers the full rectangle |

use serde::Serialize;

use membrane_core::{Shape, Topology, hz_to_omega, omega_to_hz, wave_math};

use crate::scene::{MembraneConfig, ShapeConfig};

/// Quantities computed from a [`MembraneConfig`] before the mesh is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedParams {
    /// Transverse wave speed in m/s
    pub wave_speed: f32,
    /// Junction spacing in meters
    pub sample_distance: f32,
    /// Fundamental in radians per sample
    pub fundamental: f32,
    /// Fundamental in Hz
    pub fundamental_hz: f32,
    /// Frequency the edge loss is matched at, radians per sample
    pub cutoff: f32,
    /// Pole handed to every rimguide's damping filter
    pub friction_coeff: f32,
    /// Phase delay of the damping filter at the fundamental, in samples
    pub friction_delay: f32,
    /// Outline that selects the simulated junctions
    #[serde(skip)]
    pub inclusion: Shape,
    /// Radius (circle) or `[length, width]` (rectangle) of the inclusion outline
    pub inclusion_extent: [f32; 2],
    /// Grid dimensions `(lx, ly)`
    pub grid_size: (usize, usize),
}

impl DerivedParams {
    /// Derive the mesh quantities for `config`.
    ///
    /// Does not validate; nonsensical input yields nonsensical (but finite
    /// or NaN) numbers. Call [`MembraneConfig::validate`] first.
    pub fn from_config(config: &MembraneConfig) -> Self {
        let fs = config.sample_rate();
        let physics = &config.physics;
        let topology = Topology::from(config.mesh.topology);

        let wave_speed = wave_math::wave_speed(physics.tension, physics.density);
        let sample_distance = wave_math::sample_distance(wave_speed, fs);

        match config.mesh.shape {
            ShapeConfig::Circle { radius } => {
                let fundamental = wave_math::fundamental_frequency(radius, wave_speed, fs);
                let cutoff = physics
                    .cutoff_hz
                    .map_or(fundamental, |hz| hz_to_omega(hz, fs));
                let coeff = wave_math::friction_coeff(radius, wave_speed, physics.decay, cutoff);
                let friction_delay = wave_math::friction_delay(coeff, fundamental);
                let max_radius = wave_math::max_radius(
                    radius,
                    friction_delay,
                    sample_distance,
                    physics.min_rimguide_delay,
                );

                Self {
                    wave_speed,
                    sample_distance,
                    fundamental,
                    fundamental_hz: omega_to_hz(fundamental, fs),
                    cutoff,
                    friction_coeff: -coeff,
                    friction_delay,
                    inclusion: Shape::Circle { radius: max_radius },
                    inclusion_extent: [max_radius, max_radius],
                    grid_size: wave_math::grid_size(
                        max_radius,
                        sample_distance,
                        topology.vertical_scaler(),
                    ),
                }
            }
            ShapeConfig::Rectangle { length, width } => {
                let fundamental =
                    wave_math::fundamental_frequency_rect(length, width, wave_speed, fs);
                let friction_delay = wave_math::friction_delay(-physics.filter_pole, fundamental);
                let (max_length, max_width) = wave_math::max_dimensions(
                    length,
                    width,
                    friction_delay,
                    sample_distance,
                    physics.min_rimguide_delay,
                );

                Self {
                    wave_speed,
                    sample_distance,
                    fundamental,
                    fundamental_hz: omega_to_hz(fundamental, fs),
                    cutoff: fundamental,
                    friction_coeff: physics.filter_pole,
                    friction_delay,
                    inclusion: Shape::Rectangle {
                        length: max_length,
                        width: max_width,
                    },
                    inclusion_extent: [max_length, max_width],
                    grid_size: wave_math::grid_size_for_rect(
                        length,
                        width,
                        sample_distance,
                        topology.vertical_scaler(),
                    ),
                }
            }
        }
    }

    /// Number of grid cells.
    pub fn grid_cells(&self) -> usize {
        self.grid_size.0 * self.grid_size.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::TopologyKind;

    #[test]
    fn test_reference_circle() {
        let derived = DerivedParams::from_config(&MembraneConfig::default());

        assert!((derived.wave_speed - 112.65).abs() < 0.01, "c = {}", derived.wave_speed);
        assert!(
            (derived.sample_distance - 0.01445).abs() < 1e-4,
            "d = {}",
            derived.sample_distance
        );
        // 2.405 c / (2π r)
        assert!(
            (derived.fundamental_hz - 134.7).abs() < 0.5,
            "f0 = {}",
            derived.fundamental_hz
        );
        assert_eq!(derived.cutoff, derived.fundamental);
        assert!(derived.friction_coeff.abs() > 0.0 && derived.friction_coeff.abs() < 1.0);
        assert!(derived.inclusion_extent[0] < 0.32);
        assert!(derived.inclusion_extent[0] > 0.28);

        let (lx, ly) = derived.grid_size;
        assert!(ly > lx, "triangular grids need more rows: {lx}x{ly}");
        assert!(lx > 30 && lx < 50, "lx = {lx}");
    }

    #[test]
    fn test_custom_cutoff_changes_pole_only() {
        let base = DerivedParams::from_config(&MembraneConfig::default());
        let mut config = MembraneConfig::default();
        config.physics.cutoff_hz = Some(1000.0);
        let custom = DerivedParams::from_config(&config);

        assert_ne!(custom.friction_coeff, base.friction_coeff);
        assert_eq!(custom.fundamental, base.fundamental);
        assert!((omega_to_hz(custom.cutoff, 11025.0) - 1000.0).abs() < 0.1);
    }

    #[test]
    fn test_zero_decay_is_lossless() {
        let mut config = MembraneConfig::default();
        config.physics.decay = 0.0;
        let derived = DerivedParams::from_config(&config);
        assert_eq!(derived.friction_coeff, 0.0);
        assert_eq!(derived.friction_delay, 0.0);
    }

    #[test]
    fn test_rectangle_uses_filter_pole() {
        let mut config = MembraneConfig::default();
        config.mesh.shape = ShapeConfig::Rectangle {
            length: 0.64,
            width: 0.64,
        };
        config.mesh.topology = TopologyKind::Rectilinear;
        let derived = DerivedParams::from_config(&config);

        assert_eq!(derived.friction_coeff, 0.6);
        let [l, w] = derived.inclusion_extent;
        assert!(l < 0.64 && w < 0.64);
        assert_eq!(derived.grid_size.0, derived.grid_size.1, "square plate, square lattice");
    }
}
