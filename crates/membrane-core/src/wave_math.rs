//! Physical parameter derivation for waveguide meshes.
//!
//! Converts material and geometry (tension, density, radius, decay) into the
//! quantities the mesh needs: junction spacing, grid size, and the rimguide
//! damping filter.
//!
//! | Quantity | Formula |
//! |----------|---------|
//! | wave speed | `c = sqrt(T / ρ)` |
//! | junction spacing | `d = sqrt(2) * c / fs` |
//! | fundamental (circle) | `ω0 = 2.405 * c / (fs * r)` rad/sample |
//! | grid size | `ceil(2r / d)`, `ceil(2r / d * vscale)` |
//!
//! The junction spacing comes from the rectilinear mesh dispersion limit:
//! waves travel `1/sqrt(2)` junctions per sample along the axes.
//!
//! The rimguide damping filter is a one-pole whose magnitude at the
//! fundamental equals the gain lost over one diameter at the requested
//! decay rate (dB per second). Its phase delay at the fundamental is
//! subtracted from the rimguide delay so tuning is preserved.

use libm::{atanf, ceilf, cosf, powf, sinf, sqrtf};

/// First zero of the Bessel function J0, the (0,1) mode of a circular membrane.
pub const BESSEL_J0_FIRST_ZERO: f32 = 2.405;

/// Smallest total rimguide delay: 0.5 (allpass interpolator floor) plus the
/// one-sample scattering latency at the boundary junction.
pub const MIN_RIMGUIDE_DELAY: f32 = 1.5;

/// Mode ratios of an ideal circular membrane relative to the (0,1) mode.
pub const CIRCULAR_MODE_RATIOS: [f32; 12] = [
    1.0, 1.594, 2.136, 2.296, 2.653, 2.918, 3.156, 3.501, 3.600, 3.652, 4.060, 4.154,
];

/// `(m, n)` labels for [`CIRCULAR_MODE_RATIOS`].
pub const CIRCULAR_MODE_LABELS: [&str; 12] = [
    "(0,1)", "(1,1)", "(2,1)", "(0,2)", "(3,1)", "(1,2)", "(4,1)", "(2,2)", "(0,3)", "(5,1)",
    "(3,2)", "(6,1)",
];

/// Vertical row scaling for a triangular mesh: rows are `sqrt(3)/2` apart,
/// so a square region needs `2/sqrt(3)` times as many rows.
pub const TRIANGULAR_VERTICAL_SCALER: f32 = 1.154_700_5;

/// Transverse wave speed in m/s for tension `T` (N/m) and areal density `ρ` (kg/m²).
#[inline]
pub fn wave_speed(tension: f32, density: f32) -> f32 {
    sqrtf(tension / density)
}

/// Distance between adjacent junctions in meters.
#[inline]
pub fn sample_distance(wave_speed: f32, sample_rate: f32) -> f32 {
    core::f32::consts::SQRT_2 * wave_speed / sample_rate
}

/// Largest inclusion radius that still leaves room for the minimum
/// rimguide delay plus the friction filter delay between the outermost
/// junction and the true rim.
pub fn max_radius(radius: f32, friction_delay: f32, sample_distance: f32, min_delay: f32) -> f32 {
    let min_delay = min_delay.max(MIN_RIMGUIDE_DELAY);
    radius - (min_delay + friction_delay) * sample_distance * 0.5
}

/// [`max_radius`] applied to both half-extents of a rectangle.
///
/// Returns the shrunk `(length, width)`.
pub fn max_dimensions(
    length: f32,
    width: f32,
    friction_delay: f32,
    sample_distance: f32,
    min_delay: f32,
) -> (f32, f32) {
    let half_length = max_radius(length * 0.5, friction_delay, sample_distance, min_delay);
    let half_width = max_radius(width * 0.5, friction_delay, sample_distance, min_delay);
    (half_length * 2.0, half_width * 2.0)
}

/// Fundamental of a circular membrane in radians per sample.
#[inline]
pub fn fundamental_frequency(radius: f32, wave_speed: f32, sample_rate: f32) -> f32 {
    (BESSEL_J0_FIRST_ZERO * wave_speed) / (sample_rate * radius)
}

/// Fundamental of a rectangular membrane, (1,1) mode, in radians per sample.
pub fn fundamental_frequency_rect(length: f32, width: f32, wave_speed: f32, sample_rate: f32) -> f32 {
    let hz = 0.5 * wave_speed * sqrtf(1.0 / (length * length) + 1.0 / (width * width));
    crate::hz_to_omega(hz, sample_rate)
}

/// Pole of the rimguide damping filter.
///
/// `decay_rate` is in dB per second; its sign is ignored. `freq` is the
/// frequency in radians per sample at which the loss is matched. Returns
/// 0 (no damping) for a zero decay rate.
pub fn friction_coeff(radius: f32, wave_speed: f32, decay_rate: f32, freq: f32) -> f32 {
    let decay_rate = -decay_rate.abs();
    if decay_rate == 0.0 {
        return 0.0;
    }

    let diameter = radius * 2.0;
    let gain = powf(10.0, (decay_rate * diameter) / (20.0 * wave_speed));
    let cos_freq = cosf(freq);
    let gain_2 = gain * gain;
    let discriminant = gain_2 * gain_2 * (cos_freq * cos_freq - 1.0) + gain_2 * (2.0 - 2.0 * cos_freq);

    (1.0 - gain_2 * cos_freq - sqrtf(discriminant)) / (gain_2 - 1.0)
}

/// Phase delay in samples of the damping filter at `freq` rad/sample.
pub fn friction_delay(friction_coeff: f32, freq: f32) -> f32 {
    atanf((-friction_coeff * sinf(freq)) / (friction_coeff * cosf(freq) + 1.0)) / freq
}

/// Grid dimensions `(lx, ly)` covering a circle of `radius`.
pub fn grid_size(radius: f32, sample_distance: f32, vertical_scaler: f32) -> (usize, usize) {
    let radius_samples = radius / sample_distance;
    let x = ceilf(radius_samples * 2.0) as usize;
    let y = ceilf(radius_samples * 2.0 * vertical_scaler) as usize;
    (x, y)
}

/// Grid dimensions `(lx, ly)` covering a `length × width` rectangle.
pub fn grid_size_for_rect(
    length: f32,
    width: f32,
    sample_distance: f32,
    vertical_scaler: f32,
) -> (usize, usize) {
    let x = ceilf(length / sample_distance) as usize + 1;
    let y = ceilf(width / sample_distance * vertical_scaler) as usize + 1;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIUS: f32 = 0.32;
    const FS: f32 = 11025.0;

    fn reference_speed() -> f32 {
        wave_speed(3325.0, 0.262)
    }

    #[test]
    fn test_wave_speed() {
        let c = reference_speed();
        assert!((c - 112.65).abs() < 0.05, "c = {}", c);
    }

    #[test]
    fn test_sample_distance() {
        let d = sample_distance(reference_speed(), FS);
        assert!((d - 0.01445).abs() < 1e-4, "d = {}", d);
    }

    #[test]
    fn test_fundamental_frequency() {
        let c = reference_speed();
        let w0 = fundamental_frequency(RADIUS, c, FS);
        let hz = crate::omega_to_hz(w0, FS);
        // 2.405 c / (2π r)
        assert!((hz - 134.7).abs() < 0.5, "f0 = {} Hz", hz);
    }

    #[test]
    fn test_friction_coeff_zero_decay() {
        assert_eq!(friction_coeff(RADIUS, reference_speed(), 0.0, 0.1), 0.0);
    }

    #[test]
    fn test_friction_coeff_sign_independent() {
        let c = reference_speed();
        let w0 = fundamental_frequency(RADIUS, c, FS);
        let a = friction_coeff(RADIUS, c, 25.0, w0);
        let b = friction_coeff(RADIUS, c, -25.0, w0);
        assert_eq!(a, b);
        assert!(a.abs() < 1.0, "damping pole {} must be stable", a);
    }

    #[test]
    fn test_friction_coeff_matches_target_gain() {
        // |H(e^jw)| of b0/(1 - p z^-1) with b0 = 1 - |p| should equal the
        // per-diameter loss at the fundamental.
        let c = reference_speed();
        let w0 = fundamental_frequency(RADIUS, c, FS);
        let coeff = friction_coeff(RADIUS, c, 25.0, w0);
        let pole = -coeff;
        let b0 = 1.0 - pole.abs();
        let re = 1.0 - pole * cosf(w0);
        let im = pole * sinf(w0);
        let magnitude = b0 / sqrtf(re * re + im * im);
        let target = powf(10.0, (-25.0 * 2.0 * RADIUS) / (20.0 * c));
        assert!(
            (magnitude - target).abs() < 1e-3,
            "magnitude {} should match target {}",
            magnitude,
            target
        );
    }

    #[test]
    fn test_friction_delay_small_for_no_damping() {
        assert_eq!(friction_delay(0.0, 0.1), 0.0);
    }

    #[test]
    fn test_max_radius_floors_min_delay() {
        let d = 0.01;
        assert_eq!(max_radius(1.0, 0.0, d, 0.0), max_radius(1.0, 0.0, d, 1.5));
        assert!(max_radius(1.0, 0.0, d, 3.0) < max_radius(1.0, 0.0, d, 1.5));
    }

    #[test]
    fn test_max_dimensions() {
        let (l, w) = max_dimensions(0.64, 0.32, 0.0, 0.01, 1.5);
        assert!((l - (0.64 - 0.015)).abs() < 1e-6);
        assert!((w - (0.32 - 0.015)).abs() < 1e-6);
    }

    #[test]
    fn test_grid_size() {
        assert_eq!(grid_size(1.0, 0.1, 1.0), (20, 20));
        let (x, y) = grid_size(1.0, 0.1, TRIANGULAR_VERTICAL_SCALER);
        assert_eq!(x, 20);
        assert_eq!(y, 24);
    }

    #[test]
    fn test_grid_size_for_rect_covers_edges() {
        let (x, y) = grid_size_for_rect(0.6, 0.3, 0.1, 1.0);
        assert_eq!((x, y), (7, 4));
    }

    #[test]
    fn test_mode_tables_aligned() {
        assert_eq!(CIRCULAR_MODE_RATIOS.len(), CIRCULAR_MODE_LABELS.len());
        assert!(CIRCULAR_MODE_RATIOS.windows(2).all(|w| w[0] < w[1]));
    }
}
