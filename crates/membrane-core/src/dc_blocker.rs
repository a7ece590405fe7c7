//! DC blocking filter for render output.
//!
//! Impulse-driven membranes with a solid rim can drift off zero when the
//! excitation has a DC component (a raised cosine is all positive). The
//! render driver optionally runs the listener output through this filter.
//!
//! Transfer function: H(z) = (1 - z^-1) / (1 - R*z^-1)
//!
//! Reference: Julius O. Smith, "Introduction to Digital Filters with Audio
//! Applications", Chapter on DC Blocker.

/// First-order DC blocker.
///
/// ```text
/// y[n] = x[n] - x[n-1] + R * y[n-1]
/// ```
///
/// The -3 dB cutoff is approximately `(1 - R) / (2π) * fs`. At 11025 Hz the
/// default `R = 0.995` puts it near 9 Hz.
///
/// ## Example
///
/// ```rust
/// use membrane_core::DcBlocker;
///
/// let mut blocker = DcBlocker::with_coeff(0.995);
/// let out = blocker.process(1.0);
/// assert_eq!(out, 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct DcBlocker {
    /// Pole radius R
    coeff: f32,
    /// x[n-1]
    x_prev: f32,
    /// y[n-1]
    y_prev: f32,
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::with_coeff(Self::DEFAULT_COEFF)
    }
}

impl DcBlocker {
    /// Pole radius used when none is configured.
    pub const DEFAULT_COEFF: f32 = 0.995;

    /// Create a DC blocker with pole radius `coeff`, clamped to [0.9, 0.9999].
    pub fn with_coeff(coeff: f32) -> Self {
        Self {
            coeff: coeff.clamp(0.9, 0.9999),
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    /// Process a single sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = input - self.x_prev + self.coeff * self.y_prev;
        self.x_prev = input;
        self.y_prev = output;
        output
    }

    /// Reset the filter state to zero.
    pub fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }

    /// Current pole radius.
    pub fn coeff(&self) -> f32 {
        self.coeff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn test_dc_blocker_removes_dc() {
        let mut blocker = DcBlocker::default();

        let mut output = 0.0;
        for _ in 0..11025 {
            output = blocker.process(1.0);
        }

        assert!(
            output.abs() < 0.01,
            "DC should be removed, got {}",
            output
        );
    }

    #[test]
    fn test_dc_blocker_passes_ac() {
        let mut blocker = DcBlocker::default();
        let freq = 500.0;
        let sample_rate = 11025.0;

        for i in 0..11025 {
            let t = i as f32 / sample_rate;
            blocker.process(libm::sinf(2.0 * PI * freq * t));
        }

        let mut max_output = 0.0f32;
        for i in 0..64 {
            let t = (11025 + i) as f32 / sample_rate;
            let output = blocker.process(libm::sinf(2.0 * PI * freq * t));
            max_output = max_output.max(output.abs());
        }

        assert!(
            max_output > 0.95,
            "500 Hz should pass through, max output was {}",
            max_output
        );
    }

    #[test]
    fn test_coeff_clamped() {
        assert_eq!(DcBlocker::with_coeff(0.5).coeff(), 0.9);
        assert_eq!(DcBlocker::with_coeff(1.5).coeff(), 0.9999);
    }

    #[test]
    fn test_dc_blocker_reset() {
        let mut blocker = DcBlocker::default();
        for _ in 0..1000 {
            blocker.process(1.0);
        }

        blocker.reset();

        assert_eq!(blocker.x_prev, 0.0);
        assert_eq!(blocker.y_prev, 0.0);
    }
}
