//! One-pole damping filter for rimguide losses.
//!
//! A single-pole IIR with the difference equation:
//!
//! ```text
//! y[n] = b0 * x[n] + p * y[n-1]
//! b0   = 1 - |p|
//! ```
//!
//! The gain is normalized so the peak of the magnitude response is unity:
//! at DC for `p > 0` (lowpass) and at Nyquist for `p < 0` (highpass). Inside
//! a waveguide loop this keeps every frequency passive while giving high
//! frequencies more loss per round trip than low ones.
//!
//! # Usage
//!
//! ```rust
//! use membrane_core::OnePole;
//!
//! let mut lp = OnePole::from_pole(0.6);
//! let filtered = lp.process(1.0);
//! assert!((filtered - 0.4).abs() < 1e-6);
//! ```
//!
//! # Reference
//!
//! Julius O. Smith III, "Introduction to Digital Filters with Audio Applications",
//! Section: One-Pole Filter.

use crate::flush_denormal;

/// Normalized one-pole filter.
///
/// # Invariants
///
/// - `b0 = 1 - |pole|`, so the magnitude response never exceeds 1
/// - `state` is flushed to zero when below 1e-20 (denormal protection)
#[derive(Debug, Clone, Default)]
pub struct OnePole {
    state: f32,
    pole: f32,
    b0: f32,
}

impl OnePole {
    /// Create a filter with the given pole. `|pole| < 1` for stability.
    pub fn from_pole(pole: f32) -> Self {
        let mut filter = Self::default();
        filter.set_pole(pole);
        filter
    }

    /// Move the pole and renormalize the gain.
    pub fn set_pole(&mut self, pole: f32) {
        self.pole = pole;
        self.b0 = if pole > 0.0 { 1.0 - pole } else { 1.0 + pole };
    }

    /// Current pole.
    #[inline]
    pub fn pole(&self) -> f32 {
        self.pole
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(self.b0 * input + self.pole * self.state);
        self.state
    }

    /// Reset filter state to zero.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
