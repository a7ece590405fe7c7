//! Sine oscillator for time-varying rimguide delays.
//!
//! Slowly wobbling the boundary delay detunes the reflected wave against the
//! mesh and breaks up the periodic ringing of a perfectly regular rim.

use core::f32::consts::TAU;
use libm::sinf;

/// Phase-accumulator sine oscillator.
///
/// Phase is measured in cycles, `[0.0, 1.0)`.
///
/// # Example
///
/// ```rust
/// use membrane_core::SineLfo;
///
/// let mut lfo = SineLfo::new(11025.0, 2.0);
/// lfo.add_phase(0.25);
///
/// // Starts at the peak after a quarter-cycle offset
/// let value = lfo.advance();
/// assert!((value - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct SineLfo {
    /// Current phase position [0.0, 1.0)
    phase: f32,
    /// Phase restored by `reset`
    start_phase: f32,
    /// Phase increment per sample
    phase_inc: f32,
    /// Sample rate in Hz
    sample_rate: f32,
}

impl SineLfo {
    /// Create an oscillator at `freq_hz`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            phase: 0.0,
            start_phase: 0.0,
            phase_inc: freq_hz / sample_rate,
            sample_rate,
        }
    }

    /// Set frequency in Hz.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.phase_inc = freq_hz / self.sample_rate;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    /// Shift the phase by `cycles`, wrapping into `[0, 1)`.
    ///
    /// The shift also moves the phase that [`SineLfo::reset`] returns to.
    pub fn add_phase(&mut self, cycles: f32) {
        self.phase = wrap_phase(self.phase + cycles);
        self.start_phase = wrap_phase(self.start_phase + cycles);
    }

    /// Current phase in cycles.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Return to the starting phase.
    pub fn reset(&mut self) {
        self.phase = self.start_phase;
    }

    /// Value at the current phase without advancing.
    #[inline]
    pub fn value(&self) -> f32 {
        sinf(self.phase * TAU)
    }

    /// Return the current value and advance by one sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let output = self.value();
        self.phase = wrap_phase(self.phase + self.phase_inc);
        output
    }
}

#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let wrapped = phase - libm::floorf(phase);
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}
