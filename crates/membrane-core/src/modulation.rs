//! Modulation sources for rimguide delay lengths.
//!
//! A rimguide may own one [`ModulationSource`]. Each tick it adds
//! `source.mod_advance() * amplitude` samples to its base delay. The
//! [`ModulationPlan`] decides how a set of rimguides gets its oscillators:
//!
//! | Mode | Frequency | Amplitude | Phase |
//! |------|-----------|-----------|-------|
//! | `Sync` | shared | shared | 0 |
//! | `PhaseOffset` | shared | shared | `k * offset` for rimguide `k` |
//! | `Random` | `f * (1 + r * spread)` | shared | 0 |
//! | `RandomFreqAndAmp` | `f * (1 + r * spread)` | `A * (1 + r * amp_spread)` | 0 |
//!
//! `r` is uniform in `[-1, 1]` from a seeded [`Xorshift32`], so a given plan
//! always produces the same render.

use crate::SineLfo;
use core::fmt;

/// Trait for anything that can generate modulation signals.
///
/// `Send` is required because rimguides are ticked on worker threads.
///
/// # Example
///
/// ```rust
/// use membrane_core::{ModulationSource, SineLfo};
///
/// let mut lfo = SineLfo::new(11025.0, 2.0);
/// let value = lfo.mod_advance();
/// assert!(value >= -1.0 && value <= 1.0);
/// assert!(lfo.is_bipolar());
/// ```
pub trait ModulationSource: Send + fmt::Debug {
    /// Get the next modulation value.
    ///
    /// Returns a value in the range:
    /// - Bipolar sources: -1.0 to 1.0
    /// - Unipolar sources: 0.0 to 1.0
    fn mod_advance(&mut self) -> f32;

    /// Check if this source is bipolar (-1 to 1) or unipolar (0 to 1).
    fn is_bipolar(&self) -> bool;

    /// Reset the modulation source to its initial state.
    fn mod_reset(&mut self);

    /// Get the current value without advancing.
    fn mod_value(&self) -> f32;

    /// Convert to bipolar (-1 to 1) regardless of source type.
    fn mod_advance_bipolar(&mut self) -> f32 {
        let value = self.mod_advance();
        if self.is_bipolar() {
            value
        } else {
            value * 2.0 - 1.0
        }
    }
}

impl ModulationSource for SineLfo {
    fn mod_advance(&mut self) -> f32 {
        self.advance()
    }

    fn is_bipolar(&self) -> bool {
        true
    }

    fn mod_reset(&mut self) {
        self.reset();
    }

    fn mod_value(&self) -> f32 {
        self.value()
    }
}

/// How oscillators are distributed over the rimguides of a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModulationMode {
    /// Every rimguide moves in lockstep
    #[default]
    Sync,
    /// Identical oscillators, phase staggered per rimguide
    PhaseOffset,
    /// Frequency randomized per rimguide
    Random,
    /// Frequency and amplitude randomized per rimguide
    RandomFreqAndAmp,
}

/// 32-bit xorshift PRNG.
///
/// Small and deterministic; good enough for spreading modulation rates.
#[derive(Debug, Clone)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Seed the generator. A zero seed is replaced with a fixed constant.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x1234_5678 } else { seed },
        }
    }

    /// Next raw value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform value in `[-1, 1]`.
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        (self.next_u32() as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

/// Recipe for the delay modulators of a whole mesh.
#[derive(Debug, Clone)]
pub struct ModulationPlan {
    /// Distribution mode
    pub mode: ModulationMode,
    /// Base oscillator frequency in Hz
    pub frequency: f32,
    /// Base depth in samples of delay
    pub amplitude: f32,
    /// Phase step between successive rimguides, in cycles
    pub phase_offset: f32,
    /// Relative frequency spread for the random modes
    pub random_freq: f32,
    /// Relative amplitude spread for `RandomFreqAndAmp`
    pub random_amp: f32,
    /// PRNG seed
    pub seed: u32,
}

impl Default for ModulationPlan {
    fn default() -> Self {
        Self {
            mode: ModulationMode::Sync,
            frequency: 1.0,
            amplitude: 1.0,
            phase_offset: 0.0,
            random_freq: 1.0,
            random_amp: 1.0,
            seed: 0x1234_5678,
        }
    }
}

impl ModulationPlan {
    /// Build `count` oscillators and their amplitudes in rimguide order.
    pub fn build(&self, sample_rate: f32, count: usize) -> Vec<(SineLfo, f32)> {
        let mut rng = Xorshift32::new(self.seed);
        let mut phase = self.phase_offset;

        (0..count)
            .map(|_| {
                let mut lfo = SineLfo::new(sample_rate, self.frequency);
                let mut amplitude = self.amplitude;
                match self.mode {
                    ModulationMode::Sync => {}
                    ModulationMode::PhaseOffset => {
                        lfo.add_phase(phase);
                        phase += self.phase_offset;
                    }
                    ModulationMode::Random => {
                        lfo.set_frequency(self.random_frequency(&mut rng));
                    }
                    ModulationMode::RandomFreqAndAmp => {
                        lfo.set_frequency(self.random_frequency(&mut rng));
                        amplitude =
                            (self.amplitude * (1.0 + rng.next_bipolar() * self.random_amp)).max(0.0);
                    }
                }
                (lfo, amplitude)
            })
            .collect()
    }

    fn random_frequency(&self, rng: &mut Xorshift32) -> f32 {
        (self.frequency * (1.0 + rng.next_bipolar() * self.random_freq)).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xorshift_range_and_determinism() {
        let mut a = Xorshift32::new(42);
        let mut b = Xorshift32::new(42);
        for _ in 0..1000 {
            let va = a.next_bipolar();
            assert!((-1.0..=1.0).contains(&va));
            assert_eq!(va, b.next_bipolar());
        }
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = Xorshift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_sync_plan_is_uniform() {
        let plan = ModulationPlan {
            frequency: 3.0,
            amplitude: 0.5,
            ..ModulationPlan::default()
        };
        let bank = plan.build(11025.0, 5);
        assert_eq!(bank.len(), 5);
        for (lfo, amp) in &bank {
            assert!((lfo.frequency() - 3.0).abs() < 1e-4);
            assert_eq!(lfo.phase(), 0.0);
            assert_eq!(*amp, 0.5);
        }
    }

    #[test]
    fn test_phase_offset_plan_staggers() {
        let plan = ModulationPlan {
            mode: ModulationMode::PhaseOffset,
            phase_offset: 0.1,
            ..ModulationPlan::default()
        };
        let bank = plan.build(11025.0, 3);
        let phases: Vec<f32> = bank.iter().map(|(lfo, _)| lfo.phase()).collect();
        assert!((phases[0] - 0.1).abs() < 1e-6);
        assert!((phases[1] - 0.2).abs() < 1e-6);
        assert!((phases[2] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_random_plan_spreads_frequency() {
        let plan = ModulationPlan {
            mode: ModulationMode::RandomFreqAndAmp,
            frequency: 2.0,
            random_freq: 0.5,
            random_amp: 0.5,
            ..ModulationPlan::default()
        };
        let bank = plan.build(11025.0, 16);
        let first = bank[0].0.frequency();
        assert!(
            bank.iter().any(|(lfo, _)| (lfo.frequency() - first).abs() > 1e-3),
            "random mode should not give identical frequencies"
        );
        for (lfo, amp) in &bank {
            assert!(lfo.frequency() >= 1.0 - 1e-4 && lfo.frequency() <= 3.0 + 1e-4);
            assert!(*amp >= 0.0 && *amp <= 1.5 + 1e-6);
        }
    }
}
