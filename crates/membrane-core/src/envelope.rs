//! Envelope follower driving automatic pitch bend at the rim.
//!
//! Large membrane displacements raise the effective tension, so louder hits
//! sound sharper and glide down as they decay. A rimguide tracks the level
//! of the wave it reflects and stretches its delay by that envelope.

use libm::exp;

/// Critically damped two-pole envelope follower.
///
/// ```text
/// a  = exp(-1 / period_samples)
/// y[n] = (1 - a)^2 * |x[n]| + 2a * y[n-1] - a^2 * y[n-2]
/// ```
///
/// Both poles sit at `a`, so the step response rises without overshoot and
/// the DC gain is one. With `a` near one the recursion amplifies rounding
/// by `1 / (1 - a)^2`; coefficients and state are kept in `f64`.
///
/// # Example
///
/// ```rust
/// use membrane_core::EnvelopeFollower;
///
/// // Track at the fundamental period of a 100 Hz membrane
/// let mut env = EnvelopeFollower::critically_damped(11025.0, 100.0);
/// let level = env.process(-0.5);
/// assert!(level > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    b0: f64,
    a1: f64,
    a2: f64,
    y1: f64,
    y2: f64,
}

impl EnvelopeFollower {
    /// Follower whose time constant is one period of `freq_hz`.
    pub fn critically_damped(sample_rate: f32, freq_hz: f32) -> Self {
        let period = 1.0 / f64::from(freq_hz.max(f32::EPSILON));
        Self::with_pole(exp(-1.0 / (f64::from(sample_rate) * period)))
    }

    /// Follower with both poles at `a`.
    pub fn from_pole(a: f32) -> Self {
        Self::with_pole(f64::from(a))
    }

    fn with_pole(a: f64) -> Self {
        let a1 = -2.0 * a;
        let a2 = a * a;
        Self {
            b0: 1.0 + a1 + a2,
            a1,
            a2,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Pole of both filter sections.
    pub fn pole(&self) -> f32 {
        (-0.5 * self.a1) as f32
    }

    /// Feed a sample and return the envelope level.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let y = self.b0 * f64::from(input.abs()) - self.a1 * self.y1 - self.a2 * self.y2;
        self.y2 = self.y1;
        self.y1 = y;
        y as f32
    }

    /// Current envelope level.
    pub fn level(&self) -> f32 {
        self.y1 as f32
    }

    /// Reset the envelope to zero.
    pub fn reset(&mut self) {
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_dc_gain() {
        let mut env = EnvelopeFollower::critically_damped(11025.0, 200.0);
        let mut level = 0.0;
        for _ in 0..11025 {
            level = env.process(0.8);
        }
        assert!((level - 0.8).abs() < 1e-3, "level {} should settle at 0.8", level);
    }

    #[test]
    fn test_rectifies_input() {
        let mut pos = EnvelopeFollower::from_pole(0.9);
        let mut neg = EnvelopeFollower::from_pole(0.9);
        for _ in 0..50 {
            assert_eq!(pos.process(0.5), neg.process(-0.5));
        }
    }

    #[test]
    fn test_no_overshoot() {
        let mut env = EnvelopeFollower::from_pole(0.95);
        for _ in 0..2000 {
            let level = env.process(1.0);
            assert!(level <= 1.0, "critically damped follower overshot: {}", level);
        }
    }

    #[test]
    fn test_slow_pole_settles_exactly() {
        let mut env = EnvelopeFollower::from_pole(0.9995);
        let mut level = 0.0;
        for _ in 0..200_000 {
            level = env.process(1.0);
            assert!(level <= 1.0, "overshot: {}", level);
        }
        assert!((level - 1.0).abs() < 1e-6, "settled at {}", level);
    }

    #[test]
    fn test_pole_from_frequency() {
        let env = EnvelopeFollower::critically_damped(11025.0, 110.25);
        assert!((env.pole() - libm::expf(-0.01)).abs() < 1e-7, "pole {}", env.pole());
    }

    #[test]
    fn test_decays_after_release() {
        let mut env = EnvelopeFollower::from_pole(0.9);
        for _ in 0..200 {
            env.process(1.0);
        }
        let peak = env.level();
        for _ in 0..200 {
            env.process(0.0);
        }
        assert!(env.level() < peak * 0.01);

        env.reset();
        assert_eq!(env.level(), 0.0);
    }
}
