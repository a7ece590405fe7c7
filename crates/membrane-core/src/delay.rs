//! Allpass-interpolated fractional delay line.
//!
//! Waveguide loops need fractional delays whose interpolation does not
//! low-pass the signal on every round trip. A first-order allpass
//! interpolator has unity gain at all frequencies, so the loop losses come
//! only from the damping filters.
//!
//! # Interpolation
//!
//! For a delay of `D` samples the read pointer sits `D - 1` samples behind the
//! write pointer (one sample is absorbed by the write-before-read ordering).
//! The fractional part `alpha` is kept in `[0.5, 1.5)` and drives a
//! first-order allpass:
//!
//! ```text
//! coeff = (1 - alpha) / (1 + alpha)
//! y[n]  = -coeff * y[n-1] + x_d[n-1] + coeff * x_d[n]
//! ```
//!
//! | Use | Typical delay | Capacity |
//! |-----|---------------|----------|
//! | Rimguide boundary | 0.5 to a few samples | next power of two |
//! | Clamped center | 2.5 | 8 |
//! | Listener propagation | `distance / (c_air / fs)` | delay + 8 |
//!
//! Reference: Julius O. Smith III, "Physical Audio Signal Processing",
//! Section: First-Order Allpass Interpolation.

use crate::flush_denormal;

/// Smallest delay the allpass interpolator can realize, in samples.
pub const MIN_DELAY: f32 = 0.5;

/// Fractional delay line with allpass interpolation.
///
/// The buffer is allocated once in [`AllpassDelay::new`] and never grows.
/// Delays are clamped to `[MIN_DELAY, max_delay]`.
///
/// # Example
///
/// ```rust
/// use membrane_core::AllpassDelay;
///
/// let mut delay = AllpassDelay::new(3.0, 8);
/// let first = delay.tick(1.0);
/// assert_eq!(first, 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct AllpassDelay {
    buffer: Vec<f32>,
    write_pos: usize,
    read_pos: usize,
    delay: f32,
    alpha: f32,
    coeff: f32,
    ap_input: f32,
    last_out: f32,
}

impl AllpassDelay {
    /// Create a delay line of `delay` samples able to stretch up to `max_delay`.
    pub fn new(delay: f32, max_delay: usize) -> Self {
        let mut line = Self {
            buffer: vec![0.0; max_delay.max(1) + 1],
            write_pos: 0,
            read_pos: 0,
            delay: MIN_DELAY,
            alpha: 1.0,
            coeff: 0.0,
            ap_input: 0.0,
            last_out: 0.0,
        };
        line.set_delay(delay);
        line
    }

    /// Set the delay in samples.
    ///
    /// The value is clamped to `[MIN_DELAY, max_delay]`. Safe to call every
    /// sample for modulated delays.
    pub fn set_delay(&mut self, delay: f32) {
        let len = self.buffer.len();
        let delay = delay.clamp(MIN_DELAY, (len - 1) as f32);

        let mut read_ptr = self.write_pos as f32 - delay + 1.0;
        while read_ptr < 0.0 {
            read_ptr += len as f32;
        }

        let mut read_pos = read_ptr as usize;
        if read_pos >= len {
            read_pos = 0;
        }

        let mut alpha = 1.0 + read_pos as f32 - read_ptr;
        if alpha < 0.5 {
            read_pos += 1;
            if read_pos >= len {
                read_pos -= len;
            }
            alpha += 1.0;
        }

        self.read_pos = read_pos;
        self.alpha = alpha;
        self.coeff = (1.0 - alpha) / (1.0 + alpha);
        self.delay = delay;
    }

    /// Current delay in samples.
    #[inline]
    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Largest delay this line can realize.
    #[inline]
    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 1
    }

    /// Push one sample and return the delayed output.
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = input;
        self.write_pos += 1;
        if self.write_pos == len {
            self.write_pos = 0;
        }

        let delayed = self.buffer[self.read_pos];
        let out = -self.coeff * self.last_out + self.ap_input + self.coeff * delayed;
        self.last_out = flush_denormal(out);

        self.ap_input = delayed;
        self.read_pos += 1;
        if self.read_pos == len {
            self.read_pos = 0;
        }

        self.last_out
    }

    /// Most recent output sample.
    #[inline]
    pub fn last_out(&self) -> f32 {
        self.last_out
    }

    /// Zero the buffer and interpolator state. The delay length is kept.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.ap_input = 0.0;
        self.last_out = 0.0;
    }
}
