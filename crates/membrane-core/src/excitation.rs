//! Excitation signals fed to the input tap.

use core::f32::consts::TAU;
use libm::cosf;

/// Signal injected at the start of a render.
#[derive(Debug, Clone, PartialEq)]
pub enum Excitation {
    /// A single unit sample
    Dirac,
    /// One period of a raised cosine, a smooth strike
    RaisedCosine {
        /// Frequency of the cosine in Hz; the pulse lasts `1 / frequency` seconds
        frequency: f32,
    },
    /// Arbitrary samples, for example loaded from a file
    Samples(Vec<f32>),
}

impl Default for Excitation {
    fn default() -> Self {
        Self::RaisedCosine { frequency: 100.0 }
    }
}

impl Excitation {
    /// Materialize the excitation at `sample_rate`.
    pub fn samples(&self, sample_rate: f32) -> Vec<f32> {
        match self {
            Self::Dirac => vec![1.0],
            Self::RaisedCosine { frequency } => raised_cosine(*frequency, sample_rate),
            Self::Samples(samples) => samples.clone(),
        }
    }
}

/// One period of `0.5 * (1 - cos(2π n f / fs))`.
///
/// Empty when `freq_hz` is not positive or exceeds the sample rate.
pub fn raised_cosine(freq_hz: f32, sample_rate: f32) -> Vec<f32> {
    if freq_hz <= 0.0 || !freq_hz.is_finite() {
        return Vec::new();
    }
    let len = (sample_rate / freq_hz) as usize;
    let step = TAU * freq_hz / sample_rate;
    (0..len).map(|n| 0.5 * (1.0 - cosf(step * n as f32))).collect()
}
