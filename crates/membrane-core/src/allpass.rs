//! First-order allpass filters for boundary dispersion.
//!
//! Both filters use the one-multiply lattice form:
//!
//! ```text
//! u[n] = x[n] - a * u[n-1]
//! y[n] = a * u[n] + u[n-1]
//! ```
//!
//! giving `H(z) = (a + z^-1) / (1 + a z^-1)`. A chain of these at a rimguide
//! smears the reflected wave in time without changing its magnitude
//! spectrum, which is how stiffness-like dispersion is added at the edge.
//!
//! [`NonlinearAllpass`] switches its coefficient on the sign of the internal
//! state, producing a passive, energy-preserving nonlinearity (Pierce & Van
//! Duyne, "A passive nonlinear digital filter design which facilitates
//! physics-based sound synthesis of highly nonlinear musical instruments").

use crate::flush_denormal;

/// First-order lattice allpass.
///
/// Stable for `|a| < 1`.
///
/// # Example
///
/// ```rust
/// use membrane_core::Allpass;
///
/// let mut ap = Allpass::new(0.5);
/// let first = ap.process(1.0);
/// assert_eq!(first, 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Allpass {
    coeff: f32,
    /// `a * u[n-1]`
    z_feedback: f32,
    /// `u[n-1]`
    z_state: f32,
    last_out: f32,
}

impl Allpass {
    /// Create an allpass with coefficient `a`.
    pub fn new(a: f32) -> Self {
        Self {
            coeff: a,
            ..Self::default()
        }
    }

    /// Set the coefficient.
    #[inline]
    pub fn set_coeff(&mut self, a: f32) {
        self.coeff = a;
    }

    /// Current coefficient.
    #[inline]
    pub fn coeff(&self) -> f32 {
        self.coeff
    }

    /// Process a single sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let u = x - self.z_feedback;
        self.last_out = self.coeff * u + self.z_state;
        self.z_feedback = flush_denormal(u * self.coeff);
        self.z_state = flush_denormal(u);
        self.last_out
    }

    /// Most recent output.
    #[inline]
    pub fn last_out(&self) -> f32 {
        self.last_out
    }

    /// Clear the filter state.
    pub fn clear(&mut self) {
        self.z_feedback = 0.0;
        self.z_state = 0.0;
        self.last_out = 0.0;
    }
}

/// Lattice allpass whose coefficient depends on the sign of its state.
///
/// Uses `a[0]` while `u[n] > 0` and `a[1]` otherwise. With both coefficients
/// inside the unit circle the filter stays passive.
#[derive(Debug, Clone, Default)]
pub struct NonlinearAllpass {
    coeffs: [f32; 2],
    z_feedback: f32,
    z_state: f32,
    last_out: f32,
}

impl NonlinearAllpass {
    /// Create a filter with the positive-state and negative-state coefficients.
    pub fn new(positive: f32, negative: f32) -> Self {
        Self {
            coeffs: [positive, negative],
            ..Self::default()
        }
    }

    /// Set both coefficients.
    pub fn set_coeffs(&mut self, positive: f32, negative: f32) {
        self.coeffs = [positive, negative];
    }

    /// Current `(positive, negative)` coefficients.
    pub fn coeffs(&self) -> (f32, f32) {
        (self.coeffs[0], self.coeffs[1])
    }

    /// Process a single sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let u = x - self.z_feedback;
        let a = if u > 0.0 { self.coeffs[0] } else { self.coeffs[1] };
        self.last_out = a * u + self.z_state;
        self.z_feedback = flush_denormal(u * a);
        self.z_state = flush_denormal(u);
        self.last_out
    }

    /// Most recent output.
    #[inline]
    pub fn last_out(&self) -> f32 {
        self.last_out
    }

    /// Clear the filter state.
    pub fn clear(&mut self) {
        self.z_feedback = 0.0;
        self.z_state = 0.0;
        self.last_out = 0.0;
    }
}
