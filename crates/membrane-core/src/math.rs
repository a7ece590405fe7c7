//! Scalar math helpers shared by the filters and the mesh.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//!
//! # Frequency Conversions
//!
//! - [`hz_to_omega`] / [`omega_to_hz`] - Hz to radians per sample and back
//!
//! # Utilities
//!
//! - [`flush_denormal`] - Subnormal protection for feedback paths
//! - [`delay_capacity`] - Power-of-two buffer length for a fractional delay

use libm::{ceilf, expf, log2f, logf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use membrane_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// Values at or below zero are clamped to -200 dB.
///
/// # Example
/// ```rust
/// use membrane_core::linear_to_db;
///
/// assert!((linear_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    // 20 * log10(linear) = 20 * ln(linear) / ln(10)
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Convert frequency to angular frequency in radians per sample.
#[inline]
pub fn hz_to_omega(freq_hz: f32, sample_rate: f32) -> f32 {
    core::f32::consts::TAU * freq_hz / sample_rate
}

/// Convert angular frequency in radians per sample back to Hz.
#[inline]
pub fn omega_to_hz(omega: f32, sample_rate: f32) -> f32 {
    omega * sample_rate / core::f32::consts::TAU
}

/// Flush subnormal (denormalized) floats to zero.
///
/// Subnormal floats cause severe CPU slowdowns on most architectures.
/// Values below 1e-20 are replaced with zero, leaving margin before the
/// IEEE 754 subnormal range begins.
///
/// Use this in feedback loops (damping filters, delay lines, allpass chains)
/// where a decaying mesh keeps feeding the state toward zero.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Buffer length for a fractional delay of `delay` samples.
///
/// Returns `2^ceil(log2(delay + 1))`, never less than 2.
///
/// ```rust
/// use membrane_core::delay_capacity;
///
/// assert_eq!(delay_capacity(2.5), 4);
/// assert_eq!(delay_capacity(7.0), 8);
/// assert_eq!(delay_capacity(0.5), 2);
/// ```
#[inline]
pub fn delay_capacity(delay: f32) -> usize {
    let exponent = ceilf(log2f(delay.max(0.0) + 1.0)).max(1.0);
    1usize << (exponent as u32)
}
