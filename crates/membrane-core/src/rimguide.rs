//! Rimguides: boundary terminations of the mesh.
//!
//! A boundary junction is missing some neighbors. Instead of reflecting
//! instantly off the missing ports, the wave leaving through them enters a
//! rimguide, travels to the true rim and back, and returns to the junction.
//! This restores the correct geometry for junctions that sit inside the
//! outline and gives every edge reflection its loss and dispersion.
//!
//! # Signal chain
//!
//! Each tick, in order:
//!
//! 1. Delay modulation: `delay + modulator * amplitude`, floored at 0.5
//! 2. Automatic pitch bend: `delay + envelope(|in|) * 100 * amount`, floored at 0.5
//! 3. Square-law nonlinearity: `in^2 * k + in * (1 - k)`
//! 4. Nonlinear allpass
//! 5. Diffusion allpass chain
//! 6. Phase reversal, damping one-pole, fractional delay
//!
//! The nonlinear and dispersive stages act on the wave entering the rim
//! before the damping and travel time back to the junction.
//!
//! # Delay length
//!
//! ```text
//! delay = 2 * distance * fs / c - 1 - friction_delay
//! ```
//!
//! The round trip doubles the distance, the scattering junction contributes
//! one sample, and the damping filter's phase delay is compensated.

use crate::delay::{AllpassDelay, MIN_DELAY};
use crate::{
    Allpass, EnvelopeFollower, ModulationSource, NonlinearAllpass, OnePole, Shape, Vec2,
    delay_capacity,
};

/// Delay stretch per unit of envelope at full pitch-bend amount.
const PITCH_BEND_SCALER: f32 = 100.0;

/// Fixed delay of an inner (clamped center) boundary.
const INNER_BOUNDARY_DELAY: f32 = 2.5;

/// Buffer capacity of an inner boundary.
const INNER_BOUNDARY_CAPACITY: usize = 8;

/// Boundary configuration shared by every rimguide of a mesh.
#[derive(Debug, Clone)]
pub struct RimguideInfo {
    /// Outline the rimguides are projected onto
    pub shape: Shape,
    /// Pole of the damping one-pole
    pub friction_coeff: f32,
    /// Phase delay of the damping filter in samples, removed from the delay
    pub friction_delay: f32,
    /// Wave speed in m/s
    pub wave_speed: f32,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Clamped edge (phase inverting) rather than free edge
    pub is_solid_boundary: bool,
    /// Fundamental in Hz; the pitch-bend envelope pole is `exp(-f / fs)`
    pub fundamental_frequency: f32,
    /// Stretch the delay with the reflected wave's envelope
    pub use_automatic_pitch_bend: bool,
    /// Pitch-bend depth
    pub pitch_bend_amount: f32,
    /// Blend in `in^2`
    pub use_square_law_nonlinearity: bool,
    /// Square-law blend factor
    pub nonlinear_factor: f32,
    /// Run the wave through a sign-dependent allpass
    pub use_nonlinear_allpass: bool,
    /// `(positive, negative)` coefficients of the nonlinear allpass
    pub nonlinear_allpass_coeffs: [f32; 2],
    /// Run the wave through [`RimguideInfo::diffusion_coeffs`]
    pub use_extra_diffusion_filters: bool,
    /// One first-order allpass per coefficient, applied in order
    pub diffusion_coeffs: Vec<f32>,
}

impl Default for RimguideInfo {
    fn default() -> Self {
        Self {
            shape: Shape::Circle { radius: 0.32 },
            friction_coeff: 0.0,
            friction_delay: 0.0,
            wave_speed: 112.65,
            sample_rate: 11025.0,
            is_solid_boundary: true,
            fundamental_frequency: 134.7,
            use_automatic_pitch_bend: false,
            pitch_bend_amount: 0.0,
            use_square_law_nonlinearity: false,
            nonlinear_factor: 0.1,
            use_nonlinear_allpass: false,
            nonlinear_allpass_coeffs: [0.0, 0.0],
            use_extra_diffusion_filters: false,
            diffusion_coeffs: Vec::new(),
        }
    }
}

impl RimguideInfo {
    /// Base delay in samples for a junction at `junction_pos`.
    pub fn delay_for(&self, junction_pos: Vec2) -> f32 {
        let rim_pos = self.shape.project_to_boundary(junction_pos);
        let distance = rim_pos.distance(junction_pos);
        let samples_per_meter = self.sample_rate / self.wave_speed;
        let delay = distance * samples_per_meter * 2.0 - 1.0 - self.friction_delay;
        delay.max(MIN_DELAY)
    }
}

/// Boundary termination owned by one junction.
#[derive(Debug)]
pub struct Rimguide {
    pos: Vec2,
    delay: f32,
    delay_line: AllpassDelay,
    filter: OnePole,
    phase_reversal: f32,
    input: f32,
    output: f32,
    pitch_bend_amount: Option<f32>,
    envelope: EnvelopeFollower,
    nonlinear_factor: Option<f32>,
    nonlinear_allpass: Option<NonlinearAllpass>,
    diffusion: Vec<Allpass>,
    modulator: Option<Box<dyn ModulationSource>>,
    mod_amplitude: f32,
}

impl Rimguide {
    /// Rimguide for a junction at `junction_pos` on the outer boundary.
    pub fn new(info: &RimguideInfo, junction_pos: Vec2) -> Self {
        let delay = info.delay_for(junction_pos);
        let diffusion = if info.use_extra_diffusion_filters {
            info.diffusion_coeffs.iter().map(|&c| Allpass::new(c)).collect()
        } else {
            Vec::new()
        };

        Self {
            pos: info.shape.project_to_boundary(junction_pos),
            delay,
            delay_line: AllpassDelay::new(delay, delay_capacity(delay)),
            filter: OnePole::from_pole(info.friction_coeff),
            phase_reversal: if info.is_solid_boundary { -1.0 } else { 1.0 },
            input: 0.0,
            output: 0.0,
            pitch_bend_amount: info
                .use_automatic_pitch_bend
                .then_some(info.pitch_bend_amount),
            envelope: EnvelopeFollower::critically_damped(
                info.sample_rate,
                info.fundamental_frequency,
            ),
            nonlinear_factor: info
                .use_square_law_nonlinearity
                .then_some(info.nonlinear_factor),
            nonlinear_allpass: info.use_nonlinear_allpass.then(|| {
                NonlinearAllpass::new(info.nonlinear_allpass_coeffs[0], info.nonlinear_allpass_coeffs[1])
            }),
            diffusion,
            modulator: None,
            mod_amplitude: 0.0,
        }
    }

    /// Lossless, non-inverting termination used around a clamped center.
    pub fn inner_boundary() -> Self {
        Self {
            pos: Vec2::ZERO,
            delay: INNER_BOUNDARY_DELAY,
            delay_line: AllpassDelay::new(INNER_BOUNDARY_DELAY, INNER_BOUNDARY_CAPACITY),
            filter: OnePole::from_pole(0.0),
            phase_reversal: 1.0,
            input: 0.0,
            output: 0.0,
            pitch_bend_amount: None,
            envelope: EnvelopeFollower::from_pole(0.0),
            nonlinear_factor: None,
            nonlinear_allpass: None,
            diffusion: Vec::new(),
            modulator: None,
            mod_amplitude: 0.0,
        }
    }

    /// Zero all signal state. Configuration is kept.
    pub fn clear(&mut self) {
        self.delay_line.clear();
        self.delay_line.set_delay(self.delay);
        self.filter.reset();
        self.envelope.reset();
        if let Some(ap) = self.nonlinear_allpass.as_mut() {
            ap.clear();
        }
        for ap in &mut self.diffusion {
            ap.clear();
        }
        if let Some(modulator) = self.modulator.as_mut() {
            modulator.mod_reset();
        }
        self.input = 0.0;
        self.output = 0.0;
    }

    /// Accept the wave leaving the junction toward the rim.
    #[inline]
    pub fn process_scatter(&mut self, input: f32) {
        self.input = input;
    }

    /// Run the boundary chain and produce the wave returning to the junction.
    pub fn process_delay(&mut self) {
        if let Some(modulator) = self.modulator.as_mut() {
            let delay = self.delay + modulator.mod_advance() * self.mod_amplitude;
            self.delay_line.set_delay(delay.max(MIN_DELAY));
        }

        if let Some(amount) = self.pitch_bend_amount {
            let env = self.envelope.process(self.input);
            let delay = self.delay + env * PITCH_BEND_SCALER * amount;
            self.delay_line.set_delay(delay.max(MIN_DELAY));
        }

        let mut x = self.input;

        if let Some(k) = self.nonlinear_factor {
            x = x * x * k + x * (1.0 - k);
        }

        if let Some(ap) = self.nonlinear_allpass.as_mut() {
            x = ap.process(x);
        }

        for ap in &mut self.diffusion {
            x = ap.process(x);
        }

        self.input = x;
        self.output = self.delay_line.tick(self.filter.process(x * self.phase_reversal));
    }

    /// Wave most recently accepted (after the nonlinear stages once processed).
    #[inline]
    pub fn last_in(&self) -> f32 {
        self.input
    }

    /// Wave returning to the junction.
    #[inline]
    pub fn last_out(&self) -> f32 {
        self.output
    }

    /// Position on the outline.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    /// Base delay in samples.
    #[inline]
    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Delay currently applied by the delay line, including modulation.
    #[inline]
    pub fn current_delay(&self) -> f32 {
        self.delay_line.delay()
    }

    /// True for solid (phase inverting) boundaries.
    #[inline]
    pub fn is_solid(&self) -> bool {
        self.phase_reversal < 0.0
    }

    /// Attach a delay modulator with depth `amplitude` in samples.
    pub fn set_modulator(&mut self, modulator: Box<dyn ModulationSource>, amplitude: f32) {
        self.modulator = Some(modulator);
        self.mod_amplitude = amplitude;
    }

    /// True when a delay modulator is attached.
    pub fn has_modulator(&self) -> bool {
        self.modulator.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SineLfo;

    fn circle_info(radius: f32) -> RimguideInfo {
        RimguideInfo {
            shape: Shape::Circle { radius },
            wave_speed: 100.0,
            sample_rate: 10000.0,
            ..RimguideInfo::default()
        }
    }

    #[test]
    fn test_delay_from_geometry() {
        // 0.05 m from the rim at 100 samples per meter: 2 * 5 - 1 = 9
        let info = circle_info(0.5);
        let rim = Rimguide::new(&info, Vec2::new(0.45, 0.0));
        assert!((rim.delay() - 9.0).abs() < 1e-3, "delay = {}", rim.delay());
        assert!((rim.position().x - 0.5).abs() < 1e-6);
        assert_eq!(rim.position().y, 0.0);
    }

    #[test]
    fn test_delay_floor() {
        let info = RimguideInfo {
            friction_delay: 5.0,
            ..circle_info(0.5)
        };
        let rim = Rimguide::new(&info, Vec2::new(0.4999, 0.0));
        assert_eq!(rim.delay(), MIN_DELAY);
    }

    #[test]
    fn test_solid_boundary_inverts() {
        // Zero friction, integer delay: the pulse comes back inverted after `delay` ticks
        let info = circle_info(0.5);
        let mut rim = Rimguide::new(&info, Vec2::new(0.45, 0.0));
        assert!(rim.is_solid());

        rim.process_scatter(1.0);
        rim.process_delay();
        let mut outputs = vec![rim.last_out()];
        for _ in 0..12 {
            rim.process_scatter(0.0);
            rim.process_delay();
            outputs.push(rim.last_out());
        }
        let (peak_idx, peak) = outputs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, v)| (i, *v))
            .unwrap();
        assert!(peak < -0.99, "reflection should be inverted, got {}", peak);
        assert_eq!(peak_idx, 9);
    }

    #[test]
    fn test_free_boundary_keeps_sign() {
        let info = RimguideInfo {
            is_solid_boundary: false,
            ..circle_info(0.5)
        };
        let mut rim = Rimguide::new(&info, Vec2::new(0.45, 0.0));
        rim.process_scatter(1.0);
        rim.process_delay();
        let mut sum = 0.0;
        for _ in 0..20 {
            rim.process_scatter(0.0);
            rim.process_delay();
            sum += rim.last_out();
        }
        assert!(sum > 0.99);
    }

    #[test]
    fn test_inner_boundary() {
        let mut rim = Rimguide::inner_boundary();
        assert_eq!(rim.delay(), 2.5);
        assert!(!rim.is_solid());

        rim.process_scatter(1.0);
        rim.process_delay();
        let mut energy = rim.last_out() * rim.last_out();
        for _ in 0..64 {
            rim.process_scatter(0.0);
            rim.process_delay();
            energy += rim.last_out() * rim.last_out();
        }
        assert!((energy - 1.0).abs() < 1e-3, "inner boundary should be lossless, energy {}", energy);
    }

    #[test]
    fn test_square_law() {
        let info = RimguideInfo {
            use_square_law_nonlinearity: true,
            nonlinear_factor: 0.5,
            ..circle_info(0.5)
        };
        let mut rim = Rimguide::new(&info, Vec2::new(0.45, 0.0));
        rim.process_scatter(0.5);
        rim.process_delay();
        // 0.25 * 0.5 + 0.5 * 0.5
        assert!((rim.last_in() - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_diffusion_only_when_enabled() {
        let disabled = RimguideInfo {
            diffusion_coeffs: vec![0.5, -0.3],
            ..circle_info(0.5)
        };
        let mut rim = Rimguide::new(&disabled, Vec2::new(0.45, 0.0));
        rim.process_scatter(1.0);
        rim.process_delay();
        assert_eq!(rim.last_in(), 1.0);

        let enabled = RimguideInfo {
            use_extra_diffusion_filters: true,
            ..disabled
        };
        let mut rim = Rimguide::new(&enabled, Vec2::new(0.45, 0.0));
        rim.process_scatter(1.0);
        rim.process_delay();
        // first sample of a lattice allpass is a * x
        assert!((rim.last_in() - 0.5 * -0.3).abs() < 1e-6);
    }

    #[test]
    fn test_modulator_moves_delay_above_floor() {
        let info = circle_info(0.5);
        let mut rim = Rimguide::new(&info, Vec2::new(0.45, 0.0));
        let mut lfo = SineLfo::new(10000.0, 100.0);
        lfo.add_phase(0.75);
        rim.set_modulator(Box::new(lfo), 20.0);
        assert!(rim.has_modulator());

        let mut min_delay = f32::MAX;
        for _ in 0..200 {
            rim.process_scatter(0.0);
            rim.process_delay();
            min_delay = min_delay.min(rim.current_delay());
        }
        assert_eq!(min_delay, MIN_DELAY);
    }

    #[test]
    fn test_pitch_bend_lengthens_delay() {
        let info = RimguideInfo {
            use_automatic_pitch_bend: true,
            pitch_bend_amount: 0.5,
            ..circle_info(0.5)
        };
        let mut rim = Rimguide::new(&info, Vec2::new(0.45, 0.0));
        for _ in 0..50 {
            rim.process_scatter(0.01);
            rim.process_delay();
        }
        assert!(rim.current_delay() > rim.delay());
    }

    #[test]
    fn test_pitch_bend_time_constant() {
        // one fundamental period: 134.7 Hz at 11025 Hz
        let info = RimguideInfo {
            use_automatic_pitch_bend: true,
            fundamental_frequency: 134.7,
            sample_rate: 11025.0,
            ..RimguideInfo::default()
        };
        let rim = Rimguide::new(&info, Vec2::new(0.3, 0.0));
        let expected = libm::expf(-134.7 / 11025.0);
        assert!(
            (rim.envelope.pole() - expected).abs() < 1e-6,
            "pole {} expected {}",
            rim.envelope.pole(),
            expected
        );
    }

    #[test]
    fn test_clear() {
        let info = circle_info(0.5);
        let mut rim = Rimguide::new(&info, Vec2::new(0.45, 0.0));
        for _ in 0..5 {
            rim.process_scatter(1.0);
            rim.process_delay();
        }
        rim.clear();
        assert_eq!(rim.last_out(), 0.0);
        for _ in 0..20 {
            rim.process_scatter(0.0);
            rim.process_delay();
            assert_eq!(rim.last_out(), 0.0);
        }
    }
}
