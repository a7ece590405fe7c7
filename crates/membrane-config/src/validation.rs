//! Scene validation.
//!
//! The simulator itself never rejects input; it logs and degrades. A scene
//! file is checked up front instead so a typo surfaces as a clear error
//! naming the field.

use crate::error::ConfigError;
use crate::scene::{ExcitationKind, MembraneConfig, ShapeConfig};

/// Lowest accepted simulation rate in Hz.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Highest accepted simulation rate in Hz.
pub const MAX_SAMPLE_RATE: u32 = 48000;

fn positive(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must not be negative, got {value}")))
    }
}

fn open_unit(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value.abs() < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must lie in (-1, 1), got {value}")))
    }
}

fn normalized(field: &str, value: [f32; 2]) -> Result<(), ConfigError> {
    if value.iter().all(|v| (0.0..=1.0).contains(v)) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("coordinates must lie in [0, 1], got {:?}", value),
        ))
    }
}

impl MembraneConfig {
    /// Check every field against the range the simulation accepts.
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mesh = &self.mesh;
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&mesh.sample_rate) {
            return Err(ConfigError::invalid(
                "mesh.sample_rate",
                format!(
                    "must lie in {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE} Hz, got {}",
                    mesh.sample_rate
                ),
            ));
        }
        match mesh.shape {
            ShapeConfig::Circle { radius } => positive("mesh.shape.radius", radius)?,
            ShapeConfig::Rectangle { length, width } => {
                positive("mesh.shape.length", length)?;
                positive("mesh.shape.width", width)?;
            }
        }
        if mesh.threads == 0 {
            return Err(ConfigError::invalid("mesh.threads", "need at least one thread"));
        }

        let physics = &self.physics;
        positive("physics.tension", physics.tension)?;
        positive("physics.density", physics.density)?;
        non_negative("physics.decay", physics.decay)?;
        non_negative("physics.min_rimguide_delay", physics.min_rimguide_delay)?;
        open_unit("physics.filter_pole", physics.filter_pole)?;
        if let Some(cutoff) = physics.cutoff_hz {
            positive("physics.cutoff_hz", cutoff)?;
            let nyquist = self.sample_rate() * 0.5;
            if cutoff >= nyquist {
                return Err(ConfigError::invalid(
                    "physics.cutoff_hz",
                    format!("must stay below Nyquist ({nyquist} Hz), got {cutoff}"),
                ));
            }
        }

        let rimguide = &self.rimguide;
        non_negative("rimguide.pitch_bend_amount", rimguide.pitch_bend_amount)?;
        non_negative("rimguide.nonlinear_factor", rimguide.nonlinear_factor)?;
        for coeff in rimguide.nonlinear_allpass_coeffs {
            open_unit("rimguide.nonlinear_allpass_coeffs", coeff)?;
        }
        for coeff in &rimguide.diffusion_coeffs {
            open_unit("rimguide.diffusion_coeffs", *coeff)?;
        }

        let modulation = &self.modulation;
        non_negative("modulation.frequency", modulation.frequency)?;
        non_negative("modulation.amplitude", modulation.amplitude)?;
        non_negative("modulation.random_freq", modulation.random_freq)?;
        non_negative("modulation.random_amp", modulation.random_amp)?;
        if !modulation.phase_offset.is_finite() {
            return Err(ConfigError::invalid("modulation.phase_offset", "must be finite"));
        }

        let excitation = &self.excitation;
        if !excitation.amplitude.is_finite() {
            return Err(ConfigError::invalid("excitation.amplitude", "must be finite"));
        }
        match excitation.kind {
            ExcitationKind::Dirac => {}
            ExcitationKind::RaisedCosine => {
                positive("excitation.frequency", excitation.frequency)?;
                if excitation.frequency > self.sample_rate() {
                    return Err(ConfigError::invalid(
                        "excitation.frequency",
                        "pulse would be shorter than one sample",
                    ));
                }
            }
            ExcitationKind::File => {
                if excitation.file.is_none() {
                    return Err(ConfigError::invalid(
                        "excitation.file",
                        "required for a file excitation",
                    ));
                }
            }
        }

        let listener = &self.listener;
        if !listener.position.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::invalid("listener.position", "must be finite"));
        }
        non_negative("listener.radius", listener.radius)?;
        if let Some(gain) = listener.gain
            && !gain.is_finite()
        {
            return Err(ConfigError::invalid("listener.gain", "must be finite"));
        }

        positive("render.seconds", self.render.seconds)?;
        if !(self.render.dc_blocker_coeff > 0.0 && self.render.dc_blocker_coeff < 1.0) {
            return Err(ConfigError::invalid(
                "render.dc_blocker_coeff",
                format!("must lie in (0, 1), got {}", self.render.dc_blocker_coeff),
            ));
        }

        normalized("taps.input", self.taps.input)?;
        normalized("taps.output", self.taps.output)?;
        Ok(())
    }
}
