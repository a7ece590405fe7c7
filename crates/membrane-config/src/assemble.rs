//! Turning a scene into a ready mesh and render settings.

use membrane_core::{
    Excitation, ListenerInfo, Mesh2D, ModulationPlan, RenderSettings, RimguideInfo, Topology,
};

use crate::derived::DerivedParams;
use crate::error::ConfigError;
use crate::scene::MembraneConfig;

impl MembraneConfig {
    /// Derived physical quantities for this scene.
    pub fn derived(&self) -> DerivedParams {
        DerivedParams::from_config(self)
    }

    /// Boundary configuration for this scene.
    pub fn rimguide_info(&self, derived: &DerivedParams) -> RimguideInfo {
        let rimguide = &self.rimguide;
        RimguideInfo {
            shape: self.mesh.shape.into(),
            friction_coeff: derived.friction_coeff,
            friction_delay: derived.friction_delay,
            wave_speed: derived.wave_speed,
            sample_rate: self.sample_rate(),
            is_solid_boundary: self.physics.solid_boundary,
            fundamental_frequency: derived.fundamental_hz,
            use_automatic_pitch_bend: rimguide.pitch_bend,
            pitch_bend_amount: rimguide.pitch_bend_amount,
            use_square_law_nonlinearity: rimguide.square_law,
            nonlinear_factor: rimguide.nonlinear_factor,
            use_nonlinear_allpass: rimguide.nonlinear_allpass,
            nonlinear_allpass_coeffs: rimguide.nonlinear_allpass_coeffs,
            use_extra_diffusion_filters: rimguide.diffusion,
            diffusion_coeffs: rimguide.diffusion_coeffs.clone(),
        }
    }

    /// Delay modulation recipe, if enabled.
    pub fn modulation_plan(&self) -> Option<ModulationPlan> {
        let m = &self.modulation;
        m.enabled.then(|| ModulationPlan {
            mode: m.mode.into(),
            frequency: m.frequency,
            amplitude: m.amplitude,
            phase_offset: m.phase_offset,
            random_freq: m.random_freq,
            random_amp: m.random_amp,
            seed: m.seed,
        })
    }

    /// Build the mesh: mask, boundary, taps, optional center clamp and
    /// optional delay modulators, in that order.
    pub fn build_mesh(&self) -> Result<Mesh2D, ConfigError> {
        self.validate()?;
        let derived = self.derived();
        if derived
            .inclusion_extent
            .iter()
            .any(|e| !e.is_finite() || *e <= 0.0)
        {
            return Err(ConfigError::invalid(
                "mesh.shape",
                format!(
                    "too small for a junction spacing of {} m",
                    derived.sample_distance
                ),
            ));
        }

        let (lx, ly) = derived.grid_size;
        let mut mesh = Mesh2D::with_threads(
            Topology::from(self.mesh.topology),
            lx,
            ly,
            derived.sample_distance,
            self.mesh.threads,
        );
        mesh.set_multithread_threshold(self.mesh.multithread_threshold);

        let mask = mesh.mask_for_shape(&derived.inclusion);
        mesh.init(&mask);
        mesh.init_boundary(&self.rimguide_info(&derived));

        let [ix, iy] = self.taps.input;
        let [ox, oy] = self.taps.output;
        mesh.set_input(ix, iy);
        mesh.set_output(ox, oy);

        if self.physics.clamp_center {
            mesh.clamp_center_with_rimguide();
        }

        if let Some(plan) = self.modulation_plan() {
            let mut modulators = plan
                .build(self.sample_rate(), mesh.rimguide_count())
                .into_iter();
            mesh.for_each_rimguide_mut(|_, rimguide| {
                if let Some((lfo, amplitude)) = modulators.next() {
                    rimguide.set_modulator(Box::new(lfo), amplitude);
                }
            });
            tracing::debug!(mode = ?plan.mode, rimguides = mesh.rimguide_count(), "modulators attached");
        }

        tracing::info!(
            grid_x = lx,
            grid_y = ly,
            junctions = mesh.junction_count(),
            rimguides = mesh.rimguide_count(),
            fundamental_hz = derived.fundamental_hz,
            "mesh built from config"
        );
        Ok(mesh)
    }

    /// Render settings with the configured excitation.
    ///
    /// A file excitation needs its samples loaded first; use
    /// [`MembraneConfig::build_render_with`] for it.
    pub fn build_render(&self) -> Result<RenderSettings, ConfigError> {
        self.validate()?;
        let excitation = self.excitation.signal().ok_or_else(|| {
            ConfigError::invalid(
                "excitation.kind",
                "file excitations must be loaded and passed to build_render_with",
            )
        })?;
        Ok(self.build_render_with(excitation))
    }

    /// Render settings with an explicit excitation signal.
    pub fn build_render_with(&self, excitation: Excitation) -> RenderSettings {
        let fs = self.sample_rate();
        RenderSettings {
            seconds: self.render.seconds,
            sample_rate: fs,
            excitation,
            amplitude: self.excitation.amplitude,
            listener: ListenerInfo {
                position: self.listener.position(),
                sample_rate: fs,
                listener_type: self.listener.kind.into(),
                radius: self.listener.radius,
            },
            listener_gain: self.listener.gain,
            dc_blocker: self
                .render
                .dc_blocker
                .then_some(self.render.dc_blocker_coeff),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ExcitationKind, ListenerKind, ModulationKind, ShapeConfig, TopologyKind};
    use membrane_core::ListenerType;

    fn small() -> MembraneConfig {
        let mut config = MembraneConfig::default();
        config.mesh.shape = ShapeConfig::Circle { radius: 0.1 };
        config
    }

    #[test]
    fn test_build_mesh_counts() {
        let mesh = small().build_mesh().unwrap();
        assert!(mesh.junction_count() > 100, "{}", mesh.junction_count());
        assert!(mesh.rimguide_count() > 0);
        assert_eq!(mesh.rimguide_count(), mesh.boundary_count());
        assert_eq!(mesh.topology(), Topology::Triangular);
        assert_eq!(mesh.sample_rate(), 11025.0);
        assert_eq!(mesh.threads(), 4);
    }

    #[test]
    fn test_build_mesh_rectangle() {
        let mut config = MembraneConfig::default();
        config.mesh.shape = ShapeConfig::Rectangle {
            length: 0.2,
            width: 0.15,
        };
        config.mesh.topology = TopologyKind::Rectilinear;
        let mesh = config.build_mesh().unwrap();
        assert!(mesh.rimguide_count() > 0);
        assert_eq!(mesh.rimguide_count(), mesh.boundary_count());
    }

    #[test]
    fn test_clamp_center_adds_inner_rimguides() {
        let plain = small().build_mesh().unwrap();
        let mut config = small();
        config.physics.clamp_center = true;
        let clamped = config.build_mesh().unwrap();
        assert_eq!(clamped.rimguide_count(), plain.rimguide_count() + 6);
        assert_eq!(clamped.junction_count(), plain.junction_count() - 1);
    }

    #[test]
    fn test_modulation_changes_output() {
        let mut plain = small().build_mesh().unwrap();
        let mut config = small();
        config.modulation.enabled = true;
        config.modulation.mode = ModulationKind::Random;
        config.modulation.frequency = 50.0;
        config.modulation.amplitude = 2.0;
        let mut modulated = config.build_mesh().unwrap();

        let a: Vec<f32> = (0..400).map(|n| plain.tick(if n == 0 { 1.0 } else { 0.0 })).collect();
        let b: Vec<f32> = (0..400).map(|n| modulated.tick(if n == 0 { 1.0 } else { 0.0 })).collect();
        assert_ne!(a, b, "modulated rimguides should change the response");
    }

    #[test]
    fn test_build_mesh_rejects_invalid() {
        let mut config = small();
        config.physics.tension = -1.0;
        assert!(config.build_mesh().is_err());
    }

    #[test]
    fn test_build_mesh_rejects_tiny_shape() {
        let mut config = MembraneConfig::default();
        config.mesh.shape = ShapeConfig::Circle { radius: 0.005 };
        let err = config.build_mesh().unwrap_err();
        assert_eq!(err.field(), Some("mesh.shape"));
    }

    #[test]
    fn test_build_render() {
        let mut config = MembraneConfig::default();
        config.listener.kind = ListenerKind::Boundary;
        config.listener.gain = Some(2.0);
        config.render.seconds = 0.5;
        config.render.dc_blocker = true;

        let settings = config.build_render().unwrap();
        assert_eq!(settings.len(), 5512);
        assert_eq!(settings.listener.listener_type, ListenerType::Boundary);
        assert_eq!(settings.listener_gain, Some(2.0));
        assert_eq!(settings.dc_blocker, Some(0.995));
        assert_eq!(settings.excitation, Excitation::RaisedCosine { frequency: 100.0 });
    }

    #[test]
    fn test_file_excitation_needs_samples() {
        let mut config = MembraneConfig::default();
        config.excitation.kind = ExcitationKind::File;
        config.excitation.file = Some("strike.wav".into());
        let err = config.build_render().unwrap_err();
        assert_eq!(err.field(), Some("excitation.kind"));

        let settings = config.build_render_with(Excitation::Samples(vec![1.0, 0.5]));
        assert_eq!(settings.excitation, Excitation::Samples(vec![1.0, 0.5]));
    }

    #[test]
    fn test_rimguide_info_signs() {
        let config = MembraneConfig::default();
        let derived = config.derived();
        let info = config.rimguide_info(&derived);
        assert_eq!(info.friction_coeff, derived.friction_coeff);
        assert!(info.is_solid_boundary);
        assert_eq!(info.fundamental_frequency, derived.fundamental_hz);
    }
}
