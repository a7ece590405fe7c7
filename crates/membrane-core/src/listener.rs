//! Virtual microphone above the mesh.
//!
//! Every qualifying junction is treated as a point source radiating into
//! free air. Its pressure reaches the listener through a fractional delay
//! of `distance / (343 / fs)` samples scaled by `(343 / fs) / distance`.
//! Distances shorter than one junction spacing are clamped to it for the
//! loss.
//!
//! | Type | Sources |
//! |------|---------|
//! | `All` | every active junction |
//! | `Boundary` | junctions with missing neighbors |
//! | `Zone` | active junctions within `radius` of the listener's `(x, y)` |
//! | `Point` | the junction directly below the listener, read without delay |

use crate::delay::AllpassDelay;
use crate::{Mesh2D, Vec2, Vec3};

/// Speed of sound in air, m/s.
const SPEED_OF_SOUND: f32 = 343.0;

/// Extra delay-line capacity beyond the propagation delay.
const DELAY_HEADROOM: usize = 8;

/// Which junctions feed the listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListenerType {
    /// Every active junction
    #[default]
    All,
    /// Boundary junctions only
    Boundary,
    /// One junction, read directly
    Point,
    /// Junctions within a radius
    Zone,
}

/// Listener placement and policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerInfo {
    /// Position in meters; the mesh lies in `z = 0`
    pub position: Vec3,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Source selection
    pub listener_type: ListenerType,
    /// Radius for [`ListenerType::Zone`], in meters
    pub radius: f32,
}

impl Default for ListenerInfo {
    fn default() -> Self {
        Self {
            position: Vec3::new(-0.4, 0.0, 0.8),
            sample_rate: 11025.0,
            listener_type: ListenerType::All,
            radius: 0.1,
        }
    }
}

/// Sums mesh pressures into one output sample.
///
/// # Example
///
/// ```rust
/// use membrane_core::{Grid, Listener, ListenerInfo, Mesh2D};
///
/// let mut mesh = Mesh2D::rectilinear(5, 5, 0.01);
/// mesh.init(&Grid::new(5, 5, true));
/// let mut listener = Listener::new(&mesh, &ListenerInfo::default());
/// assert_eq!(listener.source_count(), 25);
///
/// mesh.tick(1.0);
/// let _ = listener.tick(&mesh);
/// ```
#[derive(Debug)]
pub struct Listener {
    listener_type: ListenerType,
    position: Vec3,
    gain: f32,
    point: Option<usize>,
    sources: Vec<usize>,
    delays: Vec<AllpassDelay>,
    loss: Vec<f32>,
    pressures: Vec<f32>,
}

impl Listener {
    /// Select the sources of `mesh` for `info` and build their delay lines.
    pub fn new(mesh: &Mesh2D, info: &ListenerInfo) -> Self {
        let mut listener = Self {
            listener_type: info.listener_type,
            position: info.position,
            gain: 1.0,
            point: None,
            sources: Vec::new(),
            delays: Vec::new(),
            loss: Vec::new(),
            pressures: Vec::new(),
        };

        let below = info.position.xy();
        let junctions = mesh.junctions();

        if info.listener_type == ListenerType::Point {
            listener.point = junctions
                .iter()
                .find(|j| j.is_active() && j.position == below)
                .or_else(|| {
                    let nearest = junctions.iter().filter(|j| j.is_active()).min_by(|a, b| {
                        a.position
                            .distance(below)
                            .total_cmp(&b.position.distance(below))
                    });
                    if nearest.is_some() {
                        tracing::warn!(
                            x = below.x,
                            y = below.y,
                            "no junction at listener position, using nearest"
                        );
                    }
                    nearest
                })
                .map(|j| j.index);
            if listener.point.is_none() {
                tracing::error!("no junctions found for listener");
            }
            return listener;
        }

        let meters_per_sample = SPEED_OF_SOUND / info.sample_rate;
        for junction in junctions.iter().filter(|j| j.is_active()) {
            let selected = match info.listener_type {
                ListenerType::All | ListenerType::Point => true,
                ListenerType::Boundary => junction.is_boundary,
                ListenerType::Zone => junction.position.distance(below) <= info.radius,
            };
            if !selected {
                continue;
            }

            let distance = junction.position.with_z(0.0).distance(info.position);
            let delay = distance / meters_per_sample;
            listener.sources.push(junction.index);
            listener
                .delays
                .push(AllpassDelay::new(delay, delay as usize + DELAY_HEADROOM));
            listener
                .loss
                .push(meters_per_sample / distance.max(mesh.sample_distance()));
        }

        if listener.sources.is_empty() {
            tracing::error!(listener_type = ?info.listener_type, "no junctions found for listener");
        } else {
            tracing::debug!(
                listener_type = ?info.listener_type,
                sources = listener.sources.len(),
                "listener initialized"
            );
        }
        listener.pressures = vec![0.0; listener.sources.len()];
        listener
    }

    /// Scalar applied to the summed output. A point listener reads its
    /// junction unscaled.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// See [`Listener::set_gain`].
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Source selection policy.
    pub fn listener_type(&self) -> ListenerType {
        self.listener_type
    }

    /// Listener position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Number of junctions feeding the listener.
    pub fn source_count(&self) -> usize {
        if self.listener_type == ListenerType::Point {
            usize::from(self.point.is_some())
        } else {
            self.sources.len()
        }
    }

    /// Position under a point listener, if one was found.
    pub fn point_source(&self, mesh: &Mesh2D) -> Option<Vec2> {
        let (lx, _) = mesh.size();
        self.point
            .and_then(|index| mesh.junction(index % lx, index / lx))
            .map(|j| j.position)
    }

    /// Zero the propagation delay lines.
    pub fn reset(&mut self) {
        for delay in &mut self.delays {
            delay.clear();
        }
    }

    /// Read the mesh after a tick and produce one output sample.
    pub fn tick(&mut self, mesh: &Mesh2D) -> f32 {
        if self.listener_type == ListenerType::Point {
            return self.point.map_or(0.0, |index| mesh.pressure(index));
        }

        mesh.gather_pressures(&self.sources, &mut self.pressures);
        let mut out = 0.0;
        for ((delay, &loss), &pressure) in self.delays.iter_mut().zip(&self.loss).zip(&self.pressures) {
            out += delay.tick(pressure) * loss;
        }
        out * self.gain
    }
}
