//! Offline render driver.
//!
//! [`render`] ticks a prepared mesh for a fixed duration, feeding the
//! excitation into the input tap and recording the listener. It runs on the
//! calling thread. [`RenderHandle::spawn`] runs the same loop as a task on a
//! [`ThreadPool`] and hands the result back over a channel.
//!
//! The excitation enters with inverted sign: `input[n] = -excitation[n] *
//! amplitude`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use thiserror::Error;

use crate::{DcBlocker, Excitation, Listener, ListenerInfo, ListenerType, Mesh2D, ThreadPool};

/// Samples between checks of the cancel flag.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Errors that stop a render.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The excitation produced no samples.
    #[error("excitation is empty")]
    EmptyExcitation,

    /// Sample rate is zero, negative or not finite.
    #[error("sample rate must be positive")]
    InvalidSampleRate,

    /// The render was cancelled before it finished.
    #[error("render cancelled")]
    Cancelled,

    /// The render task ended without delivering a result.
    #[error("render task stopped without a result")]
    Disconnected,
}

/// Output gain used for a listener type when none is configured.
///
/// Point listeners are not scaled, so their entry is unity.
pub fn default_listener_gain(listener_type: ListenerType) -> f32 {
    match listener_type {
        ListenerType::All => 0.2,
        ListenerType::Boundary => 5.0,
        ListenerType::Point => 1.0,
        ListenerType::Zone => 1.0,
    }
}

/// Everything a render needs besides the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Duration in seconds
    pub seconds: f32,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Input signal
    pub excitation: Excitation,
    /// Excitation scale
    pub amplitude: f32,
    /// Listener placement; a point listener is moved to the output tap
    pub listener: ListenerInfo,
    /// Listener gain; `None` picks [`default_listener_gain`]
    pub listener_gain: Option<f32>,
    /// DC blocker pole radius, or `None` to leave the output untouched
    pub dc_blocker: Option<f32>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            seconds: 1.0,
            sample_rate: 11025.0,
            excitation: Excitation::default(),
            amplitude: 1.0,
            listener: ListenerInfo::default(),
            listener_gain: None,
            dc_blocker: None,
        }
    }
}

impl RenderSettings {
    /// Number of output samples.
    pub fn len(&self) -> usize {
        (self.seconds.max(0.0) * self.sample_rate) as usize
    }

    /// True when the render produces no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a finished render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// Mono samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Wall-clock time spent ticking
    pub runtime: Duration,
}

impl RenderOutput {
    /// Largest absolute sample.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0, |m, s| m.max(s.abs()))
    }

    /// Root mean square of the samples.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }

    /// Ratio of simulated time to wall-clock time.
    pub fn realtime_factor(&self) -> f32 {
        let secs = self.runtime.as_secs_f32();
        if secs == 0.0 {
            return f32::INFINITY;
        }
        self.samples.len() as f32 / self.sample_rate / secs
    }
}

/// Render `settings.seconds` of audio from `mesh`.
///
/// `progress` receives the completed fraction in `[0, 1]` at most once per
/// percent. Setting `cancel` aborts the render with
/// [`RenderError::Cancelled`].
pub fn render(
    mesh: &mut Mesh2D,
    settings: &RenderSettings,
    mut progress: impl FnMut(f32),
    cancel: &AtomicBool,
) -> Result<RenderOutput, RenderError> {
    if !(settings.sample_rate > 0.0 && settings.sample_rate.is_finite()) {
        return Err(RenderError::InvalidSampleRate);
    }
    let excitation = settings.excitation.samples(settings.sample_rate);
    if excitation.is_empty() {
        return Err(RenderError::EmptyExcitation);
    }

    let mut info = settings.listener;
    info.sample_rate = settings.sample_rate;
    if info.listener_type == ListenerType::Point {
        info.position = mesh.output_pos().with_z(0.0);
    }
    let mut listener = Listener::new(mesh, &info);
    listener.set_gain(
        settings
            .listener_gain
            .unwrap_or_else(|| default_listener_gain(info.listener_type)),
    );
    let mut dc_blocker = settings.dc_blocker.map(DcBlocker::with_coeff);

    let len = settings.len();
    let mut samples = Vec::with_capacity(len);
    let mut last_percent = 0;

    tracing::info!(
        samples = len,
        junctions = mesh.junction_count(),
        rimguides = mesh.rimguide_count(),
        listener = ?info.listener_type,
        "render started"
    );
    let start = Instant::now();

    for i in 0..len {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            tracing::info!(sample = i, "render cancelled");
            return Err(RenderError::Cancelled);
        }

        let input = excitation.get(i).map_or(0.0, |&x| -x * settings.amplitude);
        mesh.tick(input);
        let mut out = listener.tick(mesh);
        if let Some(blocker) = dc_blocker.as_mut() {
            out = blocker.process(out);
        }
        samples.push(out);

        let percent = (i + 1) * 100 / len;
        if percent > last_percent {
            last_percent = percent;
            progress(percent as f32 / 100.0);
        }
    }

    let runtime = start.elapsed();
    tracing::info!(runtime_ms = runtime.as_millis() as u64, "render finished");

    Ok(RenderOutput {
        samples,
        sample_rate: settings.sample_rate,
        runtime,
    })
}

/// A render running on a worker pool.
///
/// Dropping the handle does not stop the render; call
/// [`RenderHandle::cancel`] first.
#[derive(Debug)]
pub struct RenderHandle {
    progress: Arc<AtomicU32>,
    cancel: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    result: Receiver<Result<RenderOutput, RenderError>>,
}

impl RenderHandle {
    /// Move `mesh` onto `pool` and start rendering.
    pub fn spawn(pool: &ThreadPool, mut mesh: Mesh2D, settings: RenderSettings) -> Self {
        let progress = Arc::new(AtomicU32::new(0.0f32.to_bits()));
        let cancel = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded(1);

        let task_progress = Arc::clone(&progress);
        let task_cancel = Arc::clone(&cancel);
        let task_finished = Arc::clone(&finished);
        pool.enqueue(Box::new(move || {
            let result = render(
                &mut mesh,
                &settings,
                |p| task_progress.store(p.to_bits(), Ordering::Relaxed),
                &task_cancel,
            );
            // The receiver may already be gone; the result is simply dropped then.
            let _ = tx.send(result);
            task_finished.store(true, Ordering::Release);
        }));

        Self {
            progress,
            cancel,
            finished,
            result: rx,
        }
    }

    /// Completed fraction in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    /// Ask the render to stop at its next check.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// True once the render task has delivered its result.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// The result if it is ready, without blocking.
    pub fn try_result(&self) -> Option<Result<RenderOutput, RenderError>> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RenderError::Disconnected)),
        }
    }

    /// Block until the render finishes.
    pub fn wait(self) -> Result<RenderOutput, RenderError> {
        self.result.recv().map_err(|_| RenderError::Disconnected)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Grid, RimguideInfo, Shape, Vec3};

    fn small_mesh() -> Mesh2D {
        let mut mesh = Mesh2D::rectilinear(9, 9, 0.02);
        let mask = mesh.mask_for_radius(0.08);
        mesh.init(&mask);
        mesh.init_boundary(&RimguideInfo {
            shape: Shape::Circle { radius: 0.09 },
            ..RimguideInfo::default()
        });
        mesh
    }

    fn short_settings() -> RenderSettings {
        RenderSettings {
            seconds: 0.05,
            excitation: Excitation::Dirac,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn test_render_length_and_progress() {
        let mut mesh = small_mesh();
        let settings = short_settings();
        let mut reports = Vec::new();
        let out = render(&mut mesh, &settings, |p| reports.push(p), &AtomicBool::new(false)).unwrap();

        assert_eq!(out.samples.len(), settings.len());
        assert_eq!(out.samples.len(), 551);
        assert!(out.peak() > 0.0);
        assert!(out.samples.iter().all(|s| s.is_finite()));
        assert_eq!(reports.last().copied(), Some(1.0));
        assert!(reports.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_point_listener_follows_output_tap() {
        let mut mesh = small_mesh();
        let settings = RenderSettings {
            listener: ListenerInfo {
                listener_type: ListenerType::Point,
                position: Vec3::new(5.0, 5.0, 5.0),
                ..ListenerInfo::default()
            },
            ..short_settings()
        };
        let out = render(&mut mesh, &settings, |_| {}, &AtomicBool::new(false)).unwrap();
        // input and output share the center tap: first sample is the inverted impulse
        assert_eq!(out.samples[0], -1.0);

        // a configured gain does not scale a point listener
        let loud = RenderSettings {
            listener_gain: Some(10.0),
            ..settings
        };
        let again = render(&mut small_mesh(), &loud, |_| {}, &AtomicBool::new(false)).unwrap();
        assert_eq!(again.samples, out.samples);
    }

    #[test]
    fn test_render_errors() {
        let mut mesh = small_mesh();
        let cancel = AtomicBool::new(false);

        let empty = RenderSettings {
            excitation: Excitation::Samples(Vec::new()),
            ..short_settings()
        };
        assert_eq!(render(&mut mesh, &empty, |_| {}, &cancel), Err(RenderError::EmptyExcitation));

        let bad_rate = RenderSettings {
            sample_rate: 0.0,
            ..short_settings()
        };
        assert_eq!(
            render(&mut mesh, &bad_rate, |_| {}, &cancel),
            Err(RenderError::InvalidSampleRate)
        );

        cancel.store(true, Ordering::Relaxed);
        assert_eq!(
            render(&mut mesh, &short_settings(), |_| {}, &cancel),
            Err(RenderError::Cancelled)
        );
    }

    #[test]
    fn test_dc_blocker_applied() {
        let mut plain = small_mesh();
        let mut blocked = small_mesh();
        let settings = short_settings();
        let cancel = AtomicBool::new(false);
        let a = render(&mut plain, &settings, |_| {}, &cancel).unwrap();
        let b = render(
            &mut blocked,
            &RenderSettings {
                dc_blocker: Some(0.99),
                ..settings
            },
            |_| {},
            &cancel,
        )
        .unwrap();
        assert_eq!(a.samples[0], b.samples[0]);
        assert_ne!(a.samples, b.samples);
    }

    #[test]
    fn test_handle_matches_blocking_render() {
        let pool = ThreadPool::new(1);
        let settings = short_settings();

        let handle = RenderHandle::spawn(&pool, small_mesh(), settings.clone());
        let async_out = handle.wait().unwrap();

        let mut mesh = small_mesh();
        let sync_out = render(&mut mesh, &settings, |_| {}, &AtomicBool::new(false)).unwrap();
        assert_eq!(async_out.samples, sync_out.samples);
    }

    #[test]
    fn test_handle_cancel() {
        let pool = ThreadPool::new(1);
        let mut mesh = Mesh2D::rectilinear(4, 4, 0.01);
        mesh.init(&Grid::new(4, 4, true));
        let handle = RenderHandle::spawn(
            &pool,
            mesh,
            RenderSettings {
                seconds: 60.0,
                ..short_settings()
            },
        );
        handle.cancel();
        assert_eq!(handle.wait(), Err(RenderError::Cancelled));
    }

    #[test]
    fn test_handle_reports_completion() {
        let pool = ThreadPool::new(1);
        let handle = RenderHandle::spawn(&pool, small_mesh(), short_settings());
        let result = loop {
            if let Some(result) = handle.try_result() {
                break result;
            }
            std::thread::yield_now();
        };
        assert!(result.is_ok());
        assert_eq!(handle.progress(), 1.0);
    }
}
