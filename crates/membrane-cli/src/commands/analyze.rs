//! Modal analysis of a rendered membrane.
//!
//! Finds the strongest spectral peaks of a WAV file and compares their
//! ratios to the lowest peak against the ideal circular-membrane modes.

use super::common::db;
use clap::Args;
use membrane_core::wave_math::{CIRCULAR_MODE_LABELS, CIRCULAR_MODE_RATIOS};
use membrane_io::read_wav;
use rustfft::{FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::path::PathBuf;

/// Peaks more than this far below the strongest one are ignored.
const PEAK_FLOOR_DB: f32 = -60.0;

/// Compare the spectrum of a render to the ideal drum modes.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Rendered WAV file
    pub file: PathBuf,

    /// Number of peaks to report
    #[arg(short, long, default_value = "8")]
    pub peaks: usize,

    /// FFT size (power of 2); the whole file by default
    #[arg(long)]
    pub fft_size: Option<usize>,
}

/// One spectral peak.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    frequency: f32,
    level_db: f32,
}

/// Run the analyze command.
pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let recording = read_wav(&args.file)?;
    let samples = recording.samples;
    if samples.is_empty() {
        anyhow::bail!("{} contains no samples", args.file.display());
    }
    let sample_rate = recording.sample_rate as f32;

    let fft_size = args
        .fft_size
        .unwrap_or(samples.len())
        .next_power_of_two()
        .max(256);
    println!("Analyzing {}...", args.file.display());
    println!(
        "  {} samples, {} Hz, FFT size {}",
        samples.len(),
        recording.sample_rate,
        fft_size
    );

    let magnitudes = magnitude_spectrum(&samples, fft_size);
    let bin_hz = sample_rate / fft_size as f32;
    let peaks = find_peaks(&magnitudes, bin_hz, args.peaks);
    let Some(lowest) = peaks.iter().map(|p| p.frequency).reduce(f32::min) else {
        println!("\nNo spectral peaks found.");
        return Ok(());
    };

    let mut by_frequency = peaks;
    by_frequency.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));

    println!(
        "\n  {:>10}  {:>10}  {:>7}  {:>7}  {:>8}",
        "Freq (Hz)", "Level (dB)", "Ratio", "Mode", "Ideal"
    );
    println!(
        "  {:>10}  {:>10}  {:>7}  {:>7}  {:>8}",
        "---------", "----------", "-----", "----", "-----"
    );
    for peak in &by_frequency {
        let ratio = peak.frequency / lowest;
        let (label, ideal) = nearest_mode(ratio);
        println!(
            "  {:>10.1}  {:>10.1}  {:>7.3}  {:>7}  {:>8.3}",
            peak.frequency, peak.level_db, ratio, label, ideal
        );
    }

    Ok(())
}

/// Hann-windowed magnitude spectrum of the first `fft_size` samples,
/// zero padded, DC to Nyquist.
fn magnitude_spectrum(samples: &[f32], fft_size: usize) -> Vec<f32> {
    let n = samples.len().min(fft_size);
    let mut buffer: Vec<Complex<f32>> = samples[..n]
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let w = 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos());
            Complex::new(x * w, 0.0)
        })
        .collect();
    buffer.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(fft_size).process(&mut buffer);

    buffer.truncate(fft_size / 2 + 1);
    buffer.iter().map(|c| c.norm()).collect()
}

/// The `count` strongest local maxima, refined by parabolic interpolation
/// over the dB magnitudes, strongest first.
fn find_peaks(magnitudes: &[f32], bin_hz: f32, count: usize) -> Vec<Peak> {
    let levels: Vec<f32> = magnitudes.iter().map(|&m| db(m)).collect();
    let Some(max) = levels.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };

    let mut peaks: Vec<Peak> = levels
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] >= w[2] && w[1] > max + PEAK_FLOOR_DB)
        .map(|(i, w)| {
            let denom = w[0] - 2.0 * w[1] + w[2];
            let offset = if denom.abs() > f32::EPSILON {
                0.5 * (w[0] - w[2]) / denom
            } else {
                0.0
            };
            Peak {
                frequency: (i as f32 + 1.0 + offset) * bin_hz,
                level_db: w[1] - 0.25 * (w[0] - w[2]) * offset,
            }
        })
        .collect();

    peaks.sort_by(|a, b| b.level_db.total_cmp(&a.level_db));
    peaks.truncate(count);
    peaks
}

/// Closest ideal circular mode to a frequency ratio.
fn nearest_mode(ratio: f32) -> (&'static str, f32) {
    CIRCULAR_MODE_RATIOS
        .iter()
        .zip(CIRCULAR_MODE_LABELS)
        .min_by(|a, b| (a.0 - ratio).abs().total_cmp(&(b.0 - ratio).abs()))
        .map_or(("-", 0.0), |(&r, label)| (label, r))
}
