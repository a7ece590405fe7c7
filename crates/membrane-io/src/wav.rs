//! WAV reading and writing.
//!
//! Renders are always written as 32-bit float mono. Excitation files may be
//! any PCM or float WAV `hound` decodes; they are mixed down to mono.

use crate::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use membrane_core::{Excitation, RenderOutput};
use std::path::Path;

/// A decoded WAV file, mixed down to mono.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Mono samples in `[-1, 1]`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count of the file before mixdown
    pub channels: u16,
}

/// Header fields of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Samples are IEEE floats rather than integers
    pub is_float: bool,
    /// Frames (samples per channel)
    pub num_frames: u64,
}

impl WavInfo {
    /// Length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.num_frames as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// Read the header of a WAV file without decoding samples.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        is_float: spec.sample_format == SampleFormat::Float,
        num_frames: u64::from(reader.duration()),
    })
}

/// Decode a WAV file to mono `f32`, averaging channels.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = if spec.sample_format == SampleFormat::Float {
        reader.samples::<f32>().collect::<std::result::Result<_, _>>()?
    } else {
        let full_scale = 2.0f32.powi(i32::from(spec.bits_per_sample) - 1);
        reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / full_scale))
            .collect::<std::result::Result<_, _>>()?
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        let scale = 1.0 / channels as f32;
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect()
    };

    Ok(Recording {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Write `samples` as a 32-bit float mono WAV.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Load a recording as an excitation signal.
///
/// The file is mixed down to mono. It is not resampled: a file recorded at
/// another rate plays back at the mesh rate, which is logged as a warning.
pub fn load_excitation<P: AsRef<Path>>(path: P, sample_rate: f32) -> Result<Excitation> {
    let path = path.as_ref();
    let recording = read_wav(path)?;
    if recording.samples.is_empty() {
        return Err(Error::EmptyFile);
    }
    if recording.sample_rate as f32 != sample_rate {
        tracing::warn!(
            file_rate = recording.sample_rate,
            mesh_rate = sample_rate,
            path = %path.display(),
            "excitation sample rate differs from mesh rate, playing unresampled"
        );
    }
    tracing::debug!(samples = recording.samples.len(), path = %path.display(), "excitation loaded");
    Ok(Excitation::Samples(recording.samples))
}

/// Write a finished render, creating the parent directory if needed.
pub fn write_render<P: AsRef<Path>>(path: P, output: &RenderOutput) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    write_wav(path, &output.samples, output.sample_rate.round() as u32)?;
    tracing::info!(
        samples = output.samples.len(),
        path = %path.display(),
        "render written"
    );
    Ok(())
}
