//! WAV file I/O for membrane renders.
//!
//! This crate provides:
//!
//! - **WAV file I/O**: [`read_wav`] decodes to mono, [`write_wav`] writes float mono
//! - **Excitations from disk**: [`load_excitation`] turns a recording into an
//!   [`membrane_core::Excitation`]
//! - **Render output**: [`write_render`] stores a [`membrane_core::RenderOutput`]
//!   as 32-bit float mono
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use membrane_io::{load_excitation, write_render};
//!
//! let excitation = load_excitation("stick.wav", 11025.0)?;
//! let settings = RenderSettings { excitation, ..RenderSettings::default() };
//! let output = membrane_core::render(&mut mesh, &settings, |_| {}, &cancel)?;
//! write_render("mesh.wav", &output)?;
//! ```

mod wav;

pub use wav::{Recording, WavInfo, load_excitation, read_wav, read_wav_info, write_render, write_wav};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// The file holds no samples.
    #[error("WAV file contains no samples")]
    EmptyFile,

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
