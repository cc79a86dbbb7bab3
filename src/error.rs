use std::path::PathBuf;

use thiserror::Error;

/// Central error type for the stem-studio-core crate.
#[derive(Debug, Error)]
pub enum StudioError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    /// Input file missing, undecodable, or empty.
    #[error("Failed to load audio from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// External separation process failed. Recovered by engine fallback,
    /// never surfaced to the caller on its own.
    #[error("Separation engine error: {0}")]
    SeparationEngine(String),

    /// Malformed buffer or invalid filter/transform parameters.
    #[error("DSP computation error: {0}")]
    DspComputation(String),

    /// A mix track could not be loaded. Recovered by skipping the track.
    #[error("Track {index} failed to load: {reason}")]
    TrackLoad { index: usize, reason: String },

    /// A mix track carried out-of-range effect parameters. Recovered by
    /// skipping the track.
    #[error("Invalid effect parameter: {0}")]
    EffectParam(String),

    /// No track in the mix request produced usable audio.
    #[error("No valid tracks to mix")]
    MixNoValidTracks,

    /// Neither engine produced a stem above the energy gate.
    #[error("Separation produced no stems above the energy threshold")]
    SeparationNoStems,
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for StudioError {
    fn from(e: std::io::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<hound::Error> for StudioError {
    fn from(e: hound::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
