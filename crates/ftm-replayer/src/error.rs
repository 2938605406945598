//! Error types for FamiTracker playback.

use nes_apu::MixerError;
use thiserror::Error;

/// Result type for replayer operations.
pub type Result<T> = std::result::Result<T, FtmError>;

/// Errors raised while setting up or driving playback.
///
/// Only setup calls fail. Once a score is loaded, frame rendering degrades
/// gracefully instead of erroring.
#[derive(Error, Debug)]
pub enum FtmError {
    /// Rendering or querying before a score was loaded.
    #[error("No score loaded; call ready() first")]
    NotReady,

    /// Track index out of range.
    #[error("Track {index} out of range (0..{available})")]
    InvalidTrack {
        /// Requested index.
        index: usize,
        /// Available tracks.
        available: usize,
    },

    /// Section (order position) index out of range.
    #[error("Section {index} out of range (0..{available})")]
    InvalidSection {
        /// Requested index.
        index: usize,
        /// Sections in the track.
        available: usize,
    },

    /// Playback speed factor outside [0.1, 10].
    #[error("Invalid playback speed {0}: expected 0.1 to 10")]
    InvalidSpeed(f32),

    /// Invalid renderer configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Score is internally inconsistent.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Mixer setup error.
    #[error("Mixer error: {0}")]
    Mixer(#[from] MixerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WAV writing error.
    #[cfg(feature = "export-wav")]
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl From<String> for FtmError {
    fn from(s: String) -> Self {
        FtmError::InvalidDocument(s)
    }
}

impl From<&str> for FtmError {
    fn from(s: &str) -> Self {
        FtmError::InvalidDocument(s.to_string())
    }
}
