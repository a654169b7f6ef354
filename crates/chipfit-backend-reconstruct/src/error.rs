//! Error types for the reconstruction backend.

use std::path::PathBuf;

use chipfit_backend_synth::{LibraryError, SynthError};
use chipfit_spec::{BackendError, ChannelKind, VersionError};
use chipfit_task::TaskError;
use thiserror::Error;

/// Result type for reconstruction operations.
pub type ReconstructResult<T> = Result<T, ReconstructError>;

/// Errors raised while loading audio, searching, rendering or exporting.
#[derive(Debug, Error)]
pub enum ReconstructError {
    /// An input file could not be read.
    #[error("failed to load {path}: {message}")]
    Load {
        /// File that failed to load.
        path: PathBuf,
        /// Reason.
        message: String,
    },

    /// Input values that cannot be valid.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Data produced under another format version.
    #[error(transparent)]
    IncompatibleVersion(#[from] VersionError),

    /// The library could not be loaded or queried.
    #[error("library error: {0}")]
    Library(#[from] LibraryError),

    /// A timer or window rejected its input.
    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthError),

    /// The reconstruction was cancelled.
    #[error("reconstruction cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV encoding or decoding error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Instructions of another channel were passed in.
    #[error("channel mismatch: expected {expected} instructions, found {found}")]
    ChannelMismatch {
        /// Channel the operation works on.
        expected: ChannelKind,
        /// Channel of the offending instruction.
        found: ChannelKind,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The batch task failed.
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl ReconstructError {
    /// Creates an invalid data error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Creates a load error for a file.
    pub fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl BackendError for ReconstructError {
    fn code(&self) -> &'static str {
        match self {
            ReconstructError::Load { .. } => "RECON_001",
            ReconstructError::InvalidData(_) => "RECON_002",
            ReconstructError::IncompatibleVersion(_) => "RECON_003",
            ReconstructError::Library(_) => "RECON_004",
            ReconstructError::Synthesis(_) => "RECON_005",
            ReconstructError::Cancelled => "RECON_006",
            ReconstructError::Io(_) => "RECON_007",
            ReconstructError::Wav(_) => "RECON_008",
            ReconstructError::ChannelMismatch { .. } => "RECON_009",
            ReconstructError::Json(_) => "RECON_010",
            ReconstructError::Task(_) => "RECON_011",
        }
    }

    fn category(&self) -> &'static str {
        "reconstruct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_messages() {
        let err = ReconstructError::ChannelMismatch {
            expected: ChannelKind::Pulse,
            found: ChannelKind::Noise,
        };
        assert_eq!(err.code(), "RECON_009");
        assert_eq!(
            err.to_string(),
            "channel mismatch: expected pulse instructions, found noise"
        );

        let err = ReconstructError::load("song.wav", "not a RIFF file");
        assert_eq!(err.code(), "RECON_001");
        assert!(err.to_string().contains("song.wav"));
        assert_eq!(err.category(), "reconstruct");
    }

    #[test]
    fn test_library_errors_convert() {
        let err: ReconstructError = LibraryError::NoData("key 0123".to_string()).into();
        assert_eq!(err.code(), "RECON_004");
    }
}
