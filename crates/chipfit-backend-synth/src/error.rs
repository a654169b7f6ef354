//! Error types for the synthesis backend.

use std::path::PathBuf;

use chipfit_spec::{BackendError, VersionError};
use chipfit_task::TaskError;
use thiserror::Error;

/// Result type for timer and sample operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Result type for library operations.
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Errors raised by timers, cyclic samples and windows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    /// A phase continuation value outside [0, 1).
    #[error("invalid phase {phase}: must be in [0, 1)")]
    InvalidPhase {
        /// The rejected phase.
        phase: f64,
    },

    /// A shift register value the noise channel can never hold.
    #[error("invalid shift register value {register:#06x}: must be non-zero and 15 bits wide")]
    InvalidRegister {
        /// The rejected register.
        register: u16,
    },

    /// A continuation state of the wrong kind for this timer.
    #[error("invalid timer state: expected {expected} state, found {found}")]
    StateMismatch {
        /// Kind the timer carries.
        expected: &'static str,
        /// Kind that was supplied.
        found: &'static str,
    },

    /// Invalid frequency.
    #[error("invalid frequency: {freq} Hz")]
    InvalidFrequency {
        /// The invalid frequency.
        freq: f64,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Error message.
        message: String,
    },

    /// A cyclic sample needs at least one sample.
    #[error("cyclic sample is empty")]
    EmptySample,
}

impl SynthError {
    /// Creates an invalid parameter error.
    pub fn invalid_param(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl BackendError for SynthError {
    fn code(&self) -> &'static str {
        match self {
            SynthError::InvalidPhase { .. } => "SYNTH_001",
            SynthError::InvalidRegister { .. } => "SYNTH_002",
            SynthError::StateMismatch { .. } => "SYNTH_003",
            SynthError::InvalidFrequency { .. } => "SYNTH_004",
            SynthError::InvalidParameter { .. } => "SYNTH_005",
            SynthError::EmptySample => "SYNTH_006",
        }
    }

    fn category(&self) -> &'static str {
        "synth"
    }
}

/// Errors raised while building, persisting or querying a library.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Nothing stored for the requested key or parameters.
    #[error("no library data for {0}")]
    NoData(String),

    /// A library file could not be read.
    #[error("failed to load library {path}: {source}")]
    Load {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A library file holds values that cannot be valid.
    #[error("invalid library data: {0}")]
    InvalidData(String),

    /// A library file was written by another format version.
    #[error(transparent)]
    IncompatibleVersion(#[from] VersionError),

    /// I/O error while writing or listing libraries.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Synthesizing an entry failed.
    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthError),

    /// The build was cancelled.
    #[error("library build cancelled")]
    Cancelled,

    /// The build task failed.
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl LibraryError {
    /// Creates an invalid data error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}

impl BackendError for LibraryError {
    fn code(&self) -> &'static str {
        match self {
            LibraryError::NoData(_) => "LIB_001",
            LibraryError::Load { .. } => "LIB_002",
            LibraryError::InvalidData(_) => "LIB_003",
            LibraryError::IncompatibleVersion(_) => "LIB_004",
            LibraryError::Io(_) => "LIB_005",
            LibraryError::Synthesis(_) => "LIB_006",
            LibraryError::Cancelled => "LIB_007",
            LibraryError::Task(_) => "LIB_008",
        }
    }

    fn category(&self) -> &'static str {
        "library"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synth_error_codes() {
        assert_eq!(SynthError::InvalidPhase { phase: 1.0 }.code(), "SYNTH_001");
        assert_eq!(SynthError::EmptySample.category(), "synth");
        let err = SynthError::invalid_param("duty", "must be 0..=3");
        assert!(err.to_string().contains("duty"));
    }

    #[test]
    fn test_version_error_passes_through() {
        let err = LibraryError::from(VersionError::new(2, 1));
        assert_eq!(err.code(), "LIB_004");
        assert_eq!(err.to_string(), "incompatible version: expected 2, found 1");
    }
}
