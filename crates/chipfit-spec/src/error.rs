//! Error types for configuration validation and versioned data.

use thiserror::Error;

/// Error codes for configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// C001: Value outside its allowed domain
    OutOfRange,
    /// C002: Lower bound above upper bound
    InvertedRange,
    /// C003: Required list is empty
    EmptyList,
    /// C004: Value is NaN or infinite
    NotFinite,
    /// C005: List contains the same value twice
    DuplicateValue,
    /// C006: All loss weights are zero
    NoLossWeight,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "C001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::OutOfRange => "C001",
            ErrorCode::InvertedRange => "C002",
            ErrorCode::EmptyList => "C003",
            ErrorCode::NotFinite => "C004",
            ErrorCode::DuplicateValue => "C005",
            ErrorCode::NoLossWeight => "C006",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error with code, message, and the path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Dotted path to the problematic field (e.g., "frequency.min_pitch").
    pub path: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation error with a field path.
    pub fn with_path(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result of configuration validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Adds an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts to a Result, returning Err if there are errors.
    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Top-level error type for configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed with one or more errors.
    #[error("invalid configuration: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Returns the individual validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Persisted data was written by an incompatible format version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("incompatible version: expected {expected}, found {actual}")]
pub struct VersionError {
    /// Version this build reads and writes.
    pub expected: String,
    /// Version found in the data.
    pub actual: String,
}

impl VersionError {
    /// Creates a version error from anything displayable.
    pub fn new(expected: impl ToString, actual: impl ToString) -> Self {
        Self {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Common trait for backend errors.
///
/// Each backend error type implements this trait so callers can report a
/// stable code and a category without knowing the concrete type.
pub trait BackendError: std::error::Error {
    /// Stable error code such as "LIB_001" or "REC_003".
    fn code(&self) -> &'static str;

    /// Human-readable message.
    fn message(&self) -> String {
        self.to_string()
    }

    /// Error category such as "library", "synth" or "reconstruct".
    fn category(&self) -> &'static str;
}
