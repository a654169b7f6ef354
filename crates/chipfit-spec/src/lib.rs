//! chipfit shared types
//!
//! This crate holds the values every other chipfit crate agrees on:
//!
//! - [`config`]: the validated, immutable [`Config`] and its sections
//! - [`hash`]: the content-addressed [`LibraryKey`]
//! - [`instruction`]: per-frame channel [`Instruction`]s produced by reconstruction
//! - [`error`]: validation errors, the version error and the [`BackendError`] trait
//!
//! # Example
//!
//! ```
//! use chipfit_spec::{ChannelKind, Config, LibraryKey};
//!
//! let config = Config::builder()
//!     .sample_rate(44_100)
//!     .pitch_range(21, 108)
//!     .generators(vec![ChannelKind::Pulse])
//!     .build()
//!     .unwrap();
//!
//! let key = LibraryKey::derive(&config, "hann:1024:144");
//! assert_eq!(key.as_str().len(), chipfit_spec::hash::LIBRARY_KEY_LENGTH);
//! ```

pub mod config;
pub mod error;
pub mod hash;
pub mod instruction;

pub use config::{
    CalculationConfig, Clock, Config, ConfigBuilder, FrequencyConfig, GeneralConfig,
    GenerationConfig, LibraryConfig, LossConfig, NormalizationConfig, RawConfig, TieBreak,
};
pub use error::{
    BackendError, ConfigError, ErrorCode, ValidationError, ValidationResult, VersionError,
};
pub use hash::LibraryKey;
pub use instruction::{
    ChannelKind, Instruction, NoiseInstruction, PulseInstruction, TriangleInstruction, MAX_VOLUME,
};
