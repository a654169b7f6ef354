//! chipfit Synthesis Backend
//!
//! This crate simulates the 2A03-style sound generators and precomputes the
//! sample library the reconstructor searches.
//!
//! # Overview
//!
//! - **Frequency table** - pitch/frequency conversion around a tuning reference
//! - **Timers** - the pulse/triangle phase divider and the noise LFSR, producing
//!   frames from quantized register values and carrying continuation state
//! - **Cyclic samples** - phase-addressable periodic buffers cut from timer output
//! - **Analysis window** - Hann envelope plus the incomplete-gamma amplitude warp
//! - **Library** - content-addressed store of cyclic samples, built in parallel
//!
//! # Determinism
//!
//! Synthesis has no random input. A configuration always yields the same
//! library key and byte-identical library data.
//!
//! # Example
//!
//! ```no_run
//! use chipfit_backend_synth::{Library, LibraryCreator, LibraryParams};
//! use chipfit_spec::Config;
//!
//! let config = Config::default();
//! let library = Library::from_config(&config)?;
//! let data = LibraryCreator::new(config, library).load_or_build()?;
//! let sample = data.get(&LibraryParams::Pulse { pitch: 60, duty: 2 })?;
//! println!("{} samples at {:.2} Hz", sample.len(), sample.frequency());
//! # Ok::<(), chipfit_backend_synth::LibraryError>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`note`] - frequency table
//! - [`timer`] - channel dividers
//! - [`cyclic`] - cyclic samples
//! - [`window`] - analysis window and warp
//! - [`library`] - library store, file format and creator

pub mod cyclic;
pub mod error;
pub mod library;
pub mod note;
pub mod timer;
pub mod window;

pub use cyclic::CyclicArray;
pub use error::{LibraryError, LibraryResult, SynthError, SynthResult};
pub use library::{
    Library, LibraryCreator, LibraryData, LibraryInfo, LibraryMetadata, LibraryParams,
};
pub use note::Tuning;
pub use timer::{pitch_to_timer, ContinuationState, LfsrTimer, PhaseTimer, Timer, TimerParams};
pub use window::{Warp, Window};
