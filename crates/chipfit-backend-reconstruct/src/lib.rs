//! chipfit Reconstruction Backend
//!
//! This crate turns recorded audio into per-frame 2A03 channel instructions
//! by searching a precomputed sample library, and exports the result as
//! FamiTracker instruments.
//!
//! # Overview
//!
//! - **Criterion** - weighted spectral, temporal and continuity cost of a
//!   candidate window against the target window
//! - **Reconstructor** - greedy frame-by-frame search carrying the phase of
//!   the previous winner
//! - **Exporters** - per-channel conversion of instructions into trimmed,
//!   difference-coded envelopes
//! - **FTI writer** - the instrument file layout
//! - **Renderer** - plays instructions back through the timers
//! - **Batch** - parallel reconstruction of a directory of WAV files
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use chipfit_backend_reconstruct::{audio, export, fti, Reconstructor};
//! use chipfit_backend_synth::{Library, LibraryCreator};
//! use chipfit_spec::{ChannelKind, Config};
//!
//! let config = Arc::new(Config::default());
//! let library = Library::from_config(&config)?;
//! let data = LibraryCreator::new((*config).clone(), library).load_or_build()?;
//!
//! let reconstructor = Reconstructor::new(Arc::clone(&config), Arc::new(data), ChannelKind::Pulse)?;
//! let signal = audio::load_input(Path::new("lead.wav"), &config)?;
//! let reconstruction = reconstructor.reconstruct(&signal)?;
//!
//! let features = export::export(ChannelKind::Pulse, &reconstruction.instructions, &config)?;
//! fti::write_fti(Path::new("lead.fti"), "lead", &features)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`criterion`] - cost function
//! - [`state`] - search state and results
//! - [`reconstructor`] - the frame search
//! - [`export`] - channel exporters
//! - [`fti`] - instrument writer
//! - [`render`] - playback through the timers
//! - [`audio`] - WAV input and output
//! - [`batch`] - directory reconstruction

pub mod audio;
pub mod batch;
pub mod criterion;
pub mod error;
pub mod export;
pub mod fti;
pub mod reconstructor;
pub mod render;
pub mod state;

pub use audio::{load_input, read_wav, write_wav, AudioSignal};
pub use batch::{BatchReconstruction, BatchSummary, ChannelSummary, FileStatus, FileSummary};
pub use criterion::{Cost, Criterion, Fragment};
pub use error::{ReconstructError, ReconstructResult};
pub use export::{exporter_for, ExportContext, Exporter, Features};
pub use fti::{write_fti, Instrument, Sequence, SequenceSlot};
pub use reconstructor::Reconstructor;
pub use render::Renderer;
pub use state::{Candidate, Reconstruction};
