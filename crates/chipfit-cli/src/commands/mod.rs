//! CLI command implementations

pub mod batch;
pub mod config;
pub mod export;
pub mod library;
pub mod reconstruct;
pub mod render;

mod reporting;

pub use reporting::{exit_code_for_error, exit_status_for_error, EXIT_CANCELLED};
