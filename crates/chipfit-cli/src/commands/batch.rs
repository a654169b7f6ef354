//! Batch command implementation
//!
//! Reconstructs every WAV file of a directory in parallel.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chipfit_backend_reconstruct::batch::SUMMARY_FILE;
use chipfit_backend_reconstruct::{BatchReconstruction, FileStatus, ReconstructError};
use chipfit_task::TaskOutcome;
use colored::Colorize;

use super::library::load_or_build;
use super::reporting::run_with_progress;
use crate::context::Context;

/// Run the batch command
///
/// # Returns
/// Exit code: 0 if every file was reconstructed, 1 if any failed
pub fn run(context: &Context, input_dir: &Path, quiet: bool) -> Result<ExitCode> {
    println!("{} {}", "Batch:".cyan().bold(), input_dir.display());
    let library = load_or_build(context, quiet)?;

    let batch = BatchReconstruction::new(Arc::clone(context.config()), library, context.output_dir())?
        .with_workers(context.workers());
    let task = batch
        .task(input_dir)
        .with_context(|| format!("Failed to scan directory: {}", input_dir.display()))?;

    let summary = match run_with_progress(task, context.interrupt(), quiet)? {
        TaskOutcome::Completed(summary) => summary,
        TaskOutcome::Cancelled => return Err(ReconstructError::Cancelled.into()),
        TaskOutcome::Failed(err) => return Err(err).context("Batch failed"),
    };

    for file in &summary.files {
        match file.status {
            FileStatus::Completed => println!(
                "  {} {} ({} channel(s))",
                "OK".green().bold(),
                file.input.display(),
                file.channels.len()
            ),
            FileStatus::Failed => println!(
                "  {} {}: {}",
                "FAILED".red().bold(),
                file.input.display(),
                file.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    println!(
        "{} {} succeeded, {} failed; summary in {}",
        "Done:".cyan().bold(),
        summary.succeeded(),
        summary.failed(),
        context.output_dir().join(SUMMARY_FILE).display()
    );

    if summary.failed() > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
