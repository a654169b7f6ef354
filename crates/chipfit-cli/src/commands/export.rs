//! Export command implementation
//!
//! Turns a saved reconstruction into an FTI instrument.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use chipfit_backend_reconstruct::{export, fti};
use colored::Colorize;

use super::reconstruct::{file_stem, read_reconstruction};
use crate::context::Context;

/// Run the export command
///
/// The instrument is written into the output directory as `<stem>.fti`,
/// named `name` or the file stem.
pub fn run(context: &Context, input: &Path, name: Option<&str>) -> Result<ExitCode> {
    let reconstruction = read_reconstruction(input)?;
    let features = export::export(
        reconstruction.kind,
        &reconstruction.instructions,
        context.config(),
    )?;

    std::fs::create_dir_all(context.output_dir())?;
    let stem = file_stem(input);
    let name = name.unwrap_or(&stem);
    let path = context.output_dir().join(format!("{}.fti", stem));
    fti::write_fti(&path, name, &features)
        .with_context(|| format!("Failed to write instrument: {}", path.display()))?;

    println!(
        "{} {} ({} channel, {} volume steps) -> {}",
        "Exported".green().bold(),
        name,
        reconstruction.kind,
        features.volume.len(),
        path.display()
    );
    Ok(ExitCode::SUCCESS)
}
