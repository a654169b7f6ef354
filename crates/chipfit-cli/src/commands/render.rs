//! Render command implementation
//!
//! Plays saved reconstructions back through the channel timers and mixes
//! them into one WAV file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use chipfit_backend_reconstruct::{write_wav, Renderer};
use colored::Colorize;

use super::reconstruct::read_reconstruction;
use crate::context::Context;

/// Run the render command
pub fn run(context: &Context, inputs: &[PathBuf], output: &Path) -> Result<ExitCode> {
    let reconstructions = inputs
        .iter()
        .map(|path| read_reconstruction(path))
        .collect::<Result<Vec<_>>>()?;

    let config = context.config();
    let samples = Renderer::new(config).render_mix(&reconstructions)?;
    write_wav(output, &samples, config.general().sample_rate)
        .with_context(|| format!("Failed to write WAV: {}", output.display()))?;

    println!(
        "{} {} channel(s), {:.2} s -> {}",
        "Rendered".green().bold(),
        reconstructions.len(),
        samples.len() as f64 / config.general().sample_rate as f64,
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}
