//! Library management commands

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chipfit_backend_synth::library::outcome_to_result;
use chipfit_backend_synth::{Library, LibraryData, LibraryError};
use colored::Colorize;

use super::reporting::{format_size, run_with_progress};
use crate::context::Context;

/// Build the library of the active configuration
pub fn build(context: &Context, force: bool, quiet: bool) -> Result<ExitCode> {
    let config = context.config();
    let key = Library::key_for(config)?;

    println!("{} {}", "Library:".cyan().bold(), key);
    if !force && context.library().exists(config)? {
        println!(
            "  {} {}",
            "Already built".dimmed(),
            context.library().path_for(&key).display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let data = build_data(context, quiet)?;
    println!(
        "  {} {} entries in {}",
        "SUCCESS".green().bold(),
        data.len(),
        context.library().path_for(&key).display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Show the stored libraries
pub fn info(context: &Context) -> Result<ExitCode> {
    let info = context.library().info()?;

    println!("{}", "Library Information".cyan().bold());
    println!("  {}: {}", "Directory".dimmed(), info.directory.display());
    println!("  {}: {}", "Libraries".dimmed(), info.entry_count());
    println!("  {}: {}", "Total size".dimmed(), format_size(info.total_size_bytes));

    let active = Library::key_for(context.config())?;
    for key in &info.keys {
        if *key == active {
            println!("    {} {}", key, "(active)".green());
        } else {
            println!("    {}", key);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Remove every stored library
pub fn clear(context: &Context) -> Result<ExitCode> {
    println!("{}", "Clearing library directory...".cyan().bold());

    let count = context.library().clear()?;
    if count == 0 {
        println!("  {}", "Library directory is already empty".dimmed());
    } else {
        println!(
            "  {} Removed {} {}",
            "SUCCESS".green().bold(),
            count,
            if count == 1 { "library" } else { "libraries" }
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Loads the active library, building it with progress output when missing.
pub(crate) fn load_or_build(context: &Context, quiet: bool) -> Result<Arc<LibraryData>> {
    match context.library().load(context.config()) {
        Ok(data) => Ok(Arc::new(data)),
        Err(LibraryError::NoData(_)) => {
            if !quiet {
                println!("{}", "Building library...".cyan());
            }
            Ok(Arc::new(build_data(context, quiet)?))
        }
        Err(e) => Err(e).context("Failed to load library"),
    }
}

fn build_data(context: &Context, quiet: bool) -> Result<LibraryData> {
    let task = context.creator().task()?;
    let outcome = run_with_progress(task, context.interrupt(), quiet)?;
    outcome_to_result(outcome).context("Library build did not complete")
}
