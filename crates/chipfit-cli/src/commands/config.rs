//! Configuration commands

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use chipfit_backend_synth::{Library, LibraryParams};
use chipfit_spec::{Config, ConfigError};
use colored::Colorize;

/// Write the default configuration to `path`
pub fn init(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = Config::default().to_json_pretty()?;
    fs::write(path, json + "\n")
        .with_context(|| format!("Failed to write configuration: {}", path.display()))?;

    println!("{} {}", "Created".green().bold(), path.display());
    Ok(ExitCode::SUCCESS)
}

/// Validate a configuration file and describe the library it needs
///
/// # Returns
/// Exit code: 0 if valid, 1 if invalid
pub fn check(path: &Path) -> Result<ExitCode> {
    println!("{} {}", "Checking:".cyan().bold(), path.display());

    let config = match Config::load(path) {
        Ok(config) => config,
        Err(ConfigError::Invalid(errors)) => {
            for error in &errors {
                println!("  {} {}", "ERROR".red().bold(), error);
            }
            println!(
                "{} {} error(s)",
                "INVALID".red().bold(),
                errors.len()
            );
            return Ok(ExitCode::from(1));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read configuration: {}", path.display()))
        }
    };

    let key = Library::key_for(&config)?;
    let generators: Vec<&str> = config.generators().iter().map(|k| k.as_str()).collect();
    println!("  {}: {}", "Library key".dimmed(), key);
    println!(
        "  {}: {}",
        "Library entries".dimmed(),
        LibraryParams::enumerate(&config).len()
    );
    println!("  {}: {}", "Generators".dimmed(), generators.join(", "));
    println!(
        "  {}: {} samples",
        "Frame length".dimmed(),
        config.frame_length()
    );
    println!("{}", "VALID".green().bold());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chipfit.json");
        assert_eq!(init(&path, false).unwrap(), ExitCode::SUCCESS);
        assert!(init(&path, false).is_err());
        assert_eq!(init(&path, true).unwrap(), ExitCode::SUCCESS);

        assert_eq!(Config::load(&path).unwrap(), Config::default());
        assert_eq!(check(&path).unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_check_reports_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{ "general": { "sample_rate": 10 } }"#).unwrap();
        assert_eq!(check(&path).unwrap(), ExitCode::from(1));
    }
}
