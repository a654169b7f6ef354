//! Reconstruct command implementation
//!
//! Reconstructs one WAV file on each requested channel and writes, per
//! channel, the instructions as JSON and the instrument as FTI.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use chipfit_backend_reconstruct::{
    export, fti, load_input, write_wav, Reconstruction, Reconstructor, Renderer,
};
use chipfit_spec::ChannelKind;
use colored::Colorize;

use super::library::load_or_build;
use crate::context::Context;

/// Run the reconstruct command
///
/// # Arguments
/// * `context` - Resolved process context
/// * `input` - WAV file to reconstruct
/// * `channels` - Channels to reconstruct (empty: every configured generator)
/// * `render` - Also render the reconstruction to `<stem>.render.wav`
/// * `quiet` - Suppress progress output
pub fn run(
    context: &Context,
    input: &Path,
    channels: &[ChannelKind],
    render: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let config = context.config();
    let channels: Vec<ChannelKind> = if channels.is_empty() {
        config.generators().to_vec()
    } else {
        channels.to_vec()
    };
    if let Some(missing) = channels.iter().find(|k| !config.has_generator(**k)) {
        bail!(
            "channel '{}' is not among the configured generators; add it to \"generators\"",
            missing
        );
    }

    println!("{} {}", "Reconstructing:".cyan().bold(), input.display());
    let library = load_or_build(context, quiet)?;
    let audio = load_input(input, config)
        .with_context(|| format!("Failed to read input: {}", input.display()))?;

    fs::create_dir_all(context.output_dir()).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            context.output_dir().display()
        )
    })?;
    let stem = file_stem(input);

    let mut reconstructions = Vec::with_capacity(channels.len());
    for kind in channels {
        let reconstructor = Reconstructor::new(Arc::clone(config), Arc::clone(&library), kind)?;
        let reconstruction = reconstructor.reconstruct_with(&audio, context.interrupt())?;

        let json_path = output_path(context, &stem, kind, "json");
        write_reconstruction(&json_path, &reconstruction)?;

        let features = export::export(kind, &reconstruction.instructions, config)?;
        let fti_path = output_path(context, &stem, kind, "fti");
        fti::write_fti(&fti_path, &format!("{} {}", stem, kind), &features)
            .with_context(|| format!("Failed to write instrument: {}", fti_path.display()))?;

        println!(
            "  {} {:<8} {} frames, mean cost {:.4} -> {}",
            "OK".green().bold(),
            kind.as_str(),
            reconstruction.instructions.len(),
            reconstruction.mean_cost(),
            fti_path.display()
        );
        reconstructions.push(reconstruction);
    }

    if render {
        let samples = Renderer::new(config).render_mix(&reconstructions)?;
        let wav_path = context.output_dir().join(format!("{}.render.wav", stem));
        write_wav(&wav_path, &samples, config.general().sample_rate)?;
        println!("  {} {}", "Rendered".green().bold(), wav_path.display());
    }

    Ok(ExitCode::SUCCESS)
}

/// `<output_dir>/<stem>.<channel>.<extension>`
pub(crate) fn output_path(
    context: &Context,
    stem: &str,
    kind: ChannelKind,
    extension: &str,
) -> PathBuf {
    context
        .output_dir()
        .join(format!("{}.{}.{}", stem, kind, extension))
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Writes a reconstruction as pretty JSON.
pub(crate) fn write_reconstruction(path: &Path, reconstruction: &Reconstruction) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, reconstruction)?;
    writer.flush()?;
    Ok(())
}

/// Reads a reconstruction written by `write_reconstruction`.
pub(crate) fn read_reconstruction(path: &Path) -> Result<Reconstruction> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read reconstruction: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid reconstruction file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipfit_spec::{Config, Instruction};

    #[test]
    fn test_reconstruction_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.pulse.json");
        let reconstruction = Reconstruction {
            kind: ChannelKind::Pulse,
            instructions: vec![Instruction::off(ChannelKind::Pulse); 3],
            frame_costs: vec![0.0; 3],
            total_cost: 0.0,
        };
        write_reconstruction(&path, &reconstruction).unwrap();
        assert_eq!(read_reconstruction(&path).unwrap(), reconstruction);
    }

    #[test]
    fn test_output_naming() {
        let context = Context::with_config(
            Config::default(),
            None,
            crate::context::ContextOptions {
                library_dir: Some(PathBuf::from("lib")),
                output_dir: Some(PathBuf::from("out")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(file_stem(Path::new("songs/lead.wav")), "lead");
        assert_eq!(
            output_path(&context, "lead", ChannelKind::Triangle, "fti"),
            PathBuf::from("out/lead.triangle.fti")
        );
    }
}
