//! CLI argument definitions for the chipfit command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use std::path::PathBuf;

use chipfit_cli::context::ContextOptions;
use chipfit_spec::ChannelKind;
use clap::{Args, Parser, Subcommand};

/// chipfit - Reconstruct audio as 2A03 channel instruments
#[derive(Parser)]
#[command(name = "chipfit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct GlobalArgs {
    /// Configuration file (JSON); defaults to $CHIPFIT_CONFIG or the user config
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Library directory (overrides the configuration)
    #[arg(long, global = true)]
    pub library_dir: Option<PathBuf>,

    /// Worker threads (default: one per CPU)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Output directory (default: current directory)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); CHIPFIT_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            config: self.config.clone(),
            library_dir: self.library_dir.clone(),
            workers: self.workers,
            output_dir: self.output.clone(),
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Manage the sample library
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },

    /// Reconstruct a WAV file and write one instrument per channel
    Reconstruct {
        /// Input WAV file
        input: PathBuf,

        /// Channel to reconstruct (repeatable; default: every configured generator)
        #[arg(long = "channel", value_parser = parse_channel)]
        channels: Vec<ChannelKind>,

        /// Also render the reconstruction to <stem>.render.wav
        #[arg(long)]
        render: bool,
    },

    /// Reconstruct every WAV file in a directory
    Batch {
        /// Directory containing WAV files
        input_dir: PathBuf,
    },

    /// Export a saved reconstruction (JSON) as an FTI instrument
    Export {
        /// Reconstruction file written by `reconstruct`
        input: PathBuf,

        /// Instrument name (default: file stem)
        #[arg(long)]
        name: Option<String>,
    },

    /// Render saved reconstructions (JSON) to a WAV file
    Render {
        /// Reconstruction files written by `reconstruct`
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output WAV file
        #[arg(long)]
        wav: PathBuf,
    },

    /// Create or validate configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum LibraryCommands {
    /// Build the library of the active configuration
    Build {
        /// Rebuild even if the library is already stored
        #[arg(short, long)]
        force: bool,
    },
    /// Show stored libraries
    Info,
    /// Remove stored libraries
    Clear,
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Destination file
        #[arg(default_value = "chipfit.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate a configuration file
    Check {
        /// Configuration file
        path: PathBuf,
    },
}

fn parse_channel(value: &str) -> Result<ChannelKind, String> {
    value.parse()
}
