//! chipfit CLI - reconstruct audio as 2A03 channel instruments
//!
//! This binary builds sample libraries, reconstructs WAV files into
//! per-frame channel instructions and exports them as FTI instruments.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use chipfit_cli::commands;
use chipfit_cli::context::Context;
use chipfit_cli::{interrupt, logging};

mod cli_args;

use cli_args::{Cli, Commands, ConfigCommands, LibraryCommands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.global.verbose) {
        eprintln!("{}: {}", "warning".yellow(), e);
    }

    let quiet = cli.global.quiet;
    let result = match cli.command {
        // Config commands work on explicit files and need no context.
        Commands::Config { command } => run_config(command),
        command => Context::resolve(cli.global.context_options()).and_then(|context| {
            if let Err(e) = interrupt::install(context.interrupt().clone()) {
                eprintln!("{}: {:#}", "warning".yellow(), e);
            }
            run_command(command, &context, quiet)
        }),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red(), e);
            commands::exit_code_for_error(&e)
        }
    }
}

fn run_command(command: Commands, context: &Context, quiet: bool) -> Result<ExitCode> {
    match command {
        Commands::Library { command } => match command {
            LibraryCommands::Build { force } => commands::library::build(context, force, quiet),
            LibraryCommands::Info => commands::library::info(context),
            LibraryCommands::Clear => commands::library::clear(context),
        },
        Commands::Reconstruct {
            input,
            channels,
            render,
        } => commands::reconstruct::run(context, &input, &channels, render, quiet),
        Commands::Batch { input_dir } => commands::batch::run(context, &input_dir, quiet),
        Commands::Export { input, name } => {
            commands::export::run(context, &input, name.as_deref())
        }
        Commands::Render { inputs, wav } => commands::render::run(context, &inputs, &wav),
        Commands::Config { command } => run_config(command),
    }
}

fn run_config(command: ConfigCommands) -> Result<ExitCode> {
    match command {
        ConfigCommands::Init { path, force } => commands::config::init(&path, force),
        ConfigCommands::Check { path } => commands::config::check(&path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipfit_spec::ChannelKind;
    use std::path::PathBuf;

    #[test]
    fn test_cli_parses_reconstruct() {
        let cli = Cli::try_parse_from([
            "chipfit",
            "reconstruct",
            "lead.wav",
            "--channel",
            "pulse",
            "--channel",
            "noise",
            "--render",
            "-o",
            "out",
        ])
        .unwrap();
        assert_eq!(cli.global.output, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Reconstruct {
                input,
                channels,
                render,
            } => {
                assert_eq!(input, PathBuf::from("lead.wav"));
                assert_eq!(channels, vec![ChannelKind::Pulse, ChannelKind::Noise]);
                assert!(render);
            }
            _ => panic!("expected reconstruct command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_channel() {
        let err = Cli::try_parse_from(["chipfit", "reconstruct", "a.wav", "--channel", "dpcm"])
            .err()
            .unwrap();
        assert!(err.to_string().contains("dpcm"));
    }

    #[test]
    fn test_cli_parses_library_build() {
        let cli =
            Cli::try_parse_from(["chipfit", "-vv", "library", "build", "--force", "-w", "4"])
                .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.workers, Some(4));
        match cli.command {
            Commands::Library {
                command: LibraryCommands::Build { force },
            } => assert!(force),
            _ => panic!("expected library build command"),
        }
    }

    #[test]
    fn test_cli_parses_config_init_default_path() {
        let cli = Cli::try_parse_from(["chipfit", "config", "init"]).unwrap();
        match cli.command {
            Commands::Config {
                command: ConfigCommands::Init { path, force },
            } => {
                assert_eq!(path, PathBuf::from("chipfit.json"));
                assert!(!force);
            }
            _ => panic!("expected config init command"),
        }
    }

    #[test]
    fn test_cli_render_requires_inputs() {
        assert!(Cli::try_parse_from(["chipfit", "render", "--wav", "out.wav"]).is_err());
        let cli =
            Cli::try_parse_from(["chipfit", "render", "a.json", "b.json", "--wav", "mix.wav"])
                .unwrap();
        match cli.command {
            Commands::Render { inputs, wav } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(wav, PathBuf::from("mix.wav"));
            }
            _ => panic!("expected render command"),
        }
    }
}
