//! Process-wide settings resolved once at startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chipfit_backend_synth::{Library, LibraryCreator};
use chipfit_spec::Config;
use chipfit_task::CancellationToken;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CHIPFIT_CONFIG";

/// File name looked up in the platform config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Overrides given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextOptions {
    pub config: Option<PathBuf>,
    pub library_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

/// Immutable settings threaded through every command.
#[derive(Debug, Clone)]
pub struct Context {
    config: Arc<Config>,
    config_path: Option<PathBuf>,
    library: Library,
    workers: usize,
    output_dir: PathBuf,
    interrupt: CancellationToken,
}

impl Context {
    /// Resolves the configuration and the paths the commands use.
    ///
    /// The configuration comes from `--config`, then `CHIPFIT_CONFIG`, then
    /// `config.json` in the platform config directory, and falls back to the
    /// defaults.
    pub fn resolve(options: ContextOptions) -> Result<Self> {
        let config_path = options
            .config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.is_file()));

        let config = match &config_path {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
            None => Config::default(),
        };
        Self::with_config(config, config_path, options)
    }

    /// Context around an already loaded configuration.
    pub fn with_config(
        config: Config,
        config_path: Option<PathBuf>,
        options: ContextOptions,
    ) -> Result<Self> {
        let library = match options.library_dir {
            Some(dir) => Library::new(dir),
            None => Library::from_config(&config)?,
        };
        let workers = options.workers.unwrap_or_else(num_cpus::get).max(1);
        let output_dir = options.output_dir.unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config: Arc::new(config),
            config_path,
            library,
            workers,
            output_dir,
            interrupt: CancellationToken::new(),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// File the configuration was read from, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Library store.
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Worker pool size.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Directory outputs are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Token cancelled by Ctrl-C; every task of the process listens to it.
    pub fn interrupt(&self) -> &CancellationToken {
        &self.interrupt
    }

    /// Library creator for the active configuration.
    pub fn creator(&self) -> LibraryCreator {
        LibraryCreator::new((*self.config).clone(), self.library.clone()).with_workers(self.workers)
    }
}

/// `config.json` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chipfit").join(CONFIG_FILE))
}
