//! Directory reconstruction.
//!
//! Every `.wav` directly inside the input directory is one unit of work on
//! the task pool. A file is reconstructed on each configured channel and
//! written as `<stem>.<channel>.fti` into the output directory; a
//! `summary.json` lists every file with its costs or the reason it failed.
//!
//! A file that fails is recorded and the batch goes on. Only cancellation
//! stops the batch.

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chipfit_backend_synth::LibraryData;
use chipfit_spec::{ChannelKind, Config};
use chipfit_task::{CancellationToken, Task, TaskOutcome};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::audio::load_input;
use crate::error::{ReconstructError, ReconstructResult};
use crate::export::export;
use crate::fti::write_fti;
use crate::reconstructor::Reconstructor;

/// Name of the summary written next to the instruments.
pub const SUMMARY_FILE: &str = "summary.json";

/// Extension of the inputs picked up.
pub const INPUT_EXTENSION: &str = "wav";

/// One input file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    path: PathBuf,
}

impl BatchItem {
    /// Input path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem used to name the outputs.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string())
    }
}

impl fmt::Display for BatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path.file_name() {
            Some(name) => write!(f, "{}", name.to_string_lossy()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Result of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Completed,
    Failed,
}

/// One channel of a reconstructed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: ChannelKind,
    pub frames: usize,
    pub total_cost: f64,
    pub mean_cost: f64,
    /// Instrument file written.
    pub output: PathBuf,
}

/// One file of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub input: PathBuf,
    pub status: FileStatus,
    pub channels: Vec<ChannelSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a batch did, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Library the batch used.
    pub library_key: String,
    pub files: Vec<FileSummary>,
}

impl BatchSummary {
    /// Number of files reconstructed.
    pub fn succeeded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Completed)
            .count()
    }

    /// Number of files that failed.
    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    /// Reads a summary written by a previous batch.
    pub fn load(path: &Path) -> ReconstructResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ReconstructError::load(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Sorted `.wav` files directly inside `dir`.
pub fn find_inputs(dir: &Path) -> ReconstructResult<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ReconstructError::load(dir, e))?;
        let path = entry.path();
        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION));
        if entry.file_type().is_file() && is_wav {
            inputs.push(path.to_path_buf());
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Reconstructs directories of WAV files.
#[derive(Debug, Clone)]
pub struct BatchReconstruction {
    config: Arc<Config>,
    library: Arc<LibraryData>,
    reconstructors: Vec<Reconstructor>,
    output_dir: PathBuf,
    workers: Option<usize>,
}

impl BatchReconstruction {
    /// Batch over every configured channel, writing into `output_dir`.
    pub fn new(
        config: Arc<Config>,
        library: Arc<LibraryData>,
        output_dir: impl Into<PathBuf>,
    ) -> ReconstructResult<Self> {
        let reconstructors = config
            .generators()
            .iter()
            .map(|&kind| Reconstructor::new(Arc::clone(&config), Arc::clone(&library), kind))
            .collect::<ReconstructResult<Vec<_>>>()?;
        Ok(Self {
            config,
            library,
            reconstructors,
            output_dir: output_dir.into(),
            workers: None,
        })
    }

    /// Limits the worker pool.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Builds the task over the files of `input_dir`.
    pub fn task(&self, input_dir: &Path) -> ReconstructResult<Task<BatchSummary>> {
        let items: Vec<BatchItem> = find_inputs(input_dir)?
            .into_iter()
            .map(|path| BatchItem { path })
            .collect();
        fs::create_dir_all(&self.output_dir)?;
        info!(
            input = %input_dir.display(),
            files = items.len(),
            channels = self.reconstructors.len(),
            "batch prepared"
        );

        let worker = self.clone();
        let summary_dir = self.output_dir.clone();
        let library_key = self.library.key().to_string();
        let task = Task::new(
            "batch",
            items,
            move |item: &BatchItem, cancel: &CancellationToken| worker.process(item, cancel),
            move |files: Vec<FileSummary>| write_summary(&summary_dir, library_key, files),
        );
        Ok(match self.workers {
            Some(workers) => task.with_workers(workers),
            None => task,
        })
    }

    /// Runs the batch to completion.
    pub fn run(&self, input_dir: &Path) -> ReconstructResult<BatchSummary> {
        match self.task(input_dir)?.run() {
            TaskOutcome::Completed(summary) => Ok(summary),
            TaskOutcome::Cancelled => Err(ReconstructError::Cancelled),
            TaskOutcome::Failed(err) => Err(err.into()),
        }
    }

    /// Reconstructs one file. Only cancellation is an error; anything else
    /// is recorded in the summary.
    fn process(
        &self,
        item: &BatchItem,
        cancel: &CancellationToken,
    ) -> ReconstructResult<FileSummary> {
        match self.reconstruct_file(item, cancel) {
            Ok(channels) => Ok(FileSummary {
                input: item.path().to_path_buf(),
                status: FileStatus::Completed,
                channels,
                error: None,
            }),
            Err(ReconstructError::Cancelled) => Err(ReconstructError::Cancelled),
            Err(err) => {
                warn!(file = %item, error = %err, "file failed");
                Ok(FileSummary {
                    input: item.path().to_path_buf(),
                    status: FileStatus::Failed,
                    channels: Vec::new(),
                    error: Some(err.to_string()),
                })
            }
        }
    }

    fn reconstruct_file(
        &self,
        item: &BatchItem,
        cancel: &CancellationToken,
    ) -> ReconstructResult<Vec<ChannelSummary>> {
        let audio = load_input(item.path(), &self.config)?;
        let stem = item.stem();
        let mut channels = Vec::with_capacity(self.reconstructors.len());

        for reconstructor in &self.reconstructors {
            let kind = reconstructor.kind();
            let reconstruction = reconstructor.reconstruct_with(&audio, cancel)?;
            let features = export(kind, &reconstruction.instructions, &self.config)?;
            let output = self.output_dir.join(format!("{}.{}.fti", stem, kind));
            write_fti(&output, &format!("{} {}", stem, kind), &features)?;

            channels.push(ChannelSummary {
                channel: kind,
                frames: reconstruction.instructions.len(),
                total_cost: reconstruction.total_cost,
                mean_cost: reconstruction.mean_cost(),
                output,
            });
        }
        info!(file = %item, channels = channels.len(), "file reconstructed");
        Ok(channels)
    }
}

fn write_summary(
    dir: &Path,
    library_key: String,
    files: Vec<FileSummary>,
) -> ReconstructResult<BatchSummary> {
    let summary = BatchSummary { library_key, files };
    let mut writer = BufWriter::new(fs::File::create(dir.join(SUMMARY_FILE))?);
    serde_json::to_writer_pretty(&mut writer, &summary)?;
    writer.flush()?;
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "batch finished"
    );
    Ok(summary)
}
