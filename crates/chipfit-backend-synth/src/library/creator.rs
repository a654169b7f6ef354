//! Parallel library builds.

use std::collections::BTreeMap;
use std::sync::Arc;

use chipfit_spec::{Config, LibraryKey};
use chipfit_task::{CancellationToken, Task, TaskOutcome};
use tracing::{info, warn};

use super::data::{LibraryData, LibraryMetadata, LibraryParams};
use super::Library;
use crate::cyclic::CyclicArray;
use crate::error::{LibraryError, LibraryResult, SynthResult};

/// Builds the library of one configuration on the task worker pool.
///
/// Every parameter tuple is synthesized as an independent unit of work. The
/// data is assembled and persisted only when every unit succeeded; a failed
/// or cancelled build leaves the store untouched.
#[derive(Debug, Clone)]
pub struct LibraryCreator {
    config: Arc<Config>,
    library: Library,
    workers: Option<usize>,
}

impl LibraryCreator {
    /// Creator for `config` persisting into `library`.
    pub fn new(config: Config, library: Library) -> Self {
        Self {
            config: Arc::new(config),
            library,
            workers: None,
        }
    }

    /// Overrides the worker count (default: one per CPU).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Configuration being built.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Target store.
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Key the build will be stored under.
    pub fn key(&self) -> LibraryResult<LibraryKey> {
        Library::key_for(&self.config)
    }

    /// Creates the build task without starting it.
    ///
    /// Callers that want progress events or cancellation take the task,
    /// subscribe to it and run it themselves; [`LibraryCreator::build`] does
    /// all of that in one call.
    pub fn task(&self) -> LibraryResult<Task<LibraryData>> {
        let key = self.key()?;
        let params = LibraryParams::enumerate(&self.config);
        let metadata = LibraryMetadata::from_config(&self.config);

        let config = Arc::clone(&self.config);
        let work = move |params: &LibraryParams,
                         _cancel: &CancellationToken|
              -> SynthResult<(LibraryParams, CyclicArray)> {
            Ok((*params, params.synthesize(&config)?))
        };

        let library = self.library.clone();
        let finish = move |entries: Vec<(LibraryParams, CyclicArray)>| -> LibraryResult<LibraryData> {
            let entries: BTreeMap<_, _> = entries.into_iter().collect();
            let data = LibraryData::new(key, metadata, entries);
            library.save(&data)?;
            Ok(data)
        };

        let task = Task::new("library", params, work, finish);
        Ok(match self.workers {
            Some(workers) => task.with_workers(workers),
            None => task,
        })
    }

    /// Builds and persists the library, blocking until done.
    pub fn build(&self) -> LibraryResult<LibraryData> {
        let task = self.task()?;
        info!(key = %self.key()?, total = task.progress().total, "building library");
        outcome_to_result(task.run())
    }

    /// Loads the stored library, building it first when it is missing.
    pub fn load_or_build(&self) -> LibraryResult<LibraryData> {
        match self.library.load(&self.config) {
            Ok(data) => Ok(data),
            Err(LibraryError::NoData(_)) => self.build(),
            Err(e) => Err(e),
        }
    }
}

/// Converts the outcome of a library task into a result.
pub fn outcome_to_result(outcome: TaskOutcome<LibraryData>) -> LibraryResult<LibraryData> {
    match outcome {
        TaskOutcome::Completed(data) => Ok(data),
        TaskOutcome::Cancelled => Err(LibraryError::Cancelled),
        TaskOutcome::Failed(error) => {
            warn!(error = %error, "library build failed");
            Err(LibraryError::Task(error))
        }
    }
}
