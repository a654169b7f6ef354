//! Task lifecycle and the worker pool.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{panic_message, BoxError, TaskError};
use crate::progress::{TaskEvent, TaskProgress, TaskStatus};

/// Final result of a task.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// Every unit and the finishing step succeeded.
    Completed(T),
    /// Cancellation was requested before the task finished.
    Cancelled,
    /// A unit or the finishing step failed.
    Failed(TaskError),
}

impl<T> TaskOutcome<T> {
    /// The terminal status matching this outcome.
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Completed(_) => TaskStatus::Completed,
            TaskOutcome::Cancelled => TaskStatus::Cancelled,
            TaskOutcome::Failed(_) => TaskStatus::Failed,
        }
    }

    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

type Job<T> = Box<dyn FnOnce(Arc<Shared>, usize) -> TaskOutcome<T> + Send + 'static>;

struct TaskState {
    status: TaskStatus,
    progress: TaskProgress,
}

struct Shared {
    name: String,
    state: Mutex<TaskState>,
    cancel: CancellationToken,
    events: Sender<TaskEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: TaskEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Moves to the terminal state of `outcome` and emits its event.
    fn conclude<T>(&self, outcome: TaskOutcome<T>) -> TaskOutcome<T> {
        let mut state = self.lock();
        state.status = outcome.status();
        state.progress.current = None;
        let event = match &outcome {
            TaskOutcome::Completed(_) => TaskEvent::Completed,
            TaskOutcome::Cancelled => TaskEvent::Cancelled,
            TaskOutcome::Failed(err) => TaskEvent::Failed {
                message: err.to_string(),
            },
        };
        self.emit(event);
        info!(
            task = %self.name,
            status = %state.status,
            completed = state.progress.completed,
            total = state.progress.total,
            "task finished"
        );
        outcome
    }
}

/// A cancellable, progress-reporting unit of long-running work.
///
/// A task is built from a list of items, a per-item `work` function run on
/// the worker pool, and a `finish` function that receives every output in
/// item order once all units succeeded. `finish` never runs when a unit
/// fails or cancellation was requested, and once it runs its result is
/// the outcome.
pub struct Task<T> {
    shared: Arc<Shared>,
    receiver: Receiver<TaskEvent>,
    workers: usize,
    job: Option<Job<T>>,
    handle: Option<JoinHandle<TaskOutcome<T>>>,
}

impl<T: Send + 'static> Task<T> {
    /// Creates a task in the not-started state.
    pub fn new<I, O, E, W, F, FE>(name: impl Into<String>, items: Vec<I>, work: W, finish: F) -> Self
    where
        I: std::fmt::Display + Send + 'static,
        O: Send + 'static,
        E: Into<BoxError>,
        W: Fn(&I, &CancellationToken) -> Result<O, E> + Send + Sync + 'static,
        F: FnOnce(Vec<O>) -> Result<T, FE> + Send + 'static,
        FE: Into<BoxError>,
    {
        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(Shared {
            name: name.into(),
            state: Mutex::new(TaskState {
                status: TaskStatus::NotStarted,
                progress: TaskProgress {
                    total: items.len(),
                    completed: 0,
                    current: None,
                },
            }),
            cancel: CancellationToken::new(),
            events: sender,
        });
        let job: Job<T> = Box::new(move |shared: Arc<Shared>, workers: usize| {
            run_units(&shared, workers, items, work, finish)
        });

        Self {
            shared,
            receiver,
            workers: num_cpus::get().max(1),
            job: Some(job),
            handle: None,
        }
    }

    /// Sets the worker pool size (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        self.shared.lock().status
    }

    /// Snapshot of the progress counters.
    pub fn progress(&self) -> TaskProgress {
        self.shared.lock().progress.clone()
    }

    /// Receiver for this task's events.
    ///
    /// Every clone competes for the same events; hand one receiver to one
    /// observer.
    pub fn events(&self) -> Receiver<TaskEvent> {
        self.receiver.clone()
    }

    /// Uses `token` for cancellation, so one token can stop several tasks.
    ///
    /// Has no effect once the task was started.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.cancel = token,
            None => warn!(task = %self.shared.name, "cancel token ignored, task already started"),
        }
        self
    }

    /// Handle that cancels this task from any thread.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        debug!(task = %self.shared.name, "cancellation requested");
        self.shared.cancel.cancel();
    }

    /// Moves to running and starts the workers in the background.
    pub fn start(&mut self) -> Result<(), TaskError> {
        let job = {
            let mut state = self.shared.lock();
            let job = match (state.status, self.job.take()) {
                (TaskStatus::NotStarted, Some(job)) => job,
                _ => return Err(TaskError::AlreadyStarted(self.shared.name.clone())),
            };
            state.status = TaskStatus::Running;
            self.shared.emit(TaskEvent::Started {
                total: state.progress.total,
            });
            info!(
                task = %self.shared.name,
                total = state.progress.total,
                workers = self.workers,
                "task started"
            );
            job
        };

        let shared = Arc::clone(&self.shared);
        let workers = self.workers;
        self.handle = Some(thread::spawn(move || job(shared, workers)));
        Ok(())
    }

    /// Blocks until the task reaches a terminal state, starting it first if needed.
    pub fn wait(mut self) -> TaskOutcome<T> {
        if self.handle.is_none() {
            if let Err(err) = self.start() {
                return TaskOutcome::Failed(err);
            }
        }
        let Some(handle) = self.handle.take() else {
            return TaskOutcome::Failed(TaskError::AlreadyStarted(self.shared.name.clone()));
        };
        match handle.join() {
            Ok(outcome) => outcome,
            Err(payload) => self.shared.conclude(TaskOutcome::Failed(TaskError::Panicked {
                task: self.shared.name.clone(),
                item: "<coordinator>".to_string(),
                message: panic_message(payload.as_ref()),
            })),
        }
    }

    /// Starts the task and waits for it.
    pub fn run(self) -> TaskOutcome<T> {
        self.wait()
    }
}

fn record_failure(failure: &Mutex<Option<TaskError>>, abort: &AtomicBool, error: TaskError) {
    warn!(error = %error, "unit of work failed");
    abort.store(true, Ordering::SeqCst);
    let mut slot = failure
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.is_none() {
        *slot = Some(error);
    }
}

fn run_units<T, I, O, E, W, F, FE>(
    shared: &Shared,
    workers: usize,
    items: Vec<I>,
    work: W,
    finish: F,
) -> TaskOutcome<T>
where
    I: std::fmt::Display + Send,
    O: Send,
    E: Into<BoxError>,
    W: Fn(&I, &CancellationToken) -> Result<O, E> + Sync,
    F: FnOnce(Vec<O>) -> Result<T, FE>,
    FE: Into<BoxError>,
{
    let total = items.len();
    let (item_tx, item_rx) = channel::unbounded::<(usize, I)>();
    for pair in items.into_iter().enumerate() {
        let _ = item_tx.send(pair);
    }
    drop(item_tx);

    let results: Mutex<Vec<Option<O>>> = Mutex::new((0..total).map(|_| None).collect());
    let failure: Mutex<Option<TaskError>> = Mutex::new(None);
    let abort = AtomicBool::new(false);
    let worker_count = workers.clamp(1, total.max(1));

    thread::scope(|scope| {
        for worker_id in 0..worker_count {
            let item_rx = item_rx.clone();
            let (results, failure, abort, work) = (&results, &failure, &abort, &work);
            scope.spawn(move || {
                while !shared.cancel.is_cancelled() && !abort.load(Ordering::SeqCst) {
                    let Ok((index, item)) = item_rx.recv() else {
                        break;
                    };
                    let label = item.to_string();
                    shared.lock().progress.current = Some(label.clone());

                    match panic::catch_unwind(AssertUnwindSafe(|| work(&item, &shared.cancel))) {
                        Ok(Ok(output)) => {
                            results
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())[index] =
                                Some(output);
                            let mut state = shared.lock();
                            state.progress.completed += 1;
                            // Sent under the state lock so completed counts arrive in order.
                            shared.emit(TaskEvent::Progress {
                                status: state.status,
                                progress: state.progress.clone(),
                            });
                        }
                        Ok(Err(err)) => {
                            record_failure(
                                failure,
                                abort,
                                TaskError::Unit {
                                    task: shared.name.clone(),
                                    item: label,
                                    source: err.into(),
                                },
                            );
                            break;
                        }
                        Err(payload) => {
                            record_failure(
                                failure,
                                abort,
                                TaskError::Panicked {
                                    task: shared.name.clone(),
                                    item: label,
                                    message: panic_message(payload.as_ref()),
                                },
                            );
                            break;
                        }
                    }
                }
                debug!(task = %shared.name, worker = worker_id, "worker stopped");
            });
        }
    });

    if shared.cancel.is_cancelled() {
        return shared.conclude(TaskOutcome::Cancelled);
    }

    let failure = failure
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(error) = failure {
        return shared.conclude(TaskOutcome::Failed(error));
    }

    let outputs: Vec<O> = results
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .into_iter()
        .flatten()
        .collect();

    let finished = panic::catch_unwind(AssertUnwindSafe(|| finish(outputs)));
    let outcome = match finished {
        Ok(Ok(value)) => TaskOutcome::Completed(value),
        Ok(Err(err)) => TaskOutcome::Failed(TaskError::Finish {
            task: shared.name.clone(),
            source: err.into(),
        }),
        Err(payload) => TaskOutcome::Failed(TaskError::Panicked {
            task: shared.name.clone(),
            item: "<finish>".to_string(),
            message: panic_message(payload.as_ref()),
        }),
    };

    // `finish` commits the result; a cancel arriving after it started is ignored.
    shared.conclude(outcome)
}
