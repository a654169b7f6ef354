//! Task status, progress snapshots and lifecycle events.

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Created, not yet started.
    NotStarted,
    /// Workers are processing units.
    Running,
    /// Finished successfully.
    Completed,
    /// Stopped on request.
    Cancelled,
    /// Stopped by an error.
    Failed,
}

impl TaskStatus {
    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed
        )
    }

    /// Returns the status as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress counters of a task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskProgress {
    /// Number of units.
    pub total: usize,
    /// Units finished successfully.
    pub completed: usize,
    /// Label of the unit most recently picked up.
    pub current: Option<String>,
}

impl TaskProgress {
    /// Completed fraction in [0, 1]; 1 for an empty task.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Event emitted on the task's event channel.
///
/// `Started` is sent once when the task starts; exactly one of `Completed`,
/// `Cancelled` or `Failed` is sent last. `Progress` events arrive from worker
/// threads in between with non-decreasing `completed` counts.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// The task moved to running.
    Started {
        /// Number of units.
        total: usize,
    },
    /// A unit finished.
    Progress {
        /// Status at the time of the event.
        status: TaskStatus,
        /// Snapshot of the counters.
        progress: TaskProgress,
    },
    /// The task completed.
    Completed,
    /// The task was cancelled.
    Cancelled,
    /// The task failed.
    Failed {
        /// Error message.
        message: String,
    },
}

impl TaskEvent {
    /// Whether this is the final event of a task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::Completed | TaskEvent::Cancelled | TaskEvent::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::NotStarted.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_progress_fraction() {
        let progress = TaskProgress {
            total: 4,
            completed: 1,
            current: None,
        };
        assert!((progress.fraction() - 0.25).abs() < 1e-12);
        assert_eq!(TaskProgress::default().fraction(), 1.0);
    }
}
