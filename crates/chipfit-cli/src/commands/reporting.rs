use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use chipfit_backend_reconstruct::ReconstructError;
use chipfit_backend_synth::LibraryError;
use chipfit_task::{CancellationToken, Task, TaskEvent, TaskOutcome};
use colored::Colorize;

/// Exit code of a run stopped by cancellation.
pub const EXIT_CANCELLED: u8 = 130;

/// Maps an error to the process exit code.
pub fn exit_code_for_error(error: &anyhow::Error) -> ExitCode {
    ExitCode::from(exit_status_for_error(error))
}

/// 130 for cancellation, 1 otherwise.
pub fn exit_status_for_error(error: &anyhow::Error) -> u8 {
    let cancelled = error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ReconstructError>(),
            Some(ReconstructError::Cancelled)
        ) || matches!(
            cause.downcast_ref::<LibraryError>(),
            Some(LibraryError::Cancelled)
        )
    });
    if cancelled {
        EXIT_CANCELLED
    } else {
        1
    }
}

/// Runs a task under `cancel`, drawing a progress line on stderr until it ends.
pub(crate) fn run_with_progress<T: Send + 'static>(
    task: Task<T>,
    cancel: &CancellationToken,
    quiet: bool,
) -> Result<TaskOutcome<T>> {
    let mut task = task.with_cancel_token(cancel.clone());
    let events = task.events();
    let name = task.name().to_string();
    task.start()?;

    for event in events.iter() {
        match &event {
            TaskEvent::Progress { progress, .. } if !quiet => {
                eprint!(
                    "\r  {} {}/{} ({:.0}%)",
                    name.dimmed(),
                    progress.completed,
                    progress.total,
                    progress.fraction() * 100.0
                );
                let _ = std::io::stderr().flush();
            }
            _ => {}
        }
        if event.is_terminal() {
            break;
        }
    }
    if !quiet {
        eprintln!();
    }
    Ok(task.wait())
}

/// Human-readable byte count.
pub(crate) fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb >= 1.0 {
        format!("{:.2} MB", mb)
    } else {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_cancellation_maps_to_130() {
        let err = anyhow::Error::from(ReconstructError::Cancelled);
        assert_eq!(exit_status_for_error(&err), EXIT_CANCELLED);

        let wrapped = Err::<(), _>(LibraryError::Cancelled)
            .context("building library")
            .unwrap_err();
        assert_eq!(exit_status_for_error(&wrapped), EXIT_CANCELLED);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_status_for_error(&other), 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "0.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_run_with_progress_completes() {
        let task = Task::new(
            "double",
            vec![1u32, 2, 3],
            |n: &u32, _| Ok::<_, std::io::Error>(n * 2),
            |values: Vec<u32>| Ok::<_, std::io::Error>(values),
        );
        match run_with_progress(task, &CancellationToken::new(), true).unwrap() {
            TaskOutcome::Completed(values) => assert_eq!(values, vec![2, 4, 6]),
            other => panic!("unexpected outcome: {:?}", other.status()),
        }
    }

    #[test]
    fn test_run_with_progress_honours_interrupt() {
        let interrupt = CancellationToken::new();
        interrupt.cancel();
        let task = Task::new(
            "interrupted",
            vec![1u32, 2, 3],
            |n: &u32, _| Ok::<_, std::io::Error>(*n),
            |values: Vec<u32>| Ok::<_, std::io::Error>(values),
        );
        let outcome = run_with_progress(task, &interrupt, true).unwrap();
        assert!(matches!(outcome, TaskOutcome::Cancelled));
    }
}
