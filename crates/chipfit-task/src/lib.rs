//! chipfit parallel tasks
//!
//! A [`Task`] wraps one long-running operation (a library build, a directory
//! reconstruction) made of independent units of work. Units run on a fixed
//! pool of worker threads; the task reports its lifecycle and progress over
//! a channel of [`TaskEvent`]s and can be cancelled cooperatively.
//!
//! ```text
//! NotStarted --start()--> Running --+--> Completed
//!                                   +--> Cancelled
//!                                   +--> Failed
//! ```
//!
//! # Example
//!
//! ```
//! use chipfit_task::{Task, TaskOutcome};
//!
//! let task = Task::new(
//!     "squares",
//!     (1u32..=10).collect(),
//!     |n: &u32, _cancel| Ok::<_, std::io::Error>(n * n),
//!     |squares: Vec<u32>| Ok::<_, std::io::Error>(squares.iter().sum::<u32>()),
//! );
//!
//! match task.run() {
//!     TaskOutcome::Completed(total) => assert_eq!(total, 385),
//!     other => panic!("unexpected outcome: {:?}", other.status()),
//! }
//! ```

pub mod cancel;
pub mod error;
pub mod progress;
pub mod task;

pub use cancel::CancellationToken;
pub use error::TaskError;
pub use progress::{TaskEvent, TaskProgress, TaskStatus};
pub use task::{Task, TaskOutcome};
