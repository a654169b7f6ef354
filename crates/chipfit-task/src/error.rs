//! Task errors.

use thiserror::Error;

/// Boxed error produced by a unit of work or by the finishing step.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that end a task in the failed state.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A unit of work returned an error.
    #[error("task '{task}' failed on '{item}': {source}")]
    Unit {
        /// Task name.
        task: String,
        /// Label of the failing item.
        item: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// The finishing step returned an error.
    #[error("task '{task}' failed while finishing: {source}")]
    Finish {
        /// Task name.
        task: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// A unit of work panicked.
    #[error("task '{task}' panicked on '{item}': {message}")]
    Panicked {
        /// Task name.
        task: String,
        /// Label of the item being processed.
        item: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// `start()` was called on a task that already left the not-started state.
    #[error("task '{0}' was already started")]
    AlreadyStarted(String),
}

impl TaskError {
    /// Attempts to view the underlying unit or finish error as `E`.
    pub fn source_as<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            TaskError::Unit { source, .. } | TaskError::Finish { source, .. } => {
                source.downcast_ref::<E>()
            }
            _ => None,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_downcast() {
        let err = TaskError::Unit {
            task: "build".to_string(),
            item: "pulse:60:2".to_string(),
            source: Box::new(std::io::Error::new(std::io::ErrorKind::Other, "disk full")),
        };
        assert!(err.to_string().contains("pulse:60:2"));
        assert!(err.source_as::<std::io::Error>().is_some());
        assert!(err.source_as::<std::fmt::Error>().is_none());
    }

    #[test]
    fn test_panic_message_payloads() {
        let static_str: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_str.as_ref()), "boom");
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(owned.as_ref()), "bang");
        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
