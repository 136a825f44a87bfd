//! Error types used by the event bus runtime and subscriber handlers.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the bus runtime itself.
//! - [`HandlerError`] — errors raised by individual subscriber handlers.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.
//! Handler errors never reach publishers: they are caught at the per-handler
//! boundary inside the dispatcher and surface only as log entries. Cache
//! operations never error at all; bad input degrades to a miss or a no-op.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the bus runtime.
///
/// These represent failures in the dispatch machinery itself, such as a stop
/// sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Stop grace period was exceeded; the dispatcher worker was aborted.
    #[error("dispatcher did not stop within {grace:?}; worker aborted")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },

    /// The dispatcher worker terminated abnormally (a panic escaped the
    /// dispatch guard).
    #[error("dispatcher terminated abnormally: {reason}")]
    DispatcherFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use storecore::RuntimeError;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::DispatcherFailed { .. } => "runtime_dispatcher_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace } => {
                format!("grace exceeded after {grace:?}; dispatcher aborted")
            }
            RuntimeError::DispatcherFailed { reason } => {
                format!("dispatcher failed: {reason}")
            }
        }
    }
}

/// # Errors produced by subscriber handlers.
///
/// These represent failures of individual handlers during dispatch. They are
/// contained at the handler boundary: remaining handlers in the same pass
/// still run, and the dispatcher worker keeps going.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Handler returned an error for this event.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked while processing this event.
    #[error("handler panicked: {detail}")]
    Panicked {
        /// Extracted panic payload, or `"unknown panic"`.
        detail: String,
    },
}

impl HandlerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use storecore::HandlerError;
    ///
    /// let err = HandlerError::Fail { error: "boom".into() };
    /// assert_eq!(err.as_label(), "handler_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Panicked { .. } => "handler_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Panicked { detail } => format!("panic: {detail}"),
        }
    }
}
