//! Error types for tubes.

use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Result type alias using tubes' [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by tube hooks and pending values.
///
/// Flows are single-threaded, so hook errors need not be `Send`.
pub type BoxError = Box<dyn std::error::Error>;

/// Protocol misuse detected while connecting or pausing a flow.
///
/// These are never recovered from; they describe a pipeline that was wired or
/// driven incorrectly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A fan-out branch was asked to pause while it already holds a pause.
    #[error("fan-out branch is already paused")]
    AlreadyPaused,

    /// The fount's declared output type is not what the drain accepts.
    #[error("{drain} cannot receive items from a fount of {fount}")]
    TypeMismatch {
        /// Output type tag of the fount.
        fount: &'static str,
        /// Input type tag of the drain.
        drain: &'static str,
    },

    /// A [`NextFount`](crate::NextFount) was recovered with the wrong item type.
    #[error("expected a fount of {expected}, got a fount of {actual}")]
    UnexpectedFount {
        /// The item type asked for.
        expected: &'static str,
        /// The item type the fount actually produces.
        actual: &'static str,
    },
}

/// A captured failure of a tube hook or pending value.
///
/// Cloning a `Failure` shares the underlying error, so a single failure can be
/// broadcast to several drains.
#[derive(Error, Clone)]
#[error("exception raised when delivering from {producer}: {error}")]
pub struct Failure {
    producer: String,
    error: Rc<dyn std::error::Error>,
}

impl Failure {
    /// Captures `error`, remembering which producer raised it.
    pub fn new(producer: impl Into<String>, error: impl Into<BoxError>) -> Self {
        let error: BoxError = error.into();
        Self {
            producer: producer.into(),
            error: Rc::from(error),
        }
    }

    /// Describes the hook that failed, e.g. `"Doubler::received"`.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// The error raised by the producer.
    pub fn error(&self) -> &(dyn std::error::Error + 'static) {
        &*self.error
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("producer", &self.producer)
            .field("error", &self.error.to_string())
            .finish()
    }
}

/// Why a flow ended, as reported by [`Drain::flow_stopped`](crate::Drain::flow_stopped).
#[derive(Debug, Clone)]
pub enum StopReason {
    /// The upstream ran out of items.
    Finished,
    /// The flow ended abnormally for an application-level reason,
    /// e.g. a lost connection.
    Lost(Rc<dyn std::error::Error>),
    /// A tube hook failed.
    Failed(Failure),
}

impl StopReason {
    /// Wraps an application-level error as a stop reason.
    pub fn lost(error: impl Into<BoxError>) -> Self {
        let error: BoxError = error.into();
        StopReason::Lost(Rc::from(error))
    }

    /// Returns the captured hook failure, if this flow ended because of one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            StopReason::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the flow ended normally.
    pub fn is_finished(&self) -> bool {
        matches!(self, StopReason::Finished)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Finished => write!(f, "flow finished"),
            StopReason::Lost(error) => write!(f, "flow lost: {}", error),
            StopReason::Failed(failure) => write!(f, "flow failed: {}", failure),
        }
    }
}
