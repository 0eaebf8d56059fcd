// squadpipe/src/core/control.rs

//! Defines what a worker hands back to the runtime for each item, and how
//! errors raised by workers are classified.

use crate::core::envelope::Failure;
use thiserror::Error;

/// Result of processing a single input item.
///
/// Replaces exception-driven control flow: a retry is a value, not an error.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
  /// Forward this value downstream as a successful envelope.
  Emit(T),
  /// Produce nothing for this item.
  Suppress,
  /// Resubmit the original input to this worker's own input link, unchanged.
  Retry,
  /// Forward a failure envelope downstream.
  Fail(Failure),
}

impl<T> Outcome<T> {
  pub fn is_retry(&self) -> bool {
    matches!(self, Outcome::Retry)
  }
}

// "Nothing" never reaches a queue.
impl<T> From<Option<T>> for Outcome<T> {
  fn from(value: Option<T>) -> Self {
    match value {
      Some(v) => Outcome::Emit(v),
      None => Outcome::Suppress,
    }
  }
}

/// How the runtime treats an error returned from `work` or `handle_failed_input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
  /// Expected error: converted into a failure envelope of the given kind and forwarded.
  FollowThrough { kind: String },
  /// Unclassified error: terminates the worker task and kills the pipeline.
  Fatal,
}

impl ErrorClass {
  pub fn follow_through(kind: impl Into<String>) -> Self {
    ErrorClass::FollowThrough { kind: kind.into() }
  }
}

/// Marker wrapper that forces an error to be treated as fatal by the default
/// classification, regardless of its underlying type.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Fatal(#[from] anyhow::Error);

/// Wraps `error` so the default classification treats it as fatal.
pub fn fatal(error: impl Into<anyhow::Error>) -> anyhow::Error {
  anyhow::Error::new(Fatal(error.into()))
}

/// Kind label given to follow-through failures by the default classification.
pub const DEFAULT_FAILURE_KIND: &str = "error";

/// Classification used by [`Worker::classify`](crate::Worker::classify) unless overridden:
/// every error follows through except those wrapped with [`fatal`].
pub fn default_classify(error: &anyhow::Error) -> ErrorClass {
  let is_fatal = error.downcast_ref::<Fatal>().is_some() || error.chain().any(|cause| cause.is::<Fatal>());
  if is_fatal {
    ErrorClass::Fatal
  } else {
    ErrorClass::follow_through(DEFAULT_FAILURE_KIND)
  }
}
