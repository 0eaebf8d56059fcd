// squadpipe/src/core/envelope.rs

//! The unit that flows between squads: either a payload or the failure that
//! replaced it somewhere upstream.

use std::fmt;
use std::sync::Arc;

/// Captured information about an item that failed in some stage.
///
/// Failures are data, not errors: they travel downstream inside
/// [`Envelope::Failed`] so later stages can log, persist or re-route them.
#[derive(Debug, Clone)]
pub struct Failure {
  origin: String,
  kind: String,
  message: String,
  source: Option<Arc<anyhow::Error>>,
}

impl Failure {
  /// A failure without an underlying error value.
  pub fn new(origin: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      origin: origin.into(),
      kind: kind.into(),
      message: message.into(),
      source: None,
    }
  }

  /// Wraps an error raised by `origin`. The message keeps the full context chain.
  pub fn from_error(origin: impl Into<String>, kind: impl Into<String>, error: anyhow::Error) -> Self {
    Self {
      origin: origin.into(),
      kind: kind.into(),
      message: format!("{error:#}"),
      source: Some(Arc::new(error)),
    }
  }

  /// Name of the worker that produced this failure.
  pub fn origin(&self) -> &str {
    &self.origin
  }

  /// Classification label, e.g. `"request"` or `"retries_exhausted"`.
  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn source(&self) -> Option<&anyhow::Error> {
    self.source.as_deref()
  }
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.kind, self.message)
  }
}

/// A success flag plus either a payload or captured failure information.
#[derive(Debug, Clone)]
pub enum Envelope<T> {
  Ok(T),
  Failed(Failure),
}

impl<T> Envelope<T> {
  pub fn is_ok(&self) -> bool {
    matches!(self, Envelope::Ok(_))
  }

  pub fn ok(self) -> Option<T> {
    match self {
      Envelope::Ok(value) => Some(value),
      Envelope::Failed(_) => None,
    }
  }

  pub fn value(&self) -> Option<&T> {
    match self {
      Envelope::Ok(value) => Some(value),
      Envelope::Failed(_) => None,
    }
  }

  pub fn failure(&self) -> Option<&Failure> {
    match self {
      Envelope::Ok(_) => None,
      Envelope::Failed(failure) => Some(failure),
    }
  }
}
