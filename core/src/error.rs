// squadpipe/src/error.rs
use crate::pipeline::state::PipelineState;
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipeError {
  #[error("Pipeline configuration error: {message}")]
  Configuration { message: String },

  #[error("Worker '{worker}' failed while preparing. Source: {source}")]
  PrepareFailed {
    worker: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Worker '{worker}' raised a fatal error. Source: {source}")]
  WorkerFailed {
    worker: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Worker '{worker}' panicked: {message}")]
  WorkerPanicked { worker: String, message: String },

  #[error("Link type mismatch while wiring squad {squad_index} (expected {expected_type})")]
  TypeMismatch { squad_index: usize, expected_type: String },

  #[error("Pipeline cannot move from {from:?} to {to:?}")]
  InvalidState { from: PipelineState, to: PipelineState },
}

impl PipeError {
  pub(crate) fn configuration(message: impl Into<String>) -> Self {
    PipeError::Configuration {
      message: message.into(),
    }
  }

  /// Name of the worker that caused this error, if a single worker is to blame.
  pub fn worker(&self) -> Option<&str> {
    match self {
      PipeError::PrepareFailed { worker, .. }
      | PipeError::WorkerFailed { worker, .. }
      | PipeError::WorkerPanicked { worker, .. } => Some(worker.as_str()),
      _ => None,
    }
  }

  /// True for errors that terminated a worker task and therefore killed the run.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      PipeError::PrepareFailed { .. } | PipeError::WorkerFailed { .. } | PipeError::WorkerPanicked { .. }
    )
  }
}

pub type PipeResult<T, E = PipeError> = std::result::Result<T, E>;
