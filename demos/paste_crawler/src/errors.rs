// demos/paste_crawler/src/errors.rs

use squadpipe::PipeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Pipeline Error: {source}")]
  Pipeline {
    #[from]
    source: PipeError,
  },

  #[error("HTTP Client Error: {0}")]
  Http(#[from] reqwest::Error),
}

impl AppError {
  /// Whether the error came from a worker that killed the run, as opposed to
  /// a setup problem.
  pub fn is_fatal_run(&self) -> bool {
    matches!(self, AppError::Pipeline { source } if source.is_fatal())
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
