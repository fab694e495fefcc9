//! Error types for the ingestion runtime.

use skein_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] skein_core::Error),

  #[error("giving up after {failures} store failures: {last}")]
  StoreBudgetExhausted {
    failures: usize,
    #[source]
    last:     skein_core::Error,
  },

  #[error("event source task died: {0}")]
  SourceTask(#[from] tokio::task::JoinError),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::StoreBudgetExhausted { .. } => ErrorKind::Store,
      Self::SourceTask(_) => ErrorKind::Transport,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of [`JsonlSource`](crate::source::JsonlSource).
#[derive(Debug, Error)]
pub enum SourceError {
  #[error("read failed: {0}")]
  Io(#[from] std::io::Error),

  #[error("line {line}: {source}")]
  Decode {
    line:   u64,
    #[source]
    source: skein_wire::Error,
  },
}
