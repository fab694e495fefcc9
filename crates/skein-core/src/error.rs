//! Error taxonomy shared by every Skein crate.
//!
//! The three kinds are kept distinct so the ingestion loop can apply a
//! different policy to each: transport failures are fatal, store failures are
//! handled by the configured failure policy, truncated chains are only
//! reported.

use strum::{Display, IntoStaticStr};
use thiserror::Error;

use crate::{chain::Truncation, store::StoreOp};

/// Type-erased error from a source or store backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  Transport,
  Store,
  TruncatedChain,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("event source failed: {0}")]
  Transport(#[source] BoxError),

  #[error("store operation {op} failed for {key}: {source}")]
  Store {
    op:     StoreOp,
    /// Human-readable key of the entity involved.
    key:    String,
    #[source]
    source: BoxError,
  },

  #[error("{0}")]
  TruncatedChain(Truncation),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Transport(_) => ErrorKind::Transport,
      Self::Store { .. } => ErrorKind::Store,
      Self::TruncatedChain(_) => ErrorKind::TruncatedChain,
    }
  }

  pub fn transport(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Transport(Box::new(e))
  }
}

impl From<Truncation> for Error {
  fn from(t: Truncation) -> Self { Self::TruncatedChain(t) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{chain::TruncationReason, post::PostId};

  #[test]
  fn kinds_are_distinct() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
    assert_eq!(Error::transport(io).kind(), ErrorKind::Transport);

    let store = Error::Store {
      op:     StoreOp::InsertPost,
      key:    "post 9".into(),
      source: "disk full".into(),
    };
    assert_eq!(store.kind(), ErrorKind::Store);
    assert_eq!(
      store.to_string(),
      "store operation insert_post failed for post 9: disk full"
    );

    let truncation = Truncation {
      root:   PostId(1),
      posts:  2,
      reason: TruncationReason::Cycle { repeated: PostId(1) },
    };
    let truncated = Error::from(truncation);
    assert_eq!(truncated.kind(), ErrorKind::TruncatedChain);
    assert_eq!(truncated.to_string(), truncation.to_string());
    assert_eq!(ErrorKind::TruncatedChain.to_string(), "truncated_chain");
  }
}
