//! Error type for `skein-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// SQLite integers are signed; identifiers above `i64::MAX` cannot be
  /// stored.
  #[error("identifier {0} does not fit in a SQLite integer")]
  IdOutOfRange(u64),

  #[error("negative identifier {0} in column {1}")]
  NegativeId(i64, &'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
