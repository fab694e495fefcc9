//! Error types for the skein-wire codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing field {0}")]
  MissingField(&'static str),

  #[error("invalid identifier in {field}: {value}")]
  InvalidId { field: &'static str, value: String },

  #[error("invalid timestamp in {field}: {value}")]
  InvalidTimestamp { field: &'static str, value: String },

  #[error("invalid UTF-8: {0}")]
  Utf8(#[from] std::str::Utf8Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
