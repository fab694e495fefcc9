//! Ingestion runtime for Skein.
//!
//! Wires an [`EventSource`](skein_core::source::EventSource) to a
//! [`DedupStore`](skein_core::store::DedupStore) through a bounded queue,
//! the repost-chain resolver and the persistence gate, and exposes the
//! running counters over a small HTTP status endpoint.

pub mod error;
pub mod gate;
pub mod pipeline;
pub mod policy;
pub mod source;
pub mod status;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, path::PathBuf};

pub use error::{Error, Result, SourceError};
pub use gate::{PersistenceGate, WriteMode};
pub use pipeline::{IngestStats, Ingestor, LoopState, PipelineConfig, Termination};
pub use policy::{RetryPolicy, StoreFailurePolicy};
use serde::Deserialize;
use skein_core::chain::DEFAULT_MAX_CHAIN_LEN;
pub use source::JsonlSource;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `SKEIN__*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  pub store_path:               PathBuf,
  /// A JSONL file, or `-` for stdin.
  pub source:                   PathBuf,
  pub skip_malformed:           bool,
  pub queue_capacity:           usize,
  pub max_chain_len:            usize,
  pub write_mode:               WriteMode,
  pub drain_on_transport_error: bool,
  /// Serve `/health` and `/stats` here when set.
  pub status_addr:              Option<SocketAddr>,
  pub retry:                    RetryPolicy,
  pub store_failures:           StoreFailurePolicy,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      store_path:               PathBuf::from("tweet_data.sqlite"),
      source:                   PathBuf::from(source::STDIN),
      skip_malformed:           true,
      queue_capacity:           1024,
      max_chain_len:            DEFAULT_MAX_CHAIN_LEN,
      write_mode:               WriteMode::default(),
      drain_on_transport_error: true,
      status_addr:              None,
      retry:                    RetryPolicy::default(),
      store_failures:           StoreFailurePolicy::default(),
    }
  }
}

impl IngestConfig {
  pub fn pipeline(&self) -> PipelineConfig {
    PipelineConfig {
      queue_capacity:           self.queue_capacity,
      max_chain_len:            self.max_chain_len,
      write_mode:               self.write_mode,
      drain_on_transport_error: self.drain_on_transport_error,
      retry:                    self.retry.clone(),
      store_failures:           self.store_failures,
    }
  }
}
