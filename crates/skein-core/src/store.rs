//! The `DedupStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `skein-store-sqlite`).
//! The persistence gate in `skein-ingest` depends on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::post::{Author, AuthorKey, PostId, PostRecord};

/// Names a single store call, for error reports and logs.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
  AuthorExists,
  PostExists,
  InsertAuthor,
  InsertPost,
  InsertAuthorIfAbsent,
  InsertPostIfAbsent,
}

/// Existence-check and insert boundary for authors and posts.
///
/// Rows are append-only: nothing is ever updated or deleted through this
/// trait. Plain inserts of a key that already exists must fail rather than
/// overwrite.
///
/// All methods return `Send` futures so the trait can be driven from a
/// spawned tokio task.
pub trait DedupStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether a row for exactly this `(id, handle)` pair exists.
  fn author_exists<'a>(
    &'a self,
    key: &'a AuthorKey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Whether a post row with this identifier exists.
  fn post_exists(
    &self,
    id: PostId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn insert_author<'a>(
    &'a self,
    author: &'a Author,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn insert_post<'a>(
    &'a self,
    post: &'a PostRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Atomic variants for stores with more than one writer ──────────────

  /// Insert unless the key exists, as one store-level operation.
  /// Returns `true` if a row was written.
  fn insert_author_if_absent<'a>(
    &'a self,
    author: &'a Author,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Insert unless the key exists, as one store-level operation.
  /// Returns `true` if a row was written.
  fn insert_post_if_absent<'a>(
    &'a self,
    post: &'a PostRecord,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
