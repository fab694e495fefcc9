//! The `EventSource` trait.

use std::future::Future;

use crate::post::Post;

/// A pull-based stream of post events.
///
/// `Ok(Some(post))` is the next event, `Ok(None)` is a normal end of stream,
/// and `Err` is an unrecoverable transport failure. After either of the
/// latter two the source is not polled again.
pub trait EventSource: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Human-readable name for this source, used in logs.
  fn name(&self) -> &str;

  fn next(&mut self) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;
}
