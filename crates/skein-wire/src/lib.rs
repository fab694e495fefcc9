//! Streaming-API status JSON codec for Skein.
//!
//! Converts between the line-delimited JSON messages of a post stream and
//! [`skein_core`] domain types. Pure synchronous; no I/O.
//!
//! # Quick start
//!
//! ```no_run
//! use skein_wire::{StreamMessage, decode};
//!
//! let line = r#"{"limit":{"track":12}}"#;
//! match decode(line).unwrap() {
//!   StreamMessage::Post(post) => println!("post {}", post.id),
//!   StreamMessage::Limit { undelivered } => println!("{undelivered} posts withheld"),
//!   other => println!("{other:?}"),
//! }
//! ```

pub mod error;
mod parse;
mod serialize;

pub use error::{Error, Result};
pub use serialize::{encode, encode_line};
use skein_core::post::{AuthorId, Post, PostId};

/// Timestamp layout used by the streaming API, e.g.
/// `Wed Aug 27 13:08:45 +0000 2008`.
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

// ─── Public types
// ─────────────────────────────────────────────────────────────

/// One decoded line of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
  /// A post, with any reposted original nested inside it.
  Post(Post),
  /// The author deleted a post.
  Delete { post: PostId, author: Option<AuthorId> },
  /// The provider withheld `undelivered` matching posts due to rate limits.
  Limit { undelivered: u64 },
  /// Any other control message, named by its top-level key.
  Other { kind: String },
}

// ─── Public API
// ───────────────────────────────────────────────────────────────

/// Decode a single stream line.
pub fn decode(line: &str) -> Result<StreamMessage> {
  let value: serde_json::Value = serde_json::from_str(line)?;
  parse::decode_value(value)
}

/// Decode a single stream line given as raw bytes.
pub fn decode_bytes(line: &[u8]) -> Result<StreamMessage> {
  decode(std::str::from_utf8(line)?)
}
