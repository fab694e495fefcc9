//! Posts and authors, the two entities the ingester persists.
//!
//! A [`Post`] as it arrives from an event source is a tree: it owns its
//! [`Author`] and, when it is a repost, a boxed copy of the post it reshares.
//! The store never sees that tree. It sees [`Author`] rows and flat
//! [`PostRecord`] rows, with the nested references reduced to identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on stored post text, in characters.
pub const MAX_TEXT_CHARS: usize = 280;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Globally unique post identifier assigned by the upstream platform.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PostId(pub u64);

/// Numeric account identifier. Stable across handle changes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AuthorId(pub u64);

impl fmt::Display for PostId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl fmt::Display for AuthorId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

// ─── Author ──────────────────────────────────────────────────────────────────

/// The dedup key of an author row.
///
/// Handles are mutable upstream, so the same account observed under two
/// handles yields two rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorKey {
  pub id:     AuthorId,
  pub handle: String,
}

impl fmt::Display for AuthorKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.id, self.handle)
  }
}

/// An account snapshot as observed on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub id:                    AuthorId,
  pub name:                  Option<String>,
  /// Screen name at the time of observation.
  pub handle:                String,
  pub followers_count:       u64,
  pub following_count:       u64,
  pub listed_count:          u64,
  pub created_at:            DateTime<Utc>,
  pub favourites_count:      u64,
  pub verified:              bool,
  pub statuses_count:        u64,
  pub default_profile_image: bool,
}

impl Author {
  pub fn key(&self) -> AuthorKey {
    AuthorKey { id: self.id, handle: self.handle.clone() }
  }
}

// ─── Post ────────────────────────────────────────────────────────────────────

/// A post event, possibly carrying the post it reposts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub id:                 PostId,
  pub text:               String,
  pub created_at:         DateTime<Utc>,
  pub in_reply_to_post:   Option<PostId>,
  pub in_reply_to_author: Option<AuthorId>,
  /// Client label, e.g. the HTML anchor of the posting application.
  pub source:             String,
  pub author:             Author,
  pub reposted:           Option<Box<Post>>,
}

impl Post {
  /// Identifier of the directly reposted post, if any.
  pub fn reposted_from(&self) -> Option<PostId> {
    self.reposted.as_ref().map(|p| p.id)
  }

  pub fn record(&self) -> PostRecord { PostRecord::from(self) }
}

/// The persisted row shape of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
  pub id:                 PostId,
  pub text:               String,
  pub created_at:         DateTime<Utc>,
  pub in_reply_to_post:   Option<PostId>,
  pub in_reply_to_author: Option<AuthorId>,
  pub reposted_from:      Option<PostId>,
  pub source:             String,
  pub author_id:          AuthorId,
}

impl From<&Post> for PostRecord {
  fn from(post: &Post) -> Self {
    Self {
      id:                 post.id,
      text:               bounded_text(&post.text),
      created_at:         post.created_at,
      in_reply_to_post:   post.in_reply_to_post,
      in_reply_to_author: post.in_reply_to_author,
      reposted_from:      post.reposted_from(),
      source:             post.source.clone(),
      author_id:          post.author.id,
    }
  }
}

/// Truncate `text` to at most [`MAX_TEXT_CHARS`] characters.
pub fn bounded_text(text: &str) -> String {
  match text.char_indices().nth(MAX_TEXT_CHARS) {
    Some((cut, _)) => text[..cut].to_owned(),
    None => text.to_owned(),
  }
}
