//! Repost-chain resolution.
//!
//! A received post may repost another post, which may itself be a repost.
//! [`resolve`] flattens that nesting into the order in which the persistence
//! gate must visit it: the received post first, then each ancestor.

use std::{collections::HashSet, fmt};

use crate::post::{Post, PostId};

/// Default cap on the number of posts taken from one chain.
pub const DEFAULT_MAX_CHAIN_LEN: usize = 64;

/// Why a chain was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationReason {
  /// The chain revisited an identifier already yielded.
  Cycle { repeated: PostId },
  /// The chain had more posts than the configured maximum.
  MaxLength { limit: usize },
}

/// A chain that was not followed to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
  pub root:   PostId,
  /// Number of posts yielded before stopping.
  pub posts:  usize,
  pub reason: TruncationReason,
}

impl fmt::Display for Truncation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "repost chain from post {} truncated after {} posts: ", self.root, self.posts)?;
    match self.reason {
      TruncationReason::Cycle { repeated } => write!(f, "post {repeated} repeats"),
      TruncationReason::MaxLength { limit } => write!(f, "longer than {limit} posts"),
    }
  }
}

/// The posts of one chain in visiting order.
#[derive(Debug)]
pub struct Chain<'a> {
  posts:      Vec<&'a Post>,
  truncation: Option<Truncation>,
}

impl<'a> Chain<'a> {
  pub fn posts(&self) -> &[&'a Post] { &self.posts }

  pub fn len(&self) -> usize { self.posts.len() }

  pub fn is_empty(&self) -> bool { self.posts.is_empty() }

  pub fn truncation(&self) -> Option<Truncation> { self.truncation }

  pub fn iter(&self) -> impl Iterator<Item = &'a Post> + '_ {
    self.posts.iter().copied()
  }
}

/// Walk the repost references of `root`, yielding at most `max_len` posts.
///
/// Never recurses. Stops at the first post without a repost reference, the
/// first repeated identifier, or the length cap, whichever comes first.
pub fn resolve(root: &Post, max_len: usize) -> Chain<'_> {
  let max_len = max_len.max(1);
  let mut posts = Vec::new();
  let mut seen = HashSet::new();
  let mut truncation = None;
  let mut cursor = Some(root);

  while let Some(post) = cursor {
    if !seen.insert(post.id) {
      truncation = Some(TruncationReason::Cycle { repeated: post.id });
      break;
    }
    if posts.len() == max_len {
      truncation = Some(TruncationReason::MaxLength { limit: max_len });
      break;
    }
    posts.push(post);
    cursor = post.reposted.as_deref();
  }

  Chain {
    truncation: truncation.map(|reason| Truncation {
      root: root.id,
      posts: posts.len(),
      reason,
    }),
    posts,
  }
}
