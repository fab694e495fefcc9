//! The persistence gate: check-then-insert for every post of a chain.
//!
//! For each post the author step runs before the post step, and posts are
//! visited in chain order, so a repost row is always written before the row
//! of the post it reshares. A failed step abandons the rest of the chain.

use std::sync::Arc;

use serde::Deserialize;
use skein_core::{
  chain::Chain,
  post::{Author, AuthorKey, Post, PostId, PostRecord},
  store::{DedupStore, StoreOp},
};
use strum::Display;
use tracing::{debug, warn};

use crate::policy::RetryPolicy;

/// How the gate talks to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WriteMode {
  /// Existence check, then a plain insert. Correct with a single writer.
  #[default]
  CheckThenInsert,
  /// One atomic insert-unless-present call per entity.
  InsertIfAbsent,
}

/// Counters accumulated while persisting chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateOutcome {
  pub posts_checked:    u64,
  pub authors_inserted: u64,
  pub posts_inserted:   u64,
}

/// One store call, borrowed from the post being persisted.
#[derive(Debug, Clone, Copy)]
enum Call<'a> {
  AuthorExists(&'a AuthorKey),
  PostExists(PostId),
  InsertAuthor(&'a Author),
  InsertPost(&'a PostRecord),
  InsertAuthorIfAbsent(&'a Author),
  InsertPostIfAbsent(&'a PostRecord),
}

impl Call<'_> {
  fn op(&self) -> StoreOp {
    match self {
      Self::AuthorExists(_) => StoreOp::AuthorExists,
      Self::PostExists(_) => StoreOp::PostExists,
      Self::InsertAuthor(_) => StoreOp::InsertAuthor,
      Self::InsertPost(_) => StoreOp::InsertPost,
      Self::InsertAuthorIfAbsent(_) => StoreOp::InsertAuthorIfAbsent,
      Self::InsertPostIfAbsent(_) => StoreOp::InsertPostIfAbsent,
    }
  }

  fn key(&self) -> String {
    match self {
      Self::AuthorExists(key) => format!("author {key}"),
      Self::InsertAuthor(a) | Self::InsertAuthorIfAbsent(a) => format!("author {}", a.key()),
      Self::PostExists(id) => format!("post {id}"),
      Self::InsertPost(p) | Self::InsertPostIfAbsent(p) => format!("post {}", p.id),
    }
  }
}

pub struct PersistenceGate<S> {
  store: Arc<S>,
  mode:  WriteMode,
  retry: RetryPolicy,
}

impl<S: DedupStore> PersistenceGate<S> {
  pub fn new(store: Arc<S>, mode: WriteMode, retry: RetryPolicy) -> Self {
    Self { store, mode, retry }
  }

  pub fn mode(&self) -> WriteMode { self.mode }

  /// Persist every post of `chain` in order, adding to `outcome` as steps
  /// succeed. Stops at the first store failure that outlives its retries.
  pub async fn persist_chain(
    &self,
    chain: &Chain<'_>,
    outcome: &mut GateOutcome,
  ) -> skein_core::Result<()> {
    for post in chain.iter() {
      self.persist_post(post, outcome).await?;
    }
    Ok(())
  }

  async fn persist_post(
    &self,
    post: &Post,
    outcome: &mut GateOutcome,
  ) -> skein_core::Result<()> {
    let record = post.record();

    match self.mode {
      WriteMode::CheckThenInsert => {
        let key = post.author.key();
        if !self.run(Call::AuthorExists(&key)).await? {
          self.run(Call::InsertAuthor(&post.author)).await?;
          outcome.authors_inserted += 1;
          debug!(author = %key, "inserted author");
        }
        if !self.run(Call::PostExists(post.id)).await? {
          self.run(Call::InsertPost(&record)).await?;
          outcome.posts_inserted += 1;
          debug!(post = %post.id, "inserted post");
        }
      }
      WriteMode::InsertIfAbsent => {
        if self.run(Call::InsertAuthorIfAbsent(&post.author)).await? {
          outcome.authors_inserted += 1;
          debug!(author = %post.author.key(), "inserted author");
        }
        if self.run(Call::InsertPostIfAbsent(&record)).await? {
          outcome.posts_inserted += 1;
          debug!(post = %post.id, "inserted post");
        }
      }
    }

    outcome.posts_checked += 1;
    Ok(())
  }

  /// Issue `call`, retrying with backoff. Inserts report `true` on success.
  async fn run(&self, call: Call<'_>) -> skein_core::Result<bool> {
    let mut failed = 0;
    loop {
      let result = match call {
        Call::AuthorExists(key) => self.store.author_exists(key).await,
        Call::PostExists(id) => self.store.post_exists(id).await,
        Call::InsertAuthor(a) => self.store.insert_author(a).await.map(|()| true),
        Call::InsertPost(p) => self.store.insert_post(p).await.map(|()| true),
        Call::InsertAuthorIfAbsent(a) => self.store.insert_author_if_absent(a).await,
        Call::InsertPostIfAbsent(p) => self.store.insert_post_if_absent(p).await,
      };

      match result {
        Ok(v) => return Ok(v),
        Err(e) => {
          failed += 1;
          if failed >= self.retry.max_attempts.max(1) {
            return Err(skein_core::Error::Store {
              op:     call.op(),
              key:    call.key(),
              source: Box::new(e),
            });
          }
          let delay = self.retry.delay_after(failed);
          warn!(
            op = %call.op(),
            key = %call.key(),
            attempt = failed,
            error = %e,
            "store call failed, retrying in {delay:?}"
          );
          tokio::time::sleep(delay).await;
        }
      }
    }
  }
}
