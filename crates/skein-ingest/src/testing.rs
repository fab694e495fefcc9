//! In-memory doubles for exercising the gate and the loop.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{TimeZone, Utc};
use skein_core::{
  post::{Author, AuthorId, AuthorKey, Post, PostId, PostRecord},
  source::EventSource,
  store::{DedupStore, StoreOp},
};
use thiserror::Error;

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub fn author(id: u64, handle: &str) -> Author {
  Author {
    id:                    AuthorId(id),
    name:                  None,
    handle:                handle.into(),
    followers_count:       0,
    following_count:       0,
    listed_count:          0,
    created_at:            Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(),
    favourites_count:      0,
    verified:              false,
    statuses_count:        0,
    default_profile_image: true,
  }
}

pub fn post(id: u64, author: Author, reposted: Option<Post>) -> Post {
  Post {
    id: PostId(id),
    text: format!("post {id}"),
    created_at: Utc.with_ymd_and_hms(2014, 6, 1, 12, 0, 0).unwrap(),
    in_reply_to_post: None,
    in_reply_to_author: None,
    source: "web".into(),
    author,
    reposted: reposted.map(Box::new),
  }
}

// ─── RecordingStore ──────────────────────────────────────────────────────────

/// A store call as observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  AuthorExists(AuthorKey),
  PostExists(PostId),
  InsertAuthor(AuthorKey),
  InsertPost(PostId),
  InsertAuthorIfAbsent(AuthorKey),
  InsertPostIfAbsent(PostId),
}

#[derive(Debug, Error)]
pub enum FakeStoreError {
  #[error("injected {0} failure")]
  Injected(StoreOp),
  #[error("duplicate key {0}")]
  Duplicate(String),
}

#[derive(Default)]
struct Inner {
  authors:  HashSet<AuthorKey>,
  posts:    HashSet<PostId>,
  calls:    Vec<Call>,
  failures: HashMap<StoreOp, usize>,
}

/// A [`DedupStore`] over two hash sets that logs every call and can be told
/// to fail a given operation.
#[derive(Default)]
pub struct RecordingStore {
  inner: Mutex<Inner>,
}

impl RecordingStore {
  /// Fail the next `times` calls of `op`.
  pub fn fail(&self, op: StoreOp, times: usize) {
    self.inner.lock().unwrap().failures.insert(op, times);
  }

  pub fn seed_author(&self, author: &Author) {
    self.inner.lock().unwrap().authors.insert(author.key());
  }

  pub fn seed_post(&self, id: PostId) { self.inner.lock().unwrap().posts.insert(id); }

  pub fn take_calls(&self) -> Vec<Call> { std::mem::take(&mut self.inner.lock().unwrap().calls) }

  pub fn author_rows(&self) -> usize { self.inner.lock().unwrap().authors.len() }

  pub fn post_rows(&self) -> usize { self.inner.lock().unwrap().posts.len() }

  pub fn has_post(&self, id: PostId) -> bool { self.inner.lock().unwrap().posts.contains(&id) }

  fn enter(&self, op: StoreOp, call: Call) -> Result<std::sync::MutexGuard<'_, Inner>, FakeStoreError> {
    let mut inner = self.inner.lock().unwrap();
    inner.calls.push(call);
    if let Some(left) = inner.failures.get_mut(&op)
      && *left > 0
    {
      *left -= 1;
      return Err(FakeStoreError::Injected(op));
    }
    Ok(inner)
  }
}

impl DedupStore for RecordingStore {
  type Error = FakeStoreError;

  async fn author_exists(&self, key: &AuthorKey) -> Result<bool, FakeStoreError> {
    let inner = self.enter(StoreOp::AuthorExists, Call::AuthorExists(key.clone()))?;
    Ok(inner.authors.contains(key))
  }

  async fn post_exists(&self, id: PostId) -> Result<bool, FakeStoreError> {
    let inner = self.enter(StoreOp::PostExists, Call::PostExists(id))?;
    Ok(inner.posts.contains(&id))
  }

  async fn insert_author(&self, author: &Author) -> Result<(), FakeStoreError> {
    let mut inner = self.enter(StoreOp::InsertAuthor, Call::InsertAuthor(author.key()))?;
    if !inner.authors.insert(author.key()) {
      return Err(FakeStoreError::Duplicate(author.key().to_string()));
    }
    Ok(())
  }

  async fn insert_post(&self, post: &PostRecord) -> Result<(), FakeStoreError> {
    let mut inner = self.enter(StoreOp::InsertPost, Call::InsertPost(post.id))?;
    if !inner.posts.insert(post.id) {
      return Err(FakeStoreError::Duplicate(post.id.to_string()));
    }
    Ok(())
  }

  async fn insert_author_if_absent(&self, author: &Author) -> Result<bool, FakeStoreError> {
    let mut inner =
      self.enter(StoreOp::InsertAuthorIfAbsent, Call::InsertAuthorIfAbsent(author.key()))?;
    Ok(inner.authors.insert(author.key()))
  }

  async fn insert_post_if_absent(&self, post: &PostRecord) -> Result<bool, FakeStoreError> {
    let mut inner =
      self.enter(StoreOp::InsertPostIfAbsent, Call::InsertPostIfAbsent(post.id))?;
    Ok(inner.posts.insert(post.id))
  }
}

// ─── ScriptedSource ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("connection reset by peer")]
pub struct ConnectionReset;

/// One scripted answer of [`ScriptedSource::next`].
pub enum Step {
  Post(Post),
  Fail,
}

/// An [`EventSource`] that replays a fixed script, then either ends or
/// blocks forever.
pub struct ScriptedSource {
  steps:         VecDeque<Step>,
  hang_when_dry: bool,
  pulls:         Arc<AtomicUsize>,
}

impl ScriptedSource {
  pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
    Self {
      steps:         steps.into_iter().collect(),
      hang_when_dry: false,
      pulls:         Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn posts(posts: impl IntoIterator<Item = Post>) -> Self {
    Self::new(posts.into_iter().map(Step::Post))
  }

  /// Never end the stream once the script runs out.
  pub fn hang_when_dry(mut self) -> Self {
    self.hang_when_dry = true;
    self
  }

  /// Handle to the number of `next` calls made so far.
  pub fn pulls(&self) -> Arc<AtomicUsize> { self.pulls.clone() }
}

impl EventSource for ScriptedSource {
  type Error = ConnectionReset;

  fn name(&self) -> &str { "scripted" }

  async fn next(&mut self) -> Result<Option<Post>, ConnectionReset> {
    self.pulls.fetch_add(1, Ordering::SeqCst);
    match self.steps.pop_front() {
      Some(Step::Post(post)) => Ok(Some(post)),
      Some(Step::Fail) => Err(ConnectionReset),
      None if self.hang_when_dry => std::future::pending().await,
      None => Ok(None),
    }
  }
}
