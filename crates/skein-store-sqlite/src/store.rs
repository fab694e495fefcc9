//! [`SqliteStore`]: the SQLite implementation of [`DedupStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use skein_core::{
  post::{Author, AuthorId, AuthorKey, PostId, PostRecord},
  store::DedupStore,
};

use crate::{
  Result,
  encode::{RawAuthor, RawPost, encode_id},
  schema::SCHEMA,
};

const INSERT_AUTHOR: &str = "
  INSERT INTO users (
    user_id, name, screen_name, followers_count, friends_count, listed_count,
    created_at, favourites_count, verified, statuses_count, default_profile_image
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const INSERT_AUTHOR_IF_ABSENT: &str = "
  INSERT OR IGNORE INTO users (
    user_id, name, screen_name, followers_count, friends_count, listed_count,
    created_at, favourites_count, verified, statuses_count, default_profile_image
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const INSERT_POST: &str = "
  INSERT INTO tweets (
    tweet_id, text, created_at, in_reply_to_status_id, in_reply_to_user_id,
    retweeted_status_id, source, user_id
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const INSERT_POST_IF_ABSENT: &str = "
  INSERT OR IGNORE INTO tweets (
    tweet_id, text, created_at, in_reply_to_status_id, in_reply_to_user_id,
    retweeted_status_id, source, user_id
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A deduplication store backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run one of the author insert statements; returns rows changed.
  async fn write_author(&self, sql: &'static str, author: &Author) -> Result<usize> {
    let raw = RawAuthor::from_author(author)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          sql,
          rusqlite::params![
            raw.user_id,
            raw.name,
            raw.screen_name,
            raw.followers_count,
            raw.friends_count,
            raw.listed_count,
            raw.created_at,
            raw.favourites_count,
            raw.verified,
            raw.statuses_count,
            raw.default_profile_image,
          ],
        )?)
      })
      .await?;
    Ok(changed)
  }

  /// Run one of the post insert statements; returns rows changed.
  async fn write_post(&self, sql: &'static str, post: &PostRecord) -> Result<usize> {
    let raw = RawPost::from_record(post)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          sql,
          rusqlite::params![
            raw.tweet_id,
            raw.text,
            raw.created_at,
            raw.in_reply_to_status_id,
            raw.in_reply_to_user_id,
            raw.retweeted_status_id,
            raw.source,
            raw.user_id,
          ],
        )?)
      })
      .await?;
    Ok(changed)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Fetch the stored row for `id`, if any.
  pub async fn get_post(&self, id: PostId) -> Result<Option<PostRecord>> {
    let id = encode_id(id.0)?;

    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT tweet_id, text, created_at, in_reply_to_status_id,
                    in_reply_to_user_id, retweeted_status_id, source, user_id
             FROM tweets WHERE tweet_id = ?1",
            rusqlite::params![id],
            |row| {
              Ok(RawPost {
                tweet_id:              row.get(0)?,
                text:                  row.get(1)?,
                created_at:            row.get(2)?,
                in_reply_to_status_id: row.get(3)?,
                in_reply_to_user_id:   row.get(4)?,
                retweeted_status_id:   row.get(5)?,
                source:                row.get(6)?,
                user_id:               row.get(7)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPost::into_record).transpose()
  }

  /// Fetch the stored row for exactly this `(id, handle)` pair, if any.
  pub async fn get_author(&self, key: &AuthorKey) -> Result<Option<Author>> {
    let id = encode_id(key.id.0)?;
    let handle = key.handle.clone();

    let raw: Option<RawAuthor> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, name, screen_name, followers_count, friends_count,
                    listed_count, created_at, favourites_count, verified,
                    statuses_count, default_profile_image
             FROM users WHERE user_id = ?1 AND screen_name = ?2",
            rusqlite::params![id, handle],
            |row| {
              Ok(RawAuthor {
                user_id:               row.get(0)?,
                name:                  row.get(1)?,
                screen_name:           row.get(2)?,
                followers_count:       row.get(3)?,
                friends_count:         row.get(4)?,
                listed_count:          row.get(5)?,
                created_at:            row.get(6)?,
                favourites_count:      row.get(7)?,
                verified:              row.get(8)?,
                statuses_count:        row.get(9)?,
                default_profile_image: row.get(10)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAuthor::into_author).transpose()
  }

  /// Every handle recorded for an account, oldest row first.
  pub async fn author_handles(&self, id: AuthorId) -> Result<Vec<String>> {
    let id = encode_id(id.0)?;

    let handles = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT screen_name FROM users WHERE user_id = ?1 ORDER BY rowid")?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(handles)
  }

  pub async fn count_posts(&self) -> Result<u64> { self.count("tweets").await }

  pub async fn count_authors(&self) -> Result<u64> { self.count("users").await }

  async fn count(&self, table: &'static str) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
      })
      .await?;
    Ok(crate::encode::decode_count(n))
  }
}

// ─── DedupStore impl ─────────────────────────────────────────────────────────

impl DedupStore for SqliteStore {
  type Error = crate::Error;

  async fn author_exists(&self, key: &AuthorKey) -> Result<bool> {
    let id = encode_id(key.id.0)?;
    let handle = key.handle.clone();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1 AND screen_name = ?2",
            rusqlite::params![id, handle],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;
    Ok(exists)
  }

  async fn post_exists(&self, id: PostId) -> Result<bool> {
    let id = encode_id(id.0)?;

    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM tweets WHERE tweet_id = ?1",
            rusqlite::params![id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;
    Ok(exists)
  }

  async fn insert_author(&self, author: &Author) -> Result<()> {
    self.write_author(INSERT_AUTHOR, author).await?;
    Ok(())
  }

  async fn insert_post(&self, post: &PostRecord) -> Result<()> {
    self.write_post(INSERT_POST, post).await?;
    Ok(())
  }

  async fn insert_author_if_absent(&self, author: &Author) -> Result<bool> {
    Ok(self.write_author(INSERT_AUTHOR_IF_ABSENT, author).await? > 0)
  }

  async fn insert_post_if_absent(&self, post: &PostRecord) -> Result<bool> {
    Ok(self.write_post(INSERT_POST_IF_ABSENT, post).await? > 0)
  }
}
