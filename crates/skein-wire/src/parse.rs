//! Stream message decoder.
//!
//! Pipeline:
//!   serde_json::Value
//!     └─ classify by top-level key   → delete | limit | status | other
//!          └─ RawStatus (serde)      → nested raw tree
//!               └─ into_post()       → skein_core::post::Post

use chrono::{DateTime, Utc};
use serde::Deserialize;
use skein_core::post::{Author, AuthorId, Post, PostId, bounded_text};

use crate::{
  StreamMessage, TIMESTAMP_FORMAT,
  error::{Error, Result},
};

// ─── Raw serde shapes ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawStatus {
  id:                        Option<u64>,
  id_str:                    Option<String>,
  text:                      Option<String>,
  full_text:                 Option<String>,
  extended_tweet:            Option<RawExtended>,
  created_at:                Option<String>,
  in_reply_to_status_id:     Option<u64>,
  in_reply_to_status_id_str: Option<String>,
  in_reply_to_user_id:       Option<u64>,
  in_reply_to_user_id_str:   Option<String>,
  source:                    Option<String>,
  user:                      Option<RawUser>,
  retweeted_status:          Option<Box<RawStatus>>,
}

#[derive(Deserialize)]
struct RawExtended {
  full_text: Option<String>,
}

#[derive(Deserialize)]
struct RawUser {
  id:                    Option<u64>,
  id_str:                Option<String>,
  name:                  Option<String>,
  screen_name:           Option<String>,
  #[serde(default)]
  followers_count:       u64,
  #[serde(default)]
  friends_count:         u64,
  #[serde(default)]
  listed_count:          u64,
  created_at:            Option<String>,
  #[serde(default)]
  favourites_count:      u64,
  #[serde(default)]
  verified:              bool,
  #[serde(default)]
  statuses_count:        u64,
  #[serde(default)]
  default_profile_image: bool,
}

#[derive(Deserialize)]
struct RawDelete {
  status: RawDeletedStatus,
}

#[derive(Deserialize)]
struct RawDeletedStatus {
  id:          Option<u64>,
  id_str:      Option<String>,
  user_id:     Option<u64>,
  user_id_str: Option<String>,
}

#[derive(Deserialize)]
struct RawLimit {
  #[serde(default)]
  track: u64,
}

// ─── Field helpers ───────────────────────────────────────────────────────────

/// Prefer the string form of an id; the numeric form loses precision in
/// some JSON producers.
fn read_id(
  as_str: Option<String>,
  as_num: Option<u64>,
  field: &'static str,
) -> Result<Option<u64>> {
  match as_str {
    Some(s) => s
      .parse()
      .map(Some)
      .map_err(|_| Error::InvalidId { field, value: s }),
    None => Ok(as_num),
  }
}

fn require_id(
  as_str: Option<String>,
  as_num: Option<u64>,
  field: &'static str,
) -> Result<u64> {
  read_id(as_str, as_num, field)?.ok_or(Error::MissingField(field))
}

pub(crate) fn parse_timestamp(s: &str, field: &'static str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_str(s, TIMESTAMP_FORMAT)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| Error::InvalidTimestamp { field, value: s.to_owned() })
}

// ─── Conversion ──────────────────────────────────────────────────────────────

impl RawUser {
  fn into_author(self) -> Result<Author> {
    let id = require_id(self.id_str, self.id, "user.id")?;
    let created_at = self
      .created_at
      .as_deref()
      .ok_or(Error::MissingField("user.created_at"))
      .and_then(|s| parse_timestamp(s, "user.created_at"))?;

    Ok(Author {
      id: AuthorId(id),
      name: self.name,
      handle: self.screen_name.ok_or(Error::MissingField("user.screen_name"))?,
      followers_count: self.followers_count,
      following_count: self.friends_count,
      listed_count: self.listed_count,
      created_at,
      favourites_count: self.favourites_count,
      verified: self.verified,
      statuses_count: self.statuses_count,
      default_profile_image: self.default_profile_image,
    })
  }
}

impl RawStatus {
  /// Nesting depth is bounded by serde_json's recursion limit, so the
  /// recursive conversion of `retweeted_status` cannot run away.
  fn into_post(self) -> Result<Post> {
    let id = require_id(self.id_str, self.id, "id")?;
    let created_at = self
      .created_at
      .as_deref()
      .ok_or(Error::MissingField("created_at"))
      .and_then(|s| parse_timestamp(s, "created_at"))?;

    let text = self
      .extended_tweet
      .and_then(|e| e.full_text)
      .or(self.full_text)
      .or(self.text)
      .unwrap_or_default();

    let in_reply_to_post = read_id(
      self.in_reply_to_status_id_str,
      self.in_reply_to_status_id,
      "in_reply_to_status_id",
    )?;
    let in_reply_to_author = read_id(
      self.in_reply_to_user_id_str,
      self.in_reply_to_user_id,
      "in_reply_to_user_id",
    )?;

    let author = self.user.ok_or(Error::MissingField("user"))?.into_author()?;
    let reposted = self
      .retweeted_status
      .map(|raw| (*raw).into_post().map(Box::new))
      .transpose()?;

    Ok(Post {
      id: PostId(id),
      text: bounded_text(&text),
      created_at,
      in_reply_to_post: in_reply_to_post.map(PostId),
      in_reply_to_author: in_reply_to_author.map(AuthorId),
      source: self.source.unwrap_or_default(),
      author,
      reposted,
    })
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

pub(crate) fn decode_value(mut value: serde_json::Value) -> Result<StreamMessage> {
  let Some(object) = value.as_object_mut() else {
    return Ok(StreamMessage::Other { kind: "non_object".to_owned() });
  };

  if let Some(delete) = object.remove("delete") {
    let raw: RawDelete = serde_json::from_value(delete)?;
    let post = require_id(raw.status.id_str, raw.status.id, "delete.status.id")?;
    let author = read_id(
      raw.status.user_id_str,
      raw.status.user_id,
      "delete.status.user_id",
    )?;
    return Ok(StreamMessage::Delete {
      post:   PostId(post),
      author: author.map(AuthorId),
    });
  }

  if let Some(limit) = object.remove("limit") {
    let raw: RawLimit = serde_json::from_value(limit)?;
    return Ok(StreamMessage::Limit { undelivered: raw.track });
  }

  if !object.contains_key("id") && !object.contains_key("id_str") {
    let kind = object
      .keys()
      .next()
      .cloned()
      .unwrap_or_else(|| "empty".to_owned());
    return Ok(StreamMessage::Other { kind });
  }

  let raw: RawStatus = serde_json::from_value(value)?;
  raw.into_post().map(StreamMessage::Post)
}
