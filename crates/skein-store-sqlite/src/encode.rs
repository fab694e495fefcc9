//! Encoding and decoding helpers between Rust domain types and the plain
//! column representations stored in SQLite.
//!
//! Timestamps are stored as RFC 3339 strings, flags as 0/1 integers, and
//! identifiers as signed 64-bit integers.

use chrono::{DateTime, Utc};
use skein_core::post::{Author, AuthorId, PostId, PostRecord};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

pub fn encode_id(id: u64) -> Result<i64> {
  i64::try_from(id).map_err(|_| Error::IdOutOfRange(id))
}

pub fn decode_id(v: i64, column: &'static str) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::NegativeId(v, column))
}

/// Counters are unsigned in the domain; saturate rather than fail, they are
/// informational.
pub fn encode_count(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

pub fn decode_count(v: i64) -> u64 { u64::try_from(v).unwrap_or(0) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of a `users` row, in table order.
pub struct RawAuthor {
  pub user_id:               i64,
  pub name:                  Option<String>,
  pub screen_name:           String,
  pub followers_count:       i64,
  pub friends_count:         i64,
  pub listed_count:          i64,
  pub created_at:            String,
  pub favourites_count:      i64,
  pub verified:              bool,
  pub statuses_count:        i64,
  pub default_profile_image: bool,
}

impl RawAuthor {
  pub fn from_author(a: &Author) -> Result<Self> {
    Ok(Self {
      user_id:               encode_id(a.id.0)?,
      name:                  a.name.clone(),
      screen_name:           a.handle.clone(),
      followers_count:       encode_count(a.followers_count),
      friends_count:         encode_count(a.following_count),
      listed_count:          encode_count(a.listed_count),
      created_at:            encode_dt(a.created_at),
      favourites_count:      encode_count(a.favourites_count),
      verified:              a.verified,
      statuses_count:        encode_count(a.statuses_count),
      default_profile_image: a.default_profile_image,
    })
  }

  pub fn into_author(self) -> Result<Author> {
    Ok(Author {
      id:                    AuthorId(decode_id(self.user_id, "users.user_id")?),
      name:                  self.name,
      handle:                self.screen_name,
      followers_count:       decode_count(self.followers_count),
      following_count:       decode_count(self.friends_count),
      listed_count:          decode_count(self.listed_count),
      created_at:            decode_dt(&self.created_at)?,
      favourites_count:      decode_count(self.favourites_count),
      verified:              self.verified,
      statuses_count:        decode_count(self.statuses_count),
      default_profile_image: self.default_profile_image,
    })
  }
}

/// Column values of a `tweets` row, in table order.
pub struct RawPost {
  pub tweet_id:              i64,
  pub text:                  String,
  pub created_at:            String,
  pub in_reply_to_status_id: Option<i64>,
  pub in_reply_to_user_id:   Option<i64>,
  pub retweeted_status_id:   Option<i64>,
  pub source:                Option<String>,
  pub user_id:               i64,
}

impl RawPost {
  pub fn from_record(p: &PostRecord) -> Result<Self> {
    Ok(Self {
      tweet_id:              encode_id(p.id.0)?,
      text:                  p.text.clone(),
      created_at:            encode_dt(p.created_at),
      in_reply_to_status_id: p.in_reply_to_post.map(|id| encode_id(id.0)).transpose()?,
      in_reply_to_user_id:   p.in_reply_to_author.map(|id| encode_id(id.0)).transpose()?,
      retweeted_status_id:   p.reposted_from.map(|id| encode_id(id.0)).transpose()?,
      source:                Some(p.source.clone()),
      user_id:               encode_id(p.author_id.0)?,
    })
  }

  pub fn into_record(self) -> Result<PostRecord> {
    let opt_id = |v: Option<i64>, column: &'static str| v.map(|v| decode_id(v, column)).transpose();

    Ok(PostRecord {
      id:                 PostId(decode_id(self.tweet_id, "tweets.tweet_id")?),
      text:               self.text,
      created_at:         decode_dt(&self.created_at)?,
      in_reply_to_post:   opt_id(self.in_reply_to_status_id, "tweets.in_reply_to_status_id")?
        .map(PostId),
      in_reply_to_author: opt_id(self.in_reply_to_user_id, "tweets.in_reply_to_user_id")?
        .map(AuthorId),
      reposted_from:      opt_id(self.retweeted_status_id, "tweets.retweeted_status_id")?
        .map(PostId),
      source:             self.source.unwrap_or_default(),
      author_id:          AuthorId(decode_id(self.user_id, "tweets.user_id")?),
    })
  }
}
