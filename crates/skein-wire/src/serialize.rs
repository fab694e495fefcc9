//! Status JSON encoder.
//!
//! Produces the same shape the decoder accepts, for fixtures and replay
//! files. Ids are written in both numeric and `_str` form.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use skein_core::post::{Author, Post};

use crate::TIMESTAMP_FORMAT;

fn format_timestamp(dt: DateTime<Utc>) -> String {
  dt.format(TIMESTAMP_FORMAT).to_string()
}

fn encode_user(author: &Author) -> Value {
  json!({
    "id":                    author.id.0,
    "id_str":                author.id.to_string(),
    "name":                  author.name,
    "screen_name":           author.handle,
    "followers_count":       author.followers_count,
    "friends_count":         author.following_count,
    "listed_count":          author.listed_count,
    "created_at":            format_timestamp(author.created_at),
    "favourites_count":      author.favourites_count,
    "verified":              author.verified,
    "statuses_count":        author.statuses_count,
    "default_profile_image": author.default_profile_image,
  })
}

fn encode_flat(post: &Post) -> Value {
  json!({
    "id":                        post.id.0,
    "id_str":                    post.id.to_string(),
    "text":                      post.text,
    "created_at":                format_timestamp(post.created_at),
    "in_reply_to_status_id":     post.in_reply_to_post.map(|id| id.0),
    "in_reply_to_status_id_str": post.in_reply_to_post.map(|id| id.to_string()),
    "in_reply_to_user_id":       post.in_reply_to_author.map(|id| id.0),
    "in_reply_to_user_id_str":   post.in_reply_to_author.map(|id| id.to_string()),
    "source":                    post.source,
    "user":                      encode_user(&post.author),
  })
}

/// Encode `post` and its repost chain as one nested status object.
///
/// Built from the deepest ancestor outwards, without recursion.
pub fn encode(post: &Post) -> Value {
  let mut chain = vec![post];
  while let Some(next) = chain.last().copied().and_then(|p| p.reposted.as_deref()) {
    chain.push(next);
  }

  let mut inner: Option<Value> = None;
  for p in chain.into_iter().rev() {
    let mut value = encode_flat(p);
    if let Some(reposted) = inner.take() {
      value["retweeted_status"] = reposted;
    }
    inner = Some(value);
  }
  inner.unwrap_or(Value::Null)
}

/// Encode `post` as a single stream line (no trailing newline).
pub fn encode_line(post: &Post) -> String { encode(post).to_string() }
