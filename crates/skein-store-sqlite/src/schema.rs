//! SQL schema for the Skein SQLite store.
//!
//! Executed once at connection startup. Both tables are append-only; the
//! ingester never issues UPDATE or DELETE against them.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per observed (user_id, screen_name) pair, so handle changes
-- accumulate as separate rows.
CREATE TABLE IF NOT EXISTS users (
    user_id               INTEGER NOT NULL,
    name                  TEXT,
    screen_name           TEXT    NOT NULL DEFAULT '',
    followers_count       INTEGER NOT NULL,
    friends_count         INTEGER NOT NULL,
    listed_count          INTEGER NOT NULL,
    created_at            TEXT    NOT NULL,   -- RFC 3339 UTC
    favourites_count      INTEGER NOT NULL,
    verified              INTEGER NOT NULL,   -- 0 | 1
    statuses_count        INTEGER NOT NULL,
    default_profile_image INTEGER NOT NULL,   -- 0 | 1
    PRIMARY KEY (user_id, screen_name)
);

-- user_id and retweeted_status_id are logical references only; rows may
-- arrive before the rows they point at.
CREATE TABLE IF NOT EXISTS tweets (
    tweet_id              INTEGER PRIMARY KEY,
    text                  TEXT    NOT NULL DEFAULT '',
    created_at            TEXT    NOT NULL,   -- RFC 3339 UTC
    in_reply_to_status_id INTEGER,
    in_reply_to_user_id   INTEGER,
    retweeted_status_id   INTEGER,
    source                TEXT    DEFAULT '',
    user_id               INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS tweets_user_idx      ON tweets(user_id);
CREATE INDEX IF NOT EXISTS tweets_retweeted_idx ON tweets(retweeted_status_id);

PRAGMA user_version = 1;
";
