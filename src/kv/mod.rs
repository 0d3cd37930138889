//! Hash-per-key storage.
//!
//! Every entity is a single key holding a field -> string map, the way a
//! Redis hash would. Keys are enumerated with `*` globs.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

pub type Fields = HashMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub trait KvStore: Send + Sync {
    /// Upsert every field of `fields` under `key`, leaving other fields alone.
    fn hset_all(&self, key: &str, fields: &Fields) -> Result<(), KvError>;

    /// All fields of `key`, or `None` when the key holds nothing.
    fn hget_all(&self, key: &str) -> Result<Option<Fields>, KvError>;

    fn hdel(&self, key: &str, field: &str) -> Result<bool, KvError>;

    /// Remove the whole key. Returns whether anything was removed.
    fn del(&self, key: &str) -> Result<bool, KvError>;

    /// Keys matching a glob where `*` matches any run of characters.
    fn keys(&self, pattern: &str) -> Result<Vec<String>, KvError>;
}

/// `*`-only glob matching, the subset of Redis `KEYS` syntax the crate uses.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for mid in &parts[1..parts.len() - 1] {
        match rest.find(mid) {
            Some(pos) => rest = &rest[pos + mid.len()..],
            None => return false,
        }
    }
    true
}
