use rusqlite::{params, OptionalExtension};

use super::{Fields, KvError, KvStore};
use crate::db::DbPool;

/// [`KvStore`] over the `kv_hash` table.
#[derive(Clone)]
pub struct SqliteKv {
    pool: DbPool,
}

impl SqliteKv {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl KvStore for SqliteKv {
    fn hset_all(&self, key: &str, fields: &Fields) -> Result<(), KvError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO kv_hash (key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            )?;
            for (field, value) in fields {
                stmt.execute(params![key, field, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn hget_all(&self, key: &str) -> Result<Option<Fields>, KvError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached("SELECT field, value FROM kv_hash WHERE key = ?1")?;
        let fields: Fields = stmt
            .query_map(params![key], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool, KvError> {
        let conn = self.pool.get()?;
        let n = conn.execute(
            "DELETE FROM kv_hash WHERE key = ?1 AND field = ?2",
            params![key, field],
        )?;
        Ok(n > 0)
    }

    fn del(&self, key: &str) -> Result<bool, KvError> {
        let conn = self.pool.get()?;
        let n = conn.execute("DELETE FROM kv_hash WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare_cached("SELECT DISTINCT key FROM kv_hash WHERE key GLOB ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl SqliteKv {
    /// Number of distinct keys, used by startup logging.
    pub fn key_count(&self) -> Result<i64, KvError> {
        let conn = self.pool.get()?;
        let n = conn
            .query_row("SELECT COUNT(DISTINCT key) FROM kv_hash", [], |row| row.get(0))
            .optional()?
            .unwrap_or(0);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn kv() -> SqliteKv {
        let pool = db::create_memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        SqliteKv::new(pool)
    }

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn hset_then_hget_returns_fields() {
        let kv = kv();
        kv.hset_all("admin:blog@a", &fields(&[("title", "a"), ("content", "x")]))
            .unwrap();
        let got = kv.hget_all("admin:blog@a").unwrap().unwrap();
        assert_eq!(got.get("content").map(String::as_str), Some("x"));
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn hset_merges_instead_of_replacing() {
        let kv = kv();
        kv.hset_all("k", &fields(&[("a", "1"), ("b", "2")])).unwrap();
        kv.hset_all("k", &fields(&[("b", "3")])).unwrap();
        let got = kv.hget_all("k").unwrap().unwrap();
        assert_eq!(got["a"], "1");
        assert_eq!(got["b"], "3");
    }

    #[test]
    fn missing_key_is_none() {
        assert!(kv().hget_all("nope").unwrap().is_none());
    }

    #[test]
    fn del_and_hdel() {
        let kv = kv();
        kv.hset_all("k", &fields(&[("a", "1"), ("b", "2")])).unwrap();
        assert!(kv.hdel("k", "a").unwrap());
        assert!(!kv.hdel("k", "a").unwrap());
        assert!(kv.del("k").unwrap());
        assert!(!kv.del("k").unwrap());
        assert!(kv.hget_all("k").unwrap().is_none());
    }

    #[test]
    fn keys_by_glob() {
        let kv = kv();
        for key in ["a:blog@x", "a:blog@y", "b:blog@x", "blog@x"] {
            kv.hset_all(key, &fields(&[("title", "t")])).unwrap();
        }
        assert_eq!(kv.keys("a:blog@*").unwrap(), vec!["a:blog@x", "a:blog@y"]);
        assert_eq!(kv.keys("*:blog@x").unwrap(), vec!["a:blog@x", "b:blog@x"]);
        assert_eq!(kv.keys("blog@*").unwrap(), vec!["blog@x"]);
        assert_eq!(kv.key_count().unwrap(), 4);
    }
}
