use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{glob_match, Fields, KvError, KvStore};

/// In-process [`KvStore`]; contents vanish with the process.
#[derive(Default)]
pub struct MemoryKv {
    data: Mutex<BTreeMap<String, Fields>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn hset_all(&self, key: &str, fields: &Fields) -> Result<(), KvError> {
        let mut data = self.data.lock();
        let entry = data.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    fn hget_all(&self, key: &str) -> Result<Option<Fields>, KvError> {
        Ok(self.data.lock().get(key).filter(|f| !f.is_empty()).cloned())
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool, KvError> {
        let mut data = self.data.lock();
        let removed = data
            .get_mut(key)
            .map(|f| f.remove(field).is_some())
            .unwrap_or(false);
        if data.get(key).is_some_and(|f| f.is_empty()) {
            data.remove(key);
        }
        Ok(removed)
    }

    fn del(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        Ok(self
            .data
            .lock()
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behaves_like_a_hash_store() {
        let kv = MemoryKv::new();
        let mut f = Fields::new();
        f.insert("title".into(), "x".into());
        kv.hset_all("a:blog@x", &f).unwrap();
        kv.hset_all("b:blog@x", &f).unwrap();

        assert_eq!(kv.keys("a:blog@*").unwrap(), vec!["a:blog@x"]);
        assert_eq!(kv.hget_all("a:blog@x").unwrap().unwrap()["title"], "x");

        assert!(kv.hdel("a:blog@x", "title").unwrap());
        assert!(kv.hget_all("a:blog@x").unwrap().is_none());
        assert!(kv.keys("a:blog@*").unwrap().is_empty());
        assert!(kv.del("b:blog@x").unwrap());
    }
}
