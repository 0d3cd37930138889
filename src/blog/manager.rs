use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::book::BlogBook;
use super::engine::BlogEngine;
use crate::persistence::Persistence;
use crate::sysconf::SysConfStore;

/// Lazily spawns one [`BlogEngine`] per account.
///
/// The lock only guards the lookup-or-create step; it is never held while
/// talking to an actor.
pub struct BlogManager {
    engines: Mutex<HashMap<String, BlogEngine>>,
    persistence: Persistence,
    sysconf: Arc<SysConfStore>,
}

impl BlogManager {
    pub fn new(persistence: Persistence, sysconf: Arc<SysConfStore>) -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            persistence,
            sysconf,
        }
    }

    /// The engine for `account`, loading its blogs on first use.
    pub fn engine(&self, account: &str) -> BlogEngine {
        let mut engines = self.engines.lock();
        if let Some(engine) = engines.get(account) {
            return engine.clone();
        }
        let book = BlogBook::load(account, self.persistence.clone(), self.sysconf.clone());
        let engine = BlogEngine::spawn(book);
        engines.insert(account.to_string(), engine.clone());
        engine
    }

    pub fn loaded_accounts(&self) -> Vec<String> {
        let mut accounts: Vec<String> = self.engines.lock().keys().cloned().collect();
        accounts.sort();
        accounts
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn sysconf(&self) -> &Arc<SysConfStore> {
        &self.sysconf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::model::UploadedBlog;
    use crate::kv::memory::MemoryKv;
    use crate::persistence::FileMirror;

    #[tokio::test]
    async fn accounts_are_isolated_and_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = FileMirror::new(tmp.path().join("blogs"), tmp.path().join("recycle"));
        let persistence = Persistence::new(Arc::new(MemoryKv::new()), mirror, "admin");
        let manager = BlogManager::new(persistence, Arc::new(SysConfStore::new("admin")));

        manager.engine("alice").add(UploadedBlog::new("x", "a")).await;
        assert!(manager.engine("bob").get("x").await.is_none());
        assert_eq!(manager.engine("alice").get("x").await.unwrap().content, "a");
        assert_eq!(manager.loaded_accounts(), ["alice", "bob"]);
    }
}
