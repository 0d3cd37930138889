use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use super::book::{BlogBook, NOT_FOUND};
use super::model::{AuthFlags, Blog, BlogUpdate, UploadedBlog};
use crate::actor::{Actor, ActorError};

/// Reads that must not stall a page render wait at most this long.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Async handle to one account's [`BlogBook`] actor.
#[derive(Clone)]
pub struct BlogEngine {
    account: Arc<str>,
    actor: Actor<BlogBook>,
}

fn closed_code(e: ActorError) -> i32 {
    tracing::error!("{}", e);
    NOT_FOUND
}

impl BlogEngine {
    pub fn spawn(book: BlogBook) -> Self {
        let account: Arc<str> = Arc::from(book.account());
        let actor = Actor::spawn(format!("blog:{}", account), book);
        Self { account, actor }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub async fn add(&self, udb: UploadedBlog) -> i32 {
        self.actor
            .execute(move |b| b.add(udb))
            .await
            .unwrap_or_else(closed_code)
    }

    pub async fn modify(&self, udb: UploadedBlog) -> i32 {
        self.actor
            .execute(move |b| b.modify(udb))
            .await
            .unwrap_or_else(closed_code)
    }

    pub async fn update(&self, title: &str, update: BlogUpdate) -> i32 {
        let title = title.to_string();
        self.actor
            .execute(move |b| b.update(&title, update))
            .await
            .unwrap_or_else(closed_code)
    }

    pub async fn delete(&self, title: &str) -> i32 {
        let title = title.to_string();
        self.actor
            .execute(move |b| b.delete(&title))
            .await
            .unwrap_or_else(closed_code)
    }

    pub async fn get(&self, title: &str) -> Option<Blog> {
        let title = title.to_string();
        self.actor
            .execute_with_timeout(READ_TIMEOUT, move |b| b.get(&title))
            .await
            .flatten()
    }

    pub async fn get_all(&self, num: usize, mask: AuthFlags) -> Vec<Blog> {
        self.actor
            .execute_with_timeout(READ_TIMEOUT, move |b| b.get_all(num, mask))
            .await
            .unwrap_or_default()
    }

    /// Record a view. Does not wait for the write.
    pub async fn update_access(&self, title: &str) {
        let title = title.to_string();
        if let Err(e) = self.actor.fire(move |b| b.update_access(&title)).await {
            tracing::warn!("update_access dropped: {}", e);
        }
    }

    pub async fn auth_add(&self, title: &str, flag: AuthFlags) -> i32 {
        let title = title.to_string();
        self.actor
            .execute(move |b| b.auth_add(&title, flag))
            .await
            .unwrap_or_else(closed_code)
    }

    pub async fn auth_del(&self, title: &str, flag: AuthFlags) -> i32 {
        let title = title.to_string();
        self.actor
            .execute(move |b| b.auth_del(&title, flag))
            .await
            .unwrap_or_else(closed_code)
    }

    pub async fn recently_timed(&self, base: &str, today: NaiveDate) -> Option<Blog> {
        let base = base.to_string();
        self.actor
            .execute(move |b| b.recently_timed(&base, today))
            .await
            .ok()
            .flatten()
    }

    pub async fn linked_names(&self, title: &str) -> Vec<String> {
        let title = title.to_string();
        self.actor
            .execute(move |b| b.linked_names(&title))
            .await
            .unwrap_or_default()
    }

    pub async fn tag_replace(&self, from: &str, to: &str) -> Vec<String> {
        let (from, to) = (from.to_string(), to.to_string());
        self.actor
            .execute(move |b| b.tag_replace(&from, &to))
            .await
            .unwrap_or_default()
    }

    pub async fn tag_add(&self, substr: &str, tag: &str) -> Vec<String> {
        let (substr, tag) = (substr.to_string(), tag.to_string());
        self.actor
            .execute(move |b| b.tag_add(&substr, &tag))
            .await
            .unwrap_or_default()
    }

    pub async fn set_same_auth(&self, title: &str) -> Vec<String> {
        let title = title.to_string();
        self.actor
            .execute(move |b| b.set_same_auth(&title))
            .await
            .unwrap_or_default()
    }

    pub async fn import_from_path(&self, dir: impl Into<PathBuf>) -> usize {
        let dir = dir.into();
        self.actor
            .execute(move |b| b.import_from_path(&dir))
            .await
            .unwrap_or_default()
    }

    pub async fn export_mirror(&self) -> usize {
        self.actor
            .execute(|b| b.export_mirror())
            .await
            .unwrap_or_default()
    }

    pub async fn snapshot(&self) -> Arc<HashMap<String, Blog>> {
        self.actor
            .execute_with_timeout(READ_TIMEOUT, |b| b.snapshot())
            .await
            .unwrap_or_default()
    }

    /// Run `f` against the book on the actor thread.
    pub async fn with_book<T, F>(&self, f: F) -> Result<T, ActorError>
    where
        F: FnOnce(&mut BlogBook) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.actor.execute(f).await
    }

    /// Add when absent, modify otherwise. Returns the code of whichever ran.
    pub async fn save(&self, udb: UploadedBlog) -> i32 {
        self.actor
            .execute(move |b| b.save(udb))
            .await
            .unwrap_or_else(closed_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::book::{EXISTS, OK};
    use crate::kv::memory::MemoryKv;
    use crate::persistence::{FileMirror, Persistence};
    use crate::sysconf::SysConfStore;

    fn engine(tmp: &tempfile::TempDir) -> BlogEngine {
        let mirror = FileMirror::new(tmp.path().join("blogs"), tmp.path().join("recycle"));
        let persistence = Persistence::new(Arc::new(MemoryKv::new()), mirror, "admin");
        let book = BlogBook::load("alice", persistence, Arc::new(SysConfStore::new("admin")));
        BlogEngine::spawn(book)
    }

    #[tokio::test]
    async fn operations_round_trip_through_actor() {
        let tmp = tempfile::tempdir().unwrap();
        let e = engine(&tmp);
        assert_eq!(e.add(UploadedBlog::new("a", "1")).await, OK);
        assert_eq!(e.add(UploadedBlog::new("a", "2")).await, EXISTS);
        assert_eq!(e.get("a").await.unwrap().content, "1");
        assert_eq!(e.delete("a").await, OK);
        assert!(e.get("a").await.is_none());
    }

    #[tokio::test]
    async fn access_is_recorded_before_later_reads() {
        let tmp = tempfile::tempdir().unwrap();
        let e = engine(&tmp);
        e.add(UploadedBlog::new("a", "")).await;
        for _ in 0..3 {
            e.update_access("a").await;
        }
        assert_eq!(e.get("a").await.unwrap().access_count, 3);
    }

    #[tokio::test]
    async fn save_adds_then_modifies() {
        let tmp = tempfile::tempdir().unwrap();
        let e = engine(&tmp);
        assert_eq!(e.save(UploadedBlog::new("doc", "v1")).await, OK);
        assert_eq!(e.save(UploadedBlog::new("doc", "v2")).await, OK);
        let blog = e.get("doc").await.unwrap();
        assert_eq!(blog.content, "v2");
        assert_eq!(blog.modify_count, 1);
    }

    #[tokio::test]
    async fn concurrent_adds_of_same_title_yield_one_winner() {
        let tmp = tempfile::tempdir().unwrap();
        let e = engine(&tmp);
        let mut handles = Vec::new();
        for i in 0..10 {
            let e = e.clone();
            handles.push(tokio::spawn(async move {
                e.add(UploadedBlog::new("race", i.to_string())).await
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() == OK {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }
}
