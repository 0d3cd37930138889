use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{FeatureError, FeatureResult};
use crate::blog::{AuthFlags, BlogBook, BlogEngine, UploadedBlog};

fn decode<T: DeserializeOwned>(content: &str) -> FeatureResult<T> {
    Ok(serde_json::from_str(content)?)
}

/// Write `doc` as pretty JSON under `title`, private and unencrypted.
fn write_doc<T: Serialize>(book: &mut BlogBook, title: &str, tags: &str, doc: &T) -> FeatureResult<()> {
    let content = serde_json::to_string_pretty(doc)?;
    let udb = UploadedBlog::new(title, content)
        .with_auth(AuthFlags::PRIVATE)
        .with_tags(tags);
    match book.save(udb) {
        0 => Ok(()),
        code => Err(FeatureError::Save(code)),
    }
}

/// Typed JSON documents stored as blogs of one account.
pub struct FeatureStore<T> {
    engine: BlogEngine,
    tags: &'static str,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for FeatureStore<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            tags: self.tags,
            _doc: PhantomData,
        }
    }
}

impl<T> FeatureStore<T>
where
    T: Serialize + DeserializeOwned + Default + Send + 'static,
{
    pub fn new(engine: BlogEngine, tags: &'static str) -> Self {
        Self {
            engine,
            tags,
            _doc: PhantomData,
        }
    }

    pub fn engine(&self) -> &BlogEngine {
        &self.engine
    }

    pub async fn load(&self, title: &str) -> FeatureResult<Option<T>> {
        match self.engine.get(title).await {
            Some(blog) => decode(&blog.content).map(Some),
            None => Ok(None),
        }
    }

    pub async fn load_or_default(&self, title: &str) -> FeatureResult<T> {
        Ok(self.load(title).await?.unwrap_or_default())
    }

    pub async fn save(&self, title: &str, doc: T) -> FeatureResult<()> {
        let (title, tags) = (title.to_string(), self.tags);
        self.engine
            .with_book(move |book| write_doc(book, &title, tags, &doc))
            .await?
    }

    /// Read-modify-write on the actor thread. An absent document starts
    /// from `init()`. Nothing is written when `f` fails.
    pub async fn update<R, I, F>(&self, title: &str, init: I, f: F) -> FeatureResult<R>
    where
        R: Send + 'static,
        I: FnOnce() -> T + Send + 'static,
        F: FnOnce(&mut T) -> FeatureResult<R> + Send + 'static,
    {
        let (title, tags) = (title.to_string(), self.tags);
        self.engine
            .with_book(move |book| {
                let mut doc = match book.get(&title) {
                    Some(blog) => decode(&blog.content)?,
                    None => init(),
                };
                let out = f(&mut doc)?;
                write_doc(book, &title, tags, &doc)?;
                Ok(out)
            })
            .await?
    }

    /// Every decodable document whose title starts with `prefix`.
    pub async fn list(&self, prefix: &str) -> Vec<(String, T)> {
        let snapshot = self.engine.snapshot().await;
        let mut out: Vec<(String, T)> = snapshot
            .values()
            .filter(|b| b.title.starts_with(prefix))
            .filter_map(|b| match decode::<T>(&b.content) {
                Ok(doc) => Some((b.title.clone(), doc)),
                Err(e) => {
                    tracing::warn!("skipping malformed {}: {}", b.title, e);
                    None
                }
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub async fn delete(&self, title: &str) -> FeatureResult<()> {
        match self.engine.delete(title).await {
            0 => Ok(()),
            1 => Err(FeatureError::NotFound(title.to_string())),
            code => Err(FeatureError::Save(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        n: u32,
    }

    #[tokio::test]
    async fn save_then_load_uses_fixed_tags() {
        let tmp = tempfile::tempdir().unwrap();
        let store: FeatureStore<Doc> = FeatureStore::new(testing::engine(&tmp), "docs");
        assert_eq!(store.load("doc-1").await.unwrap(), None);
        store.save("doc-1", Doc { n: 3 }).await.unwrap();
        assert_eq!(store.load_or_default("doc-1").await.unwrap(), Doc { n: 3 });

        let blog = store.engine().get("doc-1").await.unwrap();
        assert_eq!(blog.tags, "docs");
        assert_eq!(blog.auth, AuthFlags::PRIVATE);
        assert!(blog.content.contains("\n  \"n\": 3"));
    }

    #[tokio::test]
    async fn update_is_atomic_per_call() {
        let tmp = tempfile::tempdir().unwrap();
        let store: FeatureStore<Doc> = FeatureStore::new(testing::engine(&tmp), "docs");
        let mut handles = Vec::new();
        for _ in 0..25 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                s.update("counter", Doc::default, |d| {
                    d.n += 1;
                    Ok(())
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.load_or_default("counter").await.unwrap().n, 25);
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store: FeatureStore<Doc> = FeatureStore::new(testing::engine(&tmp), "docs");
        let res: FeatureResult<()> = store
            .update("x", Doc::default, |_| Err(FeatureError::Invalid("no".into())))
            .await;
        assert!(matches!(res, Err(FeatureError::Invalid(_))));
        assert!(store.engine().get("x").await.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_prefix_and_skips_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let store: FeatureStore<Doc> = FeatureStore::new(testing::engine(&tmp), "docs");
        store.save("doc-b", Doc { n: 2 }).await.unwrap();
        store.save("doc-a", Doc { n: 1 }).await.unwrap();
        store.save("other", Doc { n: 9 }).await.unwrap();
        store
            .engine()
            .add(UploadedBlog::new("doc-broken", "not json"))
            .await;

        let titles: Vec<String> = store.list("doc-").await.into_iter().map(|(t, _)| t).collect();
        assert_eq!(titles, ["doc-a", "doc-b"]);
    }
}
