//! Reading tracker. Each book lives in one composite document together with
//! its reading record, notes and insights.

use serde::{Deserialize, Serialize};

use super::store::FeatureStore;
use super::titles::{self, READING_BOOK_PREFIX};
use super::{new_id, FeatureError, FeatureResult};
use crate::blog::model::is_valid_title;
use crate::blog::BlogEngine;
use crate::clock;

pub const TAGS: &str = "reading_book";

pub const STATUS_UNSTART: &str = "unstart";
pub const STATUS_READING: &str = "reading";
pub const STATUS_FINISHED: &str = "finished";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: String,
    pub publish_date: String,
    pub cover_url: String,
    pub description: String,
    pub total_pages: u32,
    pub current_page: u32,
    pub category: Vec<String>,
    pub tags: Vec<String>,
    pub source_url: String,
    pub add_time: String,
    pub rating: f64,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingSession {
    pub date: String,
    pub start_page: u32,
    pub end_page: u32,
    pub duration: u32,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingRecord {
    pub book_id: String,
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub current_page: u32,
    pub total_reading_time: u32,
    pub reading_sessions: Vec<ReadingSession>,
    pub last_update_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookNote {
    pub id: String,
    pub book_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub chapter: String,
    pub page: u32,
    pub content: String,
    pub tags: Vec<String>,
    pub create_time: String,
    pub update_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookInsight {
    pub id: String,
    pub book_id: String,
    pub title: String,
    pub content: String,
    pub key_takeaways: Vec<String>,
    pub applications: Vec<String>,
    pub rating: u8,
    pub tags: Vec<String>,
    pub create_time: String,
    pub update_time: String,
}

/// Everything stored under one `reading_book_` title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookComposite {
    pub book: Book,
    pub reading_record: ReadingRecord,
    pub book_notes: Vec<BookNote>,
    pub book_insights: Vec<BookInsight>,
}

impl BookComposite {
    fn start_reading(&mut self) {
        self.reading_record.status = STATUS_READING.to_string();
        if self.reading_record.start_date.is_empty() {
            self.reading_record.start_date = clock::today_string();
        }
        self.book.status = STATUS_READING.to_string();
    }

    fn finish(&mut self) {
        self.reading_record.status = STATUS_FINISHED.to_string();
        self.reading_record.end_date = clock::today_string();
        self.book.status = STATUS_FINISHED.to_string();
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: String,
    pub publish_date: String,
    pub cover_url: String,
    pub description: String,
    pub source_url: String,
    pub total_pages: u32,
    pub category: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewNote {
    #[serde(rename = "type")]
    pub kind: String,
    pub chapter: String,
    pub page: u32,
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewInsight {
    pub title: String,
    pub content: String,
    pub key_takeaways: Vec<String>,
    pub applications: Vec<String>,
    pub rating: u8,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingStatistics {
    pub total_books: usize,
    pub reading_books: usize,
    pub finished_books: usize,
    pub unstart_books: usize,
    pub total_pages: u32,
    pub total_reading_time: u32,
    pub total_notes: usize,
    pub total_insights: usize,
}

#[derive(Clone)]
pub struct ReadingService {
    store: FeatureStore<BookComposite>,
}

impl ReadingService {
    pub fn new(engine: BlogEngine) -> Self {
        Self {
            store: FeatureStore::new(engine, TAGS),
        }
    }

    pub async fn add_book(&self, new: NewBook) -> FeatureResult<Book> {
        if new.title.trim().is_empty() || new.author.trim().is_empty() {
            return Err(FeatureError::Invalid("title and author are required".into()));
        }
        let title = titles::reading_book_title(&new.title);
        if !is_valid_title(&title) {
            return Err(FeatureError::Invalid(format!("unusable book title {}", new.title)));
        }
        if self
            .list_books()
            .await
            .iter()
            .any(|b| b.title == new.title && b.author == new.author)
        {
            return Err(FeatureError::Invalid("book already exists".into()));
        }

        let now = clock::now_string();
        let id = new_id();
        let book = Book {
            id: id.clone(),
            title: new.title,
            author: new.author,
            isbn: new.isbn,
            publisher: new.publisher,
            publish_date: new.publish_date,
            cover_url: new.cover_url,
            description: new.description,
            total_pages: new.total_pages,
            current_page: 0,
            category: new.category,
            tags: new.tags,
            source_url: new.source_url,
            add_time: now.clone(),
            rating: 0.0,
            status: STATUS_UNSTART.to_string(),
        };
        let record = ReadingRecord {
            book_id: id,
            status: STATUS_UNSTART.to_string(),
            last_update_time: now,
            ..Default::default()
        };
        self.store
            .update(&title, BookComposite::default, move |doc| {
                if !doc.book.id.is_empty() {
                    return Err(FeatureError::Invalid(format!("title {} is taken", book.title)));
                }
                doc.book = book.clone();
                doc.reading_record = record;
                Ok(book)
            })
            .await
    }

    pub async fn list_books(&self) -> Vec<Book> {
        self.store
            .list(READING_BOOK_PREFIX)
            .await
            .into_iter()
            .map(|(_, doc)| doc.book)
            .filter(|b| !b.id.is_empty())
            .collect()
    }

    pub async fn get_book(&self, id: &str) -> FeatureResult<BookComposite> {
        self.find(id).await.map(|(_, doc)| doc)
    }

    /// Move to `page`. Advancing pages logs a session, the first update
    /// starts reading and reaching the last page finishes the book.
    pub async fn update_progress(&self, id: &str, page: u32, notes: &str) -> FeatureResult<ReadingRecord> {
        let notes = notes.to_string();
        self.update_book(id, move |doc| {
            let old = doc.reading_record.current_page;
            doc.reading_record.current_page = page;
            doc.reading_record.last_update_time = clock::now_string();
            doc.book.current_page = page;
            if doc.reading_record.status == STATUS_UNSTART {
                doc.start_reading();
            }
            if page > old {
                doc.reading_record.reading_sessions.push(ReadingSession {
                    date: clock::today_string(),
                    start_page: old,
                    end_page: page,
                    duration: 0,
                    notes,
                });
            }
            if doc.book.total_pages > 0 && page >= doc.book.total_pages {
                doc.finish();
            }
            Ok(doc.reading_record.clone())
        })
        .await
    }

    pub async fn finish(&self, id: &str) -> FeatureResult<ReadingRecord> {
        self.update_book(id, |doc| {
            if doc.reading_record.start_date.is_empty() {
                doc.reading_record.start_date = clock::today_string();
            }
            if doc.book.total_pages > 0 {
                doc.book.current_page = doc.book.total_pages;
                doc.reading_record.current_page = doc.book.total_pages;
            }
            doc.reading_record.last_update_time = clock::now_string();
            doc.finish();
            Ok(doc.reading_record.clone())
        })
        .await
    }

    pub async fn delete_book(&self, id: &str) -> FeatureResult<()> {
        let (title, _) = self.find(id).await?;
        self.store.delete(&title).await
    }

    pub async fn add_note(&self, id: &str, new: NewNote) -> FeatureResult<BookNote> {
        if new.content.trim().is_empty() {
            return Err(FeatureError::Invalid("note content is empty".into()));
        }
        let book_id = id.to_string();
        self.update_book(id, move |doc| {
            let now = clock::now_string();
            let note = BookNote {
                id: new_id(),
                book_id,
                kind: new.kind,
                chapter: new.chapter,
                page: new.page,
                content: new.content,
                tags: new.tags,
                create_time: now.clone(),
                update_time: now,
            };
            doc.book_notes.push(note.clone());
            Ok(note)
        })
        .await
    }

    pub async fn delete_note(&self, id: &str, note_id: &str) -> FeatureResult<()> {
        let note_id = note_id.to_string();
        self.update_book(id, move |doc| {
            let before = doc.book_notes.len();
            doc.book_notes.retain(|n| n.id != note_id);
            if doc.book_notes.len() == before {
                return Err(FeatureError::NotFound(format!("note {}", note_id)));
            }
            Ok(())
        })
        .await
    }

    /// A positive rating also becomes the book's rating.
    pub async fn add_insight(&self, id: &str, new: NewInsight) -> FeatureResult<BookInsight> {
        if new.title.trim().is_empty() || new.content.trim().is_empty() {
            return Err(FeatureError::Invalid("insight title and content are required".into()));
        }
        let book_id = id.to_string();
        self.update_book(id, move |doc| {
            let now = clock::now_string();
            let insight = BookInsight {
                id: new_id(),
                book_id,
                title: new.title,
                content: new.content,
                key_takeaways: new.key_takeaways,
                applications: new.applications,
                rating: new.rating,
                tags: new.tags,
                create_time: now.clone(),
                update_time: now,
            };
            if insight.rating > 0 {
                doc.book.rating = f64::from(insight.rating);
            }
            doc.book_insights.push(insight.clone());
            Ok(insight)
        })
        .await
    }

    pub async fn statistics(&self) -> ReadingStatistics {
        let docs = self.store.list(READING_BOOK_PREFIX).await;
        let mut stats = ReadingStatistics::default();
        for (_, doc) in docs.iter().filter(|(_, d)| !d.book.id.is_empty()) {
            stats.total_books += 1;
            match doc.book.status.as_str() {
                STATUS_READING => stats.reading_books += 1,
                STATUS_FINISHED => stats.finished_books += 1,
                STATUS_UNSTART => stats.unstart_books += 1,
                _ => {}
            }
            stats.total_pages += if doc.reading_record.status == STATUS_FINISHED {
                doc.book.total_pages
            } else {
                doc.reading_record.current_page
            };
            stats.total_reading_time += doc.reading_record.total_reading_time;
            stats.total_notes += doc.book_notes.len();
            stats.total_insights += doc.book_insights.len();
        }
        stats
    }

    async fn find(&self, id: &str) -> FeatureResult<(String, BookComposite)> {
        self.store
            .list(READING_BOOK_PREFIX)
            .await
            .into_iter()
            .find(|(_, doc)| doc.book.id == id)
            .ok_or_else(|| FeatureError::NotFound(format!("book {}", id)))
    }

    async fn update_book<R, F>(&self, id: &str, f: F) -> FeatureResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut BookComposite) -> FeatureResult<R> + Send + 'static,
    {
        let (title, _) = self.find(id).await?;
        let id = id.to_string();
        self.store
            .update(&title, BookComposite::default, move |doc| {
                // deleted or replaced since the lookup
                if doc.book.id != id {
                    return Err(FeatureError::NotFound(format!("book {}", id)));
                }
                f(doc)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing;

    fn book(title: &str, pages: u32) -> NewBook {
        NewBook {
            title: title.into(),
            author: "刘慈欣".into(),
            total_pages: pages,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn add_book_validates_and_rejects_duplicates() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = testing::engine(&tmp);
        let svc = ReadingService::new(engine.clone());

        let b = svc.add_book(book("三体", 300)).await.unwrap();
        assert_eq!(b.status, STATUS_UNSTART);
        let blog = engine.get("reading_book_三体.md").await.unwrap();
        assert_eq!(blog.tags, "reading_book");
        assert!(blog.content.contains("\"reading_record\""));

        assert!(matches!(
            svc.add_book(book("三体", 300)).await,
            Err(FeatureError::Invalid(_))
        ));
        assert!(svc
            .add_book(NewBook {
                author: String::new(),
                ..book("球状闪电", 1)
            })
            .await
            .is_err());
        assert!(svc.add_book(book("bad title", 1)).await.is_err());
        assert_eq!(svc.list_books().await.len(), 1);
    }

    #[tokio::test]
    async fn progress_starts_logs_and_finishes() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = ReadingService::new(testing::engine(&tmp));
        let b = svc.add_book(book("三体", 300)).await.unwrap();

        let rec = svc.update_progress(&b.id, 50, "ch1").await.unwrap();
        assert_eq!(rec.status, STATUS_READING);
        assert!(!rec.start_date.is_empty());
        assert_eq!(rec.reading_sessions.len(), 1);
        assert_eq!(rec.reading_sessions[0].start_page, 0);
        assert_eq!(rec.reading_sessions[0].end_page, 50);

        // going back does not log a session
        let rec = svc.update_progress(&b.id, 40, "").await.unwrap();
        assert_eq!(rec.reading_sessions.len(), 1);

        let rec = svc.update_progress(&b.id, 300, "").await.unwrap();
        assert_eq!(rec.status, STATUS_FINISHED);
        let doc = svc.get_book(&b.id).await.unwrap();
        assert_eq!(doc.book.status, STATUS_FINISHED);
        assert_eq!(doc.book.current_page, 300);
    }

    #[tokio::test]
    async fn notes_insights_and_statistics() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = ReadingService::new(testing::engine(&tmp));
        let a = svc.add_book(book("三体", 300)).await.unwrap();
        let b = svc.add_book(book("球状闪电", 200)).await.unwrap();
        svc.add_book(book("超新星纪元", 100)).await.unwrap();

        let note = svc
            .add_note(
                &a.id,
                NewNote {
                    content: "黑暗森林".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        svc.add_insight(
            &a.id,
            NewInsight {
                title: "t".into(),
                content: "c".into(),
                rating: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(svc.get_book(&a.id).await.unwrap().book.rating, 5.0);

        svc.update_progress(&a.id, 30, "").await.unwrap();
        svc.finish(&b.id).await.unwrap();

        let stats = svc.statistics().await;
        assert_eq!(stats.total_books, 3);
        assert_eq!(stats.reading_books, 1);
        assert_eq!(stats.finished_books, 1);
        assert_eq!(stats.unstart_books, 1);
        assert_eq!(stats.total_pages, 230);
        assert_eq!(stats.total_notes, 1);
        assert_eq!(stats.total_insights, 1);

        svc.delete_note(&a.id, &note.id).await.unwrap();
        assert!(svc.delete_note(&a.id, &note.id).await.is_err());
    }

    #[tokio::test]
    async fn delete_book_removes_blog() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = testing::engine(&tmp);
        let svc = ReadingService::new(engine.clone());
        let b = svc.add_book(book("三体", 300)).await.unwrap();
        svc.delete_book(&b.id).await.unwrap();
        assert!(engine.get("reading_book_三体.md").await.is_none());
        assert!(matches!(
            svc.get_book(&b.id).await,
            Err(FeatureError::NotFound(_))
        ));
        assert!(svc.update_progress(&b.id, 1, "").await.is_err());
    }
}
