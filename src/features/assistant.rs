//! Daily assistant conversation log kept as plain markdown.

use chrono::{Local, NaiveDate};

use super::titles;
use super::{FeatureError, FeatureResult};
use crate::blog::{AuthFlags, BlogEngine, BlogUpdate, UploadedBlog};
use crate::clock;

pub const TAGS: &str = "assistant";

fn entry(role: &str, text: &str) -> String {
    format!("### {} {}\n\n{}\n\n", clock::now_string(), role, text.trim_end())
}

#[derive(Clone)]
pub struct AssistantLog {
    engine: BlogEngine,
}

impl AssistantLog {
    pub fn new(engine: BlogEngine) -> Self {
        Self { engine }
    }

    /// Append to today's log, creating it on first use.
    pub async fn append(&self, role: &str, text: &str) -> FeatureResult<String> {
        self.append_on(Local::now().date_naive(), role, text).await
    }

    pub async fn append_on(&self, date: NaiveDate, role: &str, text: &str) -> FeatureResult<String> {
        if text.trim().is_empty() {
            return Err(FeatureError::Invalid("empty assistant message".into()));
        }
        let title = titles::assistant_title(date);
        let block = entry(role, text);
        let code = self
            .engine
            .with_book(move |book| match book.get(&title) {
                Some(blog) => book.update(
                    &title,
                    BlogUpdate {
                        content: Some(blog.content + &block),
                        ..Default::default()
                    },
                ),
                None => book.add(
                    UploadedBlog::new(title.clone(), format!("# {}\n\n{}", title, block))
                        .with_auth(AuthFlags::PRIVATE)
                        .with_tags(TAGS),
                ),
            })
            .await?;
        match code {
            0 => Ok(titles::assistant_title(date)),
            code => Err(FeatureError::Save(code)),
        }
    }

    pub async fn read(&self, date: NaiveDate) -> Option<String> {
        self.engine
            .get(&titles::assistant_title(date))
            .await
            .map(|b| b.content)
    }
}
