//! Daily todo lists, one JSON document per day.

use serde::{Deserialize, Serialize};

use super::store::FeatureStore;
use super::titles::{self, TODO_PREFIX};
use super::{new_id, FeatureError, FeatureResult};
use crate::blog::BlogEngine;
use crate::clock;

pub const TAGS: &str = "todolist";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub completed: bool,
    pub created_at: String,
    pub hours: u32,
    pub minutes: u32,
    pub urgency: u8,
    pub importance: u8,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoList {
    pub date: String,
    pub items: Vec<TodoItem>,
    pub order: Vec<String>,
}

impl TodoList {
    fn for_date(date: &str) -> Self {
        Self {
            date: date.to_string(),
            ..Default::default()
        }
    }

    fn item_mut(&mut self, id: &str) -> FeatureResult<&mut TodoItem> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| FeatureError::NotFound(format!("todo {}", id)))
    }
}

fn level_score(level: u8) -> u32 {
    match level {
        1 => 5,
        2 => 3,
        3 => 1,
        _ => 1,
    }
}

fn time_score(hours: u32, minutes: u32) -> u32 {
    match hours * 60 + minutes {
        0..=30 => 5,
        31..=120 => 3,
        _ => 1,
    }
}

/// Priority: higher is more pressing.
pub fn score(urgency: u8, importance: u8, hours: u32, minutes: u32) -> u32 {
    level_score(urgency) + level_score(importance) + time_score(hours, minutes)
}

/// Input for a new todo item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTodo {
    pub content: String,
    pub hours: u32,
    pub minutes: u32,
    pub urgency: u8,
    pub importance: u8,
}

#[derive(Clone)]
pub struct TodoService {
    store: FeatureStore<TodoList>,
}

impl TodoService {
    pub fn new(engine: BlogEngine) -> Self {
        Self {
            store: FeatureStore::new(engine, TAGS),
        }
    }

    pub async fn list(&self, date: &str) -> FeatureResult<TodoList> {
        Ok(self
            .store
            .load(&titles::todo_title(date))
            .await?
            .unwrap_or_else(|| TodoList::for_date(date)))
    }

    pub async fn add(&self, date: &str, new: NewTodo) -> FeatureResult<TodoItem> {
        if new.content.trim().is_empty() {
            return Err(FeatureError::Invalid("todo content is empty".into()));
        }
        let item = TodoItem {
            id: new_id(),
            score: score(new.urgency, new.importance, new.hours, new.minutes),
            content: new.content,
            completed: false,
            created_at: clock::now_string(),
            hours: new.hours,
            minutes: new.minutes,
            urgency: new.urgency,
            importance: new.importance,
        };
        let owned = date.to_string();
        self.store
            .update(&titles::todo_title(date), move || TodoList::for_date(&owned), move |list| {
                list.order.push(item.id.clone());
                list.items.push(item.clone());
                Ok(item)
            })
            .await
    }

    pub async fn delete(&self, date: &str, id: &str) -> FeatureResult<()> {
        let id = id.to_string();
        self.update(date, move |list| {
            let before = list.items.len();
            list.items.retain(|i| i.id != id);
            if list.items.len() == before {
                return Err(FeatureError::NotFound(format!("todo {}", id)));
            }
            list.order.retain(|o| *o != id);
            Ok(())
        })
        .await
    }

    /// Flip completion; returns the new state.
    pub async fn toggle(&self, date: &str, id: &str) -> FeatureResult<bool> {
        let id = id.to_string();
        self.update(date, move |list| {
            let item = list.item_mut(&id)?;
            item.completed = !item.completed;
            Ok(item.completed)
        })
        .await
    }

    pub async fn update_time(&self, date: &str, id: &str, hours: u32, minutes: u32) -> FeatureResult<TodoItem> {
        let id = id.to_string();
        self.update(date, move |list| {
            let item = list.item_mut(&id)?;
            item.hours = hours;
            item.minutes = minutes;
            item.score = score(item.urgency, item.importance, hours, minutes);
            Ok(item.clone())
        })
        .await
    }

    pub async fn update_order(&self, date: &str, order: Vec<String>) -> FeatureResult<()> {
        self.update(date, move |list| {
            if let Some(unknown) = order.iter().find(|id| !list.items.iter().any(|i| &i.id == *id)) {
                return Err(FeatureError::Invalid(format!("unknown todo id {}", unknown)));
            }
            list.order = order;
            Ok(())
        })
        .await
    }

    /// Lists dated `start..=end`, by date.
    pub async fn range(&self, start: &str, end: &str) -> FeatureResult<Vec<TodoList>> {
        if clock::parse_date(start).is_none() || clock::parse_date(end).is_none() {
            return Err(FeatureError::Invalid("dates must be YYYY-MM-DD".into()));
        }
        Ok(self
            .store
            .list(TODO_PREFIX)
            .await
            .into_iter()
            .filter(|(title, _)| {
                titles::date_suffix(title, TODO_PREFIX).is_some_and(|d| d >= start && d <= end)
            })
            .map(|(_, list)| list)
            .collect())
    }

    /// Mutate an existing day. Absent days are not found.
    async fn update<R, F>(&self, date: &str, f: F) -> FeatureResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut TodoList) -> FeatureResult<R> + Send + 'static,
    {
        let title = titles::todo_title(date);
        let missing = title.clone();
        self.store
            .update(&title, TodoList::default, move |list| {
                if list.date.is_empty() && list.items.is_empty() {
                    return Err(FeatureError::NotFound(missing));
                }
                f(list)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing;

    fn todo(content: &str, minutes: u32) -> NewTodo {
        NewTodo {
            content: content.into(),
            minutes,
            urgency: 1,
            importance: 2,
            ..Default::default()
        }
    }

    #[test]
    fn score_table() {
        assert_eq!(score(1, 1, 0, 30), 15);
        assert_eq!(score(2, 3, 1, 0), 7);
        assert_eq!(score(3, 3, 2, 1), 3);
        // unknown levels count as the lowest
        assert_eq!(score(0, 9, 0, 10), 7);
    }

    #[tokio::test]
    async fn add_toggle_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = TodoService::new(testing::engine(&tmp));
        let item = svc.add("2024-05-01", todo("write report", 20)).await.unwrap();
        assert_eq!(item.score, 5 + 3 + 5);

        let list = svc.list("2024-05-01").await.unwrap();
        assert_eq!(list.date, "2024-05-01");
        assert_eq!(list.order, vec![item.id.clone()]);

        assert!(svc.toggle("2024-05-01", &item.id).await.unwrap());
        assert!(!svc.toggle("2024-05-01", &item.id).await.unwrap());

        svc.delete("2024-05-01", &item.id).await.unwrap();
        assert!(svc.list("2024-05-01").await.unwrap().items.is_empty());
        assert!(matches!(
            svc.delete("2024-05-01", &item.id).await,
            Err(FeatureError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn blog_is_private_with_fixed_tag() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = testing::engine(&tmp);
        let svc = TodoService::new(engine.clone());
        svc.add("2024-05-02", todo("a", 0)).await.unwrap();
        let blog = engine.get("todolist-2024-05-02").await.unwrap();
        assert_eq!(blog.tags, "todolist");
        assert!(!blog.is_public());
        assert_eq!(blog.encrypt, 0);
    }

    #[tokio::test]
    async fn update_time_rescores() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = TodoService::new(testing::engine(&tmp));
        let item = svc.add("2024-05-01", todo("a", 10)).await.unwrap();
        let updated = svc.update_time("2024-05-01", &item.id, 3, 0).await.unwrap();
        assert_eq!(updated.score, 5 + 3 + 1);
    }

    #[tokio::test]
    async fn update_order_rejects_unknown_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = TodoService::new(testing::engine(&tmp));
        let a = svc.add("2024-05-01", todo("a", 0)).await.unwrap();
        let b = svc.add("2024-05-01", todo("b", 0)).await.unwrap();

        let bad = svc
            .update_order("2024-05-01", vec![b.id.clone(), "nope".into()])
            .await;
        assert!(matches!(bad, Err(FeatureError::Invalid(_))));

        svc.update_order("2024-05-01", vec![b.id.clone(), a.id.clone()])
            .await
            .unwrap();
        assert_eq!(svc.list("2024-05-01").await.unwrap().order, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn range_is_inclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = TodoService::new(testing::engine(&tmp));
        for d in ["2024-04-30", "2024-05-01", "2024-05-02", "2024-05-03"] {
            svc.add(d, todo(d, 0)).await.unwrap();
        }
        let dates: Vec<String> = svc
            .range("2024-05-01", "2024-05-02")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.date)
            .collect();
        assert_eq!(dates, ["2024-05-01", "2024-05-02"]);
        assert!(svc.range("bad", "2024-05-02").await.is_err());
    }

    #[tokio::test]
    async fn missing_day_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = TodoService::new(testing::engine(&tmp));
        assert!(matches!(
            svc.toggle("2024-01-01", "x").await,
            Err(FeatureError::NotFound(_))
        ));
    }
}
