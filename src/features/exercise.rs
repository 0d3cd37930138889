//! Exercise log, templates and the body profile used for calorie estimates.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::store::FeatureStore;
use super::titles::{self, EXERCISE_PREFIX};
use super::{new_id, FeatureError, FeatureResult};
use crate::blog::BlogEngine;
use crate::clock;

pub const TAGS: &str = "exercise";
pub const TEMPLATE_TAGS: &str = "exercise-templates";
pub const COLLECTION_TAGS: &str = "exercise-collections";
pub const PROFILE_TAGS: &str = "exercise-profile";

/// Body weight assumed when no profile is saved.
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

const MET_TABLE: [(&str, [f64; 3]); 5] = [
    ("cardio", [3.5, 6.0, 10.0]),
    ("strength", [3.0, 5.0, 8.0]),
    ("flexibility", [2.5, 3.0, 4.0]),
    ("sports", [4.0, 7.0, 10.0]),
    ("other", [2.5, 4.0, 6.0]),
];

fn intensity_index(intensity: &str) -> Option<usize> {
    match intensity {
        "low" => Some(0),
        "medium" => Some(1),
        "high" => Some(2),
        _ => None,
    }
}

pub fn met_value(kind: &str, intensity: &str) -> f64 {
    let idx = intensity_index(intensity);
    if let (Some((_, row)), Some(i)) = (MET_TABLE.iter().find(|(k, _)| *k == kind), idx) {
        return row[i];
    }
    match idx {
        Some(0) => 3.0,
        Some(1) => 5.0,
        Some(2) => 8.0,
        _ => 4.0,
    }
}

pub fn calories(kind: &str, intensity: &str, minutes: u32, weight_kg: f64) -> u32 {
    (met_value(kind, intensity) * weight_kg * f64::from(minutes) / 60.0) as u32
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: u32,
    pub intensity: String,
    pub calories: u32,
    pub notes: String,
    pub completed: bool,
    pub weight: f64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub body_parts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseList {
    pub date: String,
    pub items: Vec<ExerciseItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseTemplate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: u32,
    pub intensity: String,
    pub calories: u32,
    pub notes: String,
    pub weight: f64,
    pub body_parts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateCollection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub template_ids: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub gender: String,
    pub weight: f64,
    pub height: f64,
    pub age: u32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExerciseStats {
    pub period: String,
    pub start_date: String,
    pub end_date: String,
    pub total_days: i64,
    pub exercise_days: usize,
    pub total_duration: u32,
    pub total_calories: u32,
    pub type_stats: BTreeMap<String, u32>,
    pub weekly_avg: f64,
    pub consistency: f64,
}

/// Fields a caller supplies for a new or edited exercise.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExerciseInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: u32,
    pub intensity: String,
    pub calories: u32,
    pub notes: String,
    pub weight: f64,
    pub body_parts: Vec<String>,
}

#[derive(Clone)]
pub struct ExerciseService {
    lists: FeatureStore<ExerciseList>,
    templates: FeatureStore<Vec<ExerciseTemplate>>,
    collections: FeatureStore<Vec<TemplateCollection>>,
    profile: FeatureStore<Option<UserProfile>>,
}

impl ExerciseService {
    pub fn new(engine: BlogEngine) -> Self {
        Self {
            lists: FeatureStore::new(engine.clone(), TAGS),
            templates: FeatureStore::new(engine.clone(), TEMPLATE_TAGS),
            collections: FeatureStore::new(engine.clone(), COLLECTION_TAGS),
            profile: FeatureStore::new(engine, PROFILE_TAGS),
        }
    }

    pub async fn list(&self, date: &str) -> FeatureResult<ExerciseList> {
        Ok(self
            .lists
            .load(&titles::exercise_title(date))
            .await?
            .unwrap_or_else(|| ExerciseList {
                date: date.to_string(),
                items: Vec::new(),
            }))
    }

    /// Zero calories are estimated from the MET table, body weight plus carried weight.
    async fn resolve_calories(&self, input: &ExerciseInput) -> FeatureResult<u32> {
        if input.calories > 0 {
            return Ok(input.calories);
        }
        let body = self
            .profile()
            .await?
            .map(|p| p.weight)
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_WEIGHT_KG);
        Ok(calories(&input.kind, &input.intensity, input.duration, body + input.weight))
    }

    pub async fn add(&self, date: &str, input: ExerciseInput) -> FeatureResult<ExerciseItem> {
        if input.name.trim().is_empty() {
            return Err(FeatureError::Invalid("exercise name is empty".into()));
        }
        let item = ExerciseItem {
            id: new_id(),
            calories: self.resolve_calories(&input).await?,
            name: input.name,
            kind: input.kind,
            duration: input.duration,
            intensity: input.intensity,
            notes: input.notes,
            completed: false,
            weight: input.weight,
            created_at: clock::now_string(),
            completed_at: None,
            body_parts: input.body_parts,
        };
        let owned = date.to_string();
        self.lists
            .update(
                &titles::exercise_title(date),
                move || ExerciseList {
                    date: owned,
                    items: Vec::new(),
                },
                move |list| {
                    list.items.push(item.clone());
                    Ok(item)
                },
            )
            .await
    }

    pub async fn update(&self, date: &str, id: &str, input: ExerciseInput) -> FeatureResult<()> {
        let calories = self.resolve_calories(&input).await?;
        let id = id.to_string();
        self.update_list(date, move |list| {
            let item = find(list, &id)?;
            item.name = input.name;
            item.kind = input.kind;
            item.duration = input.duration;
            item.intensity = input.intensity;
            item.calories = calories;
            item.notes = input.notes;
            item.weight = input.weight;
            item.body_parts = input.body_parts;
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, date: &str, id: &str) -> FeatureResult<()> {
        let id = id.to_string();
        self.update_list(date, move |list| {
            let before = list.items.len();
            list.items.retain(|i| i.id != id);
            if list.items.len() == before {
                return Err(FeatureError::NotFound(format!("exercise {}", id)));
            }
            Ok(())
        })
        .await
    }

    pub async fn toggle(&self, date: &str, id: &str) -> FeatureResult<bool> {
        let id = id.to_string();
        self.update_list(date, move |list| {
            let item = find(list, &id)?;
            item.completed = !item.completed;
            item.completed_at = item.completed.then(clock::now_string);
            Ok(item.completed)
        })
        .await
    }

    async fn update_list<R, F>(&self, date: &str, f: F) -> FeatureResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut ExerciseList) -> FeatureResult<R> + Send + 'static,
    {
        let title = titles::exercise_title(date);
        let missing = title.clone();
        self.lists
            .update(&title, ExerciseList::default, move |list| {
                if list.date.is_empty() && list.items.is_empty() {
                    return Err(FeatureError::NotFound(missing));
                }
                f(list)
            })
            .await
    }

    pub async fn templates(&self) -> FeatureResult<Vec<ExerciseTemplate>> {
        self.templates
            .load_or_default(titles::EXERCISE_TEMPLATES_TITLE)
            .await
    }

    /// Replace the template list; templates without an id get one.
    pub async fn save_templates(&self, mut templates: Vec<ExerciseTemplate>) -> FeatureResult<Vec<ExerciseTemplate>> {
        for t in templates.iter_mut().filter(|t| t.id.is_empty()) {
            t.id = new_id();
        }
        self.templates
            .save(titles::EXERCISE_TEMPLATES_TITLE, templates.clone())
            .await?;
        Ok(templates)
    }

    pub async fn collections(&self) -> FeatureResult<Vec<TemplateCollection>> {
        self.collections
            .load_or_default(titles::EXERCISE_COLLECTIONS_TITLE)
            .await
    }

    pub async fn add_collection(
        &self,
        name: &str,
        description: &str,
        template_ids: Vec<String>,
    ) -> FeatureResult<TemplateCollection> {
        let collection = TemplateCollection {
            id: new_id(),
            name: name.to_string(),
            description: description.to_string(),
            template_ids,
            created_at: clock::now_string(),
        };
        self.collections
            .update(titles::EXERCISE_COLLECTIONS_TITLE, Vec::new, move |all| {
                all.push(collection.clone());
                Ok(collection)
            })
            .await
    }

    /// Copy every template of a collection into the day's list.
    pub async fn add_from_collection(&self, date: &str, collection_id: &str) -> FeatureResult<usize> {
        let collection = self
            .collections()
            .await?
            .into_iter()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| FeatureError::NotFound(format!("collection {}", collection_id)))?;
        let templates = self.templates().await?;
        let mut added = 0;
        for t in templates
            .into_iter()
            .filter(|t| collection.template_ids.contains(&t.id))
        {
            self.add(
                date,
                ExerciseInput {
                    name: t.name,
                    kind: t.kind,
                    duration: t.duration,
                    intensity: t.intensity,
                    calories: t.calories,
                    notes: t.notes,
                    weight: t.weight,
                    body_parts: t.body_parts,
                },
            )
            .await?;
            added += 1;
        }
        Ok(added)
    }

    pub async fn profile(&self) -> FeatureResult<Option<UserProfile>> {
        Ok(self
            .profile
            .load(titles::EXERCISE_PROFILE_TITLE)
            .await?
            .flatten())
    }

    pub async fn save_profile(&self, mut profile: UserProfile) -> FeatureResult<UserProfile> {
        if profile.weight < 0.0 || profile.height < 0.0 {
            return Err(FeatureError::Invalid("weight and height must not be negative".into()));
        }
        let now = clock::now_string();
        let previous = self.profile().await?;
        profile.id = previous
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(new_id);
        profile.created_at = previous.map(|p| p.created_at).unwrap_or_else(|| now.clone());
        profile.updated_at = now;
        self.profile
            .save(titles::EXERCISE_PROFILE_TITLE, Some(profile.clone()))
            .await?;
        Ok(profile)
    }

    /// Monday-to-Sunday week containing `date`.
    pub async fn weekly_stats(&self, date: &str) -> FeatureResult<ExerciseStats> {
        let day = clock::parse_date(date)
            .ok_or_else(|| FeatureError::Invalid(format!("invalid date {}", date)))?;
        let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
        let sunday = monday + Duration::days(6);
        self.stats("week", monday, sunday).await
    }

    pub async fn monthly_stats(&self, year: i32, month: u32) -> FeatureResult<ExerciseStats> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| FeatureError::Invalid(format!("invalid month {}-{}", year, month)))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| FeatureError::Invalid(format!("invalid month {}-{}", year, month)))?;
        self.stats("month", start, next - Duration::days(1)).await
    }

    async fn stats(&self, period: &str, start: NaiveDate, end: NaiveDate) -> FeatureResult<ExerciseStats> {
        let lists = self.lists.list(EXERCISE_PREFIX).await;
        Ok(aggregate(period, start, end, lists.into_iter()))
    }
}

fn find<'a>(list: &'a mut ExerciseList, id: &str) -> FeatureResult<&'a mut ExerciseItem> {
    list.items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| FeatureError::NotFound(format!("exercise {}", id)))
}

/// Completed exercises only count toward totals and exercise days.
fn aggregate(
    period: &str,
    start: NaiveDate,
    end: NaiveDate,
    lists: impl Iterator<Item = (String, ExerciseList)>,
) -> ExerciseStats {
    let mut stats = ExerciseStats {
        period: period.to_string(),
        start_date: clock::format_date(start),
        end_date: clock::format_date(end),
        total_days: (end - start).num_days() + 1,
        ..Default::default()
    };
    let mut days = HashSet::new();
    for (title, list) in lists {
        let Some(date) = titles::date_suffix(&title, EXERCISE_PREFIX).and_then(clock::parse_date) else {
            continue;
        };
        if date < start || date > end {
            continue;
        }
        for item in list.items.iter().filter(|i| i.completed) {
            days.insert(date);
            stats.total_duration += item.duration;
            stats.total_calories += item.calories;
            *stats.type_stats.entry(item.kind.clone()).or_default() += 1;
        }
    }
    stats.exercise_days = days.len();
    if stats.total_days > 0 {
        stats.consistency = stats.exercise_days as f64 / stats.total_days as f64 * 100.0;
        stats.weekly_avg = match period {
            "week" => f64::from(stats.total_duration),
            _ => f64::from(stats.total_duration) / (stats.total_days as f64 / 7.0),
        };
    }
    stats
}
