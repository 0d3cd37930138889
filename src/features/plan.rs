//! Year plans and monthly goals.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::store::FeatureStore;
use super::titles::{self, MONTH_GOAL_PREFIX};
use super::{new_id, FeatureError, FeatureResult};
use crate::blog::BlogEngine;
use crate::clock;

pub const YEAR_PLAN_TAGS: &str = "年计划";
pub const MONTH_GOAL_TAGS: &str = "月度目标";

pub const MIN_YEAR: i32 = 2020;
pub const MAX_YEAR: i32 = 2100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YearPlan {
    pub year: i32,
    pub year_overview: String,
    pub month_plans: Vec<String>,
    /// Free-form task lists keyed by month.
    pub tasks: serde_json::Map<String, serde_json::Value>,
}

impl YearPlan {
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            month_plans: vec![String::new(); 12],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub due_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekGoal {
    pub year: i32,
    pub month: u32,
    pub week: u32,
    pub overview: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthGoal {
    pub year: i32,
    pub month: u32,
    pub overview: String,
    pub weeks: BTreeMap<u32, WeekGoal>,
    pub tasks: Vec<Task>,
}

impl MonthGoal {
    /// Goal with every week of the month present.
    pub fn empty(year: i32, month: u32) -> Self {
        let mut goal = Self {
            year,
            month,
            ..Default::default()
        };
        goal.fill_weeks();
        goal
    }

    fn fill_weeks(&mut self) {
        for week in 1..=weeks_in_month(self.year, self.month) {
            self.weeks.entry(week).or_insert_with(|| WeekGoal {
                year: self.year,
                month: self.month,
                week,
                ..Default::default()
            });
        }
    }

    fn task_mut(&mut self, id: &str) -> FeatureResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| FeatureError::NotFound(format!("task {}", id)))
    }
}

/// Week of the month, counting Sunday-started weeks from 1.
pub fn week_number(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    let week_start = first - Duration::days(i64::from(first.weekday().num_days_from_sunday()));
    ((date - week_start).num_days() / 7 + 1) as u32
}

pub fn weeks_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next {
        Some(next) => week_number(next - Duration::days(1)) - week_number(first) + 1,
        None => 0,
    }
}

fn check_year(year: i32) -> FeatureResult<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(FeatureError::Invalid(format!("year {} out of range", year)))
    }
}

fn check_month(year: i32, month: u32) -> FeatureResult<()> {
    check_year(year)?;
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(FeatureError::Invalid(format!("month {} out of range", month)))
    }
}

#[derive(Clone)]
pub struct PlanService {
    years: FeatureStore<YearPlan>,
    months: FeatureStore<MonthGoal>,
}

impl PlanService {
    pub fn new(engine: BlogEngine) -> Self {
        Self {
            years: FeatureStore::new(engine.clone(), YEAR_PLAN_TAGS),
            months: FeatureStore::new(engine, MONTH_GOAL_TAGS),
        }
    }

    pub async fn year_plan(&self, year: i32) -> FeatureResult<Option<YearPlan>> {
        self.years.load(&titles::year_plan_title(year)).await
    }

    pub async fn save_year_plan(&self, plan: YearPlan) -> FeatureResult<()> {
        check_year(plan.year)?;
        if plan.month_plans.len() != 12 {
            return Err(FeatureError::Invalid(format!(
                "expected 12 month plans, got {}",
                plan.month_plans.len()
            )));
        }
        tracing::debug!("saving year plan {} with {} task months", plan.year, plan.tasks.len());
        self.years.save(&titles::year_plan_title(plan.year), plan).await
    }

    pub async fn month_goal(&self, year: i32, month: u32) -> FeatureResult<MonthGoal> {
        check_month(year, month)?;
        let mut goal = self
            .months
            .load(&titles::month_goal_title(year, month))
            .await?
            .unwrap_or_else(|| MonthGoal::empty(year, month));
        goal.fill_weeks();
        Ok(goal)
    }

    pub async fn save_month_goal(&self, mut goal: MonthGoal) -> FeatureResult<()> {
        check_month(goal.year, goal.month)?;
        goal.fill_weeks();
        self.months
            .save(&titles::month_goal_title(goal.year, goal.month), goal)
            .await
    }

    /// Every saved month goal of `year`, keyed by month.
    pub async fn month_goals(&self, year: i32) -> BTreeMap<u32, MonthGoal> {
        self.months
            .list(&format!("{}{}-", MONTH_GOAL_PREFIX, year))
            .await
            .into_iter()
            .map(|(_, g)| (g.month, g))
            .collect()
    }

    pub async fn week_goal(&self, year: i32, month: u32, week: u32) -> FeatureResult<WeekGoal> {
        self.month_goal(year, month)
            .await?
            .weeks
            .remove(&week)
            .ok_or_else(|| FeatureError::NotFound(format!("week {} of {}-{:02}", week, year, month)))
    }

    pub async fn save_week(&self, week: WeekGoal) -> FeatureResult<()> {
        self.update_month(week.year, week.month, move |goal| {
            goal.weeks.insert(week.week, week);
            Ok(())
        })
        .await
    }

    /// Missing status and priority default to pending and medium.
    pub async fn add_task(&self, year: i32, month: u32, mut task: Task) -> FeatureResult<Task> {
        let now = clock::now_string();
        if task.id.is_empty() {
            task.id = new_id();
        }
        if task.created_at.is_empty() {
            task.created_at = now.clone();
        }
        task.updated_at = now;
        if task.status.is_empty() {
            task.status = "pending".to_string();
        }
        if task.priority.is_empty() {
            task.priority = "medium".to_string();
        }
        self.update_month(year, month, move |goal| {
            goal.tasks.push(task.clone());
            Ok(task)
        })
        .await
    }

    pub async fn update_task(&self, year: i32, month: u32, id: &str, mut task: Task) -> FeatureResult<Task> {
        let id = id.to_string();
        self.update_month(year, month, move |goal| {
            let slot = goal.task_mut(&id)?;
            task.id = id;
            task.updated_at = clock::now_string();
            *slot = task.clone();
            Ok(task)
        })
        .await
    }

    pub async fn delete_task(&self, year: i32, month: u32, id: &str) -> FeatureResult<()> {
        let id = id.to_string();
        self.update_month(year, month, move |goal| {
            let before = goal.tasks.len();
            goal.tasks.retain(|t| t.id != id);
            if goal.tasks.len() == before {
                return Err(FeatureError::NotFound(format!("task {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn update_month<R, F>(&self, year: i32, month: u32, f: F) -> FeatureResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut MonthGoal) -> FeatureResult<R> + Send + 'static,
    {
        check_month(year, month)?;
        self.months
            .update(
                &titles::month_goal_title(year, month),
                move || MonthGoal::empty(year, month),
                move |goal| {
                    goal.fill_weeks();
                    f(goal)
                },
            )
            .await
    }
}
