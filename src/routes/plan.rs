use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, Local};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::features::plan::{MonthGoal, PlanService, Task, WeekGoal, YearPlan};
use crate::state::AppState;

fn this_year() -> i32 {
    Local::now().year()
}

fn this_month() -> u32 {
    Local::now().month()
}

#[derive(Deserialize)]
pub struct YearQuery {
    #[serde(default = "this_year")]
    pub year: i32,
}

#[derive(Deserialize)]
pub struct MonthQuery {
    #[serde(default = "this_year")]
    pub year: i32,
    #[serde(default = "this_month")]
    pub month: u32,
    /// `all=true` returns every saved goal of the year.
    #[serde(default)]
    pub all: bool,
}

#[derive(Deserialize)]
pub struct TaskQuery {
    #[serde(default = "this_year")]
    pub year: i32,
    #[serde(default = "this_month")]
    pub month: u32,
    #[serde(default)]
    pub id: String,
}

#[derive(Deserialize)]
pub struct WeekQuery {
    #[serde(default = "this_year")]
    pub year: i32,
    #[serde(default = "this_month")]
    pub month: u32,
    pub week: u32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/yearplan", get(year_plan).post(save_year_plan))
        .route("/api/monthgoal", get(month_goal).post(save_month_goal))
        .route("/api/monthgoal/task", get(list_tasks).post(add_task).put(update_task).delete(delete_task))
        .route("/api/monthgoal/week", get(week_goal).post(save_week))
}

fn service(state: &AppState, user: &CurrentUser) -> PlanService {
    PlanService::new(state.engine.blog(&user.account))
}

fn ok() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true }))
}

async fn year_plan(State(state): State<AppState>, user: CurrentUser, Query(q): Query<YearQuery>) -> AppResult<Json<YearPlan>> {
    let plan = service(&state, &user)
        .year_plan(q.year)
        .await?
        .unwrap_or_else(|| YearPlan::empty(q.year));
    Ok(Json(plan))
}

async fn save_year_plan(State(state): State<AppState>, user: CurrentUser, Json(plan): Json<YearPlan>) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).save_year_plan(plan).await?;
    Ok(ok())
}

async fn month_goal(State(state): State<AppState>, user: CurrentUser, Query(q): Query<MonthQuery>) -> AppResult<Json<serde_json::Value>> {
    let svc = service(&state, &user);
    if q.all {
        let goals: BTreeMap<u32, MonthGoal> = svc.month_goals(q.year).await;
        return Ok(Json(serde_json::to_value(goals)?));
    }
    Ok(Json(serde_json::to_value(svc.month_goal(q.year, q.month).await?)?))
}

async fn save_month_goal(State(state): State<AppState>, user: CurrentUser, Json(goal): Json<MonthGoal>) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).save_month_goal(goal).await?;
    Ok(ok())
}

async fn list_tasks(State(state): State<AppState>, user: CurrentUser, Query(q): Query<TaskQuery>) -> AppResult<Json<Vec<Task>>> {
    let goal = service(&state, &user).month_goal(q.year, q.month).await?;
    Ok(Json(goal.tasks))
}

async fn add_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<TaskQuery>,
    Json(task): Json<Task>,
) -> AppResult<Json<Task>> {
    if task.title.trim().is_empty() {
        return Err(AppError::BadRequest("task title is required".into()));
    }
    Ok(Json(service(&state, &user).add_task(q.year, q.month, task).await?))
}

async fn update_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<TaskQuery>,
    Json(task): Json<Task>,
) -> AppResult<Json<Task>> {
    let id = if q.id.is_empty() { task.id.clone() } else { q.id.clone() };
    Ok(Json(service(&state, &user).update_task(q.year, q.month, &id, task).await?))
}

async fn delete_task(State(state): State<AppState>, user: CurrentUser, Query(q): Query<TaskQuery>) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).delete_task(q.year, q.month, &q.id).await?;
    Ok(ok())
}

async fn week_goal(State(state): State<AppState>, user: CurrentUser, Query(q): Query<WeekQuery>) -> AppResult<Json<WeekGoal>> {
    Ok(Json(service(&state, &user).week_goal(q.year, q.month, q.week).await?))
}

async fn save_week(State(state): State<AppState>, user: CurrentUser, Json(week): Json<WeekGoal>) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).save_week(week).await?;
    Ok(ok())
}
