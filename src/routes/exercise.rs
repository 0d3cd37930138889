use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Datelike;
use serde::Deserialize;

use crate::clock;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::features::exercise::{
    ExerciseInput, ExerciseItem, ExerciseList, ExerciseService, ExerciseStats, ExerciseTemplate,
    TemplateCollection, UserProfile,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DateQuery {
    #[serde(default = "clock::today_string")]
    pub date: String,
}

#[derive(Deserialize)]
pub struct ItemQuery {
    #[serde(default = "clock::today_string")]
    pub date: String,
    pub id: String,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    /// `week` (default) or `month`.
    #[serde(default)]
    pub period: String,
    #[serde(default = "clock::today_string")]
    pub date: String,
}

#[derive(Deserialize)]
pub struct NewCollection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub template_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct ApplyCollection {
    pub collection_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/exercises", get(list).post(add).put(update).delete(remove))
        .route("/api/exercises/toggle", post(toggle))
        .route("/api/exercises/templates", get(templates).post(save_templates))
        .route("/api/exercises/collections", get(collections).post(add_collection))
        .route("/api/exercises/collections/apply", post(apply_collection))
        .route("/api/exercises/profile", get(profile).post(save_profile))
        .route("/api/exercises/stats", get(stats))
}

fn service(state: &AppState, user: &CurrentUser) -> ExerciseService {
    ExerciseService::new(state.engine.blog(&user.account))
}

async fn list(State(state): State<AppState>, user: CurrentUser, Query(q): Query<DateQuery>) -> AppResult<Json<ExerciseList>> {
    Ok(Json(service(&state, &user).list(&q.date).await?))
}

async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<DateQuery>,
    Json(input): Json<ExerciseInput>,
) -> AppResult<Json<ExerciseItem>> {
    Ok(Json(service(&state, &user).add(&q.date, input).await?))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<ItemQuery>,
    Json(input): Json<ExerciseInput>,
) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).update(&q.date, &q.id, input).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn remove(State(state): State<AppState>, user: CurrentUser, Query(q): Query<ItemQuery>) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).delete(&q.date, &q.id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn toggle(State(state): State<AppState>, user: CurrentUser, Query(q): Query<ItemQuery>) -> AppResult<Json<serde_json::Value>> {
    let completed = service(&state, &user).toggle(&q.date, &q.id).await?;
    Ok(Json(serde_json::json!({ "success": true, "completed": completed })))
}

async fn templates(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<ExerciseTemplate>>> {
    Ok(Json(service(&state, &user).templates().await?))
}

async fn save_templates(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(templates): Json<Vec<ExerciseTemplate>>,
) -> AppResult<Json<Vec<ExerciseTemplate>>> {
    Ok(Json(service(&state, &user).save_templates(templates).await?))
}

async fn collections(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<TemplateCollection>>> {
    Ok(Json(service(&state, &user).collections().await?))
}

async fn add_collection(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(new): Json<NewCollection>,
) -> AppResult<Json<TemplateCollection>> {
    let collection = service(&state, &user)
        .add_collection(&new.name, &new.description, new.template_ids)
        .await?;
    Ok(Json(collection))
}

async fn apply_collection(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<DateQuery>,
    Json(body): Json<ApplyCollection>,
) -> AppResult<Json<serde_json::Value>> {
    let added = service(&state, &user)
        .add_from_collection(&q.date, &body.collection_id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true, "added": added })))
}

async fn profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Option<UserProfile>>> {
    Ok(Json(service(&state, &user).profile().await?))
}

async fn save_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(profile): Json<UserProfile>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(service(&state, &user).save_profile(profile).await?))
}

async fn stats(State(state): State<AppState>, user: CurrentUser, Query(q): Query<StatsQuery>) -> AppResult<Json<ExerciseStats>> {
    let svc = service(&state, &user);
    let stats = match q.period.as_str() {
        "" | "week" => svc.weekly_stats(&q.date).await?,
        "month" => {
            let date = clock::parse_date(&q.date)
                .ok_or_else(|| AppError::BadRequest(format!("invalid date {}", q.date)))?;
            svc.monthly_stats(date.year(), date.month()).await?
        }
        other => return Err(AppError::BadRequest(format!("unknown period {}", other))),
    };
    Ok(Json(stats))
}
