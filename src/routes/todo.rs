use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::clock;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::features::todo::{NewTodo, TodoItem, TodoList, TodoService};
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
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

#[derive(Deserialize)]
pub struct TimeBody {
    pub id: String,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
}

#[derive(Deserialize)]
pub struct OrderBody {
    pub order: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/todos", get(list).post(add).delete(remove))
        .route("/api/todos/toggle", post(toggle))
        .route("/api/todos/time", post(update_time))
        .route("/api/todos/order", post(update_order))
        .route("/api/todos/range", get(range))
}

fn service(state: &AppState, user: &CurrentUser) -> TodoService {
    TodoService::new(state.engine.blog(&user.account))
}

async fn list(State(state): State<AppState>, user: CurrentUser, Query(q): Query<DateQuery>) -> AppResult<Json<TodoList>> {
    Ok(Json(service(&state, &user).list(&q.date).await?))
}

async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<DateQuery>,
    Json(new): Json<NewTodo>,
) -> AppResult<Json<TodoItem>> {
    Ok(Json(service(&state, &user).add(&q.date, new).await?))
}

async fn remove(State(state): State<AppState>, user: CurrentUser, Query(q): Query<ItemQuery>) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).delete(&q.date, &q.id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn toggle(State(state): State<AppState>, user: CurrentUser, Query(q): Query<ItemQuery>) -> AppResult<Json<serde_json::Value>> {
    let completed = service(&state, &user).toggle(&q.date, &q.id).await?;
    Ok(Json(serde_json::json!({ "success": true, "completed": completed })))
}

async fn update_time(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<DateQuery>,
    Json(body): Json<TimeBody>,
) -> AppResult<Json<TodoItem>> {
    let item = service(&state, &user)
        .update_time(&q.date, &body.id, body.hours, body.minutes)
        .await?;
    Ok(Json(item))
}

async fn update_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<DateQuery>,
    Json(body): Json<OrderBody>,
) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).update_order(&q.date, body.order).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn range(State(state): State<AppState>, user: CurrentUser, Query(q): Query<RangeQuery>) -> AppResult<Json<Vec<TodoList>>> {
    Ok(Json(service(&state, &user).range(&q.start, &q.end).await?))
}
