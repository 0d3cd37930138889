use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::features::assistant::AssistantLog;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub date: String,
}

#[derive(Deserialize)]
pub struct LogEntry {
    #[serde(default = "default_role")]
    pub role: String,
    pub text: String,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Serialize)]
pub struct LogView {
    pub title: String,
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/assistant/log", get(read).post(append))
}

async fn read(State(state): State<AppState>, user: CurrentUser, Query(q): Query<LogQuery>) -> AppResult<Json<LogView>> {
    let date = if q.date.is_empty() {
        Local::now().date_naive()
    } else {
        clock::parse_date(&q.date).ok_or_else(|| AppError::BadRequest(format!("invalid date {}", q.date)))?
    };
    let content = AssistantLog::new(state.engine.blog(&user.account))
        .read(date)
        .await
        .unwrap_or_default();
    Ok(Json(LogView {
        title: crate::features::titles::assistant_title(date),
        content,
    }))
}

async fn append(State(state): State<AppState>, user: CurrentUser, Json(entry): Json<LogEntry>) -> AppResult<Json<serde_json::Value>> {
    let title = AssistantLog::new(state.engine.blog(&user.account))
        .append(&entry.role, &entry.text)
        .await?;
    Ok(Json(serde_json::json!({ "success": true, "title": title })))
}
