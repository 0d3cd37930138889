use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::features::reading::{
    Book, BookComposite, BookInsight, BookNote, NewBook, NewInsight, NewNote, ReadingRecord,
    ReadingService, ReadingStatistics,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProgressBody {
    pub current_page: u32,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/books", get(list_books).post(add_book))
        .route("/api/books/{id}", get(get_book).delete(delete_book))
        .route("/api/books/{id}/progress", post(update_progress))
        .route("/api/books/{id}/finish", post(finish))
        .route("/api/books/{id}/notes", post(add_note))
        .route("/api/books/{id}/notes/{note_id}", delete(delete_note))
        .route("/api/books/{id}/insights", post(add_insight))
        .route("/api/reading/statistics", get(statistics))
}

fn service(state: &AppState, user: &CurrentUser) -> ReadingService {
    ReadingService::new(state.engine.blog(&user.account))
}

async fn list_books(State(state): State<AppState>, user: CurrentUser, Query(q): Query<ListQuery>) -> Json<Vec<Book>> {
    let books = service(&state, &user).list_books().await;
    Json(
        books
            .into_iter()
            .filter(|b| q.status.is_empty() || b.status == q.status)
            .collect(),
    )
}

async fn add_book(State(state): State<AppState>, user: CurrentUser, Json(new): Json<NewBook>) -> AppResult<Json<Book>> {
    Ok(Json(service(&state, &user).add_book(new).await?))
}

async fn get_book(State(state): State<AppState>, user: CurrentUser, Path(id): Path<String>) -> AppResult<Json<BookComposite>> {
    Ok(Json(service(&state, &user).get_book(&id).await?))
}

async fn delete_book(State(state): State<AppState>, user: CurrentUser, Path(id): Path<String>) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).delete_book(&id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn update_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<ProgressBody>,
) -> AppResult<Json<ReadingRecord>> {
    let record = service(&state, &user)
        .update_progress(&id, body.current_page, &body.notes)
        .await?;
    Ok(Json(record))
}

async fn finish(State(state): State<AppState>, user: CurrentUser, Path(id): Path<String>) -> AppResult<Json<ReadingRecord>> {
    Ok(Json(service(&state, &user).finish(&id).await?))
}

async fn add_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(new): Json<NewNote>,
) -> AppResult<Json<BookNote>> {
    Ok(Json(service(&state, &user).add_note(&id, new).await?))
}

async fn delete_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, note_id)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    service(&state, &user).delete_note(&id, &note_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn add_insight(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(new): Json<NewInsight>,
) -> AppResult<Json<BookInsight>> {
    Ok(Json(service(&state, &user).add_insight(&id, new).await?))
}

async fn statistics(State(state): State<AppState>, user: CurrentUser) -> Json<ReadingStatistics> {
    Json(service(&state, &user).statistics().await)
}
