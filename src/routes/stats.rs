use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Local;
use serde::Deserialize;

use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::statistics::{self, Statistics};

#[derive(Deserialize)]
pub struct KeywordQuery {
    #[serde(default)]
    pub keyword: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/statistics", get(overview))
        .route("/api/statistics/search", get(keyword_search))
}

async fn overview(State(state): State<AppState>, user: CurrentUser) -> Json<Statistics> {
    let blogs = state.engine.blog(&user.account).snapshot().await;
    let conf = state.engine.blogs.sysconf().account(&user.account);
    Json(statistics::collect(&blogs, Local::now().date_naive(), &conf))
}

async fn keyword_search(State(state): State<AppState>, user: CurrentUser, Query(q): Query<KeywordQuery>) -> Json<Vec<String>> {
    if q.keyword.trim().is_empty() {
        return Json(Vec::new());
    }
    let blogs = state.engine.blog(&user.account).snapshot().await;
    Json(statistics::search_keyword(&blogs, q.keyword.trim()))
}
