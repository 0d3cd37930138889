use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::features::lifecountdown::{CountdownData, LifeCountdownService, UserConfig};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lifecountdown", get(data).post(save_config))
        .route("/api/lifecountdown/config", get(config))
}

fn service(state: &AppState, user: &CurrentUser) -> LifeCountdownService {
    LifeCountdownService::new(state.engine.blog(&user.account))
}

async fn data(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<CountdownData>> {
    Ok(Json(service(&state, &user).data().await?))
}

async fn config(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<UserConfig>> {
    Ok(Json(service(&state, &user).config().await?))
}

async fn save_config(State(state): State<AppState>, user: CurrentUser, Json(config): Json<UserConfig>) -> AppResult<Json<CountdownData>> {
    Ok(Json(service(&state, &user).save_config(config).await?))
}
