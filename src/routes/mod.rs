pub mod account;
pub mod assets;
pub mod assistant;
pub mod auth;
pub mod blog;
pub mod comment;
pub mod exercise;
pub mod home;
pub mod life;
pub mod pages;
pub mod plan;
pub mod reading;
pub mod stats;
pub mod todo;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every route the server exposes, with request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/assets/{*path}", get(assets::serve))
        .merge(home::router())
        .merge(auth::router())
        .merge(blog::router())
        .merge(comment::router())
        .merge(pages::router())
        .merge(todo::router())
        .merge(exercise::router())
        .merge(plan::router())
        .merge(reading::router())
        .merge(life::router())
        .merge(stats::router())
        .merge(account::router())
        .merge(assistant::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
