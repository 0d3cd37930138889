use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout).get(handlers::logout))
        .route("/sms", get(handlers::send_sms))
        .route("/loginsms", post(handlers::login_sms))
}
