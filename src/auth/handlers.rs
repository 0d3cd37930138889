use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use super::session::{clear_session_cookie, session_cookie, Session};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginForm {
    pub account: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SmsQuery {
    pub account: String,
}

#[derive(Deserialize)]
pub struct SmsLoginForm {
    pub account: String,
    pub code: String,
}

/// 302 to the dashboard carrying the new session cookie.
fn logged_in(state: &AppState, session: &Session) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, header::HeaderValue::from_static("/main"));
    match session_cookie(&state.config.auth.cookie_name, session).parse::<header::HeaderValue>() {
        Ok(cookie) => {
            headers.insert(header::SET_COOKIE, cookie);
        }
        Err(e) => tracing::error!("session cookie is not a valid header: {}", e),
    }
    (StatusCode::FOUND, headers).into_response()
}

/// POST /login
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let session = state
        .engine
        .sessions
        .login(&form.account, &form.password)
        .ok_or_else(|| AppError::BadRequest("login failed".into()))?;
    Ok(logged_in(&state, &session))
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, maybe_user: MaybeUser) -> Response {
    if let Some(user) = maybe_user.0 {
        state.engine.sessions.logout(&user.token);
    }
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, "/index".to_string()),
            (header::SET_COOKIE, clear_session_cookie(&state.config.auth.cookie_name)),
        ],
    )
        .into_response()
}

/// GET /sms?account=. The code only goes to the log.
pub async fn send_sms(State(state): State<AppState>, Query(q): Query<SmsQuery>) -> AppResult<String> {
    if !state.engine.accounts.exists(&q.account) {
        return Err(AppError::BadRequest("unknown account".into()));
    }
    state.engine.sms.generate(&q.account);
    Ok("sms code sent".to_string())
}

/// POST /loginsms
pub async fn login_sms(State(state): State<AppState>, Form(form): Form<SmsLoginForm>) -> AppResult<Response> {
    let session = state
        .engine
        .sms
        .login_sms(&state.engine.sessions, &form.account, &form.code)
        .ok_or_else(|| AppError::BadRequest("sms login failed".into()))?;
    Ok(logged_in(&state, &session))
}
