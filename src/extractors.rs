use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;

use crate::comments::Poster;
use crate::error::AppError;
use crate::state::AppState;

/// The logged-in account behind the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: String,
    pub token: String,
    pub is_admin: bool,
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state).ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor, None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_session(parts, state)))
    }
}

/// Page-route variant of [`CurrentUser`]: sends visitors to the login page.
pub struct PageUser(pub CurrentUser);

pub struct LoginRedirect;

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        crate::routes::home::found("/index")
    }
}

impl FromRequestParts<AppState> for PageUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state)
            .map(PageUser)
            .ok_or(LoginRedirect)
    }
}

/// Client address and user agent, for comment attribution.
impl FromRequestParts<AppState> for Poster {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Poster {
            ip: client_ip(parts),
            user_agent: header_value(parts, header::USER_AGENT.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}

fn resolve_session(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let token = extract_session_token(parts, &state.config.auth.cookie_name)?;
    let account = state.engine.sessions.resolve(token)?;
    Some(CurrentUser {
        is_admin: state.engine.is_admin(&account),
        account,
        token: token.to_string(),
    })
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer.
fn client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = header_value(parts, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real) = header_value(parts, "x-real-ip").filter(|s| !s.is_empty()) {
        return real.to_string();
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn extract_session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}
