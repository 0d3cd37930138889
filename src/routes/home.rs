use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::blog::AuthFlags;
use crate::error::AppResult;
use crate::extractors::{MaybeUser, PageUser};
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate;

pub struct BlogRow {
    pub title: String,
    pub link: String,
    pub tags: String,
    pub auth: String,
    pub modify_time: String,
    pub access_count: u64,
    pub comments: usize,
}

#[derive(Template)]
#[template(path = "pages/main.html")]
pub struct MainTemplate {
    pub account: String,
    pub total: usize,
    pub rows: Vec<BlogRow>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/index", get(index))
        .route("/main", get(main_page))
}

/// 302 Found. Non-ASCII bytes in `location` are percent-encoded.
pub fn found(location: &str) -> Response {
    let mut escaped = String::with_capacity(location.len());
    for c in location.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", b));
            }
        }
    }
    (StatusCode::FOUND, [(header::LOCATION, escaped)]).into_response()
}

/// Query-string encoding for titles placed in links.
pub fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

async fn root() -> Response {
    found("/index")
}

async fn index(maybe_user: MaybeUser) -> Response {
    if maybe_user.0.is_some() {
        return found("/main");
    }
    Html(LoginTemplate).into_response()
}

async fn main_page(State(state): State<AppState>, PageUser(user): PageUser) -> AppResult<Response> {
    let engine = state.engine.blog(&user.account);
    let limit = state
        .engine
        .blogs
        .sysconf()
        .with(&user.account, |c| c.main_show_blogs());
    let num = usize::try_from(limit).unwrap_or(0);
    let blogs = engine.get_all(num, AuthFlags::ALL).await;
    let counts = state.engine.comments.comment_counts(&user.account).await;

    let rows: Vec<BlogRow> = blogs
        .into_iter()
        .map(|b| BlogRow {
            link: encode(&b.title),
            comments: counts.get(&b.title).copied().unwrap_or(0),
            auth: b.auth.to_string(),
            title: b.title,
            tags: b.tags,
            modify_time: b.modify_time,
            access_count: b.access_count,
        })
        .collect();

    tracing::debug!("main account={} rows={}", user.account, rows.len());
    Ok(Html(MainTemplate {
        account: user.account,
        total: rows.len(),
        rows,
    })
    .into_response())
}
