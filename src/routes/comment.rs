use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::blog::model::is_valid_title;
use crate::comments::book as codes;
use crate::comments::{BlogComments, Poster};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CommentForm {
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub pwd: String,
    #[serde(default)]
    pub mail: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub account: String,
}

#[derive(Deserialize)]
pub struct EditForm {
    pub title: String,
    pub idx: usize,
    #[serde(default)]
    pub comment: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub title: String,
    #[serde(default)]
    pub account: String,
}

#[derive(Deserialize)]
pub struct UsernameQuery {
    pub username: String,
    #[serde(default)]
    pub account: String,
}

#[derive(Serialize)]
pub struct CommentReply {
    pub success: bool,
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_id: String,
}

#[derive(Serialize)]
pub struct UsernameReply {
    pub available: bool,
    pub message: String,
}

impl IntoResponse for CommentReply {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, Json(self)).into_response()
    }
}

fn reply(code: i32, message: impl Into<String>, session_id: String) -> CommentReply {
    CommentReply {
        success: code == codes::OK,
        code,
        message: message.into(),
        session_id,
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comment", post(add_comment))
        .route("/comments", get(list_comments))
        .route("/comment/modify", post(modify_comment))
        .route("/comment/delete", post(delete_comment))
        .route("/api/check-username", get(check_username))
}

fn owner_account(state: &AppState, account: String) -> AppResult<String> {
    if account.is_empty() {
        Ok(state.engine.accounts.admin_account().to_string())
    } else if state.engine.accounts.exists(&account) {
        Ok(account)
    } else {
        Err(AppError::BadRequest(format!("unknown account {}", account)))
    }
}

/// POST /comment. An existing session wins, then username and password,
/// then an anonymous comment.
async fn add_comment(State(state): State<AppState>, poster: Poster, Form(form): Form<CommentForm>) -> AppResult<CommentReply> {
    if !is_valid_title(&form.title) {
        return Err(AppError::BadRequest(format!("title is invalid: {}", form.title)));
    }
    if form.comment.is_empty() {
        return Err(AppError::BadRequest("comment is empty".into()));
    }
    let account = owner_account(&state, form.account)?;
    if state.engine.blog(&account).get(&form.title).await.is_none() {
        return Err(AppError::BadRequest(format!("blog not found: {}", form.title)));
    }
    let comments = &state.engine.comments;
    tracing::debug!("comment account={} title={} ip={}", account, form.title, poster.ip);

    if !form.session_id.is_empty() {
        let (code, message) = comments
            .add_comment_with_session(&account, &form.title, &form.comment, &form.session_id, &poster)
            .await;
        return Ok(reply(code, message, String::new()));
    }

    if !form.owner.is_empty() && !form.pwd.is_empty() {
        let (code, message, session_id) = comments
            .add_comment_with_password(&account, &form.title, &form.comment, &form.owner, &form.mail, &form.pwd, &poster)
            .await;
        return Ok(reply(code, message, session_id));
    }

    let code = comments
        .add_comment(&account, &form.title, &form.owner, &form.comment, &form.mail, &form.pwd, &poster)
        .await;
    let message = match code {
        codes::OK => "comment posted",
        codes::LIMIT_REACHED => "comment limit reached",
        _ => "comment failed",
    };
    Ok(reply(code, message, String::new()))
}

/// GET /comments?title=&account=
async fn list_comments(State(state): State<AppState>, Query(q): Query<ListQuery>) -> AppResult<Json<BlogComments>> {
    let account = owner_account(&state, q.account)?;
    let comments = state
        .engine
        .comments
        .get_comments(&account, &q.title)
        .await
        .unwrap_or_else(|| BlogComments::new(q.title.as_str()));
    Ok(Json(comments))
}

/// POST /comment/modify, owner only.
async fn modify_comment(State(state): State<AppState>, user: CurrentUser, Form(form): Form<EditForm>) -> CommentReply {
    let code = state
        .engine
        .comments
        .modify_comment(&user.account, &form.title, form.idx, &form.comment)
        .await;
    reply(code, if code == codes::OK { "ok" } else { "modify failed" }, String::new())
}

/// POST /comment/delete, owner only.
async fn delete_comment(State(state): State<AppState>, user: CurrentUser, Form(form): Form<EditForm>) -> CommentReply {
    let code = state
        .engine
        .comments
        .remove_comment(&user.account, &form.title, form.idx)
        .await;
    reply(code, if code == codes::OK { "ok" } else { "delete failed" }, String::new())
}

/// GET /api/check-username?username=
async fn check_username(State(state): State<AppState>, Query(q): Query<UsernameQuery>) -> AppResult<Json<UsernameReply>> {
    let account = owner_account(&state, q.account)?;
    let (available, message) = state.engine.comments.check_username(&account, &q.username).await;
    Ok(Json(UsernameReply { available, message }))
}
