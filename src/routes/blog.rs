use askama::Template;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::blog::model::is_valid_title;
use crate::blog::{book, AuthFlags, Blog, BlogEngine, UploadedBlog};
use crate::comments::Comment;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::features::titles;
use crate::routes::home::{found, Html};
use crate::search;
use crate::share::{ShareKind, SharedEntry, ABSENT};
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/blog.html")]
pub struct BlogTemplate {
    pub account: String,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub auth: String,
    pub modify_time: String,
    pub access_count: u64,
    pub modify_count: u64,
    pub encrypted: bool,
    pub public_view: bool,
    pub comments: Vec<Comment>,
}

#[derive(Template)]
#[template(path = "pages/diary_password.html")]
pub struct DiaryPasswordTemplate {
    pub title: String,
}

#[derive(Template)]
#[template(path = "pages/diary_error.html")]
pub struct DiaryErrorTemplate {
    pub title: String,
}

#[derive(Template)]
#[template(path = "pages/tag.html")]
pub struct TagTemplate {
    pub account: String,
    pub tag: String,
    pub blogs: Vec<Blog>,
}

// -- Forms --

#[derive(Deserialize)]
pub struct SaveForm {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "auth_type")]
    pub authtype: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub encrypt: String,
}

impl SaveForm {
    fn into_upload(self) -> AppResult<UploadedBlog> {
        check_title(&self.title)?;
        let auth = AuthFlags::parse_list(&self.authtype);
        let encrypt = !self.encrypt.is_empty() || auth.contains(AuthFlags::ENCRYPTED);
        Ok(UploadedBlog::new(self.title, self.content)
            .with_auth(auth)
            .with_tags(self.tags)
            .encrypted(encrypt))
    }
}

#[derive(Deserialize)]
pub struct TitleForm {
    pub title: String,
}

#[derive(Deserialize)]
pub struct GetQuery {
    pub blogname: String,
    #[serde(default)]
    pub diary_pwd: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Deserialize)]
pub struct ShareQuery {
    pub t: u8,
    pub name: String,
    pub pwd: String,
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "match", default)]
    pub query: String,
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Deserialize)]
pub struct TagForm {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Deserialize)]
pub struct AuthForm {
    pub title: String,
    pub flag: String,
    #[serde(default = "default_op")]
    pub op: String,
}

fn default_op() -> String {
    "add".to_string()
}

#[derive(Deserialize)]
pub struct ShareForm {
    pub t: u8,
    pub name: String,
}

#[derive(Deserialize)]
pub struct ImportForm {
    #[serde(default)]
    pub dir: String,
}

#[derive(Serialize)]
pub struct ShareCreated {
    pub url: String,
    pub pwd: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/save", post(save))
        .route("/modify", post(modify))
        .route("/delete", post(delete))
        .route("/get", get(get_blog))
        .route("/getshare", get(get_share))
        .route("/search", get(search_blogs))
        .route("/tag", post(replace_tag))
        .route("/auth", post(change_auth))
        .route("/share", post(create_share).get(list_shares))
        .route("/import", post(import))
}

/// Titles accepted from the plain blog form.
fn check_title(title: &str) -> AppResult<()> {
    if !is_valid_title(title) {
        return Err(AppError::BadRequest(format!("title is invalid: {}", title)));
    }
    if titles::is_reserved(title) {
        return Err(AppError::BadRequest(format!("title is reserved: {}", title)));
    }
    Ok(())
}

/// Blog owner for visitor-facing routes: the explicit `account`, else the admin.
/// An account named in the query must be registered.
fn target_account(state: &AppState, explicit: Option<String>, user: Option<&CurrentUser>) -> AppResult<String> {
    match explicit.filter(|a| !a.is_empty()) {
        Some(account) if !state.engine.accounts.exists(&account) => {
            Err(AppError::BadRequest(format!("unknown account {}", account)))
        }
        Some(account) => Ok(account),
        None => Ok(user
            .map(|u| u.account.clone())
            .unwrap_or_else(|| state.engine.accounts.admin_account().to_string())),
    }
}

fn code_error(op: &str, code: i32) -> AppError {
    match (op, code) {
        ("save", book::EXISTS) => AppError::Conflict(format!("{} failed code={} title exists", op, code)),
        (_, book::SYS_FILE) => AppError::Forbidden(format!("{} failed code={} system file", op, code)),
        _ => AppError::BadRequest(format!("{} failed code={}", op, code)),
    }
}

// -- Writes --

/// POST /save
async fn save(State(state): State<AppState>, user: CurrentUser, Form(form): Form<SaveForm>) -> AppResult<String> {
    let upload = form.into_upload()?;
    let title = upload.title.clone();
    match state.engine.blog(&user.account).add(upload).await {
        book::OK => Ok(format!("save successfully! {}", title)),
        code => Err(code_error("save", code)),
    }
}

/// POST /modify
async fn modify(State(state): State<AppState>, user: CurrentUser, Form(form): Form<SaveForm>) -> AppResult<String> {
    let upload = form.into_upload()?;
    let title = upload.title.clone();
    match state.engine.blog(&user.account).modify(upload).await {
        book::OK => Ok(format!("modify successfully! {}", title)),
        code => Err(code_error("modify", code)),
    }
}

/// POST /delete
async fn delete(State(state): State<AppState>, user: CurrentUser, Form(form): Form<TitleForm>) -> AppResult<String> {
    match state.engine.blog(&user.account).delete(&form.title).await {
        book::OK => Ok(format!("delete successfully! {}", form.title)),
        code => Err(code_error("delete", code)),
    }
}

// -- Reads --

async fn blog_view(state: &AppState, account: &str, blog: Blog, public_view: bool) -> BlogTemplate {
    let comments = state
        .engine
        .comments
        .get_comments(account, &blog.title)
        .await
        .map(|bc| bc.comments)
        .unwrap_or_default();
    BlogTemplate {
        account: account.to_string(),
        encrypted: blog.is_encrypted(),
        auth: blog.auth.to_string(),
        title: blog.title,
        content: blog.content,
        tags: blog.tags,
        modify_time: blog.modify_time,
        access_count: blog.access_count,
        modify_count: blog.modify_count,
        public_view,
        comments,
    }
}

/// GET /get?blogname=&diary_pwd=
async fn get_blog(State(state): State<AppState>, maybe_user: MaybeUser, Query(q): Query<GetQuery>) -> AppResult<Response> {
    if let Some(target) = titles::redirect_for(&q.blogname) {
        return Ok(found(&target));
    }

    let user = maybe_user.0;
    let account = target_account(&state, q.account, user.as_ref())?;
    let is_owner = user.as_ref().map(|u| u.account == account).unwrap_or(false);
    let engine = state.engine.blog(&account);
    let blog = engine
        .get(&q.blogname)
        .await
        .ok_or_else(|| AppError::BadRequest(format!("blog not found: {}", q.blogname)))?;

    if !is_owner && !blog.is_public() {
        return Ok(found("/index"));
    }

    if blog.is_diary() {
        let expected = state.engine.blogs.sysconf().with(&account, |c| c.diary_password());
        match q.diary_pwd.as_deref() {
            None | Some("") => {
                return Ok(Html(DiaryPasswordTemplate { title: blog.title }).into_response());
            }
            Some(pwd) if pwd != expected => {
                tracing::warn!("diary password mismatch account={} title={}", account, blog.title);
                return Ok(Html(DiaryErrorTemplate { title: blog.title }).into_response());
            }
            Some(_) => {}
        }
    }

    engine.update_access(&blog.title).await;
    let mut blog = blog;
    blog.access_count += 1;
    Ok(Html(blog_view(&state, &account, blog, !is_owner).await).into_response())
}

/// Checks the password, then spends one use of the link.
async fn redeem(state: &AppState, kind: ShareKind, account: &str, q: &ShareQuery) -> AppResult<SharedEntry> {
    let shares = &state.engine.shares;
    let entry = shares
        .get(kind, account, &q.name)
        .await
        .ok_or(AppError::Exhausted(ABSENT))?;
    if entry.pwd != q.pwd {
        return Err(AppError::Forbidden("share password mismatch".into()));
    }
    let count = shares.modify_count(kind, account, &q.name, -1).await;
    if count < 0 {
        tracing::info!("share closed {:?} {}/{} code={}", kind, account, q.name, count);
        return Err(AppError::Exhausted(count));
    }
    Ok(entry)
}

/// GET /getshare?t=&name=&pwd=&account=
async fn get_share(State(state): State<AppState>, Query(q): Query<ShareQuery>) -> AppResult<Response> {
    let kind = ShareKind::from_code(q.t).ok_or_else(|| AppError::BadRequest(format!("unknown share type {}", q.t)))?;
    let account = target_account(&state, q.account.clone(), None)?;
    redeem(&state, kind, &account, &q).await?;

    let engine = state.engine.blog(&account);
    match kind {
        ShareKind::Blog => {
            let blog = engine
                .get(&q.name)
                .await
                .ok_or_else(|| AppError::BadRequest(format!("blog not found: {}", q.name)))?;
            engine.update_access(&blog.title).await;
            Ok(Html(blog_view(&state, &account, blog, true).await).into_response())
        }
        ShareKind::Tag => {
            let mut blogs: Vec<Blog> = engine
                .snapshot()
                .await
                .values()
                .filter(|b| b.has_tag(&q.name) && !b.is_encrypted())
                .cloned()
                .collect();
            blogs.sort_by(|a, b| b.modify_time.cmp(&a.modify_time));
            Ok(Html(TagTemplate {
                account,
                tag: q.name,
                blogs,
            })
            .into_response())
        }
    }
}

/// GET /search?match=
async fn search_blogs(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<String>>> {
    let user = maybe_user.0;
    let account = target_account(&state, q.account, user.as_ref())?;
    let is_owner = user.map(|u| u.account == account).unwrap_or(false);
    let engine: BlogEngine = state.engine.blog(&account);
    let found = search::run(&engine, &q.query, is_owner).await;
    Ok(Json(found.into_iter().map(|b| b.title).collect()))
}

// -- Bulk edits and sharing --

/// POST /tag
async fn replace_tag(State(state): State<AppState>, user: CurrentUser, Form(form): Form<TagForm>) -> Json<Vec<String>> {
    Json(
        state
            .engine
            .blog(&user.account)
            .tag_replace(&form.from, &form.to)
            .await,
    )
}

/// POST /auth
async fn change_auth(State(state): State<AppState>, user: CurrentUser, Form(form): Form<AuthForm>) -> AppResult<String> {
    let flag = AuthFlags::parse_one(&form.flag)
        .ok_or_else(|| AppError::BadRequest(format!("unknown auth flag {}", form.flag)))?;
    let engine = state.engine.blog(&user.account);
    let code = match form.op.as_str() {
        "add" => engine.auth_add(&form.title, flag).await,
        "del" => engine.auth_del(&form.title, flag).await,
        other => return Err(AppError::BadRequest(format!("unknown op {}", other))),
    };
    match code {
        book::OK => Ok(format!("auth {} {} ok", form.op, form.flag)),
        code => Err(code_error("auth", code)),
    }
}

/// POST /share
async fn create_share(State(state): State<AppState>, user: CurrentUser, Form(form): Form<ShareForm>) -> AppResult<Json<ShareCreated>> {
    let kind = ShareKind::from_code(form.t).ok_or_else(|| AppError::BadRequest(format!("unknown share type {}", form.t)))?;
    let shares = &state.engine.shares;
    let created = match kind {
        ShareKind::Blog => {
            if state.engine.blog(&user.account).get(&form.name).await.is_none() {
                return Err(AppError::BadRequest(format!("blog not found: {}", form.name)));
            }
            shares.add_shared_blog(&user.account, &form.name).await
        }
        ShareKind::Tag => shares.add_shared_tag(&user.account, &form.name).await,
    };
    let (url, pwd) = created.ok_or_else(|| AppError::Internal("share registry unavailable".into()))?;
    Ok(Json(ShareCreated { url, pwd }))
}

/// GET /share
async fn list_shares(State(state): State<AppState>, user: CurrentUser) -> Json<Vec<SharedEntry>> {
    Json(state.engine.shares.list(&user.account).await)
}

/// POST /import: load markdown files, by default from the account's own mirror directory.
async fn import(State(state): State<AppState>, user: CurrentUser, Form(form): Form<ImportForm>) -> AppResult<String> {
    let dir = if form.dir.is_empty() {
        state.engine.accounts.blogs_dir(&user.account)
    } else if user.is_admin {
        form.dir.into()
    } else {
        return Err(AppError::Forbidden("only the admin may import from another directory".into()));
    };
    let count = state.engine.blog(&user.account).import_from_path(dir).await;
    Ok(format!("imported {}", count))
}
