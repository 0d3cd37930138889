use askama::Template;
use axum::extract::RawQuery;
use axum::routing::get;
use axum::Router;

use super::home::Html;
use crate::extractors::PageUser;
use crate::state::AppState;

/// Shell page for a title-convention feature. The browser script pulls the
/// data from `api`, forwarding the page's own query string.
#[derive(Template)]
#[template(path = "pages/feature.html")]
pub struct FeatureTemplate {
    pub heading: &'static str,
    pub api: &'static str,
    pub query: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/todolist", get(todolist))
        .route("/exercise", get(exercise))
        .route("/yearplan", get(yearplan))
        .route("/monthgoal", get(monthgoal))
        .route("/reading", get(reading))
        .route("/lifecountdown", get(lifecountdown))
}

fn page(heading: &'static str, api: &'static str, query: Option<String>) -> Html<FeatureTemplate> {
    Html(FeatureTemplate {
        heading,
        api,
        query: query.unwrap_or_default(),
    })
}

async fn todolist(_: PageUser, RawQuery(q): RawQuery) -> Html<FeatureTemplate> {
    page("待办事项", "/api/todos", q)
}

async fn exercise(_: PageUser, RawQuery(q): RawQuery) -> Html<FeatureTemplate> {
    page("锻炼", "/api/exercises", q)
}

async fn yearplan(_: PageUser, RawQuery(q): RawQuery) -> Html<FeatureTemplate> {
    page("年计划", "/api/yearplan", q)
}

async fn monthgoal(_: PageUser, RawQuery(q): RawQuery) -> Html<FeatureTemplate> {
    page("月目标", "/api/monthgoal", q.or_else(|| Some("all=true".to_string())))
}

async fn reading(_: PageUser, RawQuery(q): RawQuery) -> Html<FeatureTemplate> {
    page("读书", "/api/books", q)
}

async fn lifecountdown(_: PageUser) -> Html<FeatureTemplate> {
    page("人生倒计时", "/api/lifecountdown", None)
}
