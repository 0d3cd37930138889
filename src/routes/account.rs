use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::accounts::Profile;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AccountView {
    pub account: String,
    pub is_admin: bool,
    pub profile: Profile,
    pub age: u32,
    pub bmi: f64,
    pub bmi_status: &'static str,
}

#[derive(Deserialize)]
pub struct NewAccount {
    pub account: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/account", get(me).post(update_profile))
        .route("/api/accounts", get(list).post(add_account))
}

fn view(account: &str, is_admin: bool, profile: Profile) -> AccountView {
    AccountView {
        account: account.to_string(),
        is_admin,
        age: profile.age_on(Local::now().date_naive()),
        bmi: (profile.bmi() * 10.0).round() / 10.0,
        bmi_status: profile.bmi_status(),
        profile,
    }
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<AccountView>> {
    let record = state.engine.accounts.get(&user.account).ok_or(AppError::NotFound)?;
    Ok(Json(view(&user.account, user.is_admin, record.profile)))
}

async fn update_profile(State(state): State<AppState>, user: CurrentUser, Json(profile): Json<Profile>) -> AppResult<Json<AccountView>> {
    let profile = state.engine.accounts.update_profile(&user.account, profile).await?;
    Ok(Json(view(&user.account, user.is_admin, profile)))
}

async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<String>>> {
    if !user.is_admin {
        return Err(AppError::Forbidden("admin only".into()));
    }
    Ok(Json(state.engine.accounts.list()))
}

async fn add_account(State(state): State<AppState>, user: CurrentUser, Json(new): Json<NewAccount>) -> AppResult<Json<serde_json::Value>> {
    if !user.is_admin {
        return Err(AppError::Forbidden("admin only".into()));
    }
    state.engine.accounts.add_account(&new.account, &new.password).await?;
    Ok(Json(serde_json::json!({ "success": true, "account": new.account })))
}
