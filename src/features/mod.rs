//! Structured features stored as JSON blogs under reserved titles.

pub mod assistant;
pub mod exercise;
pub mod lifecountdown;
pub mod plan;
pub mod reading;
pub mod store;
pub mod titles;
pub mod todo;

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("save failed code={0}")]
    Save(i32),

    #[error("stored document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Actor(#[from] crate::actor::ActorError),
}

pub type FeatureResult<T> = Result<T, FeatureError>;

impl From<FeatureError> for AppError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::NotFound(_) => AppError::NotFound,
            FeatureError::Invalid(msg) => AppError::BadRequest(msg),
            FeatureError::Save(code) => AppError::Internal(format!("feature save failed code={}", code)),
            FeatureError::Json(e) => AppError::Json(e),
            FeatureError::Actor(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Nanosecond timestamp used as a record id.
pub fn new_id() -> String {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .to_string()
}
