// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    engine::session::regrade,
    error::AppError,
    handlers::questions::load_resolved,
    models::{
        assessment::{AssessmentKind, AssessmentRef},
        progress::{ProgressAnswers, ProgressResponse, ResetRequest, SaveProgressRequest},
    },
    state::AppState,
    utils::jwt::{Claims, CurrentUser},
};

/// Returns the caller's saved answers. Anonymous callers always get an empty mapping.
pub async fn get_progress(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((kind, id)): Path<(AssessmentKind, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let assessment = AssessmentRef::new(kind, id);

    let answers = match user.0 {
        Some(user_id) => state.progress.load(user_id, assessment).await.map_err(|e| {
            tracing::error!("Failed to load progress for user {} on {}: {:?}", user_id, assessment, e);
            AppError::InternalServerError(e.to_string())
        })?,
        None => ProgressAnswers::new(),
    };

    Ok(Json(ProgressResponse { answers }))
}

/// Replaces the caller's saved answers with the submitted mapping.
///
/// `isCorrect` is recomputed from the catalog; the client's flags are ignored.
pub async fn save_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, id)): Path<(AssessmentKind, i64)>,
    Json(req): Json<SaveProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let user_id = claims.user_id()?;
    let assessment = AssessmentRef::new(kind, id);

    let resolved = load_resolved(&state, assessment).await?;
    let answers = regrade(&resolved, &req.answers)?;

    state
        .progress
        .save(user_id, assessment, &answers, resolved.len())
        .await?;

    tracing::debug!("Saved {} answers for user {} on {}", answers.len(), user_id, assessment);
    Ok(Json(json!({ "status": "success" })))
}

/// Deletes the caller's saved answers. Result records are untouched.
pub async fn reset_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, id)): Path<(AssessmentKind, i64)>,
    Json(req): Json<ResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !req.confirm {
        return Err(AppError::BadRequest("Reset must be confirmed".to_string()));
    }

    let user_id = claims.user_id()?;
    let assessment = AssessmentRef::new(kind, id);

    state.progress.clear(user_id, assessment).await?;

    tracing::info!("User {} reset progress on {}", user_id, assessment);
    Ok(StatusCode::NO_CONTENT)
}
