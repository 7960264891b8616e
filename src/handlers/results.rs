// src/handlers/results.rs

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::{recorder::Attempt, session::regrade},
    error::AppError,
    handlers::questions::load_resolved,
    models::result_record::SubmitResultRequest,
    state::AppState,
    utils::jwt::{Claims, CurrentUser},
};

/// Scores a finished attempt submitted in one piece.
///
/// * The score is recomputed from the catalog; only selections are trusted.
/// * Every question must be answered, unless a timed assessment ran out of time.
/// * Anonymous callers get their score with `saved: false`.
/// * Signed-in callers get a stored result and their progress is cleared.
pub async fn submit_result(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SubmitResultRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let assessment = req
        .assessment()
        .ok_or_else(|| AppError::BadRequest("Exactly one of testId or groupId is required".to_string()))?;

    let resolved = load_resolved(&state, assessment).await?;
    if resolved.is_empty() {
        return Err(AppError::BadRequest("Assessment has no questions yet".to_string()));
    }

    let time_limit = state.config.time_limit_for(assessment.kind);
    if req.forced_by_timeout && time_limit.is_none() {
        return Err(AppError::BadRequest("Only timed assessments can time out".to_string()));
    }

    let answers = regrade(&resolved, &req.answers)?;
    if answers.len() < resolved.len() && !req.forced_by_timeout {
        return Err(AppError::BadRequest(format!(
            "Answer every question before submitting ({} of {} answered)",
            answers.len(),
            resolved.len()
        )));
    }

    let outcome = state
        .recorder
        .finalize(Attempt {
            user_id: user.0,
            assessment,
            answers: &answers,
            total_questions: resolved.len(),
            elapsed_secs: req.time_spent,
            forced_by_timeout: req.forced_by_timeout,
            time_limit,
        })
        .await;

    Ok(Json(outcome))
}

/// Lists the caller's results, newest first.
pub async fn list_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let results = state.recorder.history(user_id).await.map_err(|e| {
        tracing::error!("Failed to fetch results for user {}: {:?}", user_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(results))
}
