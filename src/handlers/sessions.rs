// src/handlers/sessions.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    engine::runner::ActiveSession,
    error::AppError,
    handlers::questions::fetch_questions,
    models::{
        assessment::{AssessmentKind, AssessmentRef},
        progress::ResetRequest,
    },
    state::AppState,
    utils::jwt::CurrentUser,
};

/// DTO for answering one question.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub global_index: usize,
    pub selected_idx: usize,
}

async fn find_session(state: &AppState, id: Uuid, user: CurrentUser) -> Result<Arc<ActiveSession>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .filter(|session| session.is_visible_to(user.0))
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
}

/// Starts an attempt. Signed-in learners resume their saved answers, and a
/// live session of theirs on the same assessment is replaced.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((kind, id)): Path<(AssessmentKind, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let assessment = AssessmentRef::new(kind, id);

    let questions = fetch_questions(&state, assessment).await?;

    if questions.is_empty() {
        return Err(AppError::BadRequest("Assessment has no questions yet".to_string()));
    }

    let time_limit = state.config.time_limit_for(kind);
    let previous = match user.0 {
        Some(user_id) => state.sessions.take_owned(user_id, assessment).await,
        None => None,
    };

    let session = match previous {
        Some(previous) => {
            tracing::debug!("Replacing session {} on {}", previous.id(), assessment);
            ActiveSession::take_over(previous, state.session_deps(), questions, time_limit).await
        }
        None => ActiveSession::start(state.session_deps(), user.0, assessment, questions, time_limit).await,
    };

    // A concurrent start for the same learner may have registered first.
    if let Some(displaced) = state.sessions.insert(session.clone()).await {
        displaced.retire().await;
    }

    Ok((StatusCode::CREATED, Json(session.snapshot().await)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, id, user).await?;
    Ok(Json(session.snapshot().await))
}

/// Answers one question. Re-answering is a no-op that echoes the first answer.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, id, user).await?;
    let response = session.submit(req.global_index, req.selected_idx).await?;
    Ok(Json(response))
}

pub async fn reset_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, id, user).await?;
    session.reset(req.confirm).await?;
    Ok(Json(session.snapshot().await))
}
