// src/handlers/questions.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    engine::ordering::{page_bounds, paginate, resolve},
    error::AppError,
    models::{
        assessment::{AssessmentKind, AssessmentRef},
        question::{Question, ResolvedQuestion},
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Reads an assessment's questions in storage order.
/// Unknown assessments are 404; an assessment without questions is an empty list.
pub async fn fetch_questions(
    state: &AppState,
    assessment: AssessmentRef,
) -> Result<Vec<Question>, AppError> {
    state
        .catalog
        .questions_for(assessment)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions for {}: {:?}", assessment, e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or_else(|| AppError::NotFound(format!("Assessment {} not found", assessment)))
}

/// `fetch_questions` in resolved display order.
pub async fn load_resolved(
    state: &AppState,
    assessment: AssessmentRef,
) -> Result<Vec<ResolvedQuestion>, AppError> {
    Ok(resolve(fetch_questions(state, assessment).await?))
}

/// Lists one page of an assessment's questions.
///
/// Ordering is resolved over the whole assessment before slicing, so
/// `number` and `globalIndex` are stable across pages.
pub async fn list_questions(
    State(state): State<AppState>,
    Path((kind, id)): Path<(AssessmentKind, i64)>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let assessment = AssessmentRef::new(kind, id);
    let (page, limit) = page_bounds(query.page, query.limit);

    let resolved = load_resolved(&state, assessment).await?;

    Ok(Json(paginate(resolved, page, limit)))
}
