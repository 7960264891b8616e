// src/models/progress.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::assessment::AssessmentRef;

/// The learner's answer to one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub selected_idx: usize,
    pub is_correct: bool,
}

/// In-progress answers keyed by global question index.
///
/// Serialized as a JSON object; the integer keys become strings on the wire.
pub type ProgressAnswers = BTreeMap<usize, AnswerRecord>;

/// Represents a row of the 'assessment_progress' table.
/// Exactly one exists per (user, assessment).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRecord {
    pub user_id: i64,
    pub assessment: AssessmentRef,
    pub answers: ProgressAnswers,
    /// When the attempt began. Kept across saves, so a resumed timer
    /// continues instead of restarting.
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for `GET .../progress`.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub answers: ProgressAnswers,
}

/// DTO for saving progress. Always the full mapping, never a delta.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveProgressRequest {
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub answers: ProgressAnswers,
}

/// DTO for destructive resets. Must carry `confirm: true`.
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}
