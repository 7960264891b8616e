// src/models/result_record.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::PASSING_SCORE;
use crate::models::assessment::AssessmentRef;
use crate::models::progress::ProgressAnswers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Passed,
    Failed,
}

impl ResultStatus {
    pub fn from_score(score: i32) -> Self {
        if score >= PASSING_SCORE {
            ResultStatus::Passed
        } else {
            ResultStatus::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Passed => "passed",
            ResultStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "passed" => Some(ResultStatus::Passed),
            "failed" => Some(ResultStatus::Failed),
            _ => None,
        }
    }
}

/// Scored outcome of one attempt, before (or without) persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub score: i32,
    pub correct_count: i32,
    /// Wrong answers plus unanswered questions.
    pub wrong_count: i32,
    pub total_questions: i32,
    pub status: ResultStatus,
}

/// Represents the 'test_results' table. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: i64,
    pub user_id: i64,
    pub test_id: Option<i64>,
    pub group_id: Option<i64>,
    pub score: i32,
    pub correct_count: i32,
    pub wrong_count: i32,
    pub time_spent: i64,
    pub status: ResultStatus,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Raw 'test_results' row; `status` is free text in storage.
#[derive(Debug, Clone, FromRow)]
pub struct ResultRow {
    pub id: i64,
    pub user_id: i64,
    pub test_id: Option<i64>,
    pub group_id: Option<i64>,
    pub score: i32,
    pub correct_count: i32,
    pub wrong_count: i32,
    pub time_spent: i64,
    pub status: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ResultRow> for ResultRecord {
    fn from(row: ResultRow) -> Self {
        let status = ResultStatus::parse(&row.status).unwrap_or_else(|| {
            tracing::warn!("Result {} has unknown status {:?}", row.id, row.status);
            ResultStatus::from_score(row.score)
        });
        Self {
            id: row.id,
            user_id: row.user_id,
            test_id: row.test_id,
            group_id: row.group_id,
            score: row.score,
            correct_count: row.correct_count,
            wrong_count: row.wrong_count,
            time_spent: row.time_spent,
            status,
            created_at: row.created_at,
        }
    }
}

/// Values for inserting a new result row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResultRecord {
    pub user_id: i64,
    pub assessment: AssessmentRef,
    pub summary: ScoreSummary,
    pub time_spent: i64,
}

/// DTO for submitting a finished attempt.
/// The assessment is addressed by exactly one of `testId` / `groupId`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResultRequest {
    #[serde(rename = "testId", default)]
    pub test_id: Option<i64>,
    #[serde(rename = "groupId", default)]
    pub group_id: Option<i64>,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub answers: ProgressAnswers,
    #[validate(range(min = 0, max = 86_400))]
    #[serde(default)]
    pub time_spent: i64,
    #[serde(default)]
    pub forced_by_timeout: bool,
}

impl SubmitResultRequest {
    pub fn assessment(&self) -> Option<AssessmentRef> {
        AssessmentRef::from_columns(self.test_id, self.group_id)
    }
}

/// What `finalize` hands back to the learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeOutcome {
    /// Whether a result record was persisted.
    pub saved: bool,
    pub summary: ScoreSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
