// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::models::assessment::{AssessmentKind, AssessmentRef};

/// A media file attached to a question.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuestionFile {
    pub id: i64,
    pub name: String,
    pub ext: String,
    pub name_used: Option<String>,
}

/// Raw 'questions' row as stored. `options` is kept as JSON because legacy
/// rows hold a JSON-encoded string instead of an array.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub row_id: i64,
    pub table_name: String,
    pub question: String,
    pub options: Option<serde_json::Value>,
    pub correct_answer_index: Option<i32>,
    pub number: Option<i32>,
}

/// A question as the engine sees it: typed owner, parsed options.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: i64,
    pub owner: AssessmentRef,
    pub question: String,
    pub options: Vec<String>,
    /// Declared 1-based index into `options`. Not trusted, see `engine::validator`.
    pub correct_answer_index: Option<i32>,
    /// Stored display number. Zero or missing means "unnumbered".
    pub number: Option<i32>,
    pub files: Vec<QuestionFile>,
}

impl QuestionRow {
    /// Converts the row, parsing `options` once. Returns `None` for rows whose
    /// owner table is unknown.
    pub fn into_question(self, files: Vec<QuestionFile>) -> Option<Question> {
        let kind = AssessmentKind::from_table_name(&self.table_name)?;
        let options = parse_options(self.id, self.options);
        Some(Question {
            id: self.id,
            owner: AssessmentRef::new(kind, self.row_id),
            question: self.question,
            options,
            correct_answer_index: self.correct_answer_index,
            number: self.number,
            files,
        })
    }
}

/// Normalizes the stored `options` column into a list of strings.
///
/// Accepts a JSON array or a string containing a JSON array. Anything else
/// yields an empty list and a warning.
pub fn parse_options(question_id: i64, raw: Option<serde_json::Value>) -> Vec<String> {
    match raw {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items.into_iter().map(option_text).collect(),
        Some(serde_json::Value::String(encoded)) => {
            match serde_json::from_str::<Vec<serde_json::Value>>(&encoded) {
                Ok(items) => items.into_iter().map(option_text).collect(),
                Err(e) => {
                    tracing::warn!("Question {} has unparseable options: {}", question_id, e);
                    Vec::new()
                }
            }
        }
        Some(other) => {
            tracing::warn!("Question {} has non-list options: {}", question_id, other);
            Vec::new()
        }
    }
}

fn option_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

/// A question placed in its assessment's resolved order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuestion {
    pub question: Question,
    /// 1-based number shown to the learner.
    pub display_number: i32,
    /// 0-based position within the whole assessment; key for progress and scoring.
    pub global_index: usize,
}

/// DTO for sending a question to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: Option<i32>,
    pub files: Vec<QuestionFile>,
    pub number: i32,
    pub global_index: usize,
}

impl From<ResolvedQuestion> for PublicQuestion {
    fn from(resolved: ResolvedQuestion) -> Self {
        let ResolvedQuestion {
            question,
            display_number,
            global_index,
        } = resolved;
        Self {
            id: question.id,
            question: question.question,
            options: question.options,
            correct_answer_index: question.correct_answer_index,
            files: question.files,
            number: display_number,
            global_index,
        }
    }
}

/// One page of an assessment's resolved questions.
#[derive(Debug, Serialize)]
pub struct QuestionPage {
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub questions: Vec<PublicQuestion>,
}
