// src/store/mod.rs

//! Storage seams of the engine.
//!
//! The catalog is read-only from here; progress rows are mutable working
//! state; result rows are append-only.

use std::fmt;

use async_trait::async_trait;

use crate::models::{
    assessment::AssessmentRef,
    progress::{ProgressAnswers, ProgressRecord},
    question::Question,
    result_record::{NewResultRecord, ResultRecord},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Failure of a storage operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistError {
    /// The driver or connection failed.
    Database(String),
    /// An insert hit the (user, assessment) uniqueness constraint.
    Conflict,
    /// A stored value could not be decoded.
    Corrupt(String),
    /// The caller tried to persist an answer set the assessment cannot hold.
    InvalidAnswers(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Database(msg) => write!(f, "database error: {}", msg),
            PersistError::Conflict => write!(f, "unique constraint violated"),
            PersistError::Corrupt(msg) => write!(f, "corrupt stored value: {}", msg),
            PersistError::InvalidAnswers(msg) => write!(f, "invalid answers: {}", msg),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => PersistError::Conflict,
            _ => PersistError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        PersistError::Corrupt(err.to_string())
    }
}

/// Read access to the question catalog owned by the admin side.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// All questions of an assessment, in storage order.
    /// `None` when the assessment itself does not exist.
    async fn questions_for(
        &self,
        assessment: AssessmentRef,
    ) -> Result<Option<Vec<Question>>, PersistError>;
}

/// Row-level primitives for the progress table.
///
/// Implementations must enforce uniqueness of (user, assessment) on `insert`
/// and report a lost race as `PersistError::Conflict`. The find-or-create
/// protocol on top lives in `engine::progress`.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
    ) -> Result<Option<ProgressRecord>, PersistError>;

    async fn insert(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        answers: &ProgressAnswers,
    ) -> Result<(), PersistError>;

    /// Overwrites the answers of an existing row. Returns `false` when no row matched.
    async fn update(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        answers: &ProgressAnswers,
    ) -> Result<bool, PersistError>;

    /// Removes the row if present.
    async fn delete(&self, user_id: i64, assessment: AssessmentRef) -> Result<(), PersistError>;
}

/// Append-only ledger of finished attempts.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn insert_result(&self, record: NewResultRecord) -> Result<ResultRecord, PersistError>;

    /// A user's results, newest first.
    async fn results_for_user(&self, user_id: i64) -> Result<Vec<ResultRecord>, PersistError>;
}
