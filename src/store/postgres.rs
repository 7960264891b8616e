// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, types::Json};

use crate::models::{
    assessment::{AssessmentKind, AssessmentRef},
    progress::{ProgressAnswers, ProgressRecord},
    question::{Question, QuestionFile, QuestionRow},
    result_record::{NewResultRecord, ResultRecord, ResultRow},
};
use crate::store::{CatalogReader, PersistError, ProgressStore, ResultStore};

/// Helper struct for fetching attachments together with their question id.
#[derive(FromRow)]
struct FileRow {
    row_id: i64,
    #[sqlx(flatten)]
    file: QuestionFile,
}

/// Helper struct for the progress table; `answers` is decoded separately so a
/// corrupt row surfaces as `PersistError::Corrupt`.
#[derive(FromRow)]
struct ProgressRow {
    user_id: i64,
    kind: String,
    assessment_id: i64,
    answers: serde_json::Value,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<ProgressRow> for ProgressRecord {
    type Error = PersistError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        let kind = AssessmentKind::from_table_name(&row.kind)
            .ok_or_else(|| PersistError::Corrupt(format!("unknown kind '{}'", row.kind)))?;
        let answers: ProgressAnswers = serde_json::from_value(row.answers)?;
        Ok(ProgressRecord {
            user_id: row.user_id,
            assessment: AssessmentRef::new(kind, row.assessment_id),
            answers,
            started_at: row.started_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed implementation of every storage seam.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn files_for(&self, question_ids: &[i64]) -> Result<HashMap<i64, Vec<QuestionFile>>, PersistError> {
        if question_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<FileRow> = sqlx::query_as(
            r#"
            SELECT row_id, id, name, ext, name_used
            FROM files
            WHERE table_name = 'questions' AND row_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<QuestionFile>> = HashMap::new();
        for row in rows {
            by_question.entry(row.row_id).or_default().push(row.file);
        }
        Ok(by_question)
    }
}

#[async_trait]
impl CatalogReader for PgStore {
    async fn questions_for(
        &self,
        assessment: AssessmentRef,
    ) -> Result<Option<Vec<Question>>, PersistError> {
        // Table names come from the enum, never from input.
        let exists_sql = format!("SELECT id FROM {} WHERE id = $1", assessment.kind.table_name());
        let exists: Option<i64> = sqlx::query_scalar(&exists_sql)
            .bind(assessment.id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Ok(None);
        }

        let rows: Vec<QuestionRow> = sqlx::query_as(
            r#"
            SELECT id, row_id, table_name, question, options, correct_answer_index, number
            FROM questions
            WHERE table_name = $1 AND row_id = $2
            ORDER BY id ASC
            "#,
        )
        .bind(assessment.kind.table_name())
        .bind(assessment.id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut files = self.files_for(&ids).await?;

        let questions = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                let attached = files.remove(&id).unwrap_or_default();
                let question = row.into_question(attached);
                if question.is_none() {
                    tracing::warn!("Skipping question {} with unknown owner table", id);
                }
                question
            })
            .collect();

        Ok(Some(questions))
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn find(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
    ) -> Result<Option<ProgressRecord>, PersistError> {
        let row: Option<ProgressRow> = sqlx::query_as(
            r#"
            SELECT user_id, kind, assessment_id, answers, started_at, updated_at
            FROM assessment_progress
            WHERE user_id = $1 AND kind = $2 AND assessment_id = $3
            "#,
        )
        .bind(user_id)
        .bind(assessment.kind.table_name())
        .bind(assessment.id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProgressRecord::try_from).transpose()
    }

    async fn insert(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        answers: &ProgressAnswers,
    ) -> Result<(), PersistError> {
        sqlx::query(
            r#"
            INSERT INTO assessment_progress (user_id, kind, assessment_id, answers)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(assessment.kind.table_name())
        .bind(assessment.id)
        .bind(Json(answers))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        answers: &ProgressAnswers,
    ) -> Result<bool, PersistError> {
        let result = sqlx::query(
            r#"
            UPDATE assessment_progress
            SET answers = $4, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1 AND kind = $2 AND assessment_id = $3
            "#,
        )
        .bind(user_id)
        .bind(assessment.kind.table_name())
        .bind(assessment.id)
        .bind(Json(answers))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: i64, assessment: AssessmentRef) -> Result<(), PersistError> {
        sqlx::query(
            "DELETE FROM assessment_progress WHERE user_id = $1 AND kind = $2 AND assessment_id = $3",
        )
        .bind(user_id)
        .bind(assessment.kind.table_name())
        .bind(assessment.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn insert_result(&self, record: NewResultRecord) -> Result<ResultRecord, PersistError> {
        let (test_id, group_id) = record.assessment.as_columns();

        let row: ResultRow = sqlx::query_as(
            r#"
            INSERT INTO test_results
            (user_id, test_id, group_id, score, correct_count, wrong_count, time_spent, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, test_id, group_id, score, correct_count, wrong_count,
                      time_spent, status, created_at
            "#,
        )
        .bind(record.user_id)
        .bind(test_id)
        .bind(group_id)
        .bind(record.summary.score)
        .bind(record.summary.correct_count)
        .bind(record.summary.wrong_count)
        .bind(record.time_spent)
        .bind(record.summary.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn results_for_user(&self, user_id: i64) -> Result<Vec<ResultRecord>, PersistError> {
        let rows: Vec<ResultRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, test_id, group_id, score, correct_count, wrong_count,
                   time_spent, status, created_at
            FROM test_results
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ResultRecord::from).collect())
    }
}
