// src/store/memory.rs

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::models::{
    assessment::AssessmentRef,
    progress::{ProgressAnswers, ProgressRecord},
    question::Question,
    result_record::{NewResultRecord, ResultRecord},
};
use crate::store::{CatalogReader, PersistError, ProgressStore, ResultStore};

#[derive(Default)]
struct ResultLedger {
    next_id: i64,
    rows: Vec<ResultRecord>,
}

/// Process-local storage with the same constraints as the Postgres schema.
///
/// Backs the server when no `DATABASE_URL` is configured, and the test suite.
#[derive(Default)]
pub struct MemoryStore {
    assessments: RwLock<HashSet<AssessmentRef>>,
    questions: RwLock<Vec<Question>>,
    progress: RwLock<HashMap<(i64, AssessmentRef), ProgressRecord>>,
    results: Mutex<ResultLedger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_assessment(&self, assessment: AssessmentRef) {
        self.assessments.write().await.insert(assessment);
    }

    /// Adds a question, registering its owner assessment as well.
    pub async fn add_question(&self, question: Question) {
        self.add_assessment(question.owner).await;
        self.questions.write().await.push(question);
    }

    /// Number of progress rows across all users.
    pub async fn progress_rows(&self) -> usize {
        self.progress.read().await.len()
    }

    /// Moves an attempt's recorded start `by` into the past.
    #[cfg(test)]
    pub(crate) async fn backdate_progress(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        by: std::time::Duration,
    ) {
        if let Some(row) = self.progress.write().await.get_mut(&(user_id, assessment)) {
            let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
            row.started_at = row.started_at.map(|at| at - by);
        }
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn questions_for(
        &self,
        assessment: AssessmentRef,
    ) -> Result<Option<Vec<Question>>, PersistError> {
        if !self.assessments.read().await.contains(&assessment) {
            return Ok(None);
        }

        let mut questions: Vec<Question> = self
            .questions
            .read()
            .await
            .iter()
            .filter(|q| q.owner == assessment)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.id);

        Ok(Some(questions))
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
    ) -> Result<Option<ProgressRecord>, PersistError> {
        Ok(self.progress.read().await.get(&(user_id, assessment)).cloned())
    }

    async fn insert(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        answers: &ProgressAnswers,
    ) -> Result<(), PersistError> {
        let mut rows = self.progress.write().await;
        if rows.contains_key(&(user_id, assessment)) {
            return Err(PersistError::Conflict);
        }
        rows.insert(
            (user_id, assessment),
            ProgressRecord {
                user_id,
                assessment,
                answers: answers.clone(),
                started_at: Some(chrono::Utc::now()),
                updated_at: Some(chrono::Utc::now()),
            },
        );
        Ok(())
    }

    async fn update(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        answers: &ProgressAnswers,
    ) -> Result<bool, PersistError> {
        let mut rows = self.progress.write().await;
        match rows.get_mut(&(user_id, assessment)) {
            Some(row) => {
                row.answers = answers.clone();
                row.updated_at = Some(chrono::Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: i64, assessment: AssessmentRef) -> Result<(), PersistError> {
        self.progress.write().await.remove(&(user_id, assessment));
        Ok(())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_result(&self, record: NewResultRecord) -> Result<ResultRecord, PersistError> {
        let mut ledger = self.results.lock().await;
        ledger.next_id += 1;

        let (test_id, group_id) = record.assessment.as_columns();
        let row = ResultRecord {
            id: ledger.next_id,
            user_id: record.user_id,
            test_id,
            group_id,
            score: record.summary.score,
            correct_count: record.summary.correct_count,
            wrong_count: record.summary.wrong_count,
            time_spent: record.time_spent,
            status: record.summary.status,
            created_at: Some(chrono::Utc::now()),
        };
        ledger.rows.push(row.clone());

        Ok(row)
    }

    async fn results_for_user(&self, user_id: i64) -> Result<Vec<ResultRecord>, PersistError> {
        let ledger = self.results.lock().await;
        // Ids grow with insertion order, so reversing gives newest first.
        Ok(ledger
            .rows
            .iter()
            .rev()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }
}
