// src/engine/progress.rs

use std::sync::Arc;

use crate::models::{
    assessment::AssessmentRef,
    progress::{ProgressAnswers, ProgressRecord},
};
use crate::store::{PersistError, ProgressStore};

/// Durable, resumable per-(user, assessment) answer state.
#[derive(Clone)]
pub struct ProgressService {
    store: Arc<dyn ProgressStore>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Saved answers for the pair, or an empty mapping when none exist.
    pub async fn load(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
    ) -> Result<ProgressAnswers, PersistError> {
        Ok(self
            .record(user_id, assessment)
            .await?
            .map(|record| record.answers)
            .unwrap_or_default())
    }

    /// The stored attempt, including when it began.
    pub async fn record(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
    ) -> Result<Option<ProgressRecord>, PersistError> {
        self.store.find(user_id, assessment).await
    }

    /// Replaces the stored answers with `answers`.
    ///
    /// Find-or-create, then update. Two first saves racing for the same pair
    /// are settled by the storage uniqueness constraint: the losing insert
    /// falls back to updating the row the winner created.
    pub async fn save(
        &self,
        user_id: i64,
        assessment: AssessmentRef,
        answers: &ProgressAnswers,
        total_questions: usize,
    ) -> Result<(), PersistError> {
        check_bounds(answers, total_questions)?;

        if self.store.find(user_id, assessment).await?.is_some()
            && self.store.update(user_id, assessment, answers).await?
        {
            return Ok(());
        }

        match self.store.insert(user_id, assessment, answers).await {
            Ok(()) => Ok(()),
            Err(PersistError::Conflict) => {
                tracing::debug!(
                    "Progress insert for user {} on {} lost a race, updating instead",
                    user_id,
                    assessment
                );
                if self.store.update(user_id, assessment, answers).await? {
                    Ok(())
                } else {
                    // The winning row was cleared before we could update it.
                    Err(PersistError::Conflict)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the in-progress record. Clearing a missing record succeeds.
    pub async fn clear(&self, user_id: i64, assessment: AssessmentRef) -> Result<(), PersistError> {
        self.store.delete(user_id, assessment).await
    }
}

/// A progress mapping may never describe more questions than the assessment has.
fn check_bounds(answers: &ProgressAnswers, total_questions: usize) -> Result<(), PersistError> {
    if answers.len() > total_questions {
        return Err(PersistError::InvalidAnswers(format!(
            "{} answers for {} questions",
            answers.len(),
            total_questions
        )));
    }
    if let Some((&idx, _)) = answers.range(total_questions..).next() {
        return Err(PersistError::InvalidAnswers(format!(
            "question index {} is out of range (0..{})",
            idx, total_questions
        )));
    }
    Ok(())
}
