// src/engine/recorder.rs

use std::sync::Arc;
use std::time::Duration;

use crate::config::MAX_TIME_SPENT_SECS;
use crate::engine::{progress::ProgressService, scoring::tally};
use crate::models::{
    assessment::AssessmentRef,
    progress::ProgressAnswers,
    result_record::{FinalizeOutcome, NewResultRecord, ResultRecord},
};
use crate::store::{PersistError, ResultStore};

/// A finished attempt handed to `ResultRecorder::finalize`.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    /// `None` for anonymous practice: scored but never stored.
    pub user_id: Option<i64>,
    pub assessment: AssessmentRef,
    pub answers: &'a ProgressAnswers,
    pub total_questions: usize,
    pub elapsed_secs: i64,
    pub forced_by_timeout: bool,
    pub time_limit: Option<Duration>,
}

/// Scores finished attempts and appends them to the result ledger.
#[derive(Clone)]
pub struct ResultRecorder {
    results: Arc<dyn ResultStore>,
    progress: ProgressService,
}

impl ResultRecorder {
    pub fn new(results: Arc<dyn ResultStore>, progress: ProgressService) -> Self {
        Self { results, progress }
    }

    /// Computes the outcome and, for signed-in learners, stores it and clears
    /// their in-progress answers.
    ///
    /// Never fails: the learner always gets their score. Storage problems are
    /// logged and reported through `saved: false`; a failed progress cleanup
    /// after a stored result is only logged.
    pub async fn finalize(&self, attempt: Attempt<'_>) -> FinalizeOutcome {
        let summary = tally(attempt.answers, attempt.total_questions);
        let time_spent = effective_time_spent(
            attempt.elapsed_secs,
            attempt.forced_by_timeout,
            attempt.time_limit,
        );

        let Some(user_id) = attempt.user_id else {
            tracing::debug!("Anonymous attempt on {} scored {}", attempt.assessment, summary.score);
            return FinalizeOutcome {
                saved: false,
                summary,
                result: None,
                message: Some("User not logged in".to_string()),
            };
        };

        let record = NewResultRecord {
            user_id,
            assessment: attempt.assessment,
            summary,
            time_spent,
        };

        match self.results.insert_result(record).await {
            Ok(result) => {
                tracing::info!(
                    "User {} finished {} with score {} ({})",
                    user_id,
                    attempt.assessment,
                    summary.score,
                    summary.status.as_str()
                );
                if let Err(e) = self.progress.clear(user_id, attempt.assessment).await {
                    tracing::warn!(
                        "Result {} saved but progress for user {} on {} was not cleared: {}",
                        result.id,
                        user_id,
                        attempt.assessment,
                        e
                    );
                }
                FinalizeOutcome {
                    saved: true,
                    summary,
                    result: Some(result),
                    message: None,
                }
            }
            Err(e) => {
                tracing::error!(
                    "Failed to save result for user {} on {}: {}",
                    user_id,
                    attempt.assessment,
                    e
                );
                FinalizeOutcome {
                    saved: false,
                    summary,
                    result: None,
                    message: Some("Result could not be saved".to_string()),
                }
            }
        }
    }

    /// A user's past results, newest first.
    pub async fn history(&self, user_id: i64) -> Result<Vec<ResultRecord>, PersistError> {
        self.results.results_for_user(user_id).await
    }
}

/// Time charged to an attempt.
///
/// Reported time is clamped to `0..=MAX_TIME_SPENT_SECS`. On timed assessments
/// it cannot exceed the limit, and a forced timeout is charged the full limit.
pub fn effective_time_spent(
    elapsed_secs: i64,
    forced_by_timeout: bool,
    time_limit: Option<Duration>,
) -> i64 {
    let elapsed = elapsed_secs.clamp(0, MAX_TIME_SPENT_SECS);
    match time_limit {
        Some(limit) => {
            let limit = i64::try_from(limit.as_secs()).unwrap_or(MAX_TIME_SPENT_SECS);
            if forced_by_timeout { limit } else { elapsed.min(limit) }
        }
        None => elapsed,
    }
}
