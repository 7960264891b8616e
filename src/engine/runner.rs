// src/engine/runner.rs

//! Async driver around `Session`: timer, background progress writes, and the
//! hand-off to the result recorder.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::engine::{
    notifier::{Notifier, SessionEvent},
    ordering::resolve,
    progress::ProgressService,
    recorder::{Attempt, ResultRecorder},
    session::{AnswerState, CompletionReason, Restore, Session, SessionError, Submission},
};
use crate::models::{
    assessment::AssessmentRef,
    progress::ProgressAnswers,
    question::Question,
    result_record::FinalizeOutcome,
};

/// Collaborators every session needs.
#[derive(Clone)]
pub struct SessionDeps {
    pub progress: ProgressService,
    pub recorder: ResultRecorder,
    pub notifier: Arc<dyn Notifier>,
}

/// Work queued for a session's progress writer.
enum PersistCommand {
    Save(ProgressAnswers),
    Clear,
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Accepted,
    Duplicate,
    Closed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerState>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FinalizeOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub assessment: AssessmentRef,
    pub total_questions: usize,
    pub answered: usize,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u64>,
    pub answers: BTreeMap<usize, AnswerState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FinalizeOutcome>,
}

/// One learner's live attempt.
pub struct ActiveSession {
    id: Uuid,
    user_id: Option<i64>,
    assessment: AssessmentRef,
    time_limit: Option<Duration>,
    started_at: Instant,
    /// Attempt time spent in earlier sessions before this one started.
    used_before_start: Duration,
    state: Mutex<Session>,
    outcome: Mutex<Option<FinalizeOutcome>>,
    last_activity: Mutex<Instant>,
    completed_at: Mutex<Option<Instant>>,
    timer_cancel: Mutex<Option<oneshot::Sender<()>>>,
    retired: AtomicBool,
    /// Present for signed-in learners only; anonymous attempts are not resumable.
    writer: Option<mpsc::UnboundedSender<PersistCommand>>,
    deps: SessionDeps,
}

impl ActiveSession {
    /// Starts an attempt over `questions` (as read from the catalog).
    ///
    /// Signed-in learners get their saved answers back before the first
    /// snapshot, and a saved attempt keeps counting from when it began.
    /// A `time_limit` arms the countdown immediately.
    pub async fn start(
        deps: SessionDeps,
        user_id: Option<i64>,
        assessment: AssessmentRef,
        questions: Vec<Question>,
        time_limit: Option<Duration>,
    ) -> Arc<Self> {
        Self::begin(deps, user_id, assessment, questions, time_limit, Duration::ZERO).await
    }

    /// Retires `previous` and continues its attempt in a new session.
    ///
    /// The old timer is cancelled and its pending writes land first, so the
    /// new session sees every answer and inherits the time already used.
    pub async fn take_over(
        previous: Arc<ActiveSession>,
        deps: SessionDeps,
        questions: Vec<Question>,
        time_limit: Option<Duration>,
    ) -> Arc<Self> {
        let used = previous.retire().await.unwrap_or(Duration::ZERO);
        Self::begin(deps, previous.user_id, previous.assessment, questions, time_limit, used).await
    }

    async fn begin(
        deps: SessionDeps,
        user_id: Option<i64>,
        assessment: AssessmentRef,
        questions: Vec<Question>,
        time_limit: Option<Duration>,
        mut used: Duration,
    ) -> Arc<Self> {
        let id = Uuid::new_v4();
        let mut session = Session::new(resolve(questions));

        if let Some(user_id) = user_id {
            match deps.progress.record(user_id, assessment).await {
                Ok(None) => {}
                Ok(Some(record)) => match session.restore(&record.answers) {
                    Restore::StaleComplete => {
                        tracing::info!(
                            "Saved progress for user {} on {} was already complete; starting fresh",
                            user_id,
                            assessment
                        );
                        used = Duration::ZERO;
                        if let Err(e) = deps.progress.clear(user_id, assessment).await {
                            tracing::warn!("Failed to clear stale progress: {}", e);
                        }
                    }
                    Restore::Applied(count) => {
                        if count > 0 {
                            tracing::debug!("Restored {} answers for user {} on {}", count, user_id, assessment);
                        }
                        if let Some(began) = record.started_at {
                            used = used.max(since(began));
                        }
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        "Could not load progress for user {} on {}, starting without it: {}",
                        user_id,
                        assessment,
                        e
                    );
                }
            }
        }

        let writer = user_id.map(|user_id| {
            spawn_writer(
                id,
                user_id,
                assessment,
                session.total(),
                deps.progress.clone(),
                deps.notifier.clone(),
            )
        });

        let now = Instant::now();
        let active = Arc::new(Self {
            id,
            user_id,
            assessment,
            time_limit,
            started_at: now,
            used_before_start: used,
            state: Mutex::new(session),
            outcome: Mutex::new(None),
            last_activity: Mutex::new(now),
            completed_at: Mutex::new(None),
            timer_cancel: Mutex::new(None),
            retired: AtomicBool::new(false),
            writer,
            deps,
        });

        tracing::debug!("Session {} started on {}", id, assessment);

        if let Some(limit) = time_limit {
            let remaining = limit.saturating_sub(used);
            if remaining.is_zero() {
                tracing::info!("Session {} resumed with no time left", id);
                active.expire().await;
            } else {
                active.arm_timer(remaining).await;
            }
        }

        active
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn assessment(&self) -> AssessmentRef {
        self.assessment
    }

    pub fn owner(&self) -> Option<i64> {
        self.user_id
    }

    /// Attempt time used so far, across every session of the attempt.
    pub fn elapsed(&self) -> Duration {
        self.used_before_start + self.started_at.elapsed()
    }

    /// Anonymous sessions are reachable by anyone holding their id; owned
    /// sessions only by their owner.
    pub fn is_visible_to(&self, user_id: Option<i64>) -> bool {
        match self.user_id {
            Some(owner) => user_id == Some(owner),
            None => true,
        }
    }

    pub async fn submit(
        &self,
        global_index: usize,
        selected_idx: usize,
    ) -> Result<SubmitResponse, SessionError> {
        self.touch().await;

        let submission = {
            let mut session = self.state.lock().await;
            if self.retired.load(Ordering::SeqCst) {
                return Err(SessionError::Superseded);
            }
            let submission = session.submit(global_index, selected_idx)?;
            if matches!(submission, Submission::Recorded { .. }) {
                // Queued under the lock so writes land in submission order.
                self.persist(PersistCommand::Save(session.progress_answers()));
            }
            submission
        };

        match submission {
            Submission::Recorded { answer, completed } => {
                let result = if completed {
                    Some(self.finish(CompletionReason::AllAnswered).await)
                } else {
                    None
                };
                Ok(SubmitResponse {
                    status: SubmitStatus::Accepted,
                    answer: Some(answer),
                    completed,
                    result,
                })
            }
            Submission::AlreadyAnswered(answer) => Ok(SubmitResponse {
                status: SubmitStatus::Duplicate,
                answer: Some(answer),
                completed: false,
                result: None,
            }),
            Submission::Closed => Ok(SubmitResponse {
                status: SubmitStatus::Closed,
                answer: None,
                completed: true,
                result: self.outcome.lock().await.clone(),
            }),
        }
    }

    /// Timer expiry: completes the attempt unless it already is.
    pub async fn expire(&self) -> Option<FinalizeOutcome> {
        let fired = {
            let mut session = self.state.lock().await;
            !self.retired.load(Ordering::SeqCst) && session.expire()
        };
        if fired {
            Some(self.finish(CompletionReason::TimerExpired).await)
        } else {
            None
        }
    }

    /// Clears all answers, in memory and in storage.
    pub async fn reset(&self, confirmed: bool) -> Result<(), SessionError> {
        self.touch().await;
        {
            let mut session = self.state.lock().await;
            if self.retired.load(Ordering::SeqCst) {
                return Err(SessionError::Superseded);
            }
            session.reset(confirmed)?;
            self.persist(PersistCommand::Clear);
        }
        self.flush().await;
        tracing::info!("Session {} on {} was reset", self.id, self.assessment);
        Ok(())
    }

    /// Stops this session for good: its timer is cancelled, queued writes
    /// land, and later answers are refused. Returns the attempt time used
    /// when the attempt was still in progress.
    pub async fn retire(&self) -> Option<Duration> {
        let in_progress = {
            let session = self.state.lock().await;
            self.retired.store(true, Ordering::SeqCst);
            session.completion().is_none()
        };
        self.cancel_timer().await;
        self.flush().await;
        tracing::info!("Session {} on {} was superseded", self.id, self.assessment);
        in_progress.then(|| self.elapsed())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (total_questions, answered, completion, answers) = {
            let session = self.state.lock().await;
            (
                session.total(),
                session.answered(),
                session.completion(),
                session.answers().clone(),
            )
        };

        let remaining_secs = match (self.time_limit, completion) {
            (Some(limit), None) => Some(limit.saturating_sub(self.elapsed()).as_secs()),
            _ => None,
        };

        SessionSnapshot {
            session_id: self.id,
            assessment: self.assessment,
            total_questions,
            answered,
            completed: completion.is_some(),
            completion,
            time_limit_secs: self.time_limit.map(|limit| limit.as_secs()),
            remaining_secs,
            answers,
            result: self.outcome.lock().await.clone(),
        }
    }

    /// Time since the attempt completed, if it has.
    pub async fn completed_for(&self) -> Option<Duration> {
        self.completed_at.lock().await.map(|at| at.elapsed())
    }

    pub async fn idle_for(&self) -> Duration {
        self.last_activity.lock().await.elapsed()
    }

    async fn touch(&self) {
        *self.last_activity.lock().await = Instant::now();
    }

    async fn arm_timer(self: &Arc<Self>, limit: Duration) {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        *self.timer_cancel.lock().await = Some(cancel_tx);

        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    tracing::info!("Session {} ran out of time", session.id);
                    session.expire().await;
                }
                _ = cancel_rx => {}
            }
        });
    }

    async fn cancel_timer(&self) {
        if let Some(cancel) = self.timer_cancel.lock().await.take() {
            let _ = cancel.send(());
        }
    }

    fn persist(&self, command: PersistCommand) {
        if let Some(writer) = &self.writer {
            if writer.send(command).is_err() {
                tracing::warn!("Progress writer for session {} is gone", self.id);
            }
        }
    }

    /// Waits until every queued progress write has been attempted.
    async fn flush(&self) {
        if let Some(writer) = &self.writer {
            let (ack_tx, ack_rx) = oneshot::channel();
            if writer.send(PersistCommand::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }

    /// Runs once per session, from whichever trigger completed it.
    async fn finish(&self, reason: CompletionReason) -> FinalizeOutcome {
        self.cancel_timer().await;

        let (answers, total_questions) = {
            let session = self.state.lock().await;
            (session.progress_answers(), session.total())
        };

        // Pending saves must land before finalize clears the record.
        self.flush().await;

        let elapsed_secs = i64::try_from(self.elapsed().as_secs()).unwrap_or(i64::MAX);
        let outcome = self
            .deps
            .recorder
            .finalize(Attempt {
                user_id: self.user_id,
                assessment: self.assessment,
                answers: &answers,
                total_questions,
                elapsed_secs,
                forced_by_timeout: reason == CompletionReason::TimerExpired,
                time_limit: self.time_limit,
            })
            .await;

        self.deps.notifier.notify(SessionEvent::Completed {
            session_id: self.id,
            assessment: self.assessment,
            reason,
            summary: outcome.summary,
            saved: outcome.saved,
        });

        *self.outcome.lock().await = Some(outcome.clone());
        *self.completed_at.lock().await = Some(Instant::now());
        outcome
    }
}

/// Wall-clock time since `began`; zero when it lies in the future.
fn since(began: DateTime<Utc>) -> Duration {
    (Utc::now() - began).to_std().unwrap_or(Duration::ZERO)
}

/// Serializes one session's progress writes. Failures are reported to the
/// notifier and never reach the learner's request.
fn spawn_writer(
    session_id: Uuid,
    user_id: i64,
    assessment: AssessmentRef,
    total_questions: usize,
    progress: ProgressService,
    notifier: Arc<dyn Notifier>,
) -> mpsc::UnboundedSender<PersistCommand> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let result = match command {
                PersistCommand::Save(answers) => {
                    progress.save(user_id, assessment, &answers, total_questions).await
                }
                PersistCommand::Clear => progress.clear(user_id, assessment).await,
                PersistCommand::Flush(ack) => {
                    let _ = ack.send(());
                    continue;
                }
            };

            if let Err(e) = result {
                notifier.notify(SessionEvent::ProgressNotSaved {
                    session_id,
                    assessment,
                    error: e.to_string(),
                });
            }
        }
    });

    tx
}
