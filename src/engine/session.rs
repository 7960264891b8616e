// src/engine/session.rs

//! Per-attempt answer state machine.
//!
//! Each question moves `Unanswered -> Answered` exactly once; the attempt
//! moves `InProgress -> Completed` exactly once, either when the last question
//! is answered or when its timer expires. Everything here is synchronous; the
//! async driver lives in `engine::runner`.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::engine::validator::{Verdict, check_answer};
use crate::models::{
    progress::{AnswerRecord, ProgressAnswers},
    question::ResolvedQuestion,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    UnknownQuestion { index: usize, total: usize },
    OptionOutOfRange { index: usize, selected: usize, options: usize },
    ResetNotConfirmed,
    Closed,
    /// A newer session for the same learner and assessment took over.
    Superseded,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownQuestion { index, total } => {
                write!(f, "Question {} does not exist (assessment has {})", index, total)
            }
            SessionError::OptionOutOfRange {
                index,
                selected,
                options,
            } => write!(
                f,
                "Option {} is out of range for question {} ({} options)",
                selected, index, options
            ),
            SessionError::ResetNotConfirmed => write!(f, "Reset must be confirmed"),
            SessionError::Closed => write!(f, "Assessment is already completed"),
            SessionError::Superseded => write!(f, "Session was replaced by a newer one"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    AllAnswered,
    TimerExpired,
}

/// What the learner sees for an answered question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerState {
    pub selected_idx: usize,
    pub is_correct: bool,
    pub effective_correct_idx: usize,
}

impl AnswerState {
    fn new(selected_idx: usize, verdict: Verdict) -> Self {
        Self {
            selected_idx,
            is_correct: verdict.is_correct,
            effective_correct_idx: verdict.effective_correct_idx,
        }
    }
}

/// Result of a submission that did not fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The answer was stored. `completed` is true for the one submission that
    /// answered the last open question.
    Recorded { answer: AnswerState, completed: bool },
    /// The question was answered before; nothing changed.
    AlreadyAnswered(AnswerState),
    /// The attempt is completed; nothing changed.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    /// This many saved answers were applied.
    Applied(usize),
    /// The saved answers already covered every question (an earlier finish
    /// whose cleanup failed); they were ignored.
    StaleComplete,
}

#[derive(Debug, Clone)]
pub struct Session {
    questions: Vec<ResolvedQuestion>,
    answers: BTreeMap<usize, AnswerState>,
    completion: Option<CompletionReason>,
}

impl Session {
    /// `questions` must be the output of `engine::ordering::resolve`.
    pub fn new(questions: Vec<ResolvedQuestion>) -> Self {
        Self {
            questions,
            answers: BTreeMap::new(),
            completion: None,
        }
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    pub fn completion(&self) -> Option<CompletionReason> {
        self.completion
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_some()
    }

    pub fn answers(&self) -> &BTreeMap<usize, AnswerState> {
        &self.answers
    }

    /// The answers in their persisted shape.
    pub fn progress_answers(&self) -> ProgressAnswers {
        self.answers
            .iter()
            .map(|(&idx, state)| {
                (
                    idx,
                    AnswerRecord {
                        selected_idx: state.selected_idx,
                        is_correct: state.is_correct,
                    },
                )
            })
            .collect()
    }

    /// Rehydrates answers saved by an earlier visit.
    ///
    /// Verdicts are recomputed through the validator so a restored question
    /// highlights exactly as it did when first answered. Entries that no
    /// longer fit the assessment are dropped.
    pub fn restore(&mut self, saved: &ProgressAnswers) -> Restore {
        if self.is_completed() {
            return Restore::Applied(0);
        }

        let mut restored = BTreeMap::new();
        for (&idx, record) in saved {
            let Some(resolved) = self.questions.get(idx) else {
                tracing::debug!("Dropping saved answer for missing question index {}", idx);
                continue;
            };
            let options = resolved.question.options.len();
            if options > 0 && record.selected_idx >= options {
                tracing::debug!(
                    "Dropping saved answer {} for question {}: only {} options",
                    record.selected_idx,
                    resolved.question.id,
                    options
                );
                continue;
            }
            let verdict = check_answer(&resolved.question, record.selected_idx);
            restored.insert(idx, AnswerState::new(record.selected_idx, verdict));
        }

        if !self.questions.is_empty() && restored.len() == self.questions.len() {
            return Restore::StaleComplete;
        }

        let count = restored.len();
        for (idx, state) in restored {
            self.answers.entry(idx).or_insert(state);
        }
        Restore::Applied(count)
    }

    /// Records `selected_idx` for the question at `global_index`.
    pub fn submit(&mut self, global_index: usize, selected_idx: usize) -> Result<Submission, SessionError> {
        if self.is_completed() {
            return Ok(Submission::Closed);
        }

        let total = self.questions.len();
        let resolved = self
            .questions
            .get(global_index)
            .ok_or(SessionError::UnknownQuestion {
                index: global_index,
                total,
            })?;

        let options = resolved.question.options.len();
        if options > 0 && selected_idx >= options {
            return Err(SessionError::OptionOutOfRange {
                index: global_index,
                selected: selected_idx,
                options,
            });
        }

        if let Some(existing) = self.answers.get(&global_index) {
            return Ok(Submission::AlreadyAnswered(*existing));
        }

        let answer = AnswerState::new(selected_idx, check_answer(&resolved.question, selected_idx));
        self.answers.insert(global_index, answer);

        let completed = self.answers.len() == total;
        if completed {
            self.completion = Some(CompletionReason::AllAnswered);
        }

        Ok(Submission::Recorded { answer, completed })
    }

    /// Timer expiry. Returns `true` only for the call that completed the attempt.
    pub fn expire(&mut self) -> bool {
        if self.is_completed() {
            return false;
        }
        self.completion = Some(CompletionReason::TimerExpired);
        true
    }

    /// Clears every answer. Destructive, so it must be confirmed.
    pub fn reset(&mut self, confirmed: bool) -> Result<(), SessionError> {
        if !confirmed {
            return Err(SessionError::ResetNotConfirmed);
        }
        if self.is_completed() {
            return Err(SessionError::Closed);
        }
        self.answers.clear();
        Ok(())
    }
}

/// Re-grades a client-supplied answer mapping against the resolved questions.
///
/// Client-side `isCorrect` flags are never trusted. Indices and selections
/// that do not fit the assessment are rejected.
pub fn regrade(
    questions: &[ResolvedQuestion],
    answers: &ProgressAnswers,
) -> Result<ProgressAnswers, SessionError> {
    let total = questions.len();
    answers
        .iter()
        .map(|(&idx, record)| {
            let resolved = questions
                .get(idx)
                .ok_or(SessionError::UnknownQuestion { index: idx, total })?;
            let options = resolved.question.options.len();
            if options > 0 && record.selected_idx >= options {
                return Err(SessionError::OptionOutOfRange {
                    index: idx,
                    selected: record.selected_idx,
                    options,
                });
            }
            let verdict = check_answer(&resolved.question, record.selected_idx);
            Ok((
                idx,
                AnswerRecord {
                    selected_idx: record.selected_idx,
                    is_correct: verdict.is_correct,
                },
            ))
        })
        .collect()
}
