// src/engine/scoring.rs

use crate::models::{
    progress::ProgressAnswers,
    result_record::{ResultStatus, ScoreSummary},
};

/// Scores an attempt.
///
/// Unanswered questions (only possible after a forced timeout) count as wrong.
/// Entries keyed outside `0..total_questions` are ignored.
pub fn tally(answers: &ProgressAnswers, total_questions: usize) -> ScoreSummary {
    let in_range = answers.range(..total_questions);

    let (answered, correct) = in_range.fold((0usize, 0usize), |(answered, correct), (_, ans)| {
        (answered + 1, correct + usize::from(ans.is_correct))
    });
    let wrong_answered = answered - correct;
    let unanswered = total_questions - answered;

    let score = if total_questions == 0 {
        0
    } else {
        ((correct as f64 / total_questions as f64) * 100.0).round() as i32
    };

    ScoreSummary {
        score,
        correct_count: correct as i32,
        wrong_count: (wrong_answered + unanswered) as i32,
        total_questions: total_questions as i32,
        status: ResultStatus::from_score(score),
    }
}
