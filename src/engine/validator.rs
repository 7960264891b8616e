// src/engine/validator.rs

use serde::Serialize;

use crate::models::question::Question;

/// Outcome of checking one selected option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_correct: bool,
    /// Option to highlight as correct. Always a valid option index.
    pub effective_correct_idx: usize,
    /// The question's declared answer is unusable.
    #[serde(skip)]
    pub integrity_fault: bool,
}

/// Decides whether `selected_idx` (0-based) is the declared correct answer.
///
/// `correct_answer_index` is 1-based as stored. When it is missing or does not
/// name one of the `option_count` options, the question data is corrupt: the
/// learner gets the benefit of the doubt and their own choice is reported as
/// the correct one, so the UI never shows a wrong answer with nothing green.
pub fn validate(selected_idx: usize, correct_answer_index: Option<i32>, option_count: usize) -> Verdict {
    let correct0 = correct_answer_index
        .map(|declared| i64::from(declared) - 1)
        .filter(|idx| *idx >= 0 && (*idx as u64) < option_count as u64);

    match correct0 {
        Some(idx) => {
            let idx = idx as usize;
            Verdict {
                is_correct: selected_idx == idx,
                effective_correct_idx: idx,
                integrity_fault: false,
            }
        }
        None => Verdict {
            is_correct: true,
            effective_correct_idx: selected_idx,
            integrity_fault: true,
        },
    }
}

/// `validate` against a question, logging corrupt answer data for operators.
pub fn check_answer(question: &Question, selected_idx: usize) -> Verdict {
    let verdict = validate(selected_idx, question.correct_answer_index, question.options.len());
    if verdict.integrity_fault {
        tracing::warn!(
            question_id = question.id,
            assessment = %question.owner,
            correct_answer_index = ?question.correct_answer_index,
            option_count = question.options.len(),
            "Question has an invalid correct answer index; accepting the learner's choice"
        );
    }
    verdict
}
