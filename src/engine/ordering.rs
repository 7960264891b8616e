// src/engine/ordering.rs

use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::models::question::{PublicQuestion, Question, QuestionPage, ResolvedQuestion};

/// Places an assessment's questions in their display order.
///
/// When every question carries a positive stored `number`, that numbering is
/// authoritative (ties fall back to id so the order is total). Otherwise the
/// questions are ordered by id and renumbered densely from 1. Stored numbers
/// are never modified here.
///
/// The result only depends on the input set, not its order, so answer indices
/// saved by a learner keep pointing at the same question across reloads.
pub fn resolve(mut questions: Vec<Question>) -> Vec<ResolvedQuestion> {
    let numbered = questions
        .iter()
        .all(|q| q.number.is_some_and(|n| n > 0));

    if numbered {
        questions.sort_by_key(|q| (q.number.unwrap_or_default(), q.id));
    } else {
        questions.sort_by_key(|q| q.id);
    }

    questions
        .into_iter()
        .enumerate()
        .map(|(global_index, question)| {
            let display_number = match question.number {
                Some(n) if numbered => n,
                _ => global_index as i32 + 1,
            };
            ResolvedQuestion {
                question,
                display_number,
                global_index,
            }
        })
        .collect()
}

/// Normalizes `page`/`limit` query values: page defaults to 1, limit to
/// `DEFAULT_PAGE_LIMIT`, capped at `MAX_PAGE_LIMIT`.
pub fn page_bounds(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = limit
        .filter(|l| *l >= 1)
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .min(MAX_PAGE_LIMIT);
    (page, limit)
}

/// Slices one page out of a fully resolved assessment.
/// Global indices are preserved, so page 2 starts at `limit`, not 0.
pub fn paginate(resolved: Vec<ResolvedQuestion>, page: u32, limit: u32) -> QuestionPage {
    let total = resolved.len();
    let offset = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);

    let questions = resolved
        .into_iter()
        .skip(offset)
        .take(limit as usize)
        .map(PublicQuestion::from)
        .collect();

    QuestionPage {
        total,
        page,
        limit,
        questions,
    }
}
