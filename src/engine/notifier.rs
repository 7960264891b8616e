// src/engine/notifier.rs

use uuid::Uuid;

use crate::engine::session::CompletionReason;
use crate::models::{assessment::AssessmentRef, result_record::ScoreSummary};

/// Something the learner's UI may want to surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Completed {
        session_id: Uuid,
        assessment: AssessmentRef,
        reason: CompletionReason,
        summary: ScoreSummary,
        saved: bool,
    },
    /// A background progress write failed; the attempt continues but may not
    /// be resumable.
    ProgressNotSaved {
        session_id: Uuid,
        assessment: AssessmentRef,
        error: String,
    },
}

/// Delivery of session events (banners, toasts, e-mail...) is not the
/// engine's business; it only reports them here.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

/// Default notifier: writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: SessionEvent) {
        match event {
            SessionEvent::Completed {
                session_id,
                assessment,
                reason,
                summary,
                saved,
            } => tracing::info!(
                %session_id,
                %assessment,
                ?reason,
                score = summary.score,
                saved,
                "Session completed"
            ),
            SessionEvent::ProgressNotSaved {
                session_id,
                assessment,
                error,
            } => tracing::warn!(%session_id, %assessment, "Progress not saved: {}", error),
        }
    }
}
