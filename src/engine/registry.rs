// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::engine::runner::ActiveSession;
use crate::models::assessment::AssessmentRef;

#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, Arc<ActiveSession>>,
    /// A signed-in learner has at most one live session per assessment.
    by_owner: HashMap<(i64, AssessmentRef), Uuid>,
}

/// Live sessions by id, indexed by owner.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<Sessions>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session`. Returns the owner's previous session for the same
    /// assessment, now unregistered, which the caller must retire.
    pub async fn insert(&self, session: Arc<ActiveSession>) -> Option<Arc<ActiveSession>> {
        let id = session.id();
        let owner = session.owner().map(|user_id| (user_id, session.assessment()));

        let mut sessions = self.sessions.write().await;
        sessions.by_id.insert(id, session);
        let previous = owner.and_then(|key| sessions.by_owner.insert(key, id))?;
        if previous == id {
            return None;
        }
        sessions.by_id.remove(&previous)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<ActiveSession>> {
        self.sessions.read().await.by_id.get(&id).cloned()
    }

    /// Unregisters and returns the learner's live session on `assessment`.
    pub async fn take_owned(&self, user_id: i64, assessment: AssessmentRef) -> Option<Arc<ActiveSession>> {
        let mut sessions = self.sessions.write().await;
        let id = sessions.by_owner.remove(&(user_id, assessment))?;
        sessions.by_id.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.by_id.is_empty()
    }

    /// Drops sessions completed, or left idle, for longer than `retention`.
    ///
    /// Idle signed-in attempts remain resumable from their saved progress.
    pub async fn purge(&self, retention: Duration) -> usize {
        let snapshot: Vec<(Uuid, Arc<ActiveSession>)> = self
            .sessions
            .read()
            .await
            .by_id
            .iter()
            .map(|(id, session)| (*id, session.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, session) in snapshot {
            let done = session.completed_for().await.is_some_and(|d| d >= retention);
            if done || session.idle_for().await >= retention {
                expired.push(id);
            }
        }

        if expired.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().await;
        for id in &expired {
            sessions.by_id.remove(id);
        }
        sessions.by_owner.retain(|_, id| !expired.contains(id));
        tracing::debug!("Purged {} sessions, {} remain", expired.len(), sessions.by_id.len());
        expired.len()
    }
}

/// Periodically purges stale sessions for the life of the process.
pub fn spawn_janitor(registry: SessionRegistry, retention: Duration) -> tokio::task::JoinHandle<()> {
    let period = (retention / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            registry.purge(retention).await;
        }
    })
}
