// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::engine::{
    notifier::{Notifier, TracingNotifier},
    progress::ProgressService,
    recorder::ResultRecorder,
    registry::SessionRegistry,
    runner::SessionDeps,
};
use crate::store::{CatalogReader, ProgressStore, ResultStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogReader>,
    pub progress: ProgressService,
    pub recorder: ResultRecorder,
    pub sessions: SessionRegistry,
    pub notifier: Arc<dyn Notifier>,
    pub config: Config,
}

impl AppState {
    /// Wires the engine over a single backing store.
    pub fn new<S>(store: Arc<S>, config: Config) -> Self
    where
        S: CatalogReader + ProgressStore + ResultStore + 'static,
    {
        let progress = ProgressService::new(store.clone());
        Self {
            catalog: store.clone(),
            recorder: ResultRecorder::new(store, progress.clone()),
            progress,
            sessions: SessionRegistry::new(),
            notifier: Arc::new(TracingNotifier),
            config,
        }
    }

    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            progress: self.progress.clone(),
            recorder: self.recorder.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
