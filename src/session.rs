//! Ties the request controller to the history cache.
//!
//! A `Session` is the single owner of UI state. All mutations go through one
//! async mutex, which is released while the network call is pending, so
//! overlapping submissions are allowed and are ordered by the controller's
//! tickets. Successful, non-superseded results are recorded to history.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::controller::{RequestController, RequestState, Resolution};
use crate::history::{EntryId, HistoryCache, HistoryEntry};
use crate::service::models::GenerationResult;
use crate::service::PromptService;
use crate::storage::HistoryStore;

/// What a call to [`Session::submit`] ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank prompt; nothing happened.
    Rejected,
    Succeeded(GenerationResult),
    /// Carries the message now shown as `last_error`.
    Failed(String),
    /// A later submission or history load took over before this one finished.
    Superseded,
}

struct SessionState {
    controller: RequestController,
    history: HistoryCache,
}

#[derive(Clone)]
pub struct Session {
    service: Arc<dyn PromptService>,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    /// Load history from `store` and start idle.
    pub fn open(
        service: Arc<dyn PromptService>,
        store: Box<dyn HistoryStore>,
        capacity: usize,
    ) -> Self {
        let history = HistoryCache::initialize(store, capacity);
        Self {
            service,
            state: Arc::new(Mutex::new(SessionState {
                controller: RequestController::new(),
                history,
            })),
        }
    }

    pub async fn submit(&self, prompt: &str) -> SubmitOutcome {
        let ticket = {
            let mut state = self.state.lock().await;
            match state.controller.begin(prompt) {
                Some(ticket) => ticket,
                None => return SubmitOutcome::Rejected,
            }
        };

        let outcome = self.service.generate(ticket.prompt()).await;

        let mut state = self.state.lock().await;
        match state.controller.resolve(&ticket, outcome) {
            Resolution::Succeeded(result) => {
                let entry = state.history.record(ticket.prompt(), result.clone());
                if !state.history.is_durable() {
                    warn!(id = %entry.id, "history entry not persisted");
                }
                SubmitOutcome::Succeeded(result)
            }
            Resolution::Failed(message) => SubmitOutcome::Failed(message),
            Resolution::Stale => SubmitOutcome::Superseded,
        }
    }

    /// Show a past entry. Returns `None` if `id` isn't in history.
    pub async fn load_from_history(&self, id: EntryId) -> Option<HistoryEntry> {
        let mut state = self.state.lock().await;
        let entry = state.history.get(id).cloned()?;
        state.controller.load_from_history(&entry);
        debug!(%id, "loaded history entry");
        Some(entry)
    }

    pub async fn remove(&self, id: EntryId) -> bool {
        self.state.lock().await.history.remove(id)
    }

    pub async fn set_input(&self, text: &str) {
        self.state.lock().await.controller.set_input(text);
    }

    /// Snapshot of the history, newest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.history.list().to_vec()
    }

    pub async fn state(&self) -> RequestState {
        self.state.lock().await.controller.state().clone()
    }

    pub async fn is_durable(&self) -> bool {
        self.state.lock().await.history.is_durable()
    }
}
