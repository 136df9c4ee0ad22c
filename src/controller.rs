//! Request lifecycle state machine.
//!
//! `idle -> loading -> {succeeded, failed} -> loading -> ...`
//!
//! The controller never awaits anything itself. A submission is split into
//! `begin` (before the network call) and `resolve` (after it), each applied
//! on whatever single thread owns the controller. Every `begin` issues a
//! ticket carrying a generation number; a resolution is applied only if its
//! ticket is still the latest, so an older call that finishes late can't
//! clobber a newer one.

use serde::Serialize;
use tracing::{debug, info};

use crate::history::HistoryEntry;
use crate::service::models::GenerationResult;
use crate::service::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestState {
    pub status: RequestStatus,
    pub input_text: String,
    /// Last successful result. Kept while a new call is loading, and kept
    /// after a failure, so the screen never flashes blank.
    pub current_result: Option<GenerationResult>,
    pub last_error: Option<String>,
}

impl Default for RequestState {
    fn default() -> Self {
        Self {
            status: RequestStatus::Idle,
            input_text: String::new(),
            current_result: None,
            last_error: None,
        }
    }
}

/// Handle for one in-flight submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    prompt: String,
}

impl Ticket {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// What `resolve` did with an outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Succeeded(GenerationResult),
    Failed(String),
    /// A newer submission (or a history load) superseded this ticket.
    Stale,
}

#[derive(Debug, Default)]
pub struct RequestController {
    state: RequestState,
    generation: u64,
}

impl RequestController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    /// Update the text being composed without submitting it.
    pub fn set_input(&mut self, text: &str) {
        self.state.input_text = text.to_string();
    }

    /// Start a submission. Blank prompts are rejected with no state change.
    pub fn begin(&mut self, prompt: &str) -> Option<Ticket> {
        if prompt.trim().is_empty() {
            debug!("ignoring blank prompt");
            return None;
        }

        self.generation += 1;
        self.state.status = RequestStatus::Loading;
        self.state.input_text = prompt.to_string();
        self.state.last_error = None;

        debug!(generation = self.generation, "submission started");
        Some(Ticket {
            generation: self.generation,
            prompt: prompt.to_string(),
        })
    }

    /// Apply the outcome of the call behind `ticket`.
    pub fn resolve(
        &mut self,
        ticket: &Ticket,
        outcome: Result<GenerationResult, ServiceError>,
    ) -> Resolution {
        if ticket.generation != self.generation {
            info!(
                generation = ticket.generation,
                latest = self.generation,
                "discarding superseded response"
            );
            return Resolution::Stale;
        }

        match outcome {
            Ok(result) => {
                self.state.status = RequestStatus::Succeeded;
                self.state.current_result = Some(result.clone());
                self.state.last_error = None;
                Resolution::Succeeded(result)
            }
            Err(e) => {
                let message = e.user_message();
                info!(error = %e, "generation failed");
                self.state.status = RequestStatus::Failed;
                self.state.last_error = Some(message.clone());
                Resolution::Failed(message)
            }
        }
    }

    /// Show a past entry as if it had just been generated. Also supersedes
    /// any call still in flight.
    pub fn load_from_history(&mut self, entry: &HistoryEntry) {
        self.generation += 1;
        self.state.status = RequestStatus::Succeeded;
        self.state.input_text = entry.prompt.clone();
        self.state.current_result = Some(entry.result.clone());
        self.state.last_error = None;
    }
}
