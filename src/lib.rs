//! PromptCraft -- prompt generation client with a persisted session history.
//!
//! This crate provides the client-side core: the request lifecycle for a
//! single in-flight generation call, the bounded history of past results,
//! and the storage and HTTP plumbing they sit on.

pub mod config;
pub mod controller;
pub mod history;
pub mod service;
pub mod session;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

use crate::config::PromptCraftConfig;
use crate::service::HttpPromptService;
use crate::session::Session;
use crate::storage::SqliteStore;

/// Open a session against the configured service, with history persisted in
/// the configured SQLite database.
pub fn open_session(config: &PromptCraftConfig) -> Result<Session> {
    tracing::debug!(url = %config.service.base_url, "building service client");
    let service = HttpPromptService::new(&config.service)?;
    let store = SqliteStore::open(&config.history.db_path, &config.history.key)?;
    Ok(Session::open(
        Arc::new(service),
        Box::new(store),
        config.history.capacity,
    ))
}
