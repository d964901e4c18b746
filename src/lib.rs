// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Sleep-Sync: keep a local copy of every user's Fitbit sleep history.
//!
//! This crate provides the backend API and the sync engine that works out
//! which days are missing, fetches them from Fitbit, and writes them to
//! Cloud Storage and Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod ports;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use models::SyncMode;
use ports::{ObjectStore, SleepApi, SleepStore, UserDirectory};
use services::{RunContext, SyncOrchestrator, TasksService, UpstreamFetcher};
use std::sync::Arc;
use std::time::Duration;
use time_utils::Clock;
use tokio_util::sync::CancellationToken;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserDirectory>,
    pub sleep_store: Arc<dyn SleepStore>,
    pub object_store: Arc<dyn ObjectStore>,
    pub sleep_api: Arc<dyn SleepApi>,
    pub tasks_service: TasksService,
    pub clock: Arc<dyn Clock>,
    /// Cancelled on SIGTERM; every run watches a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build an orchestrator over this state's collaborators.
    pub fn orchestrator(&self, mode: SyncMode) -> SyncOrchestrator {
        SyncOrchestrator::new(
            UpstreamFetcher::new(self.sleep_api.clone()),
            self.sleep_store.clone(),
            self.object_store.clone(),
            mode,
        )
    }

    /// Deadline and cancellation for a run starting now.
    pub fn run_context(&self) -> RunContext {
        RunContext::with_budget(
            Duration::from_secs(self.config.sync_run_deadline_secs),
            self.shutdown.child_token(),
        )
    }
}
