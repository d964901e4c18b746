//! Sync run reports.
//!
//! A run never fails as a whole: every per-day and per-user failure lands in
//! the report instead, so callers (and the logs) can see exactly where each
//! user's loop stopped.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How a run chooses days and talks to the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "spa/src/app/generated/")
)]
pub enum SyncMode {
    /// Most recent `lookback_days`, one request per missing day.
    Incremental { lookback_days: u32 },
    /// Everything since the user's `memberSince`, fetched in bounded ranges.
    Backfill,
}

/// Why a user's loop stopped before working through its whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "spa/src/app/generated/")
)]
pub enum UserSyncError {
    #[error("Fitbit rate limit reached")]
    RateLimited,

    #[error("Fitbit rejected the access token")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Upstream failure: {0}")]
    Transient(String),

    #[error("Run deadline elapsed or run cancelled")]
    Cancelled,
}

/// Per-user counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "spa/src/app/generated/")
)]
pub struct UserSyncReport {
    pub user_id: String,
    /// Days the planner asked for.
    pub planned: usize,
    /// Days that came back with data.
    pub fetched: usize,
    /// Fetched days written to both sinks without error.
    pub persisted: usize,
    /// Days the upstream answered with no data (re-planned next run).
    pub empty: usize,
    /// Days in the window that were already stored.
    pub skipped_already_present: usize,
    /// Fetches that failed transiently and were skipped.
    pub transient_failures: usize,
    /// Fetched records with at least one failed sink write.
    pub store_failures: usize,
    /// Set when the loop stopped early.
    pub terminal: Option<UserSyncError>,
}

impl UserSyncReport {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Returns true if the user's whole plan was worked through.
    pub fn is_complete(&self) -> bool {
        self.terminal.is_none()
    }

    /// Returns true if the loop stopped on the upstream rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.terminal, Some(UserSyncError::RateLimited))
    }
}

/// Summary of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "spa/src/app/generated/")
)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Run start (ISO 8601)
    pub started_at: String,
    /// Run end (ISO 8601)
    pub finished_at: String,
    pub users: Vec<UserSyncReport>,
    /// Users whose loop was started (including one interrupted mid-way).
    pub users_processed: usize,
    /// Users skipped because the deadline elapsed or the run was cancelled.
    pub users_not_attempted: usize,
}

impl SyncReport {
    pub fn new(mode: SyncMode, started_at: String) -> Self {
        Self {
            mode,
            started_at,
            finished_at: String::new(),
            users: Vec::new(),
            users_processed: 0,
            users_not_attempted: 0,
        }
    }

    pub fn total_fetched(&self) -> usize {
        self.users.iter().map(|u| u.fetched).sum()
    }

    pub fn total_persisted(&self) -> usize {
        self.users.iter().map(|u| u.persisted).sum()
    }

    /// Users whose loop stopped early, for any reason.
    pub fn incomplete_users(&self) -> impl Iterator<Item = &UserSyncReport> {
        self.users.iter().filter(|u| !u.is_complete())
    }

    /// Find the report for one user.
    pub fn user(&self, user_id: &str) -> Option<&UserSyncReport> {
        self.users.iter().find(|u| u.user_id == user_id)
    }
}
