// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup and handed to components as a value.

use std::env;
use std::str::FromStr;

/// Cloud Tasks queue used for per-user backfill runs.
pub const SYNC_QUEUE_NAME: &str = "sleep-sync";

/// Header carrying the shared trigger token on `/tasks/*` requests.
pub const TRIGGER_TOKEN_HEADER: &str = "x-sync-trigger-token";

/// Application configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (Cloud Tasks location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    /// Public URL of this service (Cloud Tasks target)
    pub api_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Cloud Storage bucket for raw sleep blobs
    pub sleep_bucket: String,
    /// Base URL of the Fitbit Web API
    pub fitbit_api_url: String,
    /// Days covered by a scheduled incremental run
    pub sync_lookback_days: u32,
    /// Overall deadline for one sync run
    pub sync_run_deadline_secs: u64,
    /// Per-request timeout for Fitbit calls
    pub fitbit_http_timeout_secs: u64,
    /// Streak threshold used when a request does not specify one
    pub streak_default_hours: f64,
    /// Use in-process stores instead of Firestore/Cloud Storage (local dev)
    pub use_memory_store: bool,

    // --- Secrets ---
    /// Shared token required on `/tasks/*` requests
    pub sync_trigger_token: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gcp_project_id", &self.gcp_project_id)
            .field("gcp_region", &self.gcp_region)
            .field("port", &self.port)
            .field("api_url", &self.api_url)
            .field("sleep_bucket", &self.sleep_bucket)
            .field("fitbit_api_url", &self.fitbit_api_url)
            .field("sync_lookback_days", &self.sync_lookback_days)
            .field("sync_run_deadline_secs", &self.sync_run_deadline_secs)
            .field("use_memory_store", &self.use_memory_store)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = parse_env("PORT", 8080)?;

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-west1".to_string()),
            port,
            api_url: env::var("API_URL").unwrap_or_else(|_| format!("http://localhost:{}", port)),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            sleep_bucket: env::var("SLEEP_BUCKET").unwrap_or_else(|_| "sleep".to_string()),
            fitbit_api_url: env::var("FITBIT_API_URL")
                .unwrap_or_else(|_| "https://api.fitbit.com".to_string()),
            sync_lookback_days: parse_nonzero_env("SYNC_LOOKBACK_DAYS", 10)?,
            sync_run_deadline_secs: parse_env("SYNC_RUN_DEADLINE_SECS", 540)?,
            fitbit_http_timeout_secs: parse_env("FITBIT_HTTP_TIMEOUT_SECS", 30)?,
            streak_default_hours: parse_env("STREAK_DEFAULT_HOURS", 7.0)?,
            use_memory_store: parse_env("USE_MEMORY_STORE", false)?,

            sync_trigger_token: env::var("SYNC_TRIGGER_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing("SYNC_TRIGGER_TOKEN"))?,
        })
    }

    /// Config for tests: in-memory stores, short deadlines.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-west1".to_string(),
            port: 8080,
            api_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:4200".to_string(),
            sleep_bucket: "sleep-test".to_string(),
            fitbit_api_url: "http://127.0.0.1:9".to_string(),
            sync_lookback_days: 10,
            sync_run_deadline_secs: 30,
            fitbit_http_timeout_secs: 5,
            streak_default_hours: 7.0,
            use_memory_store: true,
            sync_trigger_token: "test_trigger_token".to_string(),
        }
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_env<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Like `parse_env`, but a zero-length window is rejected at startup.
fn parse_nonzero_env(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match parse_env(name, default)? {
        0 => Err(ConfigError::Invalid(name, "0".to_string())),
        value => Ok(value),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
