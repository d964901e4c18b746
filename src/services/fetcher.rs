// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upstream sleep fetching.
//!
//! Turns raw Fitbit responses into [`SleepRecord`]s and decides, once, what
//! every failure means: rate limited, unauthorized, or transient. Nothing
//! here retries; the orchestrator owns that policy.

use crate::models::{SleepRecord, User, UserSyncError};
use crate::ports::{HttpFailure, SleepApi};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fitbit caps sleep range requests at 100 days.
pub const MAX_RANGE_DAYS: u32 = 100;

/// Classified fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Rate limited (429)")]
    RateLimited,

    #[error("Unauthorized (401)")]
    Unauthorized,

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Invalid fetch input: {0}")]
    InvalidInput(String),
}

impl FetchError {
    /// Whether the user's loop must stop.
    pub fn stops_user(&self) -> bool {
        !matches!(self, FetchError::Transient(_))
    }
}

impl From<HttpFailure> for FetchError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Status(429) => FetchError::RateLimited,
            HttpFailure::Status(401) => FetchError::Unauthorized,
            HttpFailure::Status(code) => FetchError::Transient(format!("HTTP {}", code)),
            HttpFailure::Network(msg) => FetchError::Transient(msg),
        }
    }
}

impl From<FetchError> for UserSyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RateLimited => UserSyncError::RateLimited,
            FetchError::Unauthorized => UserSyncError::Unauthorized,
            FetchError::Transient(cause) => UserSyncError::Transient(cause),
            FetchError::InvalidInput(msg) => UserSyncError::InvalidInput(msg),
        }
    }
}

/// Result of asking for a single day.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Record(SleepRecord),
    /// Well-formed response with no sleep logged for the day.
    Empty,
}

/// Sleep log as returned inside Fitbit's `sleep` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepLog {
    date_of_sleep: NaiveDate,
    duration: u64,
    minutes_asleep: Option<u32>,
    efficiency: Option<u32>,
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    is_main_sleep: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    user: ProfileUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUser {
    member_since: Option<String>,
}

/// Fetches and interprets sleep data for one user at a time.
#[derive(Clone)]
pub struct UpstreamFetcher {
    api: Arc<dyn SleepApi>,
}

impl UpstreamFetcher {
    pub fn new(api: Arc<dyn SleepApi>) -> Self {
        Self { api }
    }

    /// Fetch one day's sleep.
    pub async fn fetch_day(&self, user: &User, date: NaiveDate) -> Result<DayOutcome, FetchError> {
        let body = self
            .api
            .get_day(&user.access_token, &user.user_id, date)
            .await?;

        let record = parse_sleep_response(&user.user_id, &body)?
            .into_iter()
            .find(|record| record.date_of_sleep == date);

        Ok(match record {
            Some(record) => DayOutcome::Record(record),
            None => DayOutcome::Empty,
        })
    }

    /// Fetch every logged day in `[start, end]`.
    ///
    /// Days with no data are simply absent from the result.
    pub async fn fetch_range(
        &self,
        user: &User,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SleepRecord>, FetchError> {
        if start > end {
            return Err(FetchError::InvalidInput(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        let span = (end - start).num_days() + 1;
        if span > i64::from(MAX_RANGE_DAYS) {
            return Err(FetchError::InvalidInput(format!(
                "range of {} days exceeds the {} day limit",
                span, MAX_RANGE_DAYS
            )));
        }

        let body = self
            .api
            .get_range(&user.access_token, &user.user_id, start, end)
            .await?;

        Ok(parse_sleep_response(&user.user_id, &body)?
            .into_iter()
            .filter(|record| record.date_of_sleep >= start && record.date_of_sleep <= end)
            .collect())
    }

    /// The user's `memberSince` date, if the profile has one.
    pub async fn member_since(&self, user: &User) -> Result<Option<NaiveDate>, FetchError> {
        let body = self
            .api
            .get_profile(&user.access_token, &user.user_id)
            .await?;

        let profile: ProfileResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::Transient(format!("Invalid profile response: {}", e)))?;

        Ok(profile
            .user
            .member_since
            .as_deref()
            .and_then(crate::time_utils::parse_sleep_date))
    }
}

/// Parse a Fitbit sleep response into at most one record per day, ascending.
///
/// When a day has several logs (naps), the main sleep wins, else the longest.
fn parse_sleep_response(user_id: &str, body: &str) -> Result<Vec<SleepRecord>, FetchError> {
    let response: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Transient(format!("Invalid sleep response: {}", e)))?;

    let logs = response
        .get("sleep")
        .and_then(|v| v.as_array())
        .ok_or_else(|| FetchError::Transient("Sleep response has no 'sleep' array".to_string()))?;

    let mut by_day: BTreeMap<NaiveDate, (SleepLog, &serde_json::Value)> = BTreeMap::new();
    let mut last_error = None;
    for raw in logs {
        let log: SleepLog = match serde_json::from_value(raw.clone()) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Skipping unreadable sleep log");
                last_error = Some(e);
                continue;
            }
        };

        let replace = match by_day.get(&log.date_of_sleep) {
            None => true,
            Some((current, _)) => prefer(&log, current),
        };
        if replace {
            by_day.insert(log.date_of_sleep, (log, raw));
        }
    }

    // Logs were present but none could be read: not an empty night.
    if by_day.is_empty() {
        if let Some(e) = last_error {
            return Err(FetchError::Transient(format!("Unreadable sleep log: {}", e)));
        }
    }

    Ok(by_day
        .into_values()
        .map(|(log, raw)| SleepRecord {
            user_id: user_id.to_string(),
            date_of_sleep: log.date_of_sleep,
            duration_millis: log.duration,
            minutes_asleep: log.minutes_asleep,
            efficiency: log.efficiency,
            start_time: log.start_time,
            end_time: log.end_time,
            is_main_sleep: log.is_main_sleep,
            raw_payload: raw.to_string(),
        })
        .collect())
}

fn prefer(candidate: &SleepLog, current: &SleepLog) -> bool {
    match (candidate.is_main_sleep, current.is_main_sleep) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.duration > current.duration,
    }
}
