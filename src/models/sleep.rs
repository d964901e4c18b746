// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Daily sleep record model for storage and API.

use crate::time_utils::format_sleep_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One calendar day of sleep data for one user.
///
/// Identity is `(user_id, date_of_sleep)`; both sinks key the record by
/// [`SleepRecord::key`], so writing it again replaces rather than duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    /// Fitbit user ID (owner)
    pub user_id: String,
    /// Calendar day the sleep is attributed to
    pub date_of_sleep: NaiveDate,
    /// Total sleep duration in milliseconds
    pub duration_millis: u64,
    /// Minutes actually asleep
    #[serde(default)]
    pub minutes_asleep: Option<u32>,
    /// Sleep efficiency score (0-100)
    #[serde(default)]
    pub efficiency: Option<u32>,
    /// Sleep start (local time, ISO 8601 without offset)
    #[serde(default)]
    pub start_time: Option<String>,
    /// Sleep end (local time, ISO 8601 without offset)
    #[serde(default)]
    pub end_time: Option<String>,
    /// Whether Fitbit flagged this log as the main sleep of the day
    #[serde(default)]
    pub is_main_sleep: bool,
    /// Upstream sleep log as returned by Fitbit (JSON text)
    #[serde(default)]
    pub raw_payload: String,
}

impl SleepRecord {
    /// Composite storage key: `"{user_id}.{date_of_sleep}"`.
    pub fn key(&self) -> String {
        record_key(&self.user_id, self.date_of_sleep)
    }

    /// Serialize the blob written to the object store: the upstream payload
    /// with our `id` and `userId` attached.
    pub fn to_blob(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut payload: serde_json::Value = if self.raw_payload.is_empty() {
            serde_json::json!({
                "dateOfSleep": format_sleep_date(self.date_of_sleep),
                "duration": self.duration_millis,
            })
        } else {
            serde_json::from_str(&self.raw_payload)?
        };

        if let Some(object) = payload.as_object_mut() {
            object.insert("id".to_string(), self.key().into());
            object.insert("userId".to_string(), self.user_id.clone().into());
        }

        serde_json::to_vec(&payload)
    }
}

/// Build the composite key for a user's day.
pub fn record_key(user_id: &str, date: NaiveDate) -> String {
    format!("{}.{}", user_id, format_sleep_date(date))
}
