// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Capability traits the sync engine depends on.
//!
//! Firestore, Cloud Storage and the Fitbit client implement these in
//! production; `db::memory` implements the store traits in-process.

use crate::models::{SleepRecord, User};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Errors returned by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store read failed: {0}")]
    Read(String),

    #[error("Store write failed: {0}")]
    Write(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a failed HTTP invocation.
///
/// Only the numeric status is surfaced; classifying it is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpFailure {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),
}

/// Registered users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_registered(&self) -> StoreResult<Vec<User>>;

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>>;

    /// Create or replace a registration.
    async fn register(&self, user: &User) -> StoreResult<()>;
}

/// Blob store keyed by opaque names.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `blob` under `key`, replacing any existing object.
    async fn put(&self, key: &str, blob: Vec<u8>) -> StoreResult<()>;
}

/// Indexed store of daily sleep records.
#[async_trait]
pub trait SleepStore: Send + Sync {
    /// Days already stored for a user.
    async fn dates_for_user(&self, user_id: &str) -> StoreResult<BTreeSet<NaiveDate>>;

    /// Insert or replace the record keyed by `(user_id, date_of_sleep)`.
    async fn upsert(&self, record: &SleepRecord) -> StoreResult<()>;

    /// All records for a user, ascending by date.
    async fn records_for_user(&self, user_id: &str) -> StoreResult<Vec<SleepRecord>>;

    async fn count_for_user(&self, user_id: &str) -> StoreResult<usize> {
        Ok(self.records_for_user(user_id).await?.len())
    }
}

/// Raw access to the upstream sleep API. Bodies are returned unparsed.
#[async_trait]
pub trait SleepApi: Send + Sync {
    async fn get_profile(&self, token: &str, user_id: &str) -> Result<String, HttpFailure>;

    async fn get_day(
        &self,
        token: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<String, HttpFailure>;

    async fn get_range(
        &self,
        token: &str,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, HttpFailure>;
}
