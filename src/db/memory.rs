// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local runs and tests.
//!
//! Implements every store port on shared maps, so one `MemoryStore` can
//! stand in for Firestore and Cloud Storage at once.

use crate::models::sleep::record_key;
use crate::models::{SleepRecord, User};
use crate::ports::{ObjectStore, SleepStore, StoreResult, UserDirectory};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<String, User>>,
    records: Arc<DashMap<String, SleepRecord>>,
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored blob for `key`, if any.
    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).map(|entry| entry.value().clone())
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// Stored record for one user's day, if any.
    pub fn record(&self, user_id: &str, date: NaiveDate) -> Option<SleepRecord> {
        self.records
            .get(&record_key(user_id, date))
            .map(|entry| entry.value().clone())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn list_registered(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.get(user_id).map(|e| e.value().clone()))
    }

    async fn register(&self, user: &User) -> StoreResult<()> {
        self.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, blob: Vec<u8>) -> StoreResult<()> {
        self.blobs.insert(key.to_string(), blob);
        Ok(())
    }
}

#[async_trait]
impl SleepStore for MemoryStore {
    async fn dates_for_user(&self, user_id: &str) -> StoreResult<BTreeSet<NaiveDate>> {
        Ok(self
            .records
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().date_of_sleep)
            .collect())
    }

    async fn upsert(&self, record: &SleepRecord) -> StoreResult<()> {
        self.records.insert(record.key(), record.clone());
        Ok(())
    }

    async fn records_for_user(&self, user_id: &str) -> StoreResult<Vec<SleepRecord>> {
        let mut records: Vec<SleepRecord> = self
            .records
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        records.sort_by_key(|r| r.date_of_sleep);
        Ok(records)
    }
}
