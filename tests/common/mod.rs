// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::NaiveDate;
use sleep_sync::config::Config;
use sleep_sync::db::{FirestoreDb, MemoryStore};
use sleep_sync::models::SleepRecord;
use sleep_sync::ports::{HttpFailure, ObjectStore, SleepApi, SleepStore, StoreError, StoreResult};
use sleep_sync::routes::create_router;
use sleep_sync::services::TasksService;
use sleep_sync::time_utils::FixedClock;
use sleep_sync::AppState;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[allow(dead_code)]
pub fn hours(h: f64) -> u64 {
    (h * 3_600_000.0) as u64
}

/// "Today" for every test app.
#[allow(dead_code)]
pub fn test_today() -> NaiveDate {
    d(2020, 1, 5)
}

/// A stored record with no upstream payload.
#[allow(dead_code)]
pub fn stored_night(user_id: &str, date: NaiveDate, h: f64) -> SleepRecord {
    SleepRecord {
        user_id: user_id.to_string(),
        date_of_sleep: date,
        duration_millis: hours(h),
        minutes_asleep: None,
        efficiency: None,
        start_time: None,
        end_time: None,
        is_main_sleep: true,
        raw_payload: String::new(),
    }
}

// ─── Scripted Fitbit ─────────────────────────────────────────

/// What the fake answers for one day.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Scripted {
    Night(u64),
    Status(u16),
    Network,
    /// A log without a `duration` field.
    Unreadable,
}

/// One call made against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum ApiCall {
    Profile(String),
    Day(String, NaiveDate),
    Range(String, NaiveDate, NaiveDate),
}

/// In-process [`SleepApi`] that answers from a script and records calls.
///
/// Unscripted days answer with an empty `sleep` array.
#[derive(Default)]
pub struct ScriptedSleepApi {
    member_since: Option<String>,
    profile_failure: Option<u16>,
    days: HashMap<NaiveDate, Scripted>,
    range_failures: HashMap<NaiveDate, u16>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ApiCall>>,
}

#[allow(dead_code)]
impl ScriptedSleepApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_since(mut self, date: &str) -> Self {
        self.member_since = Some(date.to_string());
        self
    }

    pub fn profile_fails(mut self, status: u16) -> Self {
        self.profile_failure = Some(status);
        self
    }

    pub fn night(mut self, date: NaiveDate, h: f64) -> Self {
        self.days.insert(date, Scripted::Night(hours(h)));
        self
    }

    pub fn day(mut self, date: NaiveDate, answer: Scripted) -> Self {
        self.days.insert(date, answer);
        self
    }

    /// Fail the range request whose first day is `start`.
    pub fn range_fails(mut self, start: NaiveDate, status: u16) -> Self {
        self.range_failures.insert(start, status);
        self
    }

    /// Sleep before every answer.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Days requested one at a time, in order.
    pub fn day_calls(&self) -> Vec<NaiveDate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Day(_, date) => Some(date),
                _ => None,
            })
            .collect()
    }

    pub fn range_calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Range(_, start, end) => Some((start, end)),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn log_json(date: NaiveDate, millis: u64) -> serde_json::Value {
        serde_json::json!({
            "dateOfSleep": date.format("%Y-%m-%d").to_string(),
            "duration": millis,
            "minutesAsleep": millis / 60_000,
            "efficiency": 90,
            "isMainSleep": true,
        })
    }

    fn body(logs: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "sleep": logs, "summary": {} }).to_string()
    }
}

#[async_trait]
impl SleepApi for ScriptedSleepApi {
    async fn get_profile(&self, _token: &str, user_id: &str) -> Result<String, HttpFailure> {
        self.record(ApiCall::Profile(user_id.to_string())).await;
        if let Some(status) = self.profile_failure {
            return Err(HttpFailure::Status(status));
        }
        Ok(serde_json::json!({ "user": { "memberSince": self.member_since } }).to_string())
    }

    async fn get_day(
        &self,
        _token: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<String, HttpFailure> {
        self.record(ApiCall::Day(user_id.to_string(), date)).await;
        match self.days.get(&date) {
            Some(Scripted::Night(millis)) => Ok(Self::body(vec![Self::log_json(date, *millis)])),
            Some(Scripted::Status(status)) => Err(HttpFailure::Status(*status)),
            Some(Scripted::Network) => Err(HttpFailure::Network("connection reset".to_string())),
            Some(Scripted::Unreadable) => Ok(Self::body(vec![serde_json::json!({
                "dateOfSleep": date.format("%Y-%m-%d").to_string(),
                "durationMs": 28_800_000,
            })])),
            None => Ok(Self::body(vec![])),
        }
    }

    async fn get_range(
        &self,
        _token: &str,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, HttpFailure> {
        self.record(ApiCall::Range(user_id.to_string(), start, end)).await;
        if let Some(status) = self.range_failures.get(&start) {
            return Err(HttpFailure::Status(*status));
        }
        let mut logs: Vec<(NaiveDate, u64)> = self
            .days
            .iter()
            .filter(|(date, _)| **date >= start && **date <= end)
            .filter_map(|(date, answer)| match answer {
                Scripted::Night(millis) => Some((*date, *millis)),
                _ => None,
            })
            .collect();
        logs.sort();
        Ok(Self::body(
            logs.into_iter()
                .map(|(date, millis)| Self::log_json(date, millis))
                .collect(),
        ))
    }
}

// ─── Failing Object Store ────────────────────────────────────

/// Object store that rejects writes for chosen keys.
#[allow(dead_code)]
pub struct FlakyObjectStore {
    pub inner: MemoryStore,
    fail_keys: HashSet<String>,
}

#[allow(dead_code)]
impl FlakyObjectStore {
    pub fn new(inner: MemoryStore, fail_keys: &[&str]) -> Self {
        Self {
            inner,
            fail_keys: fail_keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put(&self, key: &str, blob: Vec<u8>) -> StoreResult<()> {
        if self.fail_keys.contains(key) {
            return Err(StoreError::Write(format!("injected failure for {}", key)));
        }
        self.inner.put(key, blob).await
    }
}

// ─── Failing Sleep Store ─────────────────────────────────────

/// Sleep store that fails reads for chosen users and upserts for chosen keys.
#[allow(dead_code)]
pub struct FlakySleepStore {
    pub inner: MemoryStore,
    fail_reads: HashSet<String>,
    fail_upserts: HashSet<String>,
}

#[allow(dead_code)]
impl FlakySleepStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_reads: HashSet::new(),
            fail_upserts: HashSet::new(),
        }
    }

    pub fn failing_reads_for(mut self, user_id: &str) -> Self {
        self.fail_reads.insert(user_id.to_string());
        self
    }

    pub fn failing_upserts_for(mut self, key: &str) -> Self {
        self.fail_upserts.insert(key.to_string());
        self
    }
}

#[async_trait]
impl SleepStore for FlakySleepStore {
    async fn dates_for_user(&self, user_id: &str) -> StoreResult<BTreeSet<NaiveDate>> {
        if self.fail_reads.contains(user_id) {
            return Err(StoreError::Read("injected read failure".to_string()));
        }
        self.inner.dates_for_user(user_id).await
    }

    async fn upsert(&self, record: &SleepRecord) -> StoreResult<()> {
        if self.fail_upserts.contains(&record.key()) {
            return Err(StoreError::Write(format!("injected failure for {}", record.key())));
        }
        self.inner.upsert(record).await
    }

    async fn records_for_user(&self, user_id: &str) -> StoreResult<Vec<SleepRecord>> {
        self.inner.records_for_user(user_id).await
    }
}

// ─── Test App ────────────────────────────────────────────────

/// Build app state over an in-memory store, the given Fitbit fake, and an
/// offline Cloud Tasks client. Today is [`test_today`].
#[allow(dead_code)]
pub fn test_state(api: Arc<ScriptedSleepApi>) -> (Arc<AppState>, MemoryStore) {
    let config = Config::test_default();
    let store = MemoryStore::new();

    let state = Arc::new(AppState {
        config,
        users: Arc::new(store.clone()),
        sleep_store: Arc::new(store.clone()),
        object_store: Arc::new(store.clone()),
        sleep_api: api,
        tasks_service: TasksService::new_mock(),
        clock: Arc::new(FixedClock::on(test_today())),
        shutdown: CancellationToken::new(),
    });

    (state, store)
}

/// Create a test app with offline mock dependencies.
/// Returns the router, the shared state, and the backing store.
#[allow(dead_code)]
pub fn create_test_app_with(api: Arc<ScriptedSleepApi>) -> (axum::Router, Arc<AppState>, MemoryStore) {
    let (state, store) = test_state(api);
    (create_router(state.clone()), state, store)
}

#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let (router, state, _) = create_test_app_with(Arc::new(ScriptedSleepApi::new()));
    (router, state)
}
