// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides:
//! - Users (registration and token storage)
//! - Sleep records (one document per user and day, id `"{user_id}.{date}"`)

use crate::db::collections;
use crate::models::{SleepRecord, User};
use crate::ports::{SleepStore, StoreError, StoreResult, UserDirectory};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Projection used when only the stored days are needed.
#[derive(Debug, Deserialize)]
struct StoredDay {
    date_of_sleep: NaiveDate,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> StoreResult<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> StoreResult<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> StoreResult<&firestore::FirestoreDb> {
        self.client.as_ref().ok_or_else(|| {
            StoreError::Unavailable("Database not connected (offline mode)".to_string())
        })
    }

    // ─── Sleep Record Operations ───────────────────────────────────

    /// Get one stored day.
    pub async fn get_sleep_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<SleepRecord>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SLEEP)
            .obj()
            .one(&crate::models::sleep::record_key(user_id, date))
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for FirestoreDb {
    async fn list_registered(&self) -> StoreResult<Vec<User>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([("user_id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    async fn register(&self, user: &User) -> StoreResult<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SleepStore for FirestoreDb {
    async fn dates_for_user(&self, user_id: &str) -> StoreResult<BTreeSet<NaiveDate>> {
        let user_id = user_id.to_string();
        let days: Vec<StoredDay> = self
            .get_client()?
            .fluent()
            .select()
            .fields(["date_of_sleep"])
            .from(collections::SLEEP)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        Ok(days.into_iter().map(|day| day.date_of_sleep).collect())
    }

    async fn upsert(&self, record: &SleepRecord) -> StoreResult<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SLEEP)
            .document_id(record.key())
            .object(record)
            .execute()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn records_for_user(&self, user_id: &str) -> StoreResult<Vec<SleepRecord>> {
        let user_id = user_id.to_string();
        // Dates serialize as YYYY-MM-DD, so string order is date order.
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SLEEP)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([(
                "date_of_sleep",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }
}
