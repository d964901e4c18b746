// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Storage blob writes for raw sleep payloads.

use crate::ports::{ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use gcloud_sdk::google_rest_apis::storage_v1::objects_api;
use std::sync::Arc;

const BLOB_CONTENT_TYPE: &str = "application/json";

/// Cloud Storage bucket client.
#[derive(Clone)]
pub struct GcsStore {
    client: Option<Arc<gcloud_sdk::GoogleRestApi>>,
    bucket: String,
}

impl GcsStore {
    /// Connect using application default credentials.
    ///
    /// The bucket is provisioned with the deployment and is not created here.
    pub async fn new(bucket: &str) -> StoreResult<Self> {
        let client = gcloud_sdk::GoogleRestApi::new().await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Cloud Storage client: {}", e))
        })?;

        tracing::info!(bucket, "Connected to Cloud Storage");

        Ok(Self {
            client: Some(Arc::new(client)),
            bucket: bucket.to_string(),
        })
    }

    /// Offline client for tests. Every write fails.
    pub fn new_mock(bucket: &str) -> Self {
        Self {
            client: None,
            bucket: bucket.to_string(),
        }
    }

    fn get_client(&self) -> StoreResult<&gcloud_sdk::GoogleRestApi> {
        self.client.as_deref().ok_or_else(|| {
            StoreError::Unavailable("Cloud Storage not connected (offline mode)".to_string())
        })
    }

    fn insert_params(&self, key: &str) -> objects_api::StoragePeriodObjectsPeriodInsertParams {
        objects_api::StoragePeriodObjectsPeriodInsertParams {
            bucket: self.bucket.clone(),
            name: Some(key.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, blob: Vec<u8>) -> StoreResult<()> {
        let config = self
            .get_client()?
            .create_google_storage_v1_config()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let size = blob.len();
        objects_api::storage_objects_insert_ext_bytes(
            &config,
            self.insert_params(key),
            Some(BLOB_CONTENT_TYPE.to_string()),
            blob,
        )
        .await
        .map_err(|e| StoreError::Write(format!("Failed to write {}: {}", key, e)))?;

        tracing::debug!(bucket = %self.bucket, key, size, "Wrote sleep blob");
        Ok(())
    }
}
