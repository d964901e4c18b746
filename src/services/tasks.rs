// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks service for spreading backfills over time.
//!
//! A full-history backfill can take many Fitbit requests, so each user's
//! backfill runs as its own task against `/tasks/backfill`. The queue's rate
//! limits then keep us inside the upstream quota.
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::config::{SYNC_QUEUE_NAME, TRIGGER_TOKEN_HEADER};
use crate::error::AppError;
use crate::error::Result;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const MAX_CONCURRENT_TASKS: usize = 100;

/// Payload sent to the per-user backfill task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillUserPayload {
    pub user_id: String,
}

/// Result of a batch backfill queue operation.
///
/// Provides detailed information about which users were successfully queued
/// and which failed, allowing callers to handle partial failures appropriately.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillResult {
    /// Number of users successfully queued.
    pub queued: u32,
    /// Number of users that failed to queue.
    pub failed: u32,
    /// User IDs that failed to queue.
    pub failed_ids: Vec<String>,
}

impl BackfillResult {
    /// Returns true if all users were successfully queued.
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    /// Returns true if all users failed to queue.
    pub fn is_complete_failure(&self) -> bool {
        self.queued == 0 && self.failed > 0
    }

    /// Returns true if some users succeeded and some failed.
    pub fn is_partial_failure(&self) -> bool {
        self.queued > 0 && self.failed > 0
    }
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
    /// Sent with every task so `/tasks/*` accepts it.
    trigger_token: String,
    /// When true, nothing is sent and every queue call fails.
    offline: bool,
    /// Mock: user IDs that should fail when queued (test builds only).
    #[cfg(test)]
    mock_fail_ids: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str, trigger_token: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: SYNC_QUEUE_NAME.to_string(),
            trigger_token: trigger_token.to_string(),
            offline: false,
            #[cfg(test)]
            mock_fail_ids: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Create an offline service for testing.
    ///
    /// All queue operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            offline: true,
            ..Self::new("test-project", "us-west1", "")
        }
    }

    /// Set user IDs that should fail when queued (test builds only).
    #[cfg(test)]
    pub fn set_mock_fail_ids<S: Into<String>>(&self, ids: impl IntoIterator<Item = S>) {
        let mut guard = self.mock_fail_ids.lock().unwrap();
        guard.clear();
        guard.extend(ids.into_iter().map(Into::into));
    }

    /// Queue a full-history backfill for one user.
    pub async fn queue_user_backfill(&self, service_url: &str, user_id: &str) -> Result<()> {
        tracing::info!(user_id, "Queuing backfill task");
        let payload = BackfillUserPayload {
            user_id: user_id.to_string(),
        };
        self.queue_task(service_url, "/tasks/backfill", &payload)
            .await
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(
        &self,
        service_url: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        if self.offline {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Cloud Tasks not connected (offline mode)"
            )));
        }

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        );

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                (TRIGGER_TOKEN_HEADER.to_string(), self.trigger_token.clone()),
            ]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "sleep-sync-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(service_url.to_string()),
            );

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }

    /// Queue a backfill task for every user in `user_ids`.
    ///
    /// Returns a `BackfillResult` with details about which users were
    /// successfully queued and which failed.
    pub async fn queue_backfill_all(
        &self,
        service_url: &str,
        user_ids: Vec<String>,
    ) -> BackfillResult {
        let count = user_ids.len();
        let batch_success = Arc::new(AtomicU32::new(0));
        let failed_ids = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        stream::iter(user_ids)
            .for_each_concurrent(MAX_CONCURRENT_TASKS, |user_id| {
                let batch_success = Arc::clone(&batch_success);
                let failed_ids = Arc::clone(&failed_ids);
                async move {
                    #[cfg(test)]
                    {
                        let should_fail = self.mock_fail_ids.lock().unwrap().contains(&user_id);
                        if should_fail {
                            tracing::warn!(user_id = %user_id, "Mock failure for user");
                            failed_ids.lock().await.push(user_id);
                            return;
                        }
                    }

                    match self.queue_user_backfill(service_url, &user_id).await {
                        Ok(()) => {
                            batch_success.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            tracing::warn!(
                                user_id = %user_id,
                                error = ?e,
                                "Failed to queue backfill"
                            );
                            failed_ids.lock().await.push(user_id);
                        }
                    }
                }
            })
            .await;

        let queued = batch_success.load(Ordering::Relaxed);
        let failed_ids = std::mem::take(&mut *failed_ids.lock().await);
        let failed = failed_ids.len() as u32;

        tracing::info!(
            requested = count,
            succeeded = queued,
            failed = failed,
            "Queued user backfills"
        );

        BackfillResult {
            queued,
            failed,
            failed_ids,
        }
    }
}
