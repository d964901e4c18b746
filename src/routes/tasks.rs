// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Scheduler and Cloud Tasks callbacks.
//!
//! These endpoints are not called by users; `require_tasks_auth` guards
//! them (applied in routes/mod.rs).
//!
//! Status codes drive Cloud Tasks retries: 2xx means done, anything else is
//! retried with the queue's backoff.

use crate::error::Result;
use crate::models::{SyncMode, SyncReport, UserSyncError};
use crate::services::tasks::{BackfillResult, BackfillUserPayload};
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/sync", post(sync_all))
        .route("/tasks/backfill", post(backfill_user))
        .route("/tasks/backfill-all", post(backfill_all))
}

/// Incremental sync over every registered user (scheduled).
async fn sync_all(State(state): State<Arc<AppState>>) -> Result<Json<SyncReport>> {
    let users = state.users.list_registered().await?;

    let orchestrator = state.orchestrator(SyncMode::Incremental {
        lookback_days: state.config.sync_lookback_days,
    });
    let report = orchestrator
        .run(&users, state.clock.as_ref(), &state.run_context())
        .await;

    Ok(Json(report))
}

/// Full-history backfill for one user (queued at registration).
async fn backfill_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BackfillUserPayload>,
) -> Response {
    let user = match state.users.get_user(&payload.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(user_id = %payload.user_id, "Backfill for unknown user, dropping task");
            return StatusCode::OK.into_response();
        }
        Err(e) => {
            tracing::error!(user_id = %payload.user_id, error = %e, "Failed to load user for backfill");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let report = state
        .orchestrator(SyncMode::Backfill)
        .run(std::slice::from_ref(&user), state.clock.as_ref(), &state.run_context())
        .await;

    let terminal = report.user(&user.user_id).and_then(|u| u.terminal.clone());
    (backfill_status(terminal.as_ref()), Json(report)).into_response()
}

/// Map a user's terminal state to the status Cloud Tasks should see.
fn backfill_status(terminal: Option<&UserSyncError>) -> StatusCode {
    match terminal {
        None => StatusCode::OK,
        // Retried later by the queue once the hourly quota resets.
        Some(UserSyncError::RateLimited) => StatusCode::SERVICE_UNAVAILABLE,
        // Retrying will not help until the user re-registers.
        Some(UserSyncError::Unauthorized) | Some(UserSyncError::InvalidInput(_)) => StatusCode::OK,
        Some(UserSyncError::Transient(_))
        | Some(UserSyncError::Store(_))
        | Some(UserSyncError::Cancelled) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Queue a backfill task for every registered user.
async fn backfill_all(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<BackfillResult>)> {
    let user_ids = state
        .users
        .list_registered()
        .await?
        .into_iter()
        .map(|u| u.user_id)
        .collect();

    let result = state
        .tasks_service
        .queue_backfill_all(&state.config.api_url, user_ids)
        .await;

    let status = if result.is_complete_failure() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}
