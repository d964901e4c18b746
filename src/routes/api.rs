// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes used by the SPA.

use crate::error::{AppError, Result};
use crate::models::User;
use crate::services::streak::{hours_to_millis, longest_streak};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

/// Longest threshold a streak query may ask for.
const MAX_STREAK_HOURS: f64 = 24.0;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/sleep/days/count", get(sleep_day_count))
        .route("/api/sleep/streak", get(sleep_streak))
}

// ─── Registration ────────────────────────────────────────────

/// Sent by the SPA once the Fitbit OAuth flow has produced a token.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_user_id"))]
    pub user_id: String,
    #[validate(length(min = 1, max = 4096))]
    pub access_token: String,
}

/// User IDs become document IDs and object keys, so keep them to Fitbit's
/// alphabet.
fn validate_user_id(user_id: &str) -> std::result::Result<(), ValidationError> {
    if user_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("user_id_charset"))
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "spa/src/app/generated/")
)]
pub struct RegisterResponse {
    pub user_id: String,
    /// False when the history backfill could not be queued; the scheduled
    /// incremental run still covers recent days.
    pub backfill_queued: bool,
}

/// Register (or re-register) a user and queue their history backfill.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    request.validate()?;

    let user = User {
        registered_at: format_utc_rfc3339(state.clock.now()),
        ..User::new(request.user_id, request.access_token)
    };
    state.users.register(&user).await?;

    tracing::info!(user_id = %user.user_id, "User registered");

    let backfill_queued = match state
        .tasks_service
        .queue_user_backfill(&state.config.api_url, &user.user_id)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(user_id = %user.user_id, error = ?e, "Failed to queue backfill after registration");
            false
        }
    };

    Ok(Json(RegisterResponse {
        user_id: user.user_id,
        backfill_queued,
    }))
}

// ─── Sleep Queries ───────────────────────────────────────────

#[derive(Deserialize)]
struct CountQuery {
    user_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "spa/src/app/generated/")
)]
pub struct CountResponse {
    pub user_id: String,
    pub count: usize,
}

/// Number of days stored for a user.
async fn sleep_day_count(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CountQuery>,
) -> Result<Json<CountResponse>> {
    let count = state.sleep_store.count_for_user(&params.user_id).await?;

    Ok(Json(CountResponse {
        user_id: params.user_id,
        count,
    }))
}

#[derive(Deserialize)]
struct StreakQuery {
    user_id: String,
    hours: Option<f64>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "spa/src/app/generated/")
)]
pub struct StreakResponse {
    pub user_id: String,
    pub hours: f64,
    /// Most consecutive stored nights longer than `hours`
    pub longest_streak: usize,
    pub days_considered: usize,
}

/// Longest run of nights above a sleep-hours threshold.
async fn sleep_streak(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreakQuery>,
) -> Result<Json<StreakResponse>> {
    let hours = params.hours.unwrap_or(state.config.streak_default_hours);
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_STREAK_HOURS {
        return Err(AppError::BadRequest(format!(
            "hours must be greater than 0 and at most {}",
            MAX_STREAK_HOURS
        )));
    }

    let records = state.sleep_store.records_for_user(&params.user_id).await?;
    let longest = longest_streak(&records, hours_to_millis(hours));

    tracing::debug!(
        user_id = %params.user_id,
        hours,
        days = records.len(),
        longest,
        "Computed sleep streak"
    );

    Ok(Json(StreakResponse {
        user_id: params.user_id,
        hours,
        longest_streak: longest,
        days_considered: records.len(),
    }))
}
