// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trigger-token authentication for `/tasks/*` routes.
//!
//! Cloud Scheduler and Cloud Tasks both send the shared token in
//! [`TRIGGER_TOKEN_HEADER`]; anything else is refused before a run starts.

use crate::config::TRIGGER_TOKEN_HEADER;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Require a matching trigger token header.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(TRIGGER_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());

    match presented {
        Some(token) if token_matches(token, &state.config.sync_trigger_token) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Blocked tasks request: wrong trigger token");
            Err(StatusCode::FORBIDDEN)
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "Blocked tasks request: missing trigger token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn token_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
