// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security and behaviour tests for the `/tasks/*` handlers.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use sleep_sync::config::TRIGGER_TOKEN_HEADER;
use sleep_sync::models::User;
use sleep_sync::ports::UserDirectory;
use std::sync::Arc;
use tower::ServiceExt;

mod common;
use common::{d, Scripted, ScriptedSleepApi};

fn task_request(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(TRIGGER_TOKEN_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_sync_without_token_unauthorized() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(task_request("/tasks/sync", None, json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_with_wrong_token_forbidden() {
    let (app, _) = common::create_test_app();

    for uri in ["/tasks/sync", "/tasks/backfill", "/tasks/backfill-all"] {
        let response = app
            .clone()
            .oneshot(task_request(uri, Some("not-the-token"), json!({ "user_id": "A" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_sync_runs_incremental_for_registered_users() {
    let api = Arc::new(
        ScriptedSleepApi::new()
            .night(d(2020, 1, 4), 8.0)
            .night(d(2020, 1, 5), 9.0),
    );
    let (app, state, store) = common::create_test_app_with(api.clone());
    state.users.register(&User::new("A", "tok")).await.unwrap();
    let token = state.config.sync_trigger_token.clone();

    let response = app
        .oneshot(task_request("/tasks/sync", Some(&token), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["mode"]["kind"], "incremental");
    assert_eq!(report["mode"]["lookback_days"], 10);
    assert_eq!(report["users"][0]["persisted"], 2);
    assert_eq!(report["users"][0]["empty"], 8);
    assert_eq!(store.record_count(), 2);
}

#[tokio::test]
async fn test_backfill_unknown_user_is_dropped() {
    let (app, state) = common::create_test_app();
    let token = state.config.sync_trigger_token.clone();

    let response = app
        .oneshot(task_request(
            "/tasks/backfill",
            Some(&token),
            json!({ "user_id": "ghost" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_backfill_rate_limited_asks_for_retry() {
    let api = Arc::new(
        ScriptedSleepApi::new()
            .member_since("2020-01-01")
            .range_fails(d(2020, 1, 1), 429),
    );
    let (app, state, _) = common::create_test_app_with(api.clone());
    state.users.register(&User::new("A", "tok")).await.unwrap();
    let token = state.config.sync_trigger_token.clone();

    let response = app
        .oneshot(task_request("/tasks/backfill", Some(&token), json!({ "user_id": "A" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let report = json_body(response).await;
    assert_eq!(report["users"][0]["terminal"]["kind"], "rate_limited");
}

#[tokio::test]
async fn test_backfill_success() {
    let api = Arc::new(
        ScriptedSleepApi::new()
            .member_since("2020-01-01")
            .night(d(2020, 1, 2), 8.0)
            .day(d(2020, 1, 3), Scripted::Status(500)),
    );
    let (app, state, store) = common::create_test_app_with(api.clone());
    state.users.register(&User::new("A", "tok")).await.unwrap();
    let token = state.config.sync_trigger_token.clone();

    let response = app
        .oneshot(task_request("/tasks/backfill", Some(&token), json!({ "user_id": "A" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(api.range_calls(), vec![(d(2020, 1, 1), d(2020, 1, 5))]);
    assert!(store.record("A", d(2020, 1, 2)).is_some());
}

#[tokio::test]
async fn test_backfill_all_fails_when_nothing_queues() {
    let (app, state) = common::create_test_app();
    state.users.register(&User::new("A", "tok")).await.unwrap();
    let token = state.config.sync_trigger_token.clone();

    let response = app
        .oneshot(task_request("/tasks/backfill-all", Some(&token), json!({})))
        .await
        .unwrap();

    // Cloud Tasks is offline in tests, so every queue attempt fails.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["failed"], 1);
    assert_eq!(body["failed_ids"][0], "A");
}
