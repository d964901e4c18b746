// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sleep-Sync API Server
//!
//! Mirrors registered users' Fitbit sleep logs into Cloud Storage and
//! Firestore and answers streak queries over the stored history.

use sleep_sync::{
    config::Config,
    db::{FirestoreDb, GcsStore, MemoryStore},
    ports::{ObjectStore, SleepApi, SleepStore, UserDirectory},
    services::{FitbitClient, TasksService},
    time_utils::SystemClock,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Stores = (
    Arc<dyn UserDirectory>,
    Arc<dyn SleepStore>,
    Arc<dyn ObjectStore>,
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Sleep-Sync API");

    let (users, sleep_store, object_store) = init_stores(&config).await?;

    let sleep_api: Arc<dyn SleepApi> = Arc::new(FitbitClient::new(
        &config.fitbit_api_url,
        Duration::from_secs(config.fitbit_http_timeout_secs),
    )?);
    tracing::info!(base_url = %config.fitbit_api_url, "Fitbit client initialized");

    // Initialize Cloud Tasks service
    let tasks_service = TasksService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.sync_trigger_token,
    );
    tracing::info!(
        project = %config.gcp_project_id,
        "Cloud Tasks service initialized"
    );

    let shutdown = install_signal_handler();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        users,
        sleep_store,
        object_store,
        sleep_api,
        tasks_service,
        clock: Arc::new(SystemClock),
        shutdown: shutdown.clone(),
    });

    // Build router
    let app = sleep_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Pick Firestore + Cloud Storage, or the in-process store for local runs.
async fn init_stores(config: &Config) -> Result<Stores, Box<dyn std::error::Error>> {
    if config.use_memory_store {
        tracing::warn!("Using in-memory store; data is lost on restart");
        let store = MemoryStore::new();
        let users: Arc<dyn UserDirectory> = Arc::new(store.clone());
        let sleep_store: Arc<dyn SleepStore> = Arc::new(store.clone());
        let object_store: Arc<dyn ObjectStore> = Arc::new(store);
        return Ok((users, sleep_store, object_store));
    }

    let db = FirestoreDb::new(&config.gcp_project_id).await?;
    let gcs = GcsStore::new(&config.sleep_bucket).await?;

    let users: Arc<dyn UserDirectory> = Arc::new(db.clone());
    let sleep_store: Arc<dyn SleepStore> = Arc::new(db);
    let object_store: Arc<dyn ObjectStore> = Arc::new(gcs);
    Ok((users, sleep_store, object_store))
}

/// Cancel the returned token on SIGINT or SIGTERM.
///
/// In-flight sync runs watch child tokens and stop at the next upstream or
/// store call; the server then drains open connections.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to register SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        tracing::info!("Received shutdown signal, stopping sync runs");
        handler_token.cancel();
    });

    token
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sleep_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}
