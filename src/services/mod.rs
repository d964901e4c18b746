// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod fetcher;
pub mod fitbit;
pub mod planner;
pub mod streak;
pub mod sync;
pub mod tasks;

pub use fetcher::{DayOutcome, FetchError, UpstreamFetcher};
pub use fitbit::FitbitClient;
pub use planner::{DayPlan, PlanError, PlanWindow};
pub use streak::longest_streak;
pub use sync::{RunContext, SyncOrchestrator};
pub use tasks::TasksService;
