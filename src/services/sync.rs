// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestration.
//!
//! For each registered user, in order: read the days already stored, plan
//! the missing ones, fetch them oldest first and write every record to both
//! sinks. Per-day failures are counted and per-user failures are recorded in
//! the report; a run itself never fails.
//!
//! Every collaborator call is raced against the run's deadline and
//! cancellation token. Writes are idempotent upserts keyed by
//! `(user_id, date)`, so a run cut short is repaired by the next one.

use crate::models::{SleepRecord, SyncMode, SyncReport, User, UserSyncError, UserSyncReport};
use crate::ports::{ObjectStore, SleepStore};
use crate::services::fetcher::{DayOutcome, UpstreamFetcher, MAX_RANGE_DAYS};
use crate::services::planner::{chunk_plan, plan_window, PlanError, PlanWindow};
use crate::time_utils::{format_utc_rfc3339, Clock};
use chrono::NaiveDate;
use futures_util::future;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// The run deadline passed or the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Sync run interrupted")]
pub struct Interrupted;

impl From<Interrupted> for UserSyncError {
    fn from(_: Interrupted) -> Self {
        UserSyncError::Cancelled
    }
}

impl From<PlanError> for UserSyncError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::InvalidInput(msg) => UserSyncError::InvalidInput(msg),
        }
    }
}

/// Deadline and cancellation shared by everything in one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(deadline: Instant, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// Deadline `budget` from now.
    pub fn with_budget(budget: Duration, cancel: CancellationToken) -> Self {
        Self::new(Instant::now() + budget, cancel)
    }

    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Run `fut`, dropping it if the deadline passes or the run is cancelled.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted),
            result = tokio::time::timeout_at(self.deadline, fut) => result.map_err(|_| Interrupted),
        }
    }
}

/// Drives one sync run over a list of users.
#[derive(Clone)]
pub struct SyncOrchestrator {
    fetcher: UpstreamFetcher,
    sleep_store: Arc<dyn SleepStore>,
    object_store: Arc<dyn ObjectStore>,
    mode: SyncMode,
}

impl SyncOrchestrator {
    pub fn new(
        fetcher: UpstreamFetcher,
        sleep_store: Arc<dyn SleepStore>,
        object_store: Arc<dyn ObjectStore>,
        mode: SyncMode,
    ) -> Self {
        Self {
            fetcher,
            sleep_store,
            object_store,
            mode,
        }
    }

    /// Sync every user in order and report what happened.
    pub async fn run(&self, users: &[User], clock: &dyn Clock, ctx: &RunContext) -> SyncReport {
        let mut report = SyncReport::new(self.mode, format_utc_rfc3339(clock.now()));
        let today = clock.today();

        tracing::info!(
            mode = ?self.mode,
            users = users.len(),
            today = %today,
            "Starting sync run"
        );

        for (i, user) in users.iter().enumerate() {
            if ctx.is_done() {
                report.users_not_attempted = users.len() - i;
                tracing::warn!(
                    users_not_attempted = report.users_not_attempted,
                    "Sync run interrupted before all users were attempted"
                );
                break;
            }

            let span = tracing::info_span!("sync_user", user_id = %user.user_id);
            let user_report = self.sync_user(user, today, ctx).instrument(span).await;
            report.users_processed += 1;
            report.users.push(user_report);
        }

        report.finished_at = format_utc_rfc3339(clock.now());

        tracing::info!(
            users_processed = report.users_processed,
            users_not_attempted = report.users_not_attempted,
            fetched = report.total_fetched(),
            persisted = report.total_persisted(),
            incomplete = report.incomplete_users().count(),
            "Sync run finished"
        );

        report
    }

    async fn sync_user(&self, user: &User, today: NaiveDate, ctx: &RunContext) -> UserSyncReport {
        let mut report = UserSyncReport::new(&user.user_id);

        if let Err(e) = self.work_user(user, today, ctx, &mut report).await {
            tracing::warn!(error = %e, "User sync stopped early");
            report.terminal = Some(e);
        }

        tracing::info!(
            planned = report.planned,
            fetched = report.fetched,
            persisted = report.persisted,
            empty = report.empty,
            skipped = report.skipped_already_present,
            transient_failures = report.transient_failures,
            store_failures = report.store_failures,
            "User sync finished"
        );

        report
    }

    async fn work_user(
        &self,
        user: &User,
        today: NaiveDate,
        ctx: &RunContext,
        report: &mut UserSyncReport,
    ) -> Result<(), UserSyncError> {
        let stored = ctx
            .guard(self.sleep_store.dates_for_user(&user.user_id))
            .await?
            .map_err(|e| UserSyncError::Store(e.to_string()))?;

        let (window, member_since) = match self.mode {
            SyncMode::Incremental { lookback_days } => (PlanWindow::LookBack(lookback_days), None),
            SyncMode::Backfill => (
                PlanWindow::FullHistory,
                ctx.guard(self.fetcher.member_since(user)).await??,
            ),
        };

        let plan = plan_window(window, member_since, today, &stored)?;
        report.planned = plan.missing.len();
        report.skipped_already_present = plan.already_present;

        tracing::debug!(
            missing = plan.missing.len(),
            already_present = plan.already_present,
            "Planned missing days"
        );

        match self.mode {
            SyncMode::Incremental { .. } => self.fetch_by_day(user, &plan.missing, ctx, report).await,
            SyncMode::Backfill => self.fetch_by_range(user, &plan.missing, &stored, ctx, report).await,
        }
    }

    async fn fetch_by_day(
        &self,
        user: &User,
        days: &[NaiveDate],
        ctx: &RunContext,
        report: &mut UserSyncReport,
    ) -> Result<(), UserSyncError> {
        for &date in days {
            match ctx.guard(self.fetcher.fetch_day(user, date)).await? {
                Ok(DayOutcome::Record(record)) => {
                    report.fetched += 1;
                    self.persist(&record, ctx, report).await?;
                }
                Ok(DayOutcome::Empty) => {
                    tracing::debug!(date = %date, "No sleep logged");
                    report.empty += 1;
                }
                Err(e) if e.stops_user() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(date = %date, error = %e, "Transient fetch failure, skipping day");
                    report.transient_failures += 1;
                }
            }
        }

        Ok(())
    }

    async fn fetch_by_range(
        &self,
        user: &User,
        days: &[NaiveDate],
        stored: &BTreeSet<NaiveDate>,
        ctx: &RunContext,
        report: &mut UserSyncReport,
    ) -> Result<(), UserSyncError> {
        for chunk in chunk_plan(days, MAX_RANGE_DAYS) {
            let (Some(&start), Some(&end)) = (chunk.first(), chunk.last()) else {
                continue;
            };

            let records = match ctx.guard(self.fetcher.fetch_range(user, start, end)).await? {
                Ok(records) => records,
                Err(e) if e.stops_user() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        start = %start,
                        end = %end,
                        error = %e,
                        "Transient range fetch failure, skipping chunk"
                    );
                    report.transient_failures += 1;
                    continue;
                }
            };

            // Records for days we already hold are dropped; the plan counted them.
            let mut by_date: BTreeMap<NaiveDate, SleepRecord> = records
                .into_iter()
                .filter(|record| !stored.contains(&record.date_of_sleep))
                .map(|record| (record.date_of_sleep, record))
                .collect();

            for date in chunk {
                match by_date.remove(date) {
                    Some(record) => {
                        report.fetched += 1;
                        self.persist(&record, ctx, report).await?;
                    }
                    None => report.empty += 1,
                }
            }
        }

        Ok(())
    }

    /// Write one record to both sinks. Failures are counted, not returned.
    async fn persist(
        &self,
        record: &SleepRecord,
        ctx: &RunContext,
        report: &mut UserSyncReport,
    ) -> Result<(), UserSyncError> {
        let blob = match record.to_blob() {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!(date = %record.date_of_sleep, error = %e, "Failed to serialize sleep blob");
                report.store_failures += 1;
                return Ok(());
            }
        };
        let key = record.key();

        let (object, indexed) = ctx
            .guard(future::join(
                self.object_store.put(&key, blob),
                self.sleep_store.upsert(record),
            ))
            .await?;

        if let Err(e) = &object {
            tracing::error!(key = %key, error = %e, "Object store write failed");
        }
        if let Err(e) = &indexed {
            tracing::error!(key = %key, error = %e, "Sleep store write failed");
        }

        if object.is_ok() && indexed.is_ok() {
            report.persisted += 1;
        } else {
            report.store_failures += 1;
        }

        Ok(())
    }
}
