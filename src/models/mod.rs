// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod report;
pub mod sleep;
pub mod user;

pub use report::{SyncMode, SyncReport, UserSyncError, UserSyncReport};
pub use sleep::SleepRecord;
pub use user::User;
