// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Longest run of long nights.

use crate::models::SleepRecord;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Convert a threshold in hours to milliseconds.
pub fn hours_to_millis(hours: f64) -> u64 {
    (hours * MILLIS_PER_HOUR).round() as u64
}

/// Length of the longest run of consecutive records whose duration is
/// strictly greater than `threshold_millis`.
///
/// Records are taken in the order given (ascending by date when read from a
/// [`SleepStore`](crate::ports::SleepStore)). Adjacency is by position, so a
/// day with no record does not break a run.
pub fn longest_streak<'a, I>(records: I, threshold_millis: u64) -> usize
where
    I: IntoIterator<Item = &'a SleepRecord>,
{
    let mut longest = 0;
    let mut current = 0;

    for record in records {
        if record.duration_millis > threshold_millis {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    longest
}
