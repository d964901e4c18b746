// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Missing-day planning.
//!
//! Pure functions: given the window bounds and the days already stored,
//! produce the ascending list of days that still need fetching. `today` is
//! always a parameter so runs and tests control it.

use chrono::{Days, NaiveDate};
use std::collections::BTreeSet;

/// Which days a run considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanWindow {
    /// The most recent `n` days, ending today.
    LookBack(u32),
    /// Every day since the user's first possible day.
    FullHistory,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Invalid planner input: {0}")]
    InvalidInput(String),
}

/// Missing days for one user plus how many window days were already stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayPlan {
    pub missing: Vec<NaiveDate>,
    pub already_present: usize,
}

/// Every day in `[earliest, today]`, ascending, minus `already_stored`.
pub fn plan(
    earliest: Option<NaiveDate>,
    today: NaiveDate,
    already_stored: &BTreeSet<NaiveDate>,
) -> Result<Vec<NaiveDate>, PlanError> {
    let earliest = earliest
        .ok_or_else(|| PlanError::InvalidInput("earliest date is required".to_string()))?;

    Ok(days_between(earliest, today)
        .filter(|day| !already_stored.contains(day))
        .collect())
}

/// Plan a bounded window.
///
/// `member_since` is required for [`PlanWindow::FullHistory`]; for a
/// look-back window it only clamps the start so we never ask for days before
/// the account existed.
pub fn plan_window(
    window: PlanWindow,
    member_since: Option<NaiveDate>,
    today: NaiveDate,
    already_stored: &BTreeSet<NaiveDate>,
) -> Result<DayPlan, PlanError> {
    let start = match window {
        PlanWindow::FullHistory => member_since.ok_or_else(|| {
            PlanError::InvalidInput("member-since date is required for a full-history plan".to_string())
        })?,
        PlanWindow::LookBack(0) => {
            return Err(PlanError::InvalidInput(
                "look-back window must cover at least one day".to_string(),
            ))
        }
        PlanWindow::LookBack(days) => {
            let start = today
                .checked_sub_days(Days::new(u64::from(days - 1)))
                .unwrap_or(NaiveDate::MIN);
            member_since.map_or(start, |since| start.max(since))
        }
    };

    let missing = plan(Some(start), today, already_stored)?;
    let already_present = if start <= today {
        already_stored.range(start..=today).count()
    } else {
        0
    };

    Ok(DayPlan {
        missing,
        already_present,
    })
}

/// Split an ascending plan into runs spanning at most `max_span_days`
/// calendar days (first to last, inclusive).
pub fn chunk_plan(days: &[NaiveDate], max_span_days: u32) -> Vec<&[NaiveDate]> {
    let max_span = i64::from(max_span_days.max(1));
    let mut chunks = Vec::new();
    let mut chunk_start = 0;

    for (i, day) in days.iter().enumerate() {
        let span = (*day - days[chunk_start]).num_days() + 1;
        if span > max_span {
            chunks.push(&days[chunk_start..i]);
            chunk_start = i;
        }
    }
    if chunk_start < days.len() {
        chunks.push(&days[chunk_start..]);
    }

    chunks
}

fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_plan_excludes_stored_day() {
        let stored = BTreeSet::from([d(2020, 1, 2)]);
        let result = plan(Some(d(2020, 1, 1)), d(2020, 1, 5), &stored).unwrap();

        assert_eq!(
            result,
            vec![d(2020, 1, 1), d(2020, 1, 3), d(2020, 1, 4), d(2020, 1, 5)]
        );
    }

    #[test]
    fn test_plan_requires_earliest() {
        let err = plan(None, d(2020, 1, 5), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }

    #[test]
    fn test_plan_is_window_minus_stored_for_every_subset() {
        let earliest = d(2021, 12, 28);
        let today = d(2022, 1, 4); // 8 days, crosses a year boundary
        let window: Vec<NaiveDate> = days_between(earliest, today).collect();
        assert_eq!(window.len(), 8);

        for mask in 0u32..(1 << window.len()) {
            let stored: BTreeSet<NaiveDate> = window
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, day)| *day)
                .collect();

            let result = plan(Some(earliest), today, &stored).unwrap();

            let expected: Vec<NaiveDate> = window
                .iter()
                .copied()
                .filter(|day| !stored.contains(day))
                .collect();
            assert_eq!(result, expected, "mask {:#010b}", mask);
            assert!(result.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_plan_ignores_stored_days_outside_window() {
        let stored = BTreeSet::from([d(2019, 12, 31), d(2020, 1, 6)]);
        let result = plan(Some(d(2020, 1, 1)), d(2020, 1, 2), &stored).unwrap();
        assert_eq!(result, vec![d(2020, 1, 1), d(2020, 1, 2)]);
    }

    #[test]
    fn test_plan_earliest_after_today_is_empty() {
        let result = plan(Some(d(2020, 2, 1)), d(2020, 1, 1), &BTreeSet::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_lookback_window() {
        let stored = BTreeSet::from([d(2020, 3, 9)]);
        let result = plan_window(PlanWindow::LookBack(3), None, d(2020, 3, 10), &stored).unwrap();

        assert_eq!(result.missing, vec![d(2020, 3, 8), d(2020, 3, 10)]);
        assert_eq!(result.already_present, 1);
    }

    #[test]
    fn test_lookback_clamped_to_member_since() {
        let result = plan_window(
            PlanWindow::LookBack(10),
            Some(d(2020, 3, 8)),
            d(2020, 3, 10),
            &BTreeSet::new(),
        )
        .unwrap();

        assert_eq!(result.missing, vec![d(2020, 3, 8), d(2020, 3, 9), d(2020, 3, 10)]);
    }

    #[test]
    fn test_lookback_of_zero_days_is_invalid() {
        let err = plan_window(PlanWindow::LookBack(0), None, d(2020, 3, 10), &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }

    #[test]
    fn test_full_history_requires_member_since() {
        let err = plan_window(PlanWindow::FullHistory, None, d(2020, 3, 10), &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }

    #[test]
    fn test_full_history_counts_present_days() {
        let stored = BTreeSet::from([d(2020, 1, 1), d(2020, 1, 3), d(2021, 1, 1)]);
        let result =
            plan_window(PlanWindow::FullHistory, Some(d(2020, 1, 1)), d(2020, 1, 4), &stored)
                .unwrap();

        assert_eq!(result.missing, vec![d(2020, 1, 2), d(2020, 1, 4)]);
        assert_eq!(result.already_present, 2);
    }

    #[test]
    fn test_chunk_plan_respects_span() {
        let days: Vec<NaiveDate> = days_between(d(2020, 1, 1), d(2020, 12, 31)).collect();
        let chunks = chunk_plan(&days, 100);

        assert_eq!(chunks.len(), 4); // 366 days
        for chunk in &chunks {
            let span = (chunk[chunk.len() - 1] - chunk[0]).num_days() + 1;
            assert!(span <= 100);
        }
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), days.len());
    }

    #[test]
    fn test_chunk_plan_with_gaps() {
        let days = vec![d(2020, 1, 1), d(2020, 1, 2), d(2020, 6, 1), d(2020, 6, 30)];
        let chunks = chunk_plan(&days, 100);

        assert_eq!(chunks, vec![&days[0..2], &days[2..4]]);
        assert!(chunk_plan(&[], 100).is_empty());
    }
}
