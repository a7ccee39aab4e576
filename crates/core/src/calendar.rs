// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named exclusion calendars referenced by triggers
//!
//! A calendar removes instants from a trigger's schedule. Triggers consult
//! their calendar when computing the next fire time, after a misfire, and
//! when the calendar itself is replaced.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Upper bound on skip steps when searching for the next included instant
const MAX_PROBES: usize = 1_100;

/// Errors from validating a calendar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("daily range must start before it ends ({start} >= {end})")]
    EmptyDailyRange { start: NaiveTime, end: NaiveTime },
    #[error("weekly calendar excludes every day of the week")]
    ExcludesEveryWeekday,
}

/// An exclusion schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Calendar {
    /// Excludes whole days
    Holiday { excluded_dates: BTreeSet<NaiveDate> },
    /// Excludes days of the week
    Weekly { excluded_days: Vec<Weekday> },
    /// Excludes `[range_start, range_end)` every day, or everything else when inverted
    Daily {
        range_start: NaiveTime,
        range_end: NaiveTime,
        #[serde(default)]
        invert: bool,
    },
}

impl Calendar {
    pub fn holidays(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Calendar::Holiday {
            excluded_dates: dates.into_iter().collect(),
        }
    }

    pub fn weekly(days: impl IntoIterator<Item = Weekday>) -> Self {
        Calendar::Weekly {
            excluded_days: days.into_iter().collect(),
        }
    }

    pub fn daily(range_start: NaiveTime, range_end: NaiveTime) -> Self {
        Calendar::Daily {
            range_start,
            range_end,
            invert: false,
        }
    }

    /// Reject calendars that can never admit or never exclude a fire time
    pub fn validate(&self) -> Result<(), CalendarError> {
        match self {
            Calendar::Holiday { .. } => Ok(()),
            Calendar::Weekly { excluded_days } => {
                let distinct: BTreeSet<u32> = excluded_days
                    .iter()
                    .map(Weekday::num_days_from_monday)
                    .collect();
                if distinct.len() == 7 {
                    return Err(CalendarError::ExcludesEveryWeekday);
                }
                Ok(())
            }
            Calendar::Daily {
                range_start,
                range_end,
                ..
            } => {
                if range_start >= range_end {
                    return Err(CalendarError::EmptyDailyRange {
                        start: *range_start,
                        end: *range_end,
                    });
                }
                Ok(())
            }
        }
    }

    /// Whether a trigger may fire at `instant`
    pub fn is_time_included(&self, instant: DateTime<Utc>) -> bool {
        match self {
            Calendar::Holiday { excluded_dates } => !excluded_dates.contains(&instant.date_naive()),
            Calendar::Weekly { excluded_days } => !excluded_days.contains(&instant.weekday()),
            Calendar::Daily {
                range_start,
                range_end,
                invert,
            } => {
                let time = instant.time();
                let in_range = *range_start <= time && time < *range_end;
                in_range == *invert
            }
        }
    }

    /// First included instant strictly after `instant`
    ///
    /// Returns `None` when the calendar excludes everything it was probed for.
    pub fn next_included_time(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = instant.checked_add_signed(TimeDelta::milliseconds(1))?;
        for _ in 0..MAX_PROBES {
            if self.is_time_included(candidate) {
                return Some(candidate);
            }
            candidate = self.skip_excluded(candidate)?;
        }
        None
    }

    /// Jump from an excluded instant to the end of its excluded span
    fn skip_excluded(&self, excluded: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = excluded.date_naive();
        match self {
            Calendar::Holiday { .. } | Calendar::Weekly { .. } => start_of(date.succ_opt()?),
            Calendar::Daily {
                range_start,
                range_end,
                invert,
            } => {
                if !*invert {
                    Some(date.and_time(*range_end).and_utc())
                } else if excluded.time() < *range_start {
                    Some(date.and_time(*range_start).and_utc())
                } else {
                    Some(date.succ_opt()?.and_time(*range_start).and_utc())
                }
            }
        }
    }
}

fn start_of(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
#[path = "calendar_tests.rs"]
mod tests;
