// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Firing rules carried by triggers

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from validating a schedule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("repeating schedule needs a non-zero interval")]
    ZeroInterval,
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// When a trigger fires, relative to its start time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Fire at start, then every `interval`; `repeat_count` extra firings (`None` = forever)
    Simple {
        #[serde(with = "humantime_serde")]
        interval: Duration,
        #[serde(default)]
        repeat_count: Option<u32>,
    },
    /// Seconds-resolution cron expression, evaluated in UTC
    Cron { expression: String },
}

impl Schedule {
    /// Fire exactly once, at the start time
    pub fn once() -> Self {
        Schedule::Simple {
            interval: Duration::ZERO,
            repeat_count: Some(0),
        }
    }

    /// Fire at start and every `interval` after, forever
    pub fn every(interval: Duration) -> Self {
        Schedule::Simple {
            interval,
            repeat_count: None,
        }
    }

    /// Fire at start and `repeat_count` more times
    pub fn repeat(interval: Duration, repeat_count: u32) -> Self {
        Schedule::Simple {
            interval,
            repeat_count: Some(repeat_count),
        }
    }

    pub fn cron(expression: impl Into<String>) -> Self {
        Schedule::Cron {
            expression: expression.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        match self {
            Schedule::Simple {
                interval,
                repeat_count,
            } => {
                if interval.is_zero() && *repeat_count != Some(0) {
                    return Err(ScheduleError::ZeroInterval);
                }
                Ok(())
            }
            Schedule::Cron { expression } => parse_cron(expression).map(|_| ()),
        }
    }

    /// Whether the schedule fires a single time
    pub fn is_one_shot(&self) -> bool {
        matches!(
            self,
            Schedule::Simple {
                repeat_count: Some(0),
                ..
            }
        )
    }

    /// First fire time strictly after `after`, never earlier than `start`
    pub fn fire_time_after(
        &self,
        start: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Simple {
                interval,
                repeat_count,
            } => {
                if after < start {
                    return Some(start);
                }
                if *repeat_count == Some(0) {
                    return None;
                }
                let interval_ms = i64::try_from(interval.as_millis()).ok()?;
                if interval_ms == 0 {
                    return None;
                }
                let elapsed_ms = (after - start).num_milliseconds();
                let n = elapsed_ms / interval_ms + 1;
                if let Some(limit) = repeat_count {
                    if n > i64::from(*limit) {
                        return None;
                    }
                }
                start.checked_add_signed(TimeDelta::milliseconds(n.checked_mul(interval_ms)?))
            }
            Schedule::Cron { expression } => {
                let schedule = parse_cron(expression).ok()?;
                let floor = start.checked_sub_signed(TimeDelta::milliseconds(1))?;
                let after = after.max(floor);
                schedule.after(&after).next()
            }
        }
    }
}

fn parse_cron(expression: &str) -> Result<cron::Schedule, ScheduleError> {
    cron::Schedule::from_str(expression).map_err(|e| ScheduleError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
