// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Triggers: when a job fires
//!
//! A trigger owns its fire-time bookkeeping. The job store never computes
//! fire times itself; it asks the trigger to advance (`triggered`), to
//! recover from a misfire (`update_after_misfire`) or to re-evaluate
//! against a replaced calendar (`update_with_new_calendar`).

use crate::calendar::Calendar;
use crate::instruction::CompletedExecutionInstruction;
use crate::job::JobDataMap;
use crate::key::{JobKey, TriggerKey};
use crate::schedule::Schedule;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default trigger priority
pub const DEFAULT_PRIORITY: i32 = 5;

/// Upper bound on schedule steps skipped over calendar exclusions
const MAX_CALENDAR_SKIPS: usize = 10_000;

/// What to do when a trigger's fire time passed without it firing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisfireInstruction {
    /// `FireNow` for one-shot schedules, `DoNothing` otherwise
    #[default]
    Smart,
    /// Fire every missed time as soon as possible; never treated as misfired
    IgnoreMisfirePolicy,
    /// Reschedule to fire immediately
    FireNow,
    /// Skip missed firings and wait for the next scheduled time
    DoNothing,
}

/// When and how often one job fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub key: TriggerKey,
    pub job_key: JobKey,
    #[serde(default)]
    pub description: Option<String>,
    pub schedule: Schedule,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_fire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub previous_fire_time: Option<DateTime<Utc>>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub misfire_instruction: MisfireInstruction,
    #[serde(default)]
    pub calendar_name: Option<String>,
    #[serde(default)]
    pub times_triggered: u32,
    #[serde(default)]
    pub data: JobDataMap,
    /// Assigned when the trigger is acquired for firing
    #[serde(default)]
    pub fire_instance_id: Option<String>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl Trigger {
    /// Create a trigger whose first fire time is its first scheduled time
    /// at or after `start_time` (calendars are applied by
    /// [`Trigger::compute_first_fire_time`]).
    pub fn new(
        key: TriggerKey,
        job_key: JobKey,
        schedule: Schedule,
        start_time: DateTime<Utc>,
    ) -> Self {
        let mut trigger = Self {
            key,
            job_key,
            description: None,
            schedule,
            start_time,
            end_time: None,
            next_fire_time: None,
            previous_fire_time: None,
            priority: DEFAULT_PRIORITY,
            misfire_instruction: MisfireInstruction::Smart,
            calendar_name: None,
            times_triggered: 0,
            data: JobDataMap::new(),
            fire_instance_id: None,
        };
        trigger.next_fire_time = trigger.first_scheduled_time();
        trigger
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_misfire_instruction(mut self, instruction: MisfireInstruction) -> Self {
        self.misfire_instruction = instruction;
        self
    }

    pub fn with_calendar(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = Some(name.into());
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        if self.next_fire_time.is_some_and(|t| t > end_time) {
            self.next_fire_time = None;
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_next_fire_time(mut self, next_fire_time: Option<DateTime<Utc>>) -> Self {
        self.next_fire_time = next_fire_time;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Whether the trigger has another fire time ahead of it
    pub fn may_fire_again(&self) -> bool {
        self.next_fire_time.is_some()
    }

    /// Scheduled time strictly after `after`, bounded by the end time
    pub fn fire_time_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let next = self.schedule.fire_time_after(self.start_time, after)?;
        match self.end_time {
            Some(end) if next > end => None,
            _ => Some(next),
        }
    }

    /// Compute (and store) the first fire time, honouring the calendar
    pub fn compute_first_fire_time(
        &mut self,
        calendar: Option<&Calendar>,
    ) -> Option<DateTime<Utc>> {
        let first = self.first_scheduled_time();
        self.next_fire_time = self.skip_excluded(first, calendar);
        self.next_fire_time
    }

    /// Advance after a firing: the current fire time becomes the previous one
    pub fn triggered(&mut self, calendar: Option<&Calendar>) {
        self.times_triggered = self.times_triggered.saturating_add(1);
        self.previous_fire_time = self.next_fire_time;
        let following = self
            .next_fire_time
            .and_then(|current| self.fire_time_after(current));
        self.next_fire_time = self.skip_excluded(following, calendar);
    }

    /// Recompute the next fire time after a misfire
    pub fn update_after_misfire(&mut self, calendar: Option<&Calendar>, now: DateTime<Utc>) {
        let fire_now = match self.misfire_instruction {
            MisfireInstruction::IgnoreMisfirePolicy => return,
            MisfireInstruction::FireNow => true,
            MisfireInstruction::DoNothing => false,
            MisfireInstruction::Smart => self.schedule.is_one_shot(),
        };

        if fire_now {
            self.next_fire_time = Some(now);
        } else {
            let next = self.fire_time_after(now);
            self.next_fire_time = self.skip_excluded(next, calendar);
        }
    }

    /// Re-evaluate the next fire time against a replaced calendar
    ///
    /// If the recomputed time has already passed by more than
    /// `misfire_threshold`, it is skipped once so the trigger does not
    /// immediately misfire.
    pub fn update_with_new_calendar(
        &mut self,
        calendar: &Calendar,
        misfire_threshold: Duration,
        now: DateTime<Utc>,
    ) {
        let next = match self.previous_fire_time {
            Some(previous) => self.fire_time_after(previous),
            None => self.first_scheduled_time(),
        };
        let Some(mut next) = self.skip_excluded(next, Some(calendar)) else {
            self.next_fire_time = None;
            return;
        };

        if next < now {
            let behind = (now - next).to_std().unwrap_or_default();
            if behind >= misfire_threshold {
                match self.skip_excluded(self.fire_time_after(next), Some(calendar)) {
                    Some(skipped) => next = skipped,
                    None => {
                        self.next_fire_time = None;
                        return;
                    }
                }
            }
        }
        self.next_fire_time = Some(next);
    }

    /// Instruction for the store once the job body has finished normally
    pub fn execution_complete(&self) -> CompletedExecutionInstruction {
        if self.may_fire_again() {
            CompletedExecutionInstruction::Noop
        } else {
            CompletedExecutionInstruction::DeleteTrigger
        }
    }

    fn first_scheduled_time(&self) -> Option<DateTime<Utc>> {
        let before_start = self
            .start_time
            .checked_sub_signed(TimeDelta::milliseconds(1))?;
        self.fire_time_after(before_start)
    }

    /// Walk forward through the schedule until the calendar includes the time
    fn skip_excluded(
        &self,
        mut candidate: Option<DateTime<Utc>>,
        calendar: Option<&Calendar>,
    ) -> Option<DateTime<Utc>> {
        let Some(calendar) = calendar else {
            return candidate;
        };
        for _ in 0..MAX_CALENDAR_SKIPS {
            let time = candidate?;
            if calendar.is_time_included(time) {
                return Some(time);
            }
            // Jump to the first included instant, then back onto the schedule
            let included = calendar.next_included_time(time)?;
            let resume_from = included.checked_sub_signed(TimeDelta::milliseconds(1))?;
            candidate = self.fire_time_after(resume_from);
        }
        None
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
