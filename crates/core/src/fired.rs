// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Firing context handed from the job store to the executor

use crate::calendar::Calendar;
use crate::job::JobDetail;
use crate::key::TriggerKey;
use crate::trigger::Trigger;
use chrono::{DateTime, Utc};

/// Everything an executor needs to run one firing of a job
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerFiredBundle {
    pub job: JobDetail,
    /// The trigger as it is after the firing (fire times already advanced)
    pub trigger: Trigger,
    pub calendar: Option<Calendar>,
    pub recovering: bool,
    /// When the firing actually happened
    pub fire_time: DateTime<Utc>,
    /// When the firing was scheduled for
    pub scheduled_fire_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
}

/// Outcome of firing one acquired trigger
///
/// `bundle` is `None` when the trigger was removed, paused or released
/// between acquisition and firing, or its calendar disappeared.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerFiredResult {
    pub trigger_key: TriggerKey,
    pub bundle: Option<TriggerFiredBundle>,
}
