// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutations applied to the shared grid
//!
//! Every change the job store makes is expressed as an operation so the grid
//! can log it to the write-ahead log before applying it.

use crate::calendar::Calendar;
use crate::job::JobDetail;
use crate::key::{JobKey, TriggerKey};
use crate::state::TriggerWrapper;
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert or replace a job
    JobStore { job: JobDetail },

    /// Remove a job (its triggers are removed by separate operations)
    JobRemove { key: JobKey },

    /// Insert or replace a trigger together with its state
    TriggerStore { wrapper: TriggerWrapper },

    /// Remove a trigger
    TriggerRemove { key: TriggerKey },

    CalendarStore { name: String, calendar: Calendar },

    CalendarRemove { name: String },

    TriggerGroupPause { group: String },

    TriggerGroupResume { group: String },

    JobGroupPause { group: String },

    JobGroupResume { group: String },

    /// A disallow-concurrent job started executing on `instance_id`
    JobBlock { key: JobKey, instance_id: String },

    JobUnblock { key: JobKey },

    /// Wipe every collection
    ClearAll,
}

impl Operation {
    /// Short name for log fields
    pub fn name(&self) -> &'static str {
        match self {
            Operation::JobStore { .. } => "job_store",
            Operation::JobRemove { .. } => "job_remove",
            Operation::TriggerStore { .. } => "trigger_store",
            Operation::TriggerRemove { .. } => "trigger_remove",
            Operation::CalendarStore { .. } => "calendar_store",
            Operation::CalendarRemove { .. } => "calendar_remove",
            Operation::TriggerGroupPause { .. } => "trigger_group_pause",
            Operation::TriggerGroupResume { .. } => "trigger_group_resume",
            Operation::JobGroupPause { .. } => "job_group_pause",
            Operation::JobGroupResume { .. } => "job_group_resume",
            Operation::JobBlock { .. } => "job_block",
            Operation::JobUnblock { .. } => "job_unblock",
            Operation::ClearAll => "clear_all",
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
