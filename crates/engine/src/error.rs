// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the job store

use cj_core::{CalendarError, JobKey, ScheduleError, TriggerKey};
use cj_storage::GridError;
use thiserror::Error;

/// Errors that can occur in job store operations
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("{kind} {key} already exists")]
    ObjectAlreadyExists { kind: &'static str, key: String },
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] GridError),
    #[error("calendar {calendar} is still referenced by trigger {trigger}")]
    ResourceInUse { calendar: String, trigger: TriggerKey },
    #[error("job not found: {0}")]
    JobNotFound(JobKey),
    #[error("calendar not found: {0}")]
    CalendarNotFound(String),
    #[error("trigger {trigger} belongs to job {expected}, not {found}")]
    TriggerJobMismatch {
        trigger: TriggerKey,
        expected: JobKey,
        found: JobKey,
    },
    #[error("trigger {trigger} has an invalid schedule: {source}")]
    InvalidSchedule {
        trigger: TriggerKey,
        source: ScheduleError,
    },
    #[error("calendar {calendar} is invalid: {source}")]
    InvalidCalendar {
        calendar: String,
        source: CalendarError,
    },
}

impl JobStoreError {
    pub(crate) fn job_exists(key: &JobKey) -> Self {
        Self::ObjectAlreadyExists {
            kind: "job",
            key: key.to_string(),
        }
    }

    pub(crate) fn trigger_exists(key: &TriggerKey) -> Self {
        Self::ObjectAlreadyExists {
            kind: "trigger",
            key: key.to_string(),
        }
    }

    pub(crate) fn calendar_exists(name: &str) -> Self {
        Self::ObjectAlreadyExists {
            kind: "calendar",
            key: name.to_string(),
        }
    }
}
