// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for job store tests

use crate::JobStore;
use chrono::{DateTime, Utc};
use cj_core::{
    FakeClock, JobDetail, JobKey, RecordingSignaler, Schedule, SequentialIdGen, StoreConfig,
    Trigger, TriggerKey,
};
use cj_storage::MemoryGrid;
use std::sync::Arc;
use std::time::Duration;

/// Clock start for every test, in epoch milliseconds
pub(crate) const T0: i64 = 1_000_000;

pub(crate) fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap()
}

pub(crate) struct Harness {
    pub store: JobStore<FakeClock, SequentialIdGen>,
    pub clock: FakeClock,
    pub signals: RecordingSignaler,
    pub grid: Arc<MemoryGrid>,
}

impl Harness {
    pub fn new() -> Self {
        Self::on_grid(Arc::new(MemoryGrid::new("test-grid")), "node-a")
    }

    /// Another node on `grid`, with its own clock starting at `T0`
    pub fn on_grid(grid: Arc<MemoryGrid>, instance_id: &str) -> Self {
        let clock = FakeClock::at_millis(T0);
        let signals = RecordingSignaler::new();
        let store = JobStore::with_deps(
            Arc::clone(&grid),
            StoreConfig::new(instance_id),
            Arc::new(signals.clone()),
            clock.clone(),
            SequentialIdGen::new(instance_id),
        );
        Self {
            store,
            clock,
            signals,
            grid,
        }
    }

    /// Store `job` (unless already stored) and `trigger`
    pub fn schedule(&self, job: JobDetail, trigger: Trigger) {
        if !self.store.check_job_exists(&job.key).unwrap() {
            self.store.store_job(job, false).unwrap();
        }
        self.store.store_trigger(trigger, false).unwrap();
    }

    /// Acquire everything due by `T0` with no window
    pub fn acquire_due(&self) -> Vec<TriggerKey> {
        self.store
            .acquire_next_triggers(at(T0), 10, Duration::ZERO)
            .unwrap()
            .into_iter()
            .map(|trigger| trigger.key)
            .collect()
    }
}

pub(crate) fn job(name: &str) -> JobDetail {
    JobDetail::new(JobKey::named(name))
}

/// Trigger firing `job` every minute starting at `fire_at`
pub(crate) fn every_minute(name: &str, job: &str, fire_at: i64) -> Trigger {
    Trigger::new(
        TriggerKey::named(name),
        JobKey::named(job),
        Schedule::every(Duration::from_secs(60)),
        at(fire_at),
    )
}

/// Trigger firing `job` once at `fire_at`
pub(crate) fn once(name: &str, job: &str, fire_at: i64) -> Trigger {
    Trigger::new(
        TriggerKey::named(name),
        JobKey::named(job),
        Schedule::once(),
        at(fire_at),
    )
}
