//! Shared helpers for job store specs

pub use chrono::{DateTime, Utc};
pub use cj_core::{
    Clock, CompletedExecutionInstruction, FakeClock, GroupMatcher, JobDetail, JobKey,
    RecordingSignaler, Schedule, SequentialIdGen, Signal, StoreConfig, Trigger, TriggerKey,
    TriggerState,
};
pub use cj_engine::{JobStore, JobStoreError};
pub use cj_storage::MemoryGrid;
pub use std::sync::Arc;
pub use std::time::Duration;

/// Start of every spec's clock, in epoch milliseconds
pub const T0: i64 = 1_700_000_000_000;

pub fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap()
}

/// One scheduler node attached to a grid
pub struct Node {
    pub store: JobStore<FakeClock, SequentialIdGen>,
    pub clock: FakeClock,
    pub signals: RecordingSignaler,
}

impl Node {
    pub fn join(grid: &Arc<MemoryGrid>, instance_id: &str) -> Self {
        let clock = FakeClock::at_millis(T0);
        let signals = RecordingSignaler::new();
        let store = JobStore::with_deps(
            Arc::clone(grid),
            StoreConfig::new(instance_id),
            Arc::new(signals.clone()),
            clock.clone(),
            SequentialIdGen::new(instance_id),
        );
        Self {
            store,
            clock,
            signals,
        }
    }

    /// Acquire up to `max_count` triggers due now
    pub fn acquire(&self, max_count: usize) -> Vec<TriggerKey> {
        self.store
            .acquire_next_triggers(self.clock.now(), max_count, Duration::ZERO)
            .unwrap()
            .into_iter()
            .map(|trigger| trigger.key)
            .collect()
    }

    /// Acquire, fire and complete everything due now
    pub fn run_due(&self) -> Vec<TriggerKey> {
        let acquired = self
            .store
            .acquire_next_triggers(self.clock.now(), 10, Duration::ZERO)
            .unwrap();
        let mut ran = Vec::new();
        for result in self.store.triggers_fired(&acquired).unwrap() {
            let Some(bundle) = result.bundle else {
                continue;
            };
            let instruction = bundle.trigger.execution_complete();
            self.store
                .triggered_job_complete(&bundle.trigger, &bundle.job, instruction)
                .unwrap();
            ran.push(result.trigger_key);
        }
        ran
    }

    pub fn state(&self, name: &str) -> TriggerState {
        self.store
            .get_trigger_state(&TriggerKey::named(name))
            .unwrap()
    }
}

pub fn job(name: &str) -> JobDetail {
    JobDetail::new(JobKey::named(name))
}

pub fn trigger(name: &str, job: &str, schedule: Schedule, fire_at: i64) -> Trigger {
    Trigger::new(
        TriggerKey::named(name),
        JobKey::named(job),
        schedule,
        at(fire_at),
    )
}

pub fn every_minute() -> Schedule {
    Schedule::every(Duration::from_secs(60))
}
