// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callbacks from the job store back into the scheduler driver

use crate::key::JobKey;
use crate::trigger::Trigger;
use chrono::{DateTime, Utc};

/// Notifications the store raises while it holds the cluster lock
///
/// Implementations must not call back into the job store.
pub trait SchedulerSignaler: Send + Sync {
    /// A trigger missed its fire time and was rescheduled
    fn notify_trigger_listeners_misfired(&self, trigger: &Trigger);

    /// A trigger will never fire again
    fn notify_scheduler_listeners_finalized(&self, trigger: &Trigger);

    /// A job was removed because its last trigger went away
    fn notify_scheduler_listeners_job_deleted(&self, key: &JobKey);

    /// Scheduling data changed; the driver should re-poll soon
    fn signal_scheduling_change(&self, candidate_new_next_fire_time: Option<DateTime<Utc>>);
}

/// Signaler that drops every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpSignaler;

impl SchedulerSignaler for NoOpSignaler {
    fn notify_trigger_listeners_misfired(&self, _trigger: &Trigger) {}

    fn notify_scheduler_listeners_finalized(&self, _trigger: &Trigger) {}

    fn notify_scheduler_listeners_job_deleted(&self, _key: &JobKey) {}

    fn signal_scheduling_change(&self, _candidate: Option<DateTime<Utc>>) {}
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{RecordingSignaler, Signal};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use crate::key::TriggerKey;
    use std::sync::{Arc, Mutex};

    /// Recorded signaler callback
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Signal {
        Misfired(TriggerKey),
        Finalized(TriggerKey),
        JobDeleted(JobKey),
        SchedulingChange(Option<DateTime<Utc>>),
    }

    /// Signaler that records every callback for assertions
    #[derive(Clone, Debug, Default)]
    pub struct RecordingSignaler {
        calls: Arc<Mutex<Vec<Signal>>>,
    }

    impl RecordingSignaler {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded signals
        pub fn calls(&self) -> Vec<Signal> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
        }

        fn record(&self, signal: Signal) {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(signal);
        }
    }

    impl SchedulerSignaler for RecordingSignaler {
        fn notify_trigger_listeners_misfired(&self, trigger: &Trigger) {
            self.record(Signal::Misfired(trigger.key.clone()));
        }

        fn notify_scheduler_listeners_finalized(&self, trigger: &Trigger) {
            self.record(Signal::Finalized(trigger.key.clone()));
        }

        fn notify_scheduler_listeners_job_deleted(&self, key: &JobKey) {
            self.record(Signal::JobDeleted(key.clone()));
        }

        fn signal_scheduling_change(&self, candidate: Option<DateTime<Utc>>) {
            self.record(Signal::SchedulingChange(candidate));
        }
    }
}
