// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler driver: acquires due triggers, fires them and runs their jobs
//!
//! Each pass acquires a batch from the job store, fires it, and hands every
//! resulting bundle to a [`JobRunner`] on its own task. Completion is
//! reported back to the store when the runner returns, fails or panics. Between passes the
//! loop sleeps until the poll interval elapses or the store signals a
//! scheduling change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cj_core::{
    Clock, CompletedExecutionInstruction, IdGen, JobKey, SchedulerSignaler, SequentialIdGen,
    SystemClock, Trigger, TriggerFiredBundle,
};
use cj_engine::JobStore;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::DriverConfig;
use crate::lifecycle::DaemonError;

/// A failed job execution and what should happen to its triggers
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct JobFailure {
    pub message: String,
    /// Never fire the trigger that started this execution again
    pub unschedule_firing_trigger: bool,
    /// Never fire any trigger of the job again
    pub unschedule_all_triggers: bool,
}

impl JobFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn unschedule_firing_trigger(mut self) -> Self {
        self.unschedule_firing_trigger = true;
        self
    }

    pub fn unschedule_all_triggers(mut self) -> Self {
        self.unschedule_all_triggers = true;
        self
    }
}

/// Executes fired jobs
///
/// The runner may update `bundle.job.data`; the store keeps the updated map
/// when the job persists its data after execution.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, bundle: &mut TriggerFiredBundle) -> Result<(), JobFailure>;
}

/// Runner that only logs each execution
#[derive(Clone, Copy, Debug, Default)]
pub struct LogJobRunner;

#[async_trait]
impl JobRunner for LogJobRunner {
    async fn run(&self, bundle: &mut TriggerFiredBundle) -> Result<(), JobFailure> {
        info!(
            job = %bundle.job.key,
            trigger = %bundle.trigger.key,
            scheduled = ?bundle.scheduled_fire_time,
            next = ?bundle.next_fire_time,
            "running job"
        );
        Ok(())
    }
}

/// Instruction reported to the store once an execution ends
pub fn completion_instruction(
    trigger: &Trigger,
    outcome: &Result<(), JobFailure>,
) -> CompletedExecutionInstruction {
    match outcome {
        Err(failure) if failure.unschedule_all_triggers => {
            CompletedExecutionInstruction::SetAllJobTriggersComplete
        }
        Err(failure) if failure.unschedule_firing_trigger => {
            CompletedExecutionInstruction::SetTriggerComplete
        }
        _ => trigger.execution_complete(),
    }
}

/// Signaler that wakes the driver loop on scheduling changes
pub struct LoopSignaler {
    wake: Arc<Notify>,
}

impl LoopSignaler {
    pub fn new(wake: Arc<Notify>) -> Self {
        Self { wake }
    }
}

impl SchedulerSignaler for LoopSignaler {
    fn notify_trigger_listeners_misfired(&self, trigger: &Trigger) {
        warn!(trigger = %trigger.key, next = ?trigger.next_fire_time, "trigger misfired");
    }

    fn notify_scheduler_listeners_finalized(&self, trigger: &Trigger) {
        info!(trigger = %trigger.key, "trigger finalized");
    }

    fn notify_scheduler_listeners_job_deleted(&self, key: &JobKey) {
        info!(job = %key, "job deleted");
    }

    fn signal_scheduling_change(&self, candidate: Option<DateTime<Utc>>) {
        debug!(?candidate, "scheduling change");
        self.wake.notify_one();
    }
}

/// Acquire/fire/complete loop for one scheduler node
pub struct SchedulerLoop<R, C: Clock = SystemClock, I: IdGen = SequentialIdGen> {
    store: Arc<JobStore<C, I>>,
    runner: Arc<R>,
    clock: C,
    config: DriverConfig,
    wake: Arc<Notify>,
    executions: JoinSet<()>,
}

impl<R: JobRunner> SchedulerLoop<R> {
    pub fn new(
        store: Arc<JobStore>,
        runner: Arc<R>,
        config: DriverConfig,
        wake: Arc<Notify>,
    ) -> Self {
        Self::with_clock(store, runner, config, wake, SystemClock)
    }
}

impl<R, C, I> SchedulerLoop<R, C, I>
where
    R: JobRunner,
    C: Clock + 'static,
    I: IdGen + 'static,
{
    /// `clock` should be the clock the store was built with
    pub fn with_clock(
        store: Arc<JobStore<C, I>>,
        runner: Arc<R>,
        config: DriverConfig,
        wake: Arc<Notify>,
        clock: C,
    ) -> Self {
        Self {
            store,
            runner,
            clock,
            config,
            wake,
            executions: JoinSet::new(),
        }
    }

    /// Run until `cancel` changes, then wait for running executions
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        info!(
            instance = %self.store.instance_id(),
            poll_interval = ?self.config.poll_interval,
            batch_size = self.config.batch_size,
            "scheduler loop started"
        );
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.wake.notified() => {}
                _ = cancel.changed() => {
                    info!("scheduler loop shutting down");
                    break;
                }
            }

            match self.run_once() {
                Ok(_) => failures = 0,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.store.acquire_retry_delay(failures);
                    error!(error = %e, failures, ?delay, "scheduler pass failed");
                    tokio::time::sleep(delay).await;
                }
            }
            self.reap_finished();
        }

        self.wait_for_executions().await;
        info!("scheduler loop stopped");
    }

    /// One acquire/fire pass; returns how many executions were started
    pub fn run_once(&mut self) -> Result<usize, DaemonError> {
        let now = self.clock.now();
        let acquired = self.store.acquire_next_triggers(
            now,
            self.config.batch_size,
            self.config.time_window,
        )?;
        if acquired.is_empty() {
            return Ok(0);
        }

        let results = self.store.triggers_fired(&acquired)?;
        let mut started = 0;
        for result in results {
            let Some(bundle) = result.bundle else {
                debug!(trigger = %result.trigger_key, "trigger not fired");
                continue;
            };
            self.spawn_execution(bundle);
            started += 1;
        }
        Ok(started)
    }

    /// Wait for every execution started so far to report completion
    pub async fn wait_for_executions(&mut self) {
        while let Some(joined) = self.executions.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "job execution task failed");
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.executions.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "job execution task failed");
            }
        }
    }

    fn spawn_execution(&mut self, bundle: TriggerFiredBundle) {
        let store = Arc::clone(&self.store);
        let runner = Arc::clone(&self.runner);
        self.executions.spawn(async move {
            let (bundle, outcome) = execute(runner, bundle).await;
            if let Err(failure) = &outcome {
                warn!(
                    job = %bundle.job.key,
                    trigger = %bundle.trigger.key,
                    error = %failure,
                    "job failed"
                );
            }
            let instruction = completion_instruction(&bundle.trigger, &outcome);
            if let Err(e) = store.triggered_job_complete(&bundle.trigger, &bundle.job, instruction)
            {
                error!(
                    job = %bundle.job.key,
                    trigger = %bundle.trigger.key,
                    error = %e,
                    "failed to record job completion"
                );
            }
        });
    }
}

/// Run one execution on its own task so a panicking runner still yields an
/// outcome; the bundle comes back as the runner left it, or as fired when
/// the runner panicked
async fn execute<R: JobRunner>(
    runner: Arc<R>,
    bundle: TriggerFiredBundle,
) -> (TriggerFiredBundle, Result<(), JobFailure>) {
    let fired = bundle.clone();
    let task = tokio::spawn(async move {
        let mut bundle = bundle;
        let outcome = runner.run(&mut bundle).await;
        (bundle, outcome)
    });
    match task.await {
        Ok(done) => done,
        Err(e) => (fired, Err(JobFailure::new(format!("job execution aborted: {e}")))),
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
