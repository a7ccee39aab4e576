// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Firing acquired triggers and completing executions

use crate::error::JobStoreError;
use crate::store::{wrappers_for_job, JobStore};
use chrono::{DateTime, Utc};
use cj_core::{
    Clock, CompletedExecutionInstruction, IdGen, JobDetail, Operation, Trigger,
    TriggerFiredBundle, TriggerFiredResult, TriggerKey, TriggerState,
};
use cj_storage::GridGuard;

impl<C: Clock, I: IdGen> JobStore<C, I> {
    /// Fire each acquired trigger, advancing its schedule
    ///
    /// A result carries no bundle when the trigger was removed, released or
    /// paused since acquisition, or when its calendar or job is gone.
    pub fn triggers_fired(
        &self,
        triggers: &[Trigger],
    ) -> Result<Vec<TriggerFiredResult>, JobStoreError> {
        let now = self.now();
        self.write(|grid| {
            let mut results = Vec::with_capacity(triggers.len());
            for trigger in triggers {
                let bundle = self.fire_one(grid, &trigger.key, now)?;
                results.push(TriggerFiredResult {
                    trigger_key: trigger.key.clone(),
                    bundle,
                });
            }
            Ok(results)
        })
    }

    fn fire_one(
        &self,
        grid: &mut GridGuard<'_>,
        key: &TriggerKey,
        now: DateTime<Utc>,
    ) -> Result<Option<TriggerFiredBundle>, JobStoreError> {
        let state = grid.state();
        let Some(wrapper) = state.trigger(key) else {
            tracing::debug!(trigger = %key, "fired trigger no longer stored");
            return Ok(None);
        };
        if wrapper.state() != TriggerState::Acquired {
            tracing::debug!(trigger = %key, state = %wrapper.state(), "fired trigger not acquired");
            return Ok(None);
        }
        let calendar = match wrapper.trigger.calendar_name.as_deref() {
            Some(name) => match state.calendar(name) {
                Some(calendar) => Some(calendar.clone()),
                None => {
                    tracing::warn!(trigger = %key, calendar = name, "fired trigger's calendar is gone");
                    return Ok(None);
                }
            },
            None => None,
        };

        let mut wrapper = wrapper.clone();
        let previous_fire_time = wrapper.trigger.previous_fire_time;
        wrapper.trigger.triggered(calendar.as_ref());
        wrapper.fired();
        if wrapper.trigger.next_fire_time.is_none() {
            wrapper.complete();
        }
        let fired = wrapper.trigger.clone();
        grid.apply(Operation::TriggerStore { wrapper })?;

        let state = grid.state();
        let Some(job) = state.job(&fired.job_key).cloned() else {
            tracing::warn!(trigger = %key, job = %fired.job_key, "fired trigger's job is gone");
            return Ok(None);
        };

        if job.disallow_concurrent_execution {
            self.block_siblings(grid, &job, key)?;
        }

        tracing::info!(
            trigger = %key,
            job = %job.key,
            fire_instance = ?fired.fire_instance_id,
            next_fire_time = ?fired.next_fire_time,
            "trigger fired"
        );
        Ok(Some(TriggerFiredBundle {
            job,
            recovering: false,
            fire_time: now,
            scheduled_fire_time: fired.previous_fire_time,
            previous_fire_time,
            next_fire_time: fired.next_fire_time,
            trigger: fired,
            calendar,
        }))
    }

    /// Block every other trigger of `job` and record the job as executing
    fn block_siblings(
        &self,
        grid: &mut GridGuard<'_>,
        job: &JobDetail,
        fired: &TriggerKey,
    ) -> Result<(), JobStoreError> {
        for mut sibling in wrappers_for_job(grid.state(), &job.key) {
            if sibling.trigger.key == *fired {
                continue;
            }
            if sibling.block() {
                grid.apply(Operation::TriggerStore { wrapper: sibling })?;
            }
        }
        grid.apply(Operation::JobBlock {
            key: job.key.clone(),
            instance_id: self.instance_id().to_string(),
        })?;
        Ok(())
    }

    /// Record the outcome of an execution started by [`JobStore::triggers_fired`]
    ///
    /// `trigger` and `job` are the copies from the fired bundle; `job.data`
    /// holds the data map as the execution left it.
    pub fn triggered_job_complete(
        &self,
        trigger: &Trigger,
        job: &JobDetail,
        instruction: CompletedExecutionInstruction,
    ) -> Result<(), JobStoreError> {
        let mut grid = self.lock()?;

        if job.persist_job_data_after_execution {
            if let Some(stored) = grid.state().job(&job.key) {
                let mut updated = stored.clone();
                updated.data = job.data.clone();
                grid.apply(Operation::JobStore { job: updated })?;
            }
        }

        if job.disallow_concurrent_execution {
            self.unblock_job_locked(&mut grid, &job.key)?;
            self.signaler().signal_scheduling_change(None);
        }

        let key = &trigger.key;
        tracing::debug!(trigger = %key, job = %job.key, %instruction, "job complete");
        match instruction {
            CompletedExecutionInstruction::Noop => {}
            CompletedExecutionInstruction::DeleteTrigger => {
                if trigger.next_fire_time.is_some() {
                    self.remove_trigger_locked(&mut grid, key)?;
                    self.signaler().signal_scheduling_change(None);
                } else {
                    // A stored fire time means it was rescheduled while the job ran
                    let rescheduled = grid
                        .state()
                        .trigger(key)
                        .is_some_and(|stored| stored.trigger.next_fire_time.is_some());
                    if !rescheduled {
                        self.remove_trigger_locked(&mut grid, key)?;
                    }
                }
            }
            CompletedExecutionInstruction::SetTriggerComplete => {
                self.settle_trigger(&mut grid, key, TriggerState::Complete)?;
                self.signaler().signal_scheduling_change(None);
            }
            CompletedExecutionInstruction::SetTriggerError => {
                tracing::warn!(trigger = %key, "trigger set to error state");
                self.settle_trigger(&mut grid, key, TriggerState::Error)?;
                self.signaler().signal_scheduling_change(None);
            }
            CompletedExecutionInstruction::SetAllJobTriggersComplete => {
                self.settle_job_triggers(&mut grid, job, TriggerState::Complete)?;
                self.signaler().signal_scheduling_change(None);
            }
            CompletedExecutionInstruction::SetAllJobTriggersError => {
                tracing::warn!(job = %job.key, "all triggers of job set to error state");
                self.settle_job_triggers(&mut grid, job, TriggerState::Error)?;
                self.signaler().signal_scheduling_change(None);
            }
        }
        grid.commit()?;
        Ok(())
    }

    fn settle_trigger(
        &self,
        grid: &mut GridGuard<'_>,
        key: &TriggerKey,
        outcome: TriggerState,
    ) -> Result<(), JobStoreError> {
        let Some(wrapper) = grid.state().trigger(key) else {
            return Ok(());
        };
        let mut wrapper = wrapper.clone();
        if outcome == TriggerState::Error {
            wrapper.set_error();
        } else {
            wrapper.complete();
        }
        grid.apply(Operation::TriggerStore { wrapper })?;
        Ok(())
    }

    fn settle_job_triggers(
        &self,
        grid: &mut GridGuard<'_>,
        job: &JobDetail,
        outcome: TriggerState,
    ) -> Result<(), JobStoreError> {
        let keys: Vec<TriggerKey> = grid.state().triggers_for_job(&job.key).cloned().collect();
        for key in keys {
            self.settle_trigger(grid, &key, outcome)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fired_tests.rs"]
mod tests;
