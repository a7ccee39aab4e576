// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger acquisition
//!
//! Candidates come from the grid's next-fire-time index, already in
//! acquisition order (fire time, then priority, then key). A batch never
//! spans more than one `time_window` past its first trigger and holds at
//! most one trigger per disallow-concurrent job.

use crate::error::JobStoreError;
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use cj_core::clock::saturating_add;
use cj_core::{
    Clock, IdGen, JobKey, MisfireInstruction, Operation, Trigger, TriggerKey, TriggerState,
};
use std::collections::HashSet;
use std::time::Duration;

impl<C: Clock, I: IdGen> JobStore<C, I> {
    /// Acquire up to `max_count` triggers due by `no_later_than + time_window`
    pub fn acquire_next_triggers(
        &self,
        no_later_than: DateTime<Utc>,
        max_count: usize,
        time_window: Duration,
    ) -> Result<Vec<Trigger>, JobStoreError> {
        if max_count == 0 {
            return Ok(Vec::new());
        }
        let mut grid = self.lock()?;
        let now = self.now();
        self.recover_misfired_locked(&mut grid, now)?;

        let horizon = saturating_add(no_later_than, time_window);
        let misfire_time = self.misfire_time(now);
        let state = grid.state();
        let candidates: Vec<TriggerKey> = state
            .fire_index_until(horizon)
            .filter(|entry| {
                entry.next_fire_time >= misfire_time
                    || state.trigger(&entry.key).is_some_and(|wrapper| {
                        wrapper.trigger.misfire_instruction
                            == MisfireInstruction::IgnoreMisfirePolicy
                    })
            })
            .map(|entry| entry.key.clone())
            .collect();

        let mut acquired: Vec<Trigger> = Vec::new();
        let mut batch_jobs: HashSet<JobKey> = HashSet::new();
        let mut batch_end: Option<DateTime<Utc>> = None;

        for key in candidates {
            let state = grid.state();
            let Some(wrapper) = state.trigger(&key) else {
                continue;
            };
            if wrapper.state() != TriggerState::Normal {
                continue;
            }
            let Some(fire_time) = wrapper.trigger.next_fire_time else {
                continue;
            };
            if batch_end.is_some_and(|end| fire_time > end) {
                break;
            }

            let mut wrapper = wrapper.clone();
            if self.misfire_wrapper(state, &mut wrapper, now) {
                grid.apply(Operation::TriggerStore { wrapper })?;
                continue;
            }

            let job_key = wrapper.trigger.job_key.clone();
            let Some(job) = state.job(&job_key) else {
                tracing::warn!(
                    trigger = %key,
                    job = %job_key,
                    "reaping trigger whose job no longer exists"
                );
                grid.apply(Operation::TriggerRemove { key })?;
                continue;
            };

            if job.disallow_concurrent_execution {
                let busy = batch_jobs.contains(&job_key)
                    || state.is_job_blocked(&job_key)
                    || state.triggers_for_job(&job_key).any(|sibling| {
                        state
                            .trigger(sibling)
                            .is_some_and(|w| w.state() == TriggerState::Acquired)
                    });
                if busy {
                    tracing::trace!(trigger = %key, job = %job_key, "job busy, skipping");
                    continue;
                }
                batch_jobs.insert(job_key);
            }

            wrapper.acquire(self.instance_id());
            wrapper.trigger.fire_instance_id = Some(self.next_fire_instance_id());
            tracing::debug!(
                trigger = %key,
                fire_time = %fire_time,
                fire_instance = ?wrapper.trigger.fire_instance_id,
                "acquired trigger"
            );
            acquired.push(wrapper.trigger.clone());
            grid.apply(Operation::TriggerStore { wrapper })?;

            if batch_end.is_none() {
                batch_end = Some(saturating_add(fire_time, time_window));
            }
            if acquired.len() >= max_count {
                break;
            }
        }

        grid.commit()?;
        Ok(acquired)
    }

    /// Hand an acquired trigger back, restoring the state it was acquired from
    pub fn release_acquired_trigger(&self, key: &TriggerKey) -> Result<(), JobStoreError> {
        let mut grid = self.lock()?;
        let Some(wrapper) = grid.state().trigger(key) else {
            return Ok(());
        };
        let mut wrapper = wrapper.clone();
        if !wrapper.release() {
            return Ok(());
        }
        wrapper.trigger.fire_instance_id = None;
        tracing::debug!(trigger = %key, state = %wrapper.state(), "released trigger");
        grid.apply(Operation::TriggerStore { wrapper })?;
        grid.commit()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "acquire_tests.rs"]
mod tests;
