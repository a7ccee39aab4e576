// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Misfire detection and recovery

use crate::error::JobStoreError;
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use cj_core::clock::saturating_sub;
use cj_core::{Clock, IdGen, MisfireInstruction, Operation, TriggerKey, TriggerState, TriggerWrapper};
use cj_storage::{GridGuard, GridState};

impl<C: Clock, I: IdGen> JobStore<C, I> {
    /// Latest fire time that still counts as on time at `now`
    pub(crate) fn misfire_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        saturating_sub(now, self.config().misfire_threshold)
    }

    /// Reschedule `wrapper` if it missed its fire time
    ///
    /// Mutates the wrapper in place; the caller persists it. Returns true
    /// when the next fire time changed, in which case the trigger must not be
    /// acquired in the current pass.
    pub(crate) fn misfire_wrapper(
        &self,
        state: &GridState,
        wrapper: &mut TriggerWrapper,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(original) = wrapper.trigger.next_fire_time else {
            return false;
        };
        if original > self.misfire_time(now)
            || wrapper.trigger.misfire_instruction == MisfireInstruction::IgnoreMisfirePolicy
        {
            return false;
        }

        let calendar = wrapper
            .trigger
            .calendar_name
            .as_deref()
            .and_then(|name| state.calendar(name));
        self.signaler()
            .notify_trigger_listeners_misfired(&wrapper.trigger);
        wrapper.trigger.update_after_misfire(calendar, now);

        match wrapper.trigger.next_fire_time {
            None => {
                tracing::info!(trigger = %wrapper.trigger.key, "misfired trigger will never fire again");
                wrapper.complete();
                self.signaler()
                    .notify_scheduler_listeners_finalized(&wrapper.trigger);
                true
            }
            Some(next) if next == original => false,
            Some(next) => {
                tracing::info!(
                    trigger = %wrapper.trigger.key,
                    missed = %original,
                    next = %next,
                    "trigger misfired"
                );
                true
            }
        }
    }

    /// Apply misfire handling to one stored trigger, persisting any change
    pub fn apply_misfire(&self, key: &TriggerKey) -> Result<bool, JobStoreError> {
        let now = self.now();
        self.write(|grid| self.apply_misfire_locked(grid, key, now))
    }

    pub(crate) fn apply_misfire_locked(
        &self,
        grid: &mut GridGuard<'_>,
        key: &TriggerKey,
        now: DateTime<Utc>,
    ) -> Result<bool, JobStoreError> {
        let state = grid.state();
        let Some(wrapper) = state.trigger(key) else {
            return Ok(false);
        };
        let mut wrapper = wrapper.clone();
        if !self.misfire_wrapper(state, &mut wrapper, now) {
            return Ok(false);
        }
        grid.apply(Operation::TriggerStore { wrapper })?;
        Ok(true)
    }

    /// Reschedule every waiting trigger that fell behind the misfire threshold
    ///
    /// Overdue triggers never show up as acquisition candidates, so this
    /// sweep is what moves them forward. Returns the number rescheduled.
    pub fn recover_misfired_triggers(&self) -> Result<usize, JobStoreError> {
        let now = self.now();
        self.write(|grid| self.recover_misfired_locked(grid, now))
    }

    pub(crate) fn recover_misfired_locked(
        &self,
        grid: &mut GridGuard<'_>,
        now: DateTime<Utc>,
    ) -> Result<usize, JobStoreError> {
        let misfire_time = self.misfire_time(now);
        let state = grid.state();
        let overdue: Vec<TriggerKey> = state
            .fire_index_until(misfire_time)
            .filter(|entry| {
                state.trigger(&entry.key).is_some_and(|wrapper| {
                    wrapper.state() == TriggerState::Normal
                        && wrapper.trigger.misfire_instruction
                            != MisfireInstruction::IgnoreMisfirePolicy
                })
            })
            .map(|entry| entry.key.clone())
            .collect();

        let mut recovered = 0;
        for key in overdue {
            if self.apply_misfire_locked(grid, &key, now)? {
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::debug!(recovered, "recovered misfired triggers");
        }
        Ok(recovered)
    }
}

#[cfg(test)]
#[path = "misfire_tests.rs"]
mod tests;
