// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clustered job store: keyed collections and scheduler lifecycle
//!
//! Every public operation takes the grid's cluster lock for its whole
//! duration, reads included, so read-modify-write sequences are atomic
//! across all nodes sharing the grid. Writing operations go through
//! [`JobStore::write`], which commits everything they applied as one grid
//! transaction. Acquisition, firing and pause/resume live in sibling modules
//! as further `impl JobStore` blocks.

use crate::error::JobStoreError;
use chrono::{DateTime, Utc};
use cj_core::{
    Calendar, Clock, GroupMatcher, IdGen, JobDetail, JobKey, Operation,
    SchedulerSignaler, SequentialIdGen, StoreConfig, SystemClock, Trigger, TriggerKey,
    TriggerState, TriggerWrapper,
};
use cj_storage::{GridGuard, GridState, MemoryGrid};
use std::sync::Arc;
use std::time::Duration;

const MIN_RETRY_DELAY: Duration = Duration::from_millis(20);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Job store for one scheduler node of a cluster sharing `grid`
pub struct JobStore<C: Clock = SystemClock, I: IdGen = SequentialIdGen> {
    grid: Arc<MemoryGrid>,
    config: StoreConfig,
    signaler: Arc<dyn SchedulerSignaler>,
    clock: C,
    id_gen: I,
}

impl JobStore {
    /// Store on the system clock
    ///
    /// Fire-instance ids are prefixed with the instance id and seeded from
    /// the wall clock so they stay unique across restarts.
    pub fn new(
        grid: Arc<MemoryGrid>,
        config: StoreConfig,
        signaler: Arc<dyn SchedulerSignaler>,
    ) -> Self {
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let id_gen = SequentialIdGen::starting_at(config.instance_id.clone(), seed);
        Self::with_deps(grid, config, signaler, SystemClock, id_gen)
    }
}

impl<C: Clock, I: IdGen> JobStore<C, I> {
    pub fn with_deps(
        grid: Arc<MemoryGrid>,
        config: StoreConfig,
        signaler: Arc<dyn SchedulerSignaler>,
        clock: C,
        id_gen: I,
    ) -> Self {
        tracing::info!(
            instance = %config.instance_id,
            grid = %grid.name(),
            "job store initialized"
        );
        Self {
            grid,
            config,
            signaler,
            clock,
            id_gen,
        }
    }

    pub(crate) fn lock(&self) -> Result<GridGuard<'_>, JobStoreError> {
        Ok(self.grid.lock(&self.config.instance_id)?)
    }

    /// Run `f` under the cluster lock and commit what it applied as one
    /// transaction
    ///
    /// `f` must only fail before its first write or because the grid did;
    /// an error after a write takes the grid offline rather than leave it
    /// half updated.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&mut GridGuard<'_>) -> Result<T, JobStoreError>,
    ) -> Result<T, JobStoreError> {
        let mut grid = self.lock()?;
        let value = f(&mut grid)?;
        grid.commit()?;
        Ok(value)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn signaler(&self) -> &dyn SchedulerSignaler {
        self.signaler.as_ref()
    }

    pub(crate) fn next_fire_instance_id(&self) -> String {
        self.id_gen.next()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    pub fn instance_name(&self) -> &str {
        &self.config.instance_name
    }

    // -- Jobs --

    pub fn store_job(&self, job: JobDetail, replace_existing: bool) -> Result<(), JobStoreError> {
        self.write(|grid| {
            if !replace_existing && grid.state().job(&job.key).is_some() {
                return Err(JobStoreError::job_exists(&job.key));
            }
            tracing::debug!(job = %job.key, "storing job");
            grid.apply(Operation::JobStore { job })?;
            Ok(())
        })
    }

    /// Remove a job and every trigger that fires it
    pub fn remove_job(&self, key: &JobKey) -> Result<bool, JobStoreError> {
        self.write(|grid| self.remove_job_locked(grid, key))
    }

    /// Remove each job; true only if every one existed
    pub fn remove_jobs(&self, keys: &[JobKey]) -> Result<bool, JobStoreError> {
        self.write(|grid| {
            let mut all_found = true;
            for key in keys {
                all_found &= self.remove_job_locked(grid, key)?;
            }
            Ok(all_found)
        })
    }

    pub fn retrieve_job(&self, key: &JobKey) -> Result<Option<JobDetail>, JobStoreError> {
        Ok(self.lock()?.state().job(key).cloned())
    }

    pub fn check_job_exists(&self, key: &JobKey) -> Result<bool, JobStoreError> {
        Ok(self.lock()?.state().job(key).is_some())
    }

    // -- Triggers --

    pub fn store_trigger(
        &self,
        trigger: Trigger,
        replace_existing: bool,
    ) -> Result<(), JobStoreError> {
        self.write(|grid| {
            validate_trigger(grid.state(), &trigger, replace_existing)?;
            self.insert_trigger(grid, trigger)
        })
    }

    pub fn store_job_and_trigger(
        &self,
        job: JobDetail,
        trigger: Trigger,
    ) -> Result<(), JobStoreError> {
        self.write(|grid| {
            if grid.state().job(&job.key).is_some() {
                return Err(JobStoreError::job_exists(&job.key));
            }
            if trigger.job_key != job.key {
                return Err(JobStoreError::TriggerJobMismatch {
                    trigger: trigger.key.clone(),
                    expected: job.key.clone(),
                    found: trigger.job_key.clone(),
                });
            }
            check_schedule(&trigger)?;
            check_calendar(grid.state(), &trigger)?;
            if grid.state().trigger(&trigger.key).is_some() {
                return Err(JobStoreError::trigger_exists(&trigger.key));
            }
            grid.apply(Operation::JobStore { job })?;
            self.insert_trigger(grid, trigger)
        })
    }

    /// Store several jobs with their triggers
    ///
    /// Everything is validated before anything is written and the writes
    /// commit together, so the grid holds either the whole batch or none of
    /// it.
    pub fn store_jobs_and_triggers(
        &self,
        batch: Vec<(JobDetail, Vec<Trigger>)>,
        replace_existing: bool,
    ) -> Result<(), JobStoreError> {
        self.write(|grid| {
            for (job, triggers) in &batch {
                let state = grid.state();
                if !replace_existing && state.job(&job.key).is_some() {
                    return Err(JobStoreError::job_exists(&job.key));
                }
                for trigger in triggers {
                    if trigger.job_key != job.key {
                        return Err(JobStoreError::TriggerJobMismatch {
                            trigger: trigger.key.clone(),
                            expected: job.key.clone(),
                            found: trigger.job_key.clone(),
                        });
                    }
                    if !replace_existing && state.trigger(&trigger.key).is_some() {
                        return Err(JobStoreError::trigger_exists(&trigger.key));
                    }
                    check_schedule(trigger)?;
                    check_calendar(state, trigger)?;
                }
            }

            for (job, triggers) in batch {
                grid.apply(Operation::JobStore { job })?;
                for trigger in triggers {
                    self.insert_trigger(grid, trigger)?;
                }
            }
            Ok(())
        })
    }

    /// Remove a trigger; the job goes too if it is non-durable and this was
    /// its last trigger
    pub fn remove_trigger(&self, key: &TriggerKey) -> Result<bool, JobStoreError> {
        self.write(|grid| self.remove_trigger_locked(grid, key))
    }

    /// Remove each trigger; true only if every one existed
    pub fn remove_triggers(&self, keys: &[TriggerKey]) -> Result<bool, JobStoreError> {
        self.write(|grid| {
            let mut all_found = true;
            for key in keys {
                all_found &= self.remove_trigger_locked(grid, key)?;
            }
            Ok(all_found)
        })
    }

    /// Swap the trigger stored under `key` for `new_trigger`
    ///
    /// Both must fire the same job. Returns false if nothing is stored
    /// under `key`.
    pub fn replace_trigger(
        &self,
        key: &TriggerKey,
        new_trigger: Trigger,
    ) -> Result<bool, JobStoreError> {
        self.write(|grid| {
            let state = grid.state();
            let Some(old) = state.trigger(key) else {
                return Ok(false);
            };
            if old.trigger.job_key != new_trigger.job_key {
                return Err(JobStoreError::TriggerJobMismatch {
                    trigger: key.clone(),
                    expected: old.trigger.job_key.clone(),
                    found: new_trigger.job_key.clone(),
                });
            }
            check_schedule(&new_trigger)?;
            check_calendar(state, &new_trigger)?;
            if new_trigger.key != *key && state.trigger(&new_trigger.key).is_some() {
                return Err(JobStoreError::trigger_exists(&new_trigger.key));
            }

            tracing::debug!(old = %key, new = %new_trigger.key, "replacing trigger");
            grid.apply(Operation::TriggerRemove { key: key.clone() })?;
            self.insert_trigger(grid, new_trigger)?;
            Ok(true)
        })
    }

    pub fn retrieve_trigger(&self, key: &TriggerKey) -> Result<Option<Trigger>, JobStoreError> {
        Ok(self
            .lock()?
            .state()
            .trigger(key)
            .map(|wrapper| wrapper.trigger.clone()))
    }

    pub fn check_trigger_exists(&self, key: &TriggerKey) -> Result<bool, JobStoreError> {
        Ok(self.lock()?.state().trigger(key).is_some())
    }

    /// `TriggerState::None` when the trigger is not stored
    pub fn get_trigger_state(&self, key: &TriggerKey) -> Result<TriggerState, JobStoreError> {
        Ok(self
            .lock()?
            .state()
            .trigger(key)
            .map_or(TriggerState::None, TriggerWrapper::state))
    }

    pub fn get_triggers_for_job(&self, job: &JobKey) -> Result<Vec<Trigger>, JobStoreError> {
        let grid = self.lock()?;
        let state = grid.state();
        Ok(state
            .triggers_for_job(job)
            .filter_map(|key| state.trigger(key))
            .map(|wrapper| wrapper.trigger.clone())
            .collect())
    }

    /// ERROR -> NORMAL, or PAUSED/BLOCKED when its group is paused or its
    /// job is executing
    pub fn reset_trigger_from_error_state(&self, key: &TriggerKey) -> Result<(), JobStoreError> {
        self.write(|grid| {
            let state = grid.state();
            let Some(wrapper) = state.trigger(key) else {
                return Ok(());
            };
            let mut wrapper = wrapper.clone();
            let paused = state.is_trigger_group_paused(&key.group)
                || state.is_job_group_paused(&wrapper.trigger.job_key.group);
            let blocked = state.is_job_blocked(&wrapper.trigger.job_key);
            if !wrapper.reset_from_error(paused) {
                return Ok(());
            }
            if blocked {
                wrapper.block();
            }
            tracing::info!(trigger = %key, state = %wrapper.state(), "reset trigger from error");
            grid.apply(Operation::TriggerStore { wrapper })?;
            Ok(())
        })
    }

    // -- Calendars --

    /// Store a calendar, optionally re-evaluating every trigger that uses it
    pub fn store_calendar(
        &self,
        name: &str,
        calendar: Calendar,
        replace_existing: bool,
        update_triggers: bool,
    ) -> Result<(), JobStoreError> {
        calendar
            .validate()
            .map_err(|source| JobStoreError::InvalidCalendar {
                calendar: name.to_string(),
                source,
            })?;
        self.write(|grid| {
            if !replace_existing && grid.state().calendar(name).is_some() {
                return Err(JobStoreError::calendar_exists(name));
            }
            grid.apply(Operation::CalendarStore {
                name: name.to_string(),
                calendar: calendar.clone(),
            })?;
            if !update_triggers {
                return Ok(());
            }

            let now = self.now();
            let mut affected: Vec<TriggerWrapper> = grid
                .state()
                .triggers()
                .filter(|wrapper| wrapper.trigger.calendar_name.as_deref() == Some(name))
                .cloned()
                .collect();
            affected.sort_by(|a, b| a.trigger.key.cmp(&b.trigger.key));
            for mut wrapper in affected {
                wrapper
                    .trigger
                    .update_with_new_calendar(&calendar, self.config.misfire_threshold, now);
                tracing::debug!(
                    trigger = %wrapper.trigger.key,
                    calendar = name,
                    next_fire_time = ?wrapper.trigger.next_fire_time,
                    "re-evaluated trigger against new calendar"
                );
                grid.apply(Operation::TriggerStore { wrapper })?;
            }
            Ok(())
        })
    }

    /// Remove a calendar no trigger references; returns whether it existed
    pub fn remove_calendar(&self, name: &str) -> Result<bool, JobStoreError> {
        self.write(|grid| {
            let state = grid.state();
            let referencing = state
                .triggers()
                .filter(|wrapper| wrapper.trigger.calendar_name.as_deref() == Some(name))
                .map(|wrapper| &wrapper.trigger.key)
                .min();
            if let Some(trigger) = referencing {
                return Err(JobStoreError::ResourceInUse {
                    calendar: name.to_string(),
                    trigger: trigger.clone(),
                });
            }
            if state.calendar(name).is_none() {
                return Ok(false);
            }
            grid.apply(Operation::CalendarRemove {
                name: name.to_string(),
            })?;
            Ok(true)
        })
    }

    pub fn retrieve_calendar(&self, name: &str) -> Result<Option<Calendar>, JobStoreError> {
        Ok(self.lock()?.state().calendar(name).cloned())
    }

    // -- Listings --

    pub fn get_number_of_jobs(&self) -> Result<usize, JobStoreError> {
        Ok(self.lock()?.state().job_count())
    }

    pub fn get_number_of_triggers(&self) -> Result<usize, JobStoreError> {
        Ok(self.lock()?.state().trigger_count())
    }

    pub fn get_number_of_calendars(&self) -> Result<usize, JobStoreError> {
        Ok(self.lock()?.state().calendar_count())
    }

    pub fn get_job_group_names(&self) -> Result<Vec<String>, JobStoreError> {
        Ok(sorted(self.lock()?.state().job_group_names().cloned()))
    }

    pub fn get_trigger_group_names(&self) -> Result<Vec<String>, JobStoreError> {
        Ok(sorted(self.lock()?.state().trigger_group_names().cloned()))
    }

    pub fn get_calendar_names(&self) -> Result<Vec<String>, JobStoreError> {
        Ok(sorted(self.lock()?.state().calendar_names().cloned()))
    }

    pub fn get_job_keys(&self, matcher: &GroupMatcher) -> Result<Vec<JobKey>, JobStoreError> {
        let grid = self.lock()?;
        Ok(matching_job_keys(grid.state(), matcher))
    }

    pub fn get_trigger_keys(
        &self,
        matcher: &GroupMatcher,
    ) -> Result<Vec<TriggerKey>, JobStoreError> {
        let grid = self.lock()?;
        Ok(matching_trigger_keys(grid.state(), matcher))
    }

    pub fn clear_all_scheduling_data(&self) -> Result<(), JobStoreError> {
        self.write(|grid| {
            tracing::warn!(grid = %self.grid.name(), "clearing all scheduling data");
            grid.apply(Operation::ClearAll)?;
            Ok(())
        })
    }

    // -- Scheduler lifecycle --

    /// Recover this instance's work left over from a previous run
    ///
    /// Triggers this instance acquired but never fired are released, and
    /// jobs it was executing are unblocked along with their siblings.
    pub fn scheduler_started(&self) -> Result<(), JobStoreError> {
        let instance = self.config.instance_id.as_str();
        let (released, blocked) = self.write(|grid| {
            let state = grid.state();
            let mut stale: Vec<TriggerWrapper> = state
                .triggers()
                .filter(|wrapper| {
                    wrapper.state() == TriggerState::Acquired
                        && wrapper.acquired_by() == Some(instance)
                })
                .cloned()
                .collect();
            stale.sort_by(|a, b| a.trigger.key.cmp(&b.trigger.key));
            let mut blocked: Vec<JobKey> = state.jobs_blocked_by(instance).cloned().collect();
            blocked.sort();

            let released = stale.len();
            for mut wrapper in stale {
                wrapper.release();
                wrapper.trigger.fire_instance_id = None;
                grid.apply(Operation::TriggerStore { wrapper })?;
            }
            for job in &blocked {
                self.unblock_job_locked(grid, job)?;
            }
            Ok((released, blocked))
        })?;

        tracing::info!(
            instance,
            released,
            unblocked = blocked.len(),
            "scheduler started"
        );
        if released > 0 || !blocked.is_empty() {
            self.signaler.signal_scheduling_change(None);
        }
        Ok(())
    }

    pub fn scheduler_paused(&self) {
        tracing::info!(instance = %self.config.instance_id, "scheduler paused");
    }

    pub fn scheduler_resumed(&self) {
        tracing::info!(instance = %self.config.instance_id, "scheduler resumed");
    }

    /// The grid is shared with other nodes, so it stays up
    pub fn shutdown(&self) {
        tracing::info!(instance = %self.config.instance_id, "job store shut down");
    }

    /// Whether stored data survives a restart
    pub fn supports_persistence(&self) -> bool {
        self.grid.is_durable()
    }

    pub fn is_clustered(&self) -> bool {
        true
    }

    pub fn estimated_time_to_release_and_acquire_trigger(&self) -> Duration {
        Duration::from_millis(5)
    }

    /// Back-off before retrying acquisition after `failures` consecutive errors
    pub fn acquire_retry_delay(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.min(16));
        MIN_RETRY_DELAY.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }

    // -- Locked helpers shared across modules --

    /// Wrap and store a validated trigger in the state its groups and job imply
    fn insert_trigger(
        &self,
        grid: &mut GridGuard<'_>,
        trigger: Trigger,
    ) -> Result<(), JobStoreError> {
        let state = grid.state();
        let paused = state.is_trigger_group_paused(&trigger.key.group)
            || state.is_job_group_paused(&trigger.job_key.group);
        let blocked = state.is_job_blocked(&trigger.job_key);

        let initial = if paused {
            TriggerState::Paused
        } else {
            TriggerState::Normal
        };
        let mut wrapper = TriggerWrapper::new(trigger, initial);
        if blocked {
            wrapper.block();
        }
        tracing::debug!(
            trigger = %wrapper.trigger.key,
            job = %wrapper.trigger.job_key,
            state = %wrapper.state(),
            "storing trigger"
        );
        grid.apply(Operation::TriggerStore { wrapper })?;
        Ok(())
    }

    pub(crate) fn remove_job_locked(
        &self,
        grid: &mut GridGuard<'_>,
        key: &JobKey,
    ) -> Result<bool, JobStoreError> {
        let triggers: Vec<TriggerKey> = grid.state().triggers_for_job(key).cloned().collect();
        for trigger in triggers {
            grid.apply(Operation::TriggerRemove { key: trigger })?;
        }
        if grid.state().job(key).is_none() {
            return Ok(false);
        }
        tracing::debug!(job = %key, "removing job");
        grid.apply(Operation::JobRemove { key: key.clone() })?;
        Ok(true)
    }

    pub(crate) fn remove_trigger_locked(
        &self,
        grid: &mut GridGuard<'_>,
        key: &TriggerKey,
    ) -> Result<bool, JobStoreError> {
        let Some(wrapper) = grid.state().trigger(key) else {
            return Ok(false);
        };
        let job_key = wrapper.trigger.job_key.clone();
        tracing::debug!(trigger = %key, "removing trigger");
        grid.apply(Operation::TriggerRemove { key: key.clone() })?;

        let state = grid.state();
        let orphaned = state.job(&job_key).is_some_and(|job| !job.durable)
            && state.triggers_for_job(&job_key).next().is_none();
        if orphaned {
            tracing::debug!(job = %job_key, "removing non-durable job with no triggers");
            grid.apply(Operation::JobRemove {
                key: job_key.clone(),
            })?;
            self.signaler.notify_scheduler_listeners_job_deleted(&job_key);
        }
        Ok(true)
    }

    /// Restore every blocked trigger of `job` and drop it from the blocked set
    pub(crate) fn unblock_job_locked(
        &self,
        grid: &mut GridGuard<'_>,
        job: &JobKey,
    ) -> Result<(), JobStoreError> {
        let siblings = wrappers_for_job(grid.state(), job);
        for mut wrapper in siblings {
            if wrapper.unblock() {
                grid.apply(Operation::TriggerStore { wrapper })?;
            }
        }
        if grid.state().is_job_blocked(job) {
            grid.apply(Operation::JobUnblock { key: job.clone() })?;
        }
        Ok(())
    }
}

/// Owned copies of the wrappers of `job`'s triggers, in key order
pub(crate) fn wrappers_for_job(state: &GridState, job: &JobKey) -> Vec<TriggerWrapper> {
    state
        .triggers_for_job(job)
        .filter_map(|key| state.trigger(key))
        .cloned()
        .collect()
}

pub(crate) fn matching_job_keys(state: &GridState, matcher: &GroupMatcher) -> Vec<JobKey> {
    let mut keys: Vec<JobKey> = match matcher.exact_group() {
        Some(group) => state.jobs_in_group(group).cloned().collect(),
        None => state
            .jobs()
            .map(|job| &job.key)
            .filter(|key| matcher.is_match(*key))
            .cloned()
            .collect(),
    };
    keys.sort();
    keys
}

pub(crate) fn matching_trigger_keys(state: &GridState, matcher: &GroupMatcher) -> Vec<TriggerKey> {
    let mut keys: Vec<TriggerKey> = match matcher.exact_group() {
        Some(group) => state.triggers_in_group(group).cloned().collect(),
        None => state
            .triggers()
            .map(|wrapper| &wrapper.trigger.key)
            .filter(|key| matcher.is_match(*key))
            .cloned()
            .collect(),
    };
    keys.sort();
    keys
}

fn validate_trigger(
    state: &GridState,
    trigger: &Trigger,
    replace_existing: bool,
) -> Result<(), JobStoreError> {
    check_schedule(trigger)?;
    if !replace_existing && state.trigger(&trigger.key).is_some() {
        return Err(JobStoreError::trigger_exists(&trigger.key));
    }
    if state.job(&trigger.job_key).is_none() {
        return Err(JobStoreError::JobNotFound(trigger.job_key.clone()));
    }
    check_calendar(state, trigger)
}

fn check_schedule(trigger: &Trigger) -> Result<(), JobStoreError> {
    trigger
        .schedule
        .validate()
        .map_err(|source| JobStoreError::InvalidSchedule {
            trigger: trigger.key.clone(),
            source,
        })
}

fn check_calendar(state: &GridState, trigger: &Trigger) -> Result<(), JobStoreError> {
    match &trigger.calendar_name {
        Some(name) if state.calendar(name).is_none() => {
            Err(JobStoreError::CalendarNotFound(name.clone()))
        }
        _ => Ok(()),
    }
}

fn sorted(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut names: Vec<String> = names.collect();
    names.sort();
    names
}

/// Groups present in `names` that `matcher` selects
pub(crate) fn matching_groups<'a>(
    names: impl Iterator<Item = &'a String>,
    matcher: &GroupMatcher,
) -> Vec<String> {
    sorted(
        names
            .filter(|group| matcher.matches_group(group))
            .cloned(),
    )
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
