// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pausing and resuming triggers, jobs and groups

use crate::error::JobStoreError;
use crate::store::{matching_groups, matching_job_keys, matching_trigger_keys, JobStore};
use cj_core::{Clock, GroupMatcher, IdGen, JobKey, Operation, TriggerKey};
use cj_storage::GridGuard;
use std::collections::BTreeSet;

impl<C: Clock, I: IdGen> JobStore<C, I> {
    pub fn pause_trigger(&self, key: &TriggerKey) -> Result<(), JobStoreError> {
        self.write(|grid| self.pause_trigger_locked(grid, key))
    }

    /// Pause every trigger in the matched groups and remember the groups,
    /// so triggers stored there later start out paused
    ///
    /// An exact group match is recorded even if the group is empty.
    pub fn pause_triggers(&self, matcher: &GroupMatcher) -> Result<Vec<String>, JobStoreError> {
        let groups = self.write(|grid| {
            let mut groups: BTreeSet<String> = grid
                .state()
                .trigger_group_names()
                .filter(|group| matcher.matches_group(group))
                .cloned()
                .collect();
            if let Some(group) = matcher.exact_group() {
                groups.insert(group.to_string());
            }

            for group in &groups {
                grid.apply(Operation::TriggerGroupPause {
                    group: group.clone(),
                })?;
            }
            for key in matching_trigger_keys(grid.state(), matcher) {
                self.pause_trigger_locked(grid, &key)?;
            }
            Ok(groups)
        })?;
        tracing::info!(?groups, "paused trigger groups");
        Ok(groups.into_iter().collect())
    }

    /// Pause every trigger of `key`
    pub fn pause_job(&self, key: &JobKey) -> Result<(), JobStoreError> {
        self.write(|grid| self.pause_job_locked(grid, key))
    }

    /// Pause every job in the matched groups and remember the groups
    pub fn pause_jobs(&self, matcher: &GroupMatcher) -> Result<Vec<String>, JobStoreError> {
        let groups = self.write(|grid| {
            let mut groups: BTreeSet<String> = grid
                .state()
                .job_group_names()
                .filter(|group| matcher.matches_group(group))
                .cloned()
                .collect();
            if let Some(group) = matcher.exact_group() {
                groups.insert(group.to_string());
            }

            for group in &groups {
                grid.apply(Operation::JobGroupPause {
                    group: group.clone(),
                })?;
            }
            for job in matching_job_keys(grid.state(), matcher) {
                self.pause_job_locked(grid, &job)?;
            }
            Ok(groups)
        })?;
        tracing::info!(?groups, "paused job groups");
        Ok(groups.into_iter().collect())
    }

    /// Resume a paused trigger, first giving it a chance to misfire
    pub fn resume_trigger(&self, key: &TriggerKey) -> Result<(), JobStoreError> {
        self.write(|grid| self.resume_trigger_locked(grid, key))
    }

    /// Resume every trigger in the matched groups and forget the groups
    ///
    /// Returns the groups that were paused, not every group matched.
    pub fn resume_triggers(&self, matcher: &GroupMatcher) -> Result<Vec<String>, JobStoreError> {
        let groups = self.write(|grid| {
            let groups = matching_groups(grid.state().paused_trigger_groups(), matcher);
            for group in &groups {
                grid.apply(Operation::TriggerGroupResume {
                    group: group.clone(),
                })?;
            }
            for key in matching_trigger_keys(grid.state(), matcher) {
                self.resume_trigger_locked(grid, &key)?;
            }
            Ok(groups)
        })?;
        tracing::info!(?groups, "resumed trigger groups");
        Ok(groups)
    }

    pub fn resume_job(&self, key: &JobKey) -> Result<(), JobStoreError> {
        self.write(|grid| self.resume_job_locked(grid, key))
    }

    /// Resume every job in the matched groups and forget the groups
    ///
    /// Returns the groups that were paused, not every group matched.
    pub fn resume_jobs(&self, matcher: &GroupMatcher) -> Result<Vec<String>, JobStoreError> {
        let groups = self.write(|grid| {
            let groups = matching_groups(grid.state().paused_job_groups(), matcher);
            for group in &groups {
                grid.apply(Operation::JobGroupResume {
                    group: group.clone(),
                })?;
            }
            for job in matching_job_keys(grid.state(), matcher) {
                self.resume_job_locked(grid, &job)?;
            }
            Ok(groups)
        })?;
        tracing::info!(?groups, "resumed job groups");
        Ok(groups)
    }

    /// Pause every trigger group
    pub fn pause_all(&self) -> Result<(), JobStoreError> {
        self.pause_triggers(&GroupMatcher::any_group())?;
        Ok(())
    }

    /// Resume every trigger group and clear both paused-group sets
    pub fn resume_all(&self) -> Result<(), JobStoreError> {
        self.write(|grid| {
            let state = grid.state();
            let trigger_groups: Vec<String> = state.paused_trigger_groups().cloned().collect();
            let job_groups: Vec<String> = state.paused_job_groups().cloned().collect();
            for group in trigger_groups {
                grid.apply(Operation::TriggerGroupResume { group })?;
            }
            for group in job_groups {
                grid.apply(Operation::JobGroupResume { group })?;
            }
            for key in matching_trigger_keys(grid.state(), &GroupMatcher::any_group()) {
                self.resume_trigger_locked(grid, &key)?;
            }
            Ok(())
        })?;
        tracing::info!("resumed all triggers");
        Ok(())
    }

    pub fn get_paused_trigger_groups(&self) -> Result<Vec<String>, JobStoreError> {
        Ok(self.lock()?.state().paused_trigger_groups().cloned().collect())
    }

    pub fn is_trigger_group_paused(&self, group: &str) -> Result<bool, JobStoreError> {
        Ok(self.lock()?.state().is_trigger_group_paused(group))
    }

    pub fn is_job_group_paused(&self, group: &str) -> Result<bool, JobStoreError> {
        Ok(self.lock()?.state().is_job_group_paused(group))
    }

    fn pause_trigger_locked(
        &self,
        grid: &mut GridGuard<'_>,
        key: &TriggerKey,
    ) -> Result<(), JobStoreError> {
        let Some(wrapper) = grid.state().trigger(key) else {
            return Ok(());
        };
        let mut wrapper = wrapper.clone();
        if !wrapper.pause() {
            return Ok(());
        }
        tracing::debug!(trigger = %key, state = %wrapper.state(), "paused trigger");
        grid.apply(Operation::TriggerStore { wrapper })?;
        Ok(())
    }

    fn pause_job_locked(&self, grid: &mut GridGuard<'_>, job: &JobKey) -> Result<(), JobStoreError> {
        let keys: Vec<TriggerKey> = grid.state().triggers_for_job(job).cloned().collect();
        for key in keys {
            self.pause_trigger_locked(grid, &key)?;
        }
        Ok(())
    }

    fn resume_trigger_locked(
        &self,
        grid: &mut GridGuard<'_>,
        key: &TriggerKey,
    ) -> Result<(), JobStoreError> {
        let state = grid.state();
        let Some(wrapper) = state.trigger(key) else {
            return Ok(());
        };
        if !wrapper.is_paused() {
            return Ok(());
        }
        let mut wrapper = wrapper.clone();
        let job_blocked = state.is_job_blocked(&wrapper.trigger.job_key);
        wrapper.resume(job_blocked);
        // A long pause may have left the trigger overdue
        self.misfire_wrapper(state, &mut wrapper, self.now());
        tracing::debug!(trigger = %key, state = %wrapper.state(), "resumed trigger");
        grid.apply(Operation::TriggerStore { wrapper })?;
        Ok(())
    }

    fn resume_job_locked(
        &self,
        grid: &mut GridGuard<'_>,
        job: &JobKey,
    ) -> Result<(), JobStoreError> {
        let keys: Vec<TriggerKey> = grid.state().triggers_for_job(job).cloned().collect();
        for key in keys {
            self.resume_trigger_locked(grid, &key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "pause_tests.rs"]
mod tests;
