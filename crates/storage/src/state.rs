// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized grid state built from operations
//!
//! Holds the keyed collections shared by every scheduler node and keeps the
//! derived structures (group membership, per-job trigger sets and the
//! next-fire-time index) in step with the flat maps. Empty groups are pruned.

use chrono::{DateTime, Utc};
use cj_core::{Calendar, JobDetail, JobKey, Operation, TriggerKey, TriggerState, TriggerWrapper};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

/// Entry in the next-fire-time index
///
/// Derived ordering is the acquisition order: earliest fire time first,
/// then highest priority, then key. Only waiting (NORMAL) triggers are
/// indexed, so acquisition and misfire sweeps never walk paused, blocked,
/// acquired or finished triggers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FireIndexEntry {
    pub next_fire_time: DateTime<Utc>,
    pub priority: Reverse<i32>,
    pub key: TriggerKey,
}

impl FireIndexEntry {
    fn for_wrapper(wrapper: &TriggerWrapper) -> Option<Self> {
        if wrapper.state() != TriggerState::Normal {
            return None;
        }
        let trigger = &wrapper.trigger;
        Some(Self {
            next_fire_time: trigger.next_fire_time?,
            priority: Reverse(trigger.priority),
            key: trigger.key.clone(),
        })
    }
}

/// Every collection held by the grid
#[derive(Debug, Default)]
pub struct GridState {
    jobs: HashMap<JobKey, JobDetail>,
    triggers: HashMap<TriggerKey, TriggerWrapper>,
    triggers_by_job: HashMap<JobKey, BTreeSet<TriggerKey>>,
    job_groups: HashMap<String, BTreeSet<JobKey>>,
    trigger_groups: HashMap<String, BTreeSet<TriggerKey>>,
    calendars: HashMap<String, Calendar>,
    paused_job_groups: BTreeSet<String>,
    paused_trigger_groups: BTreeSet<String>,
    /// Disallow-concurrent jobs currently executing, with the executing node
    blocked_jobs: HashMap<JobKey, String>,
    fire_index: BTreeSet<FireIndexEntry>,
}

impl GridState {
    /// Rebuild state by applying a sequence of operations
    pub fn from_operations<'a>(ops: impl IntoIterator<Item = &'a Operation>) -> Self {
        let mut state = Self::default();
        for op in ops {
            state.apply(op);
        }
        state
    }

    pub fn job(&self, key: &JobKey) -> Option<&JobDetail> {
        self.jobs.get(key)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobDetail> {
        self.jobs.values()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn trigger(&self, key: &TriggerKey) -> Option<&TriggerWrapper> {
        self.triggers.get(key)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &TriggerWrapper> {
        self.triggers.values()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Keys of the triggers that fire `job`, in key order
    pub fn triggers_for_job(&self, job: &JobKey) -> impl Iterator<Item = &TriggerKey> {
        self.triggers_by_job.get(job).into_iter().flatten()
    }

    pub fn job_group_names(&self) -> impl Iterator<Item = &String> {
        self.job_groups.keys()
    }

    pub fn trigger_group_names(&self) -> impl Iterator<Item = &String> {
        self.trigger_groups.keys()
    }

    pub fn jobs_in_group(&self, group: &str) -> impl Iterator<Item = &JobKey> {
        self.job_groups.get(group).into_iter().flatten()
    }

    pub fn triggers_in_group(&self, group: &str) -> impl Iterator<Item = &TriggerKey> {
        self.trigger_groups.get(group).into_iter().flatten()
    }

    pub fn calendar(&self, name: &str) -> Option<&Calendar> {
        self.calendars.get(name)
    }

    pub fn calendar_names(&self) -> impl Iterator<Item = &String> {
        self.calendars.keys()
    }

    pub fn calendar_count(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_job_group_paused(&self, group: &str) -> bool {
        self.paused_job_groups.contains(group)
    }

    pub fn is_trigger_group_paused(&self, group: &str) -> bool {
        self.paused_trigger_groups.contains(group)
    }

    pub fn paused_job_groups(&self) -> impl Iterator<Item = &String> {
        self.paused_job_groups.iter()
    }

    pub fn paused_trigger_groups(&self) -> impl Iterator<Item = &String> {
        self.paused_trigger_groups.iter()
    }

    pub fn is_job_blocked(&self, key: &JobKey) -> bool {
        self.blocked_jobs.contains_key(key)
    }

    /// Every blocked job with the instance executing it
    pub fn blocked_jobs(&self) -> impl Iterator<Item = (&JobKey, &String)> {
        self.blocked_jobs.iter()
    }

    /// Jobs blocked by `instance_id`'s executions
    pub fn jobs_blocked_by<'a>(&'a self, instance_id: &'a str) -> impl Iterator<Item = &'a JobKey> {
        self.blocked_jobs
            .iter()
            .filter(move |(_, holder)| holder.as_str() == instance_id)
            .map(|(key, _)| key)
    }

    /// Waiting triggers due at or before `until`, in acquisition order
    pub fn fire_index_until(
        &self,
        until: DateTime<Utc>,
    ) -> impl Iterator<Item = &FireIndexEntry> {
        self.fire_index
            .iter()
            .take_while(move |entry| entry.next_fire_time <= until)
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::JobStore { job } => {
                self.job_groups
                    .entry(job.key.group.clone())
                    .or_default()
                    .insert(job.key.clone());
                self.jobs.insert(job.key.clone(), job.clone());
            }

            Operation::JobRemove { key } => {
                if self.jobs.remove(key).is_some() {
                    prune(&mut self.job_groups, &key.group, key);
                }
                if self
                    .triggers_by_job
                    .get(key)
                    .is_some_and(|triggers| triggers.is_empty())
                {
                    self.triggers_by_job.remove(key);
                }
                self.blocked_jobs.remove(key);
            }

            Operation::TriggerStore { wrapper } => {
                let key = wrapper.trigger.key.clone();
                self.unlink_trigger(&key);
                if let Some(entry) = FireIndexEntry::for_wrapper(wrapper) {
                    self.fire_index.insert(entry);
                }
                self.triggers_by_job
                    .entry(wrapper.trigger.job_key.clone())
                    .or_default()
                    .insert(key.clone());
                self.trigger_groups
                    .entry(key.group.clone())
                    .or_default()
                    .insert(key.clone());
                self.triggers.insert(key, wrapper.clone());
            }

            Operation::TriggerRemove { key } => {
                self.unlink_trigger(key);
            }

            Operation::CalendarStore { name, calendar } => {
                self.calendars.insert(name.clone(), calendar.clone());
            }

            Operation::CalendarRemove { name } => {
                self.calendars.remove(name);
            }

            Operation::TriggerGroupPause { group } => {
                self.paused_trigger_groups.insert(group.clone());
            }

            Operation::TriggerGroupResume { group } => {
                self.paused_trigger_groups.remove(group);
            }

            Operation::JobGroupPause { group } => {
                self.paused_job_groups.insert(group.clone());
            }

            Operation::JobGroupResume { group } => {
                self.paused_job_groups.remove(group);
            }

            Operation::JobBlock { key, instance_id } => {
                self.blocked_jobs.insert(key.clone(), instance_id.clone());
            }

            Operation::JobUnblock { key } => {
                self.blocked_jobs.remove(key);
            }

            Operation::ClearAll => {
                *self = Self::default();
            }
        }
    }

    /// Remove a trigger from the flat map and every derived structure
    fn unlink_trigger(&mut self, key: &TriggerKey) {
        let Some(old) = self.triggers.remove(key) else {
            return;
        };
        if let Some(entry) = FireIndexEntry::for_wrapper(&old) {
            self.fire_index.remove(&entry);
        }
        prune(&mut self.triggers_by_job, &old.trigger.job_key, key);
        prune(&mut self.trigger_groups, &key.group, key);
    }
}

/// Remove `member` from `map[owner]`, dropping the entry once it is empty
fn prune<K, M>(map: &mut HashMap<K, BTreeSet<M>>, owner: &K, member: &M)
where
    K: std::hash::Hash + Eq,
    M: Ord,
{
    if let Some(members) = map.get_mut(owner) {
        members.remove(member);
        if members.is_empty() {
            map.remove(owner);
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
