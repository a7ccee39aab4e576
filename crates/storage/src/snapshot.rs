// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point-in-time grid snapshots
//!
//! A snapshot folds every WAL entry up to `sequence` into one file, after
//! which the log can be truncated. Recovery loads the snapshot and replays
//! only the entries written after it.

use crate::state::GridState;
use chrono::{DateTime, Utc};
use cj_core::{Calendar, JobDetail, JobKey, Operation, TriggerWrapper};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur reading or writing a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

/// A disallow-concurrent job executing on `instance_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedJob {
    pub key: JobKey,
    pub instance_id: String,
}

/// Serializable copy of every collection in a [`GridState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub version: u32,
    /// Last WAL sequence folded into this snapshot
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub jobs: Vec<JobDetail>,
    pub triggers: Vec<TriggerWrapper>,
    pub calendars: BTreeMap<String, Calendar>,
    pub paused_trigger_groups: BTreeSet<String>,
    pub paused_job_groups: BTreeSet<String>,
    pub blocked_jobs: Vec<BlockedJob>,
}

impl GridSnapshot {
    /// Current version of the snapshot format
    pub const CURRENT_VERSION: u32 = 1;

    /// Capture `state` as of WAL sequence `sequence`
    pub fn capture(state: &GridState, sequence: u64) -> Self {
        let mut jobs: Vec<JobDetail> = state.jobs().cloned().collect();
        jobs.sort_by(|a, b| a.key.cmp(&b.key));
        let mut triggers: Vec<TriggerWrapper> = state.triggers().cloned().collect();
        triggers.sort_by(|a, b| a.trigger.key.cmp(&b.trigger.key));
        let mut blocked_jobs: Vec<BlockedJob> = state
            .blocked_jobs()
            .map(|(key, instance_id)| BlockedJob {
                key: key.clone(),
                instance_id: instance_id.clone(),
            })
            .collect();
        blocked_jobs.sort_by(|a, b| a.key.cmp(&b.key));

        Self {
            version: Self::CURRENT_VERSION,
            sequence,
            taken_at: Utc::now(),
            jobs,
            triggers,
            calendars: state
                .calendar_names()
                .filter_map(|name| Some((name.clone(), state.calendar(name)?.clone())))
                .collect(),
            paused_trigger_groups: state.paused_trigger_groups().cloned().collect(),
            paused_job_groups: state.paused_job_groups().cloned().collect(),
            blocked_jobs,
        }
    }

    /// Operations that rebuild the captured state on an empty grid
    pub fn operations(&self) -> Vec<Operation> {
        let calendars = self
            .calendars
            .iter()
            .map(|(name, calendar)| Operation::CalendarStore {
                name: name.clone(),
                calendar: calendar.clone(),
            });
        let jobs = self
            .jobs
            .iter()
            .map(|job| Operation::JobStore { job: job.clone() });
        let triggers = self
            .triggers
            .iter()
            .map(|wrapper| Operation::TriggerStore {
                wrapper: wrapper.clone(),
            });
        let trigger_groups = self
            .paused_trigger_groups
            .iter()
            .map(|group| Operation::TriggerGroupPause {
                group: group.clone(),
            });
        let job_groups = self
            .paused_job_groups
            .iter()
            .map(|group| Operation::JobGroupPause {
                group: group.clone(),
            });
        let blocked = self.blocked_jobs.iter().map(|blocked| Operation::JobBlock {
            key: blocked.key.clone(),
            instance_id: blocked.instance_id.clone(),
        });
        calendars
            .chain(jobs)
            .chain(triggers)
            .chain(trigger_groups)
            .chain(job_groups)
            .chain(blocked)
            .collect()
    }

    pub fn to_state(&self) -> GridState {
        GridState::from_operations(&self.operations())
    }

    /// Write the snapshot to `path`, replacing any previous one atomically
    pub fn write(&self, path: &Path) -> Result<(), SnapshotError> {
        let temp_path = path.with_extension("snapshot.tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Load the snapshot at `path`, if one was ever written
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Self = serde_json::from_reader(BufReader::new(file))?;
        if snapshot.version != Self::CURRENT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: Self::CURRENT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }
}

/// Snapshot file kept next to the WAL at `wal_path`
pub fn snapshot_path(wal_path: &Path) -> PathBuf {
    wal_path.with_extension("snapshot")
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
