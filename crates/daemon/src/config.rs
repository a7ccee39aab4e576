// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file
//!
//! A single TOML file carries the job store settings, the driver loop
//! tuning and the jobs, triggers and calendars to schedule at startup.

use crate::lifecycle::DaemonError;
use chrono::{DateTime, Utc};
use cj_core::{
    Calendar, JobDataMap, JobDetail, JobKey, MisfireInstruction, Schedule, StoreConfig, Trigger,
    TriggerKey, DEFAULT_GROUP, DEFAULT_PRIORITY,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub store: StoreConfig,
    /// Write-ahead log backing the grid; in-memory only when unset
    pub wal_path: Option<PathBuf>,
    pub log_path: PathBuf,
    /// Replace jobs, triggers and calendars already in the grid with the
    /// configured ones instead of keeping what a previous run left
    pub overwrite_existing: bool,
    pub driver: DriverConfig,
    pub calendars: BTreeMap<String, Calendar>,
    pub jobs: Vec<JobConfig>,
    /// Whether `store.instance_id` came from the file rather than a default
    #[serde(skip)]
    pub instance_id_pinned: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            wal_path: None,
            log_path: PathBuf::from("cjd.log"),
            overwrite_existing: false,
            driver: DriverConfig::default(),
            calendars: BTreeMap::new(),
            jobs: Vec::new(),
            instance_id_pinned: false,
        }
    }
}

/// Tuning for the acquire/fire loop
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Longest sleep between acquisition passes
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Most triggers acquired per pass
    pub batch_size: usize,
    /// How far past now a pass may reach to batch triggers together
    #[serde(with = "humantime_serde")]
    pub time_window: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 10,
            time_window: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub disallow_concurrent_execution: bool,
    #[serde(default)]
    pub persist_job_data_after_execution: bool,
    #[serde(default)]
    pub data: JobDataMap,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
    pub schedule: Schedule,
    /// Defaults to the moment the daemon loads the configuration
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub misfire_instruction: MisfireInstruction,
    #[serde(default)]
    pub calendar: Option<String>,
    #[serde(default)]
    pub data: JobDataMap,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl DaemonConfig {
    pub fn from_toml(text: &str) -> Result<Self, DaemonError> {
        let document: toml::Value = toml::from_str(text)?;
        let pinned = document
            .get("store")
            .and_then(|store| store.get("instance_id"))
            .is_some();
        let mut config: Self = document.try_into()?;
        config.instance_id_pinned = pinned;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), DaemonError> {
        self.store.validate()?;
        if self.driver.batch_size == 0 {
            return Err(DaemonError::invalid("driver.batch_size must be at least 1"));
        }
        if self.driver.poll_interval.is_zero() {
            return Err(DaemonError::invalid("driver.poll_interval must be non-zero"));
        }
        for (name, calendar) in &self.calendars {
            if let Err(e) = calendar.validate() {
                return Err(DaemonError::invalid(format!("calendar {name}: {e}")));
            }
        }

        let mut jobs = HashSet::new();
        let mut triggers = HashSet::new();
        for job in &self.jobs {
            let key = job.key();
            if !jobs.insert(key.clone()) {
                return Err(DaemonError::invalid(format!("job {key} defined twice")));
            }
            for trigger in &job.triggers {
                let trigger_key = trigger.key();
                if !triggers.insert(trigger_key.clone()) {
                    return Err(DaemonError::invalid(format!(
                        "trigger {trigger_key} defined twice"
                    )));
                }
                if let Err(e) = trigger.schedule.validate() {
                    return Err(DaemonError::invalid(format!("trigger {trigger_key}: {e}")));
                }
                if let Some(calendar) = &trigger.calendar {
                    if !self.calendars.contains_key(calendar) {
                        return Err(DaemonError::invalid(format!(
                            "trigger {trigger_key} references unknown calendar '{calendar}'"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl JobConfig {
    pub fn key(&self) -> JobKey {
        JobKey::new(self.name.clone(), self.group.clone())
    }

    pub fn to_job(&self) -> JobDetail {
        JobDetail {
            key: self.key(),
            description: self.description.clone(),
            durable: self.durable,
            disallow_concurrent_execution: self.disallow_concurrent_execution,
            persist_job_data_after_execution: self.persist_job_data_after_execution,
            requests_recovery: false,
            data: self.data.clone(),
        }
    }
}

impl TriggerConfig {
    pub fn key(&self) -> TriggerKey {
        TriggerKey::new(self.name.clone(), self.group.clone())
    }

    /// Build the trigger for `job`; fire times still ignore the calendar
    pub fn to_trigger(&self, job: JobKey, now: DateTime<Utc>) -> Trigger {
        let mut trigger = Trigger::new(
            self.key(),
            job,
            self.schedule.clone(),
            self.start_time.unwrap_or(now),
        )
        .with_priority(self.priority)
        .with_misfire_instruction(self.misfire_instruction);
        if let Some(end) = self.end_time {
            trigger = trigger.with_end_time(end);
        }
        if let Some(calendar) = &self.calendar {
            trigger = trigger.with_calendar(calendar.clone());
        }
        trigger.data = self.data.clone();
        trigger
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
