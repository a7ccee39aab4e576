// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, schedule loading, shutdown.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use cj_core::ConfigError;
use cj_engine::{JobStore, JobStoreError};
use cj_storage::{GridError, MemoryGrid};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::info;

use crate::config::DaemonConfig;
use crate::driver::{JobRunner, LoopSignaler, SchedulerLoop};

/// Daemon state during operation
pub struct Daemon {
    pub config: DaemonConfig,
    /// Grid shared by every store instance of this process
    pub grid: Arc<MemoryGrid>,
    pub store: Arc<JobStore>,
    /// Woken by the store whenever scheduling data changes
    pub wake: Arc<Notify>,
}

impl Daemon {
    /// Driver loop running `runner` against this daemon's store
    pub fn scheduler_loop<R: JobRunner>(&self, runner: Arc<R>) -> SchedulerLoop<R> {
        SchedulerLoop::new(
            Arc::clone(&self.store),
            runner,
            self.config.driver.clone(),
            Arc::clone(&self.wake),
        )
    }

    /// Shutdown the daemon gracefully
    pub fn shutdown(&self) {
        info!("Shutting down daemon...");
        self.store.shutdown();
        // Later calls on the grid fail rather than write past this point
        self.grid.shutdown();
        info!("Daemon shutdown complete");
    }
}

/// Open the grid, recover this instance's in-flight work and load the
/// configured schedule
pub fn startup(mut config: DaemonConfig) -> Result<Daemon, DaemonError> {
    let grid = match config.wal_path.clone() {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            config.store.instance_id = resolve_instance_id(&config, &path)?;
            MemoryGrid::open(config.store.grid_name.clone(), &path)?
        }
        None => MemoryGrid::new(config.store.grid_name.clone()),
    };
    let grid = Arc::new(grid);

    let wake = Arc::new(Notify::new());
    let signaler = Arc::new(LoopSignaler::new(Arc::clone(&wake)));
    let store = Arc::new(JobStore::new(
        Arc::clone(&grid),
        config.store.clone(),
        signaler,
    ));

    store.scheduler_started()?;
    let loaded = load_schedule(&store, &config)?;
    info!(
        instance = %store.instance_id(),
        durable = store.supports_persistence(),
        triggers = loaded,
        "daemon started"
    );

    Ok(Daemon {
        config,
        grid,
        store,
        wake,
    })
}

/// File next to the WAL recording the instance id of the node writing it
pub fn instance_id_path(wal_path: &Path) -> PathBuf {
    wal_path.with_extension("instance")
}

/// Instance id to run as on a durable grid
///
/// Without an id in the configuration file the one recorded by a previous
/// run is reused, so the restarted node recovers the triggers it acquired
/// and the jobs it was executing. The resolved id is always recorded.
fn resolve_instance_id(config: &DaemonConfig, wal_path: &Path) -> Result<String, DaemonError> {
    let path = instance_id_path(wal_path);
    if !config.instance_id_pinned {
        match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => {
                let recorded = text.trim().to_string();
                info!(instance = %recorded, path = %path.display(), "reusing recorded instance id");
                return Ok(recorded);
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    std::fs::write(&path, format!("{}\n", config.store.instance_id))?;
    Ok(config.store.instance_id.clone())
}

/// Store the configured calendars, jobs and triggers
///
/// Entries already in the grid are kept unless `overwrite_existing` is set.
/// Returns the number of triggers stored.
pub fn load_schedule<C, I>(
    store: &JobStore<C, I>,
    config: &DaemonConfig,
) -> Result<usize, DaemonError>
where
    C: cj_core::Clock,
    I: cj_core::IdGen,
{
    let overwrite = config.overwrite_existing;

    for (name, calendar) in &config.calendars {
        if overwrite || store.retrieve_calendar(name)?.is_none() {
            store.store_calendar(name, calendar.clone(), true, true)?;
        }
    }

    let now = Utc::now();
    let mut stored = 0;
    for job in &config.jobs {
        let key = job.key();
        if overwrite || !store.check_job_exists(&key)? {
            store.store_job(job.to_job(), true)?;
        }
        for trigger_config in &job.triggers {
            if !overwrite && store.check_trigger_exists(&trigger_config.key())? {
                continue;
            }
            let mut trigger = trigger_config.to_trigger(key.clone(), now);
            if let Some(name) = &trigger.calendar_name {
                let calendar = store.retrieve_calendar(name)?;
                trigger.compute_first_fire_time(calendar.as_ref());
            }
            store.store_trigger(trigger, true)?;
            stored += 1;
        }
    }
    Ok(stored)
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Could not determine log directory")]
    NoLogDir,

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Job store error: {0}")]
    Store(#[from] JobStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        DaemonError::Config(ConfigError::Invalid(message.into()))
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
