// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared grid with a single cluster-wide lock
//!
//! Every scheduler node holds an `Arc<MemoryGrid>`. All reads and writes go
//! through a [`GridGuard`], which is the cluster lock: at most one node holds
//! it at a time and it is released when the guard drops, on every exit path.
//!
//! Writes made under one guard form a transaction. They are visible to the
//! holder immediately and become durable together on [`GridGuard::commit`],
//! as a single WAL entry. A transaction that cannot be committed takes the
//! grid offline, so no node ever observes a half-applied write, and a
//! restart replays only whole commits.

use crate::snapshot::{snapshot_path, GridSnapshot, SnapshotError};
use crate::state::GridState;
use crate::wal::{Wal, WalError};
use cj_core::Operation;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Commits logged before the WAL is folded into a snapshot
pub const DEFAULT_COMPACT_AFTER: u64 = 1_000;

/// Errors from the grid substrate
#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid {0} is unavailable")]
    Unavailable(String),
    #[error("grid {0} lock poisoned by a panicked holder")]
    Poisoned(String),
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// WAL plus the snapshot it compacts into
struct Durable {
    wal: Wal,
    snapshot_path: PathBuf,
    compact_after: u64,
}

impl Durable {
    /// Fold `state` into a snapshot and empty the log
    fn compact(&mut self, grid: &str, state: &GridState) -> Result<(), GridError> {
        let snapshot = GridSnapshot::capture(state, self.wal.sequence());
        snapshot.write(&self.snapshot_path)?;
        let folded = self.wal.entries();
        self.wal.truncate()?;
        tracing::info!(
            grid,
            sequence = snapshot.sequence,
            folded,
            "compacted WAL into snapshot"
        );
        Ok(())
    }
}

struct GridInner {
    state: GridState,
    durable: Option<Durable>,
}

/// In-process grid shared by the nodes of a cluster
pub struct MemoryGrid {
    name: String,
    inner: Mutex<GridInner>,
    available: AtomicBool,
}

impl MemoryGrid {
    /// A grid whose contents live only as long as the process
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_state(name.into(), GridState::default(), None)
    }

    /// A grid backed by a write-ahead log at `path`, recovering prior contents
    pub fn open(name: impl Into<String>, path: &Path) -> Result<Self, GridError> {
        Self::open_with(name, path, DEFAULT_COMPACT_AFTER)
    }

    /// Like [`MemoryGrid::open`], compacting after `compact_after` commits
    ///
    /// The snapshot lives next to the log. Recovery loads it, replays the
    /// commits logged after it and compacts straight away, so an open always
    /// starts from a single snapshot and an empty log.
    pub fn open_with(
        name: impl Into<String>,
        path: &Path,
        compact_after: u64,
    ) -> Result<Self, GridError> {
        let name = name.into();
        let snapshot_path = snapshot_path(path);
        let snapshot = GridSnapshot::load(&snapshot_path)?;
        let floor = snapshot.as_ref().map_or(0, |s| s.sequence);
        let mut state = snapshot
            .as_ref()
            .map(GridSnapshot::to_state)
            .unwrap_or_default();

        let wal = Wal::open(path, floor)?;
        let ops = Wal::replay(path, floor)?;
        for op in &ops {
            state.apply(op);
        }

        let mut durable = Durable {
            wal,
            snapshot_path,
            compact_after: compact_after.max(1),
        };
        if durable.wal.entries() > 0 {
            durable.compact(&name, &state)?;
        }
        tracing::info!(
            grid = %name,
            path = %path.display(),
            snapshot = floor,
            replayed = ops.len(),
            "opened grid"
        );
        Ok(Self::with_state(name, state, Some(durable)))
    }

    fn with_state(name: String, state: GridState, durable: Option<Durable>) -> Self {
        Self {
            name,
            inner: Mutex::new(GridInner { state, durable }),
            available: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether writes survive a restart
    pub fn is_durable(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.durable.is_some(),
            Err(poisoned) => poisoned.into_inner().durable.is_some(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Take the grid offline; later lock attempts fail with `Unavailable`
    pub fn shutdown(&self) {
        if self.available.swap(false, Ordering::SeqCst) {
            tracing::info!(grid = %self.name, "grid shut down");
        }
    }

    /// Take the grid offline after a write that cannot be committed
    fn fence(&self, reason: &dyn fmt::Display) {
        if self.available.swap(false, Ordering::SeqCst) {
            tracing::error!(grid = %self.name, %reason, "grid taken offline");
        }
    }

    /// Acquire the cluster lock, blocking until the current holder releases it
    pub fn lock(&self, holder: &str) -> Result<GridGuard<'_>, GridError> {
        if !self.is_available() {
            return Err(GridError::Unavailable(self.name.clone()));
        }
        let inner = self
            .inner
            .lock()
            .map_err(|_| GridError::Poisoned(self.name.clone()))?;
        tracing::trace!(grid = %self.name, holder, "cluster lock acquired");
        Ok(GridGuard {
            grid: self,
            holder: holder.to_string(),
            inner,
            pending: Vec::new(),
        })
    }
}

/// Exclusive access to the grid; dropping it releases the cluster lock
///
/// Dropping a guard with uncommitted writes takes the grid offline.
pub struct GridGuard<'a> {
    grid: &'a MemoryGrid,
    holder: String,
    inner: MutexGuard<'a, GridInner>,
    pending: Vec<Operation>,
}

impl GridGuard<'_> {
    pub fn state(&self) -> &GridState {
        &self.inner.state
    }

    /// Apply one operation as part of this guard's transaction
    pub fn apply(&mut self, op: Operation) -> Result<(), GridError> {
        if !self.grid.is_available() {
            return Err(GridError::Unavailable(self.grid.name.clone()));
        }
        tracing::trace!(grid = %self.grid.name, op = op.name(), "apply");
        self.inner.state.apply(&op);
        self.pending.push(op);
        Ok(())
    }

    /// Number of writes awaiting commit
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Make every write of this guard durable as one WAL entry, then release
    /// the lock
    pub fn commit(mut self) -> Result<(), GridError> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }
        let grid = self.grid;
        if !grid.is_available() {
            grid.fence(&"commit after shutdown");
            return Err(GridError::Unavailable(grid.name.clone()));
        }

        let inner = &mut *self.inner;
        if let Some(durable) = inner.durable.as_mut() {
            if let Err(err) = durable.wal.append(&pending) {
                grid.fence(&err);
                return Err(err.into());
            }
            if durable.wal.entries() >= durable.compact_after {
                // The commit is already durable; a failed compaction is retried
                // on the next commit
                if let Err(err) = durable.compact(&grid.name, &inner.state) {
                    tracing::warn!(grid = %grid.name, error = %err, "WAL compaction failed");
                }
            }
        }
        tracing::trace!(grid = %grid.name, ops = pending.len(), "committed");
        Ok(())
    }
}

impl Drop for GridGuard<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.grid.fence(&format_args!(
                "{} uncommitted writes by {}",
                self.pending.len(),
                self.holder
            ));
        }
        tracing::trace!(grid = %self.grid.name, holder = %self.holder, "cluster lock released");
    }
}

#[cfg(test)]
#[path = "grid_tests.rs"]
mod tests;
