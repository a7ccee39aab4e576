// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! cj-storage: the shared grid behind the clustered job store
//!
//! - [`GridState`]: keyed collections and the next-fire-time index
//! - [`MemoryGrid`]: cluster lock and transactions around the state,
//!   optionally WAL-backed
//! - [`Wal`]: append-only log of committed operation batches
//! - [`GridSnapshot`]: the compacted form of the log

mod grid;
mod snapshot;
mod state;
mod wal;

pub use grid::{GridError, GridGuard, MemoryGrid, DEFAULT_COMPACT_AFTER};
pub use snapshot::{snapshot_path, BlockedJob, GridSnapshot, SnapshotError};
pub use state::{FireIndexEntry, GridState};
pub use wal::{Wal, WalError};
