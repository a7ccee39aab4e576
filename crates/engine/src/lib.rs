// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Clustered job store
//!
//! [`JobStore`] is one scheduler node's view of a shared [`cj_storage::MemoryGrid`].
//! Any number of stores may share a grid; the grid's cluster lock keeps
//! them from acquiring or firing the same trigger twice.

mod acquire;
mod error;
mod fired;
mod misfire;
mod pause;
mod store;

#[cfg(test)]
mod test_helpers;

pub use error::JobStoreError;
pub use store::JobStore;
