// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-instance ID generation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique, monotonically increasing identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// Sequential ID generator
///
/// In production the prefix is the scheduler instance id and the counter is
/// seeded from the wall clock, so ids stay unique across restarts.
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(first)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("fire")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// Generate a random scheduler instance id
pub fn new_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
