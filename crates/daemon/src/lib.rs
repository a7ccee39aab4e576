// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cj-daemon: configuration, lifecycle and the scheduler driver loop
//! behind the `cjd` binary

pub mod config;
pub mod driver;
pub mod lifecycle;

pub use config::{DaemonConfig, DriverConfig, JobConfig, TriggerConfig};
pub use driver::{
    completion_instruction, JobFailure, JobRunner, LogJobRunner, LoopSignaler, SchedulerLoop,
};
pub use lifecycle::{instance_id_path, load_schedule, startup, Daemon, DaemonError};
