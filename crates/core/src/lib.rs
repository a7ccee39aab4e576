// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cj-core: Domain model for the clustered job store
//!
//! This crate provides:
//! - Job and trigger keys, definitions, schedules and calendars
//! - The trigger lifecycle state machine
//! - Grid operations persisted to the write-ahead log
//! - Clock, id generation and configuration abstractions
//! - The signaler contract between the store and the scheduler driver

pub mod clock;
pub mod config;
pub mod id;

pub mod calendar;
pub mod fired;
pub mod instruction;
pub mod job;
pub mod key;
pub mod matcher;
pub mod operation;
pub mod schedule;
pub mod signaler;
pub mod state;
pub mod trigger;

// Re-exports
pub use calendar::{Calendar, CalendarError};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, StoreConfig, DEFAULT_MISFIRE_THRESHOLD};
pub use fired::{TriggerFiredBundle, TriggerFiredResult};
pub use id::{IdGen, SequentialIdGen};
pub use instruction::CompletedExecutionInstruction;
pub use job::{JobDataMap, JobDetail};
pub use key::{GroupedKey, JobKey, TriggerKey, DEFAULT_GROUP};
pub use matcher::GroupMatcher;
pub use operation::Operation;
pub use schedule::{Schedule, ScheduleError};
pub use signaler::{NoOpSignaler, SchedulerSignaler};
pub use state::{TriggerState, TriggerWrapper};
pub use trigger::{MisfireInstruction, Trigger, DEFAULT_PRIORITY};

#[cfg(any(test, feature = "test-support"))]
pub use signaler::{RecordingSignaler, Signal};
