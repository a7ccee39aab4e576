// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger lifecycle state machine
//!
//! ```text
//! NORMAL <-> PAUSED
//! NORMAL -> ACQUIRED -> NORMAL (fired) | previous state (released)
//! NORMAL/PAUSED -> BLOCKED -> previous state (sibling completed)
//! any -> COMPLETE | ERROR (completion instructions, misfire without fire time)
//! ```
//!
//! The wrapper remembers the state a trigger left when it became ACQUIRED or
//! BLOCKED, so that release and unblock can put it back.

use crate::trigger::Trigger;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a stored trigger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// Not stored (or nothing to restore)
    #[default]
    None,
    Normal,
    Paused,
    Complete,
    Error,
    Blocked,
    Acquired,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerState::None => write!(f, "none"),
            TriggerState::Normal => write!(f, "normal"),
            TriggerState::Paused => write!(f, "paused"),
            TriggerState::Complete => write!(f, "complete"),
            TriggerState::Error => write!(f, "error"),
            TriggerState::Blocked => write!(f, "blocked"),
            TriggerState::Acquired => write!(f, "acquired"),
        }
    }
}

/// A stored trigger together with its lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerWrapper {
    pub trigger: Trigger,
    state: TriggerState,
    old_state: TriggerState,
    /// Scheduler instance that acquired the trigger
    #[serde(default)]
    acquired_by: Option<String>,
}

impl TriggerWrapper {
    pub fn new(trigger: Trigger, state: TriggerState) -> Self {
        Self {
            trigger,
            state,
            old_state: TriggerState::None,
            acquired_by: None,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// State restored on release or unblock; `None` outside ACQUIRED/BLOCKED
    pub fn old_state(&self) -> TriggerState {
        self.old_state
    }

    pub fn acquired_by(&self) -> Option<&str> {
        self.acquired_by.as_deref()
    }

    /// Paused, or blocked with a paused state waiting underneath
    pub fn is_paused(&self) -> bool {
        self.state == TriggerState::Paused
            || (self.state == TriggerState::Blocked && self.old_state == TriggerState::Paused)
    }

    /// NORMAL -> ACQUIRED
    pub fn acquire(&mut self, instance_id: &str) -> bool {
        if self.state != TriggerState::Normal {
            return false;
        }
        self.old_state = self.state;
        self.state = TriggerState::Acquired;
        self.acquired_by = Some(instance_id.to_string());
        true
    }

    /// ACQUIRED -> previous state
    pub fn release(&mut self) -> bool {
        if self.state != TriggerState::Acquired {
            return false;
        }
        self.state = self.old_state;
        self.old_state = TriggerState::None;
        self.acquired_by = None;
        true
    }

    /// ACQUIRED -> NORMAL once the trigger has been handed to an executor
    pub fn fired(&mut self) -> bool {
        if self.state != TriggerState::Acquired {
            return false;
        }
        self.state = TriggerState::Normal;
        self.old_state = TriggerState::None;
        self.acquired_by = None;
        true
    }

    /// NORMAL/PAUSED -> BLOCKED, remembering the state to restore
    pub fn block(&mut self) -> bool {
        match self.state {
            TriggerState::Normal | TriggerState::Paused => {
                self.old_state = self.state;
                self.state = TriggerState::Blocked;
                true
            }
            _ => false,
        }
    }

    /// BLOCKED -> previous state
    pub fn unblock(&mut self) -> bool {
        if self.state != TriggerState::Blocked {
            return false;
        }
        self.state = self.old_state;
        self.old_state = TriggerState::None;
        true
    }

    /// Pause; complete triggers are left alone and blocked triggers stay
    /// blocked with PAUSED to restore
    pub fn pause(&mut self) -> bool {
        match self.state {
            TriggerState::Complete | TriggerState::Paused => false,
            TriggerState::Blocked => {
                if self.old_state == TriggerState::Paused {
                    return false;
                }
                self.old_state = TriggerState::Paused;
                true
            }
            _ => {
                self.state = TriggerState::Paused;
                self.old_state = TriggerState::None;
                self.acquired_by = None;
                true
            }
        }
    }

    /// Undo [`TriggerWrapper::pause`]; `job_blocked` keeps the trigger
    /// BLOCKED while its job is executing elsewhere
    pub fn resume(&mut self, job_blocked: bool) -> bool {
        match self.state {
            TriggerState::Paused if job_blocked => {
                self.state = TriggerState::Blocked;
                self.old_state = TriggerState::Normal;
                true
            }
            TriggerState::Paused => {
                self.state = TriggerState::Normal;
                true
            }
            TriggerState::Blocked if self.old_state == TriggerState::Paused => {
                self.old_state = TriggerState::Normal;
                true
            }
            _ => false,
        }
    }

    pub fn complete(&mut self) {
        self.settle(TriggerState::Complete);
    }

    pub fn set_error(&mut self) {
        self.settle(TriggerState::Error);
    }

    /// ERROR -> NORMAL (or PAUSED when its group is paused)
    pub fn reset_from_error(&mut self, paused: bool) -> bool {
        if self.state != TriggerState::Error {
            return false;
        }
        self.state = if paused {
            TriggerState::Paused
        } else {
            TriggerState::Normal
        };
        true
    }

    fn settle(&mut self, state: TriggerState) {
        self.state = state;
        self.old_state = TriggerState::None;
        self.acquired_by = None;
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
