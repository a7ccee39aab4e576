// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-execution instructions reported back to the job store

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the store should do with a trigger once its job has run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletedExecutionInstruction {
    /// Leave the trigger as it is
    #[default]
    Noop,
    DeleteTrigger,
    SetTriggerComplete,
    SetTriggerError,
    SetAllJobTriggersComplete,
    SetAllJobTriggersError,
}

impl fmt::Display for CompletedExecutionInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompletedExecutionInstruction::Noop => "noop",
            CompletedExecutionInstruction::DeleteTrigger => "delete_trigger",
            CompletedExecutionInstruction::SetTriggerComplete => "set_trigger_complete",
            CompletedExecutionInstruction::SetTriggerError => "set_trigger_error",
            CompletedExecutionInstruction::SetAllJobTriggersComplete => {
                "set_all_job_triggers_complete"
            }
            CompletedExecutionInstruction::SetAllJobTriggersError => "set_all_job_triggers_error",
        };
        write!(f, "{}", name)
    }
}
