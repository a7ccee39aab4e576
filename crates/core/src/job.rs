// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions

use crate::key::JobKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque per-job (and per-trigger) state handed to the executor
pub type JobDataMap = BTreeMap<String, serde_json::Value>;

/// A unit of work that one or more triggers fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub key: JobKey,
    #[serde(default)]
    pub description: Option<String>,
    /// Durable jobs survive the removal of their last trigger
    #[serde(default)]
    pub durable: bool,
    /// At most one trigger of this job may be executing at a time
    #[serde(default)]
    pub disallow_concurrent_execution: bool,
    /// Job data returned on completion replaces the stored data
    #[serde(default)]
    pub persist_job_data_after_execution: bool,
    #[serde(default)]
    pub requests_recovery: bool,
    #[serde(default)]
    pub data: JobDataMap,
}

impl JobDetail {
    pub fn new(key: JobKey) -> Self {
        Self {
            key,
            description: None,
            durable: false,
            disallow_concurrent_execution: false,
            persist_job_data_after_execution: false,
            requests_recovery: false,
            data: JobDataMap::new(),
        }
    }

    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub fn disallow_concurrent_execution(mut self) -> Self {
        self.disallow_concurrent_execution = true;
        self
    }

    pub fn persist_job_data_after_execution(mut self) -> Self {
        self.persist_job_data_after_execution = true;
        self
    }

    pub fn requests_recovery(mut self) -> Self {
        self.requests_recovery = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_has_conservative_defaults() {
        let job = JobDetail::new(JobKey::named("j"));
        assert!(!job.durable);
        assert!(!job.disallow_concurrent_execution);
        assert!(!job.persist_job_data_after_execution);
        assert!(job.data.is_empty());
    }

    #[test]
    fn job_deserializes_with_missing_flags() {
        let job: JobDetail =
            serde_json::from_str(r#"{"key":{"name":"j","group":"g"}}"#).unwrap();
        assert_eq!(job.key, JobKey::new("j", "g"));
        assert!(!job.durable);
    }

    #[test]
    fn builder_sets_flags_and_data() {
        let job = JobDetail::new(JobKey::named("j"))
            .durable()
            .disallow_concurrent_execution()
            .with_data("count", serde_json::json!(3));
        assert!(job.durable);
        assert!(job.disallow_concurrent_execution);
        assert_eq!(job.data["count"], serde_json::json!(3));
    }
}
