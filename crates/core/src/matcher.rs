// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group-name predicates for bulk lookups, pause and resume

use crate::key::GroupedKey;
use serde::{Deserialize, Serialize};

/// Selects keys by their group name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum GroupMatcher {
    Equals(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    Anything,
}

impl GroupMatcher {
    pub fn group_equals(group: impl Into<String>) -> Self {
        GroupMatcher::Equals(group.into())
    }

    pub fn group_starts_with(prefix: impl Into<String>) -> Self {
        GroupMatcher::StartsWith(prefix.into())
    }

    pub fn any_group() -> Self {
        GroupMatcher::Anything
    }

    pub fn matches_group(&self, group: &str) -> bool {
        match self {
            GroupMatcher::Equals(value) => group == value,
            GroupMatcher::StartsWith(value) => group.starts_with(value.as_str()),
            GroupMatcher::EndsWith(value) => group.ends_with(value.as_str()),
            GroupMatcher::Contains(value) => group.contains(value.as_str()),
            GroupMatcher::Anything => true,
        }
    }

    pub fn is_match(&self, key: &impl GroupedKey) -> bool {
        self.matches_group(key.group())
    }

    /// The single group named by an equality matcher
    pub fn exact_group(&self) -> Option<&str> {
        match self {
            GroupMatcher::Equals(value) => Some(value),
            _ => None,
        }
    }
}
