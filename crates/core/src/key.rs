// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composite `(name, group)` identifiers for jobs and triggers

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Group assigned when a key is created without one
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Anything addressed by a `(name, group)` pair
pub trait GroupedKey {
    fn name(&self) -> &str;
    fn group(&self) -> &str;
}

/// Key order: group first (default group ahead of all others), then name
fn compare_keys(a: &impl GroupedKey, b: &impl GroupedKey) -> Ordering {
    let a_default = a.group() == DEFAULT_GROUP;
    let b_default = b.group() == DEFAULT_GROUP;
    b_default
        .cmp(&a_default)
        .then_with(|| a.group().cmp(b.group()))
        .then_with(|| a.name().cmp(b.name()))
}

macro_rules! grouped_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            pub name: String,
            pub group: String,
        }

        impl $name {
            pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    group: group.into(),
                }
            }

            /// Key in the default group
            pub fn named(name: impl Into<String>) -> Self {
                Self::new(name, DEFAULT_GROUP)
            }
        }

        impl GroupedKey for $name {
            fn name(&self) -> &str {
                &self.name
            }

            fn group(&self) -> &str {
                &self.group
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                compare_keys(self, other)
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}", self.group, self.name)
            }
        }
    };
}

grouped_key!(
    /// Identifies a job definition
    JobKey
);

grouped_key!(
    /// Identifies a trigger
    TriggerKey
);

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
