// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structural diff between a candidate topic definition and the live one.
//!
//! Computed on demand and discarded after the plan is applied; diffs are
//! never stored.

use crate::topic::TopicSpec;

/// One changed config key with its old and new values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub key: String,
    /// Value on the cluster, `None` if the key is not set there.
    pub old: Option<String>,
    /// Desired value, `None` if the key is being removed.
    pub new: Option<String>,
}

/// Diff of a candidate definition against the cluster's current one.
#[derive(Debug, Clone)]
pub struct TopicDiff {
    /// Topic name the diff applies to.
    pub name: String,

    /// Changed config keys (old -> new).
    pub config_changes: Vec<ConfigChange>,

    /// Partition count change implied by the candidate (live, desired).
    pub partition_change: Option<(i32, i32)>,

    /// Replication factor change implied by the candidate (live, desired).
    pub replication_change: Option<(i32, i32)>,
}

impl TopicDiff {
    /// Compute the diff of `candidate` against `live`.
    pub fn between(live: &TopicSpec, candidate: &TopicSpec) -> Self {
        let mut config_changes = Vec::new();

        for (key, new_value) in &candidate.config {
            match live.config.get(key) {
                Some(old_value) if old_value == new_value => {}
                old => config_changes.push(ConfigChange {
                    key: key.clone(),
                    old: old.cloned(),
                    new: Some(new_value.clone()),
                }),
            }
        }

        // Keys set on the cluster but absent from the candidate are removals.
        for (key, old_value) in &live.config {
            if !candidate.config.contains_key(key) {
                config_changes.push(ConfigChange {
                    key: key.clone(),
                    old: Some(old_value.clone()),
                    new: None,
                });
            }
        }

        let partition_change = (live.partitions != candidate.partitions)
            .then_some((live.partitions, candidate.partitions));
        let replication_change = (live.replication != candidate.replication)
            .then_some((live.replication, candidate.replication));

        Self {
            name: candidate.name.clone(),
            config_changes,
            partition_change,
            replication_change,
        }
    }

    /// Whether any config key differs.
    pub fn has_changes(&self) -> bool {
        !self.config_changes.is_empty()
    }

    /// A diff is invalid when it implies a change to an attribute that is
    /// immutable on a live topic (partitions, replication factor).
    pub fn is_valid(&self) -> bool {
        self.partition_change.is_none() && self.replication_change.is_none()
    }
}
