// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Administrative client seam.
//!
//! The reconciler, relay and prober only ever touch the cluster through
//! [`TopicAdmin`]. Conflicts are surfaced as typed errors and never
//! retried: the cluster is the source of truth and another actor may be
//! creating or deleting the same topic concurrently.

use crate::diff::TopicDiff;
use crate::topic::TopicSpec;
use std::collections::HashSet;
use thiserror::Error;

/// Administrative call errors.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("topic already exists: {0}")]
    TopicAlreadyExists(String),

    #[error("topic does not exist: {0}")]
    TopicDoesNotExist(String),

    #[error("broker error: {0}")]
    Broker(String),
}

/// Name filter for topic listings. An efficiency hint, not a correctness
/// requirement: callers must tolerate extra entries.
#[derive(Debug, Clone, Default)]
pub enum TopicFilter {
    /// Every topic.
    #[default]
    All,

    /// Topics whose name contains the substring.
    Contains(String),

    /// Topics whose name is in the set.
    OneOf(HashSet<String>),
}

impl TopicFilter {
    /// Restrict to the given names.
    pub fn one_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(names.into_iter().map(Into::into).collect())
    }

    /// Check whether a topic name passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Contains(fragment) => name.contains(fragment.as_str()),
            Self::OneOf(names) => names.contains(name),
        }
    }
}

/// Topic lifecycle operations against one cluster.
pub trait TopicAdmin {
    /// List topics matching the filter.
    fn list_topics(&self, filter: &TopicFilter) -> Result<Vec<TopicSpec>, AdminError>;

    /// Fetch one topic's live definition.
    fn get(&self, name: &str) -> Result<TopicSpec, AdminError>;

    /// Create every given topic. Fails with `TopicAlreadyExists` on conflict.
    fn create(&mut self, topics: &[TopicSpec]) -> Result<(), AdminError>;

    /// Alter the config of every given topic. Fails with `TopicDoesNotExist`.
    fn alter(&mut self, topics: &[TopicSpec]) -> Result<(), AdminError>;

    /// Delete one topic.
    fn delete(&mut self, name: &str) -> Result<(), AdminError>;

    /// Diff a candidate definition against the cluster's current one.
    fn diff(&self, candidate: &TopicSpec) -> Result<TopicDiff, AdminError> {
        let live = self.get(&candidate.name)?;
        Ok(TopicDiff::between(&live, candidate))
    }
}
