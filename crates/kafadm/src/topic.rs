// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic definitions and the desired-topics document.
//!
//! A [`TopicSpec`] is identified by name alone: two specs with the same
//! name are the same topic for set operations even when their attributes
//! differ. The reconciler's create/edit/ignore partition relies on this,
//! so equality and hashing are deliberately name-only while diffs compare
//! content (see `diff`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::Path;
use thiserror::Error;

/// Desired-document errors. Raised before any cluster contact.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate topic name in document: {0}")]
    DuplicateTopic(String),
}

/// A topic definition.
///
/// `partitions` and `replication` are fixed at creation time; only the
/// config map can change on a live topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    /// Topic name (cluster-wide identity).
    pub name: String,

    /// Partition count. Immutable once the topic exists.
    #[serde(default = "default_partitions", alias = "num_partitions")]
    pub partitions: i32,

    /// Replication factor. Immutable once the topic exists.
    #[serde(default = "default_replication", alias = "replication_factor")]
    pub replication: i32,

    /// Per-topic configuration entries (`retention.ms`, ...).
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

fn default_partitions() -> i32 {
    1
}

fn default_replication() -> i32 {
    1
}

impl TopicSpec {
    /// Create a spec with default structural attributes and empty config.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: default_partitions(),
            replication: default_replication(),
            config: BTreeMap::new(),
        }
    }

    /// Set partition count.
    pub fn partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Set replication factor.
    pub fn replication(mut self, replication: i32) -> Self {
        self.replication = replication;
        self
    }

    /// Add a config entry.
    pub fn config_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Replace the whole config map.
    pub fn with_config(mut self, config: BTreeMap<String, String>) -> Self {
        self.config = config;
        self
    }
}

// Identity is the name, nothing else. Structural comparison goes through
// `TopicDiff`, never through `==`.
impl PartialEq for TopicSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TopicSpec {}

impl Hash for TopicSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// The desired-topics document (`topics:` list in YAML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsDocument {
    /// Desired topic definitions, pairwise unique by name.
    pub topics: Vec<TopicSpec>,
}

impl TopicsDocument {
    /// Load and validate a document from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SpecError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse and validate a document from YAML text.
    pub fn from_str(content: &str) -> Result<Self, SpecError> {
        let doc: Self = serde_yaml::from_str(content)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Reject duplicate names before any cluster contact.
    pub fn validate(&self) -> Result<(), SpecError> {
        let mut seen = HashSet::new();
        for topic in &self.topics {
            if !seen.insert(topic.name.as_str()) {
                return Err(SpecError::DuplicateTopic(topic.name.clone()));
            }
        }
        Ok(())
    }
}
