// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-context configuration store.
//!
//! A context is a named set of connection parameters identifying one
//! cluster. The store persists as a TOML file; the relay never mutates
//! process-global state and instead receives source and destination
//! context names explicitly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Context store errors.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context not defined: {0}")]
    NotDefined(String),

    #[error("no current context set")]
    NoCurrent,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Connection parameters for one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Broker bootstrap addresses (`host:port`).
    pub bootstrap_servers: Vec<String>,

    /// Security protocol (`plaintext`, `sasl_ssl`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_protocol: Option<String>,

    /// SASL mechanism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_mechanism: Option<String>,

    /// SASL username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_username: Option<String>,

    /// SASL password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_password: Option<String>,
}

/// On-disk configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextConfig {
    /// Name of the context commands operate on by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    /// Named contexts.
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextSettings>,
}

impl ContextConfig {
    /// A starter configuration pointing at a local broker.
    pub fn sample() -> Self {
        let mut contexts = BTreeMap::new();
        contexts.insert(
            "local".to_string(),
            ContextSettings {
                bootstrap_servers: vec!["localhost:9092".to_string()],
                security_protocol: None,
                sasl_mechanism: None,
                sasl_username: None,
                sasl_password: None,
            },
        );
        Self {
            current_context: Some("local".to_string()),
            contexts,
        }
    }
}

/// File-backed context store.
#[derive(Debug)]
pub struct ContextStore {
    path: PathBuf,
    config: ContextConfig,
}

impl ContextStore {
    /// Load the store from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ContextError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)?;
        let config: ContextConfig = toml::from_str(&content)?;
        Ok(Self { path, config })
    }

    /// Write a sample configuration (overwriting any existing file) and
    /// return the store.
    pub fn recreate<P: AsRef<Path>>(path: P) -> Result<Self, ContextError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            path,
            config: ContextConfig::sample(),
        };
        store.save()?;
        Ok(store)
    }

    /// Persist the current state.
    pub fn save(&self) -> Result<(), ContextError> {
        let content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// The context commands operate on by default.
    pub fn current_context(&self) -> Result<&str, ContextError> {
        self.config
            .current_context
            .as_deref()
            .ok_or(ContextError::NoCurrent)
    }

    /// All defined context names, sorted.
    pub fn available_contexts(&self) -> Vec<&str> {
        self.config.contexts.keys().map(String::as_str).collect()
    }

    /// Connection settings for a context.
    pub fn settings(&self, name: &str) -> Result<&ContextSettings, ContextError> {
        self.config
            .contexts
            .get(name)
            .ok_or_else(|| ContextError::NotDefined(name.to_string()))
    }

    /// Switch the current context and persist the change. Fails without
    /// mutation when the context is not defined.
    pub fn switch(&mut self, name: &str) -> Result<(), ContextError> {
        if !self.config.contexts.contains_key(name) {
            return Err(ContextError::NotDefined(name.to_string()));
        }
        self.config.current_context = Some(name.to_string());
        self.save()?;
        tracing::info!(context = name, "switched context");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn two_context_file(dir: &Path) -> PathBuf {
        let path = dir.join("kafadm.toml");
        std::fs::write(
            &path,
            r#"
current_context = "staging"

[contexts.staging]
bootstrap_servers = ["staging-1:9092", "staging-2:9092"]

[contexts.production]
bootstrap_servers = ["prod-1:9092"]
security_protocol = "sasl_ssl"
sasl_mechanism = "PLAIN"
"#,
        )
        .expect("write config");
        path
    }

    #[test]
    fn test_load_and_read() {
        let dir = tempdir().expect("tempdir");
        let store = ContextStore::load(two_context_file(dir.path())).expect("load");

        assert_eq!(store.current_context().expect("current"), "staging");
        assert_eq!(store.available_contexts(), vec!["production", "staging"]);
        assert_eq!(
            store.settings("production").expect("settings").bootstrap_servers,
            vec!["prod-1:9092"]
        );
    }

    #[test]
    fn test_switch_persists() {
        let dir = tempdir().expect("tempdir");
        let path = two_context_file(dir.path());

        let mut store = ContextStore::load(&path).expect("load");
        store.switch("production").expect("switch");

        let reloaded = ContextStore::load(&path).expect("reload");
        assert_eq!(reloaded.current_context().expect("current"), "production");
    }

    #[test]
    fn test_switch_unknown_context() {
        let dir = tempdir().expect("tempdir");
        let mut store = ContextStore::load(two_context_file(dir.path())).expect("load");

        assert!(matches!(
            store.switch("nonexistent"),
            Err(ContextError::NotDefined(name)) if name == "nonexistent"
        ));
        // Failed switch leaves the current context alone.
        assert_eq!(store.current_context().expect("current"), "staging");
    }

    #[test]
    fn test_recreate_sample() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("conf/kafadm.toml");

        let store = ContextStore::recreate(&path).expect("recreate");
        assert_eq!(store.current_context().expect("current"), "local");

        let reloaded = ContextStore::load(&path).expect("reload");
        assert_eq!(
            reloaded.settings("local").expect("local").bootstrap_servers,
            vec!["localhost:9092"]
        );
    }
}
