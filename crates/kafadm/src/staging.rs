// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scoped staging directory for relay and probe runs.
//!
//! One acquisition couples to exactly one release. Explicit [`release`]
//! reports cleanup errors; the `Drop` backstop covers every other exit
//! path (errors, panics, interrupt unwinds) so a staging directory is
//! never left behind unless retention was requested.
//!
//! [`release`]: StagingArea::release

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Staging directory errors.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staging directory already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusively-owned staging directory, deleted on release unless retained.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    retain: bool,
    released: bool,
}

impl StagingArea {
    /// Create the directory. Fails if the path already exists; there is
    /// no silent reuse of another invocation's staging area.
    pub fn acquire<P: AsRef<Path>>(path: P, retain: bool) -> Result<Self, StagingError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // create_dir fails on an existing path, which also closes the
        // check-then-create race.
        match std::fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StagingError::AlreadyExists(path));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(path = %path.display(), retain, "staging area acquired");
        Ok(Self {
            path,
            retain,
            released: false,
        })
    }

    /// The staged-files directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory will survive release.
    pub fn retained(&self) -> bool {
        self.retain
    }

    /// Release explicitly, surfacing cleanup errors.
    pub fn release(mut self) -> Result<(), StagingError> {
        self.do_release()?;
        Ok(())
    }

    fn do_release(&mut self) -> Result<(), StagingError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if self.retain {
            tracing::info!(path = %self.path.display(), "staging area retained");
            return Ok(());
        }
        // Tolerate the caller (or another cleanup) having removed it first.
        if self.path.exists() {
            std::fs::remove_dir_all(&self.path)?;
            tracing::debug!(path = %self.path.display(), "staging area removed");
        }
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = self.do_release() {
            tracing::warn!(path = %self.path.display(), error = %e, "staging cleanup failed");
        }
    }
}
