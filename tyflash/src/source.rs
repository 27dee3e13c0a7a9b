// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware source resolution.
//!
//! A firmware location is either an existing local directory, used in place,
//! or a repository URL that is cloned into a temporary directory for the
//! duration of the run.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use tyflash_common::plan::repository_name;
use tyflash_common::{Step, Toolchain};

use crate::executor::{Executor, StepFailure};

/// Where the firmware project comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FirmwareSource {
    Local(PathBuf),
    Remote(String),
}

impl FirmwareSource {
    /// Existing paths are local, anything else is treated as a URL.
    pub fn classify(location: &str) -> Self {
        let path = Path::new(location);
        if path.exists() {
            FirmwareSource::Local(path.to_path_buf())
        } else {
            FirmwareSource::Remote(location.to_string())
        }
    }
}

/// Fetching a remote firmware source failed.
#[derive(Debug)]
pub struct SourceFetchError {
    pub url: String,
    pub reason: String,
}

impl fmt::Display for SourceFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to fetch {}: {}", self.url, self.reason)
    }
}

impl std::error::Error for SourceFetchError {}

/// Temporary directory holding a clone. Removed when dropped.
pub struct CloneDir {
    dir: TempDir,
}

impl CloneDir {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("tyflash-").tempdir()?;
        debug!("created {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting any error instead of ignoring it.
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("removed {}", path.display());
        Ok(())
    }
}

/// Firmware project directory ready for uploading.
pub struct ResolvedSource {
    path: PathBuf,
    clone_dir: Option<CloneDir>,
}

impl ResolvedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the project lives in a temporary clone.
    pub fn is_temporary(&self) -> bool {
        self.clone_dir.is_some()
    }

    /// Release the source, removing the temporary clone if there is one.
    pub fn close(self) -> io::Result<()> {
        match self.clone_dir {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

/// Locate or fetch the firmware project named by `location`.
pub fn resolve_firmware_source(
    location: &str,
    tools: &Toolchain,
    executor: &mut dyn Executor,
) -> Result<ResolvedSource, SourceFetchError> {
    let url = match FirmwareSource::classify(location) {
        FirmwareSource::Local(path) => {
            info!("using local firmware at {}", path.display());
            return Ok(ResolvedSource {
                path,
                clone_dir: None,
            });
        }
        FirmwareSource::Remote(url) => url,
    };

    let fetch_error = |reason: String| SourceFetchError {
        url: url.clone(),
        reason,
    };

    let name = repository_name(&url)
        .ok_or_else(|| fetch_error("cannot derive a repository name".to_string()))?
        .to_string();
    let clone_dir = CloneDir::new()
        .map_err(|e| fetch_error(format!("cannot create temporary directory: {}", e)))?;

    info!("cloning {} into {}", url, clone_dir.path().display());
    let step = Step::Clone { url: url.clone() };
    if let Some(invocation) = tools.invocation(&step, clone_dir.path()) {
        executor
            .run(&invocation)
            .map_err(|e: StepFailure| fetch_error(e.to_string()))?;
    }

    Ok(ResolvedSource {
        path: clone_dir.path().join(name),
        clone_dir: Some(clone_dir),
    })
}
