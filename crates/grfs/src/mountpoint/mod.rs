// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Mountpoint records and the lifecycle of their filesystem daemons.

mod launcher;
mod mounter;
mod supervisor;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
pub use launcher::{DaemonLauncher, Launcher};
pub use mounter::{Mounter, SystemMounter, mount_status};
use serde::{Deserialize, Serialize};
pub use supervisor::Supervisor;

use crate::{Config, Error, Repository, Result};


/// The observed state of a mountpoint, never persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MountPointStatus {
    /// A filesystem is mounted at the path
    Mounted,
    /// Nothing is mounted at the path, or it does not exist
    Unmounted,
    /// A filesystem is mounted but its daemon is gone
    Lost,
    /// The path could not be inspected
    Error,
}

/// A persistent association between a repository and a local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    pub repo: Repository,
    pub path: PathBuf,
    /// Where the daemon serving this mountpoint writes its output
    pub log_path: PathBuf,
    #[serde(default = "Utc::now")]
    pub create_time: DateTime<Utc>,
}

impl MountPoint {
    /// Create a new mountpoint record, preparing its log directory.
    ///
    /// The given path is made absolute but it does not need to exist.
    pub fn new<P: AsRef<Path>>(repo: Repository, path: P, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let path = std::path::absolute(path)
            .map_err(|err| Error::MountPointIoError(path.to_owned(), err))?;
        let log_path = log_path_for(&repo, &config.storage.logs_root());
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| Error::MountPointIoError(parent.to_owned(), err))?;
        }
        Ok(Self {
            repo,
            path,
            log_path,
            create_time: Utc::now(),
        })
    }
}

/// The log file location for a repository, unique per canonical identity.
pub fn log_path_for(repo: &Repository, logs_root: &Path) -> PathBuf {
    logs_root.join(repo.to_string().replace(':', "/"))
}

/// A mountpoint along with its current status, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountPointDisplay {
    #[serde(flatten)]
    pub mount_point: MountPoint,
    pub status: MountPointStatus,
    #[serde(rename = "errMsg", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl MountPointDisplay {
    pub fn new(mount_point: MountPoint, mounter: &dyn Mounter) -> Self {
        let (status, error_message) = mount_status(mounter, &mount_point.path);
        Self {
            mount_point,
            status,
            error_message,
        }
    }
}
