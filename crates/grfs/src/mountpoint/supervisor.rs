// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::path::Path;
use std::process::Child;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use super::{
    Launcher,
    MountPoint,
    MountPointDisplay,
    MountPointStatus,
    Mounter,
    SystemMounter,
    mount_status,
};
use crate::{Config, Error, Result};

#[cfg(test)]
#[path = "./supervisor_test.rs"]
mod supervisor_test;

/// Drives mountpoints between their mounted and unmounted states.
#[derive(Debug, Clone)]
pub struct Supervisor<M = SystemMounter> {
    mounter: M,
    ready_timeout: Duration,
    ready_interval: Duration,
}

impl Supervisor<SystemMounter> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SystemMounter,
            config.mount.ready_timeout(),
            config.mount.ready_interval(),
        )
    }
}

impl<M: Mounter> Supervisor<M> {
    pub fn new(mounter: M, ready_timeout: Duration, ready_interval: Duration) -> Self {
        Self {
            mounter,
            ready_timeout,
            ready_interval,
        }
    }

    pub fn mounter(&self) -> &M {
        &self.mounter
    }

    pub fn status(&self, path: &Path) -> (MountPointStatus, Option<String>) {
        mount_status(&self.mounter, path)
    }

    pub fn display(&self, mount_point: MountPoint) -> MountPointDisplay {
        MountPointDisplay::new(mount_point, &self.mounter)
    }

    /// Ensure that the given mountpoint is served.
    ///
    /// An already mounted path is left alone. Stale mounts are
    /// cleaned up first, and the directory must be empty before
    /// a new daemon is launched.
    pub async fn mount(&self, mount_point: &MountPoint, launcher: &dyn Launcher) -> Result<()> {
        let path = &mount_point.path;
        let (status, message) = self.status(path);
        tracing::debug!(repo = %mount_point.repo, path = %path.display(), %status, "mounting");
        match status {
            MountPointStatus::Mounted => {
                tracing::info!("{} is already mounted to {}", mount_point.repo, path.display());
                return Ok(());
            }
            MountPointStatus::Unmounted => {
                tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|err| Error::MountPointIoError(path.clone(), err))?;
            }
            MountPointStatus::Lost | MountPointStatus::Error => {
                tracing::warn!(
                    "{} is in {status} state ({}), unmounting it first",
                    path.display(),
                    message.as_deref().unwrap_or("no details"),
                );
                self.mounter.unmount(path)?;
            }
        }

        if !is_empty_dir(path).await? {
            return Err(Error::MountPointNotEmpty(path.clone()));
        }

        let daemon = launcher.launch(mount_point)?;
        self.wait_mounted(mount_point, daemon).await
    }

    /// Poll until the mountpoint appears, the daemon exits or time runs out.
    ///
    /// A daemon that exits is reaped here so that it does not linger
    /// for the rest of this process.
    async fn wait_mounted(
        &self,
        mount_point: &MountPoint,
        mut daemon: Option<Child>,
    ) -> Result<()> {
        let deadline = Instant::now() + self.ready_timeout;
        let mut interval = tokio::time::interval(self.ready_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let (status, _) = self.status(&mount_point.path);
            if status == MountPointStatus::Mounted {
                tracing::info!(
                    "mounted {} to {}",
                    mount_point.repo,
                    mount_point.path.display()
                );
                return Ok(());
            }
            if let Some(child) = daemon.as_mut() {
                let exited = child.try_wait().map_err(|source| Error::LaunchFailed {
                    repo: mount_point.repo.to_string(),
                    source,
                })?;
                if let Some(status) = exited {
                    return Err(Error::DaemonExited {
                        path: mount_point.path.clone(),
                        status,
                        log: mount_point.log_path.clone(),
                    });
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::MountPointTimeout {
                    path: mount_point.path.clone(),
                    status,
                    log: mount_point.log_path.clone(),
                });
            }
        }
    }

    /// Stop serving the given mountpoint and remove its directory.
    ///
    /// Unmounting something that is not mounted is not an error,
    /// and neither is a directory that no longer exists.
    pub async fn unmount(&self, mount_point: &MountPoint) -> Result<()> {
        let path = &mount_point.path;
        let (status, _) = self.status(path);
        tracing::debug!(repo = %mount_point.repo, path = %path.display(), %status, "unmounting");
        if status != MountPointStatus::Unmounted {
            self.mounter.unmount(path)?;
        }
        match tokio::fs::remove_dir(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::MountPointIoError(path.clone(), err)),
        }
    }
}

async fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|err| Error::MountPointIoError(path.to_owned(), err))?;
    let first = entries
        .next_entry()
        .await
        .map_err(|err| Error::MountPointIoError(path.to_owned(), err))?;
    Ok(first.is_none())
}
