// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use super::MountPoint;
use crate::{Error, Result};

/// Starts the process that serves a mountpoint.
pub trait Launcher: Send + Sync {
    /// Start serving the given mountpoint.
    ///
    /// This must return as soon as the server has been started,
    /// it is not expected to have mounted anything yet. The started
    /// process is returned when there is one to watch while waiting
    /// for the mount to appear.
    fn launch(&self, mount_point: &MountPoint) -> Result<Option<Child>>;
}

/// Launches the filesystem as a detached copy of a grfs binary.
///
/// The daemon runs in its own process group so that it survives
/// the end of the invoking shell session, and all of its output is
/// appended to the mountpoint's log file.
#[derive(Debug, Clone)]
pub struct DaemonLauncher {
    program: PathBuf,
    debug: bool,
}

impl DaemonLauncher {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            debug: false,
        }
    }

    /// Launch daemons using the currently running executable.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().map_err(|err| Error::LaunchFailed {
            repo: String::from("<unknown>"),
            source: err,
        })?;
        Ok(Self::new(program))
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The full command used to serve the given mountpoint.
    pub fn command(&self, mount_point: &MountPoint) -> Command {
        let repo = &mount_point.repo;
        let mut cmd = Command::new(&self.program);
        cmd.arg("start")
            .arg("--path")
            .arg(&mount_point.path)
            .arg("--domain")
            .arg(&repo.domain)
            .arg("--owner")
            .arg(&repo.owner)
            .arg("--name")
            .arg(&repo.name);
        if !repo.reference.is_empty() {
            cmd.arg("--ref").arg(&repo.reference);
        }
        if self.debug {
            cmd.arg("--debug");
        }
        cmd
    }
}

impl Launcher for DaemonLauncher {
    fn launch(&self, mount_point: &MountPoint) -> Result<Option<Child>> {
        let failed = |source| Error::LaunchFailed {
            repo: mount_point.repo.to_string(),
            source,
        };
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&mount_point.log_path)
            .map_err(|err| Error::MountPointIoError(mount_point.log_path.clone(), err))?;
        writeln!(
            log,
            "==== {} launching filesystem for {} at {}",
            chrono::Utc::now().to_rfc3339(),
            mount_point.repo,
            mount_point.path.display(),
        )
        .map_err(|err| Error::MountPointIoError(mount_point.log_path.clone(), err))?;
        let stderr = log.try_clone().map_err(failed)?;

        let mut cmd = self.command(mount_point);
        cmd.stdin(Stdio::null())
            .stdout(log)
            .stderr(stderr)
            .process_group(0);
        tracing::debug!(?cmd, "launching filesystem daemon");
        let child = cmd.spawn().map_err(failed)?;
        tracing::debug!(pid = child.id(), "filesystem daemon started");
        Ok(Some(child))
    }
}
