// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::io;
use std::path::Path;

use super::MountPointStatus;
use crate::{Error, Result};

/// Access to the mount table of the local operating system.
pub trait Mounter: Send + Sync {
    /// Check if a filesystem is mounted at the given path.
    ///
    /// Errors are returned as-is so that they can be classified,
    /// see [`mount_status`].
    fn is_mount_point(&self, path: &Path) -> io::Result<bool>;

    /// Detach whatever filesystem is mounted at the given path.
    fn unmount(&self, path: &Path) -> Result<()>;
}

/// Classify the state of a mountpoint path.
///
/// A missing path is considered unmounted. A disconnected fuse
/// mount is reported as lost, which is only detectable on linux.
pub fn mount_status(mounter: &dyn Mounter, path: &Path) -> (MountPointStatus, Option<String>) {
    match mounter.is_mount_point(path) {
        Ok(true) => (MountPointStatus::Mounted, None),
        Ok(false) => (MountPointStatus::Unmounted, None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (MountPointStatus::Unmounted, None),
        Err(err) if err.raw_os_error() == Some(libc::ENOTCONN) => {
            (MountPointStatus::Lost, Some(err.to_string()))
        }
        Err(err) => (MountPointStatus::Error, Some(err.to_string())),
    }
}

/// Probes and unmounts using the real system calls and tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        let st_target = nix::sys::stat::stat(path).map_err(io::Error::from)?;
        let Some(parent) = path.parent() else {
            // the root directory is always a mount point
            return Ok(true);
        };
        let st_parent = nix::sys::stat::stat(parent).map_err(io::Error::from)?;
        Ok(st_target.st_dev != st_parent.st_dev)
    }

    fn unmount(&self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "unmounting");
        #[cfg(target_os = "linux")]
        {
            if nix::unistd::geteuid().is_root() {
                // Perform a lazy unmount in case there are still open handles to files.
                return nix::mount::umount2(path, nix::mount::MntFlags::MNT_DETACH).map_err(
                    |err| Error::UnmountFailed {
                        path: path.to_owned(),
                        message: err.to_string(),
                    },
                );
            }
        }
        fusermount(path)
    }
}

#[cfg(target_os = "linux")]
const UNMOUNT_COMMANDS: &[(&str, &[&str])] = &[
    ("fusermount3", &["-u", "-z"]),
    ("fusermount", &["-u", "-z"]),
];
#[cfg(not(target_os = "linux"))]
const UNMOUNT_COMMANDS: &[(&str, &[&str])] = &[("umount", &[])];

/// Unmount using the setuid helper that ships with fuse, for unprivileged users.
fn fusermount(path: &Path) -> Result<()> {
    for (program, args) in UNMOUNT_COMMANDS {
        let output = std::process::Command::new(program)
            .args(*args)
            .arg(path)
            .output();
        match output {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{program} not found, trying next option");
                continue;
            }
            Err(err) => {
                return Err(Error::UnmountFailed {
                    path: path.to_owned(),
                    message: format!("failed to run {program}: {err}"),
                });
            }
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::UnmountFailed {
                    path: path.to_owned(),
                    message: format!("{program} {}: {}", output.status, stderr.trim()),
                });
            }
        }
    }
    Err(Error::UnmountFailed {
        path: path.to_owned(),
        message: "no unmount command was found, is fuse installed?".into(),
    })
}
