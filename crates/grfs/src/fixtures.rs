// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rstest::fixture;
use tempfile::TempDir;

use crate::Result;
use crate::mountpoint::{Launcher, MountPoint, MountPointStatus, Mounter};

#[allow(dead_code)]
pub fn init_logging() {
    let sub = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::new("grfs=trace"))
        .without_time()
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(sub);
}

#[fixture]
pub fn tmpdir() -> TempDir {
    tempfile::Builder::new()
        .prefix("grfs-test-")
        .tempdir()
        .expect("failed to create dir for test")
}

/// Tracks mount state in memory instead of the system mount table.
#[derive(Clone, Default)]
pub struct FakeMounter {
    state: Arc<Mutex<HashMap<PathBuf, MountPointStatus>>>,
    unmounts: Arc<AtomicUsize>,
}

impl FakeMounter {
    pub fn set(&self, path: &Path, status: MountPointStatus) {
        self.state.lock().unwrap().insert(path.to_owned(), status);
    }

    pub fn unmounts(&self) -> usize {
        self.unmounts.load(Ordering::SeqCst)
    }
}

impl Mounter for FakeMounter {
    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        let status = self.state.lock().unwrap().get(path).copied();
        match status {
            Some(MountPointStatus::Mounted) => Ok(true),
            Some(MountPointStatus::Lost) => Err(io::Error::from_raw_os_error(libc::ENOTCONN)),
            Some(MountPointStatus::Error) => Err(io::Error::from_raw_os_error(libc::EACCES)),
            Some(MountPointStatus::Unmounted) | None if path.exists() => Ok(false),
            Some(MountPointStatus::Unmounted) | None => Err(io::ErrorKind::NotFound.into()),
        }
    }

    fn unmount(&self, path: &Path) -> Result<()> {
        self.unmounts.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Pretends to start a daemon, optionally marking the path as mounted.
pub struct FakeLauncher {
    mounter: FakeMounter,
    succeed: bool,
    exits: bool,
    launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(mounter: &FakeMounter, succeed: bool) -> Self {
        Self {
            mounter: mounter.clone(),
            succeed,
            exits: false,
            launches: AtomicUsize::new(0),
        }
    }

    /// Start a real process that exits right away without mounting.
    pub fn exiting(mounter: &FakeMounter) -> Self {
        Self {
            exits: true,
            ..Self::new(mounter, false)
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, mount_point: &MountPoint) -> Result<Option<Child>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.exits {
            let child = Command::new("false")
                .spawn()
                .expect("failed to spawn a short-lived process");
            return Ok(Some(child));
        }
        if self.succeed {
            self.mounter
                .set(&mount_point.path, MountPointStatus::Mounted);
        }
        Ok(None)
    }
}
