// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::time::Duration;

use rstest::rstest;

use super::Supervisor;
use crate::fixtures::*;
use crate::mountpoint::{MountPoint, MountPointStatus};
use crate::{Config, Error, Repository};

fn supervisor(mounter: &FakeMounter) -> Supervisor<FakeMounter> {
    Supervisor::new(
        mounter.clone(),
        Duration::from_millis(200),
        Duration::from_millis(10),
    )
}

fn mount_point(tmpdir: &tempfile::TempDir, name: &str) -> MountPoint {
    let mut config = Config::default();
    config.storage.root = tmpdir.path().join("data");
    let repo = Repository::new("github.com", "fioncat", name);
    MountPoint::new(repo, tmpdir.path().join("mnt").join(name), &config).unwrap()
}

#[rstest]
#[tokio::test]
async fn test_mount_creates_directory(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let launcher = FakeLauncher::new(&mounter, true);
    let mp = mount_point(&tmpdir, "grfs");

    supervisor(&mounter)
        .mount(&mp, &launcher)
        .await
        .expect("mount should succeed");

    assert!(mp.path.is_dir(), "mount should create the directory");
    assert_eq!(launcher.launches(), 1);
    assert_eq!(supervisor(&mounter).status(&mp.path).0, MountPointStatus::Mounted);
}

#[rstest]
#[tokio::test]
async fn test_mount_already_mounted(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let launcher = FakeLauncher::new(&mounter, true);
    let mp = mount_point(&tmpdir, "grfs");
    mounter.set(&mp.path, MountPointStatus::Mounted);

    supervisor(&mounter).mount(&mp, &launcher).await.unwrap();
    assert_eq!(launcher.launches(), 0, "nothing should be launched");
    assert_eq!(mounter.unmounts(), 0);
}

#[rstest]
#[tokio::test]
async fn test_mount_non_empty_directory(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let launcher = FakeLauncher::new(&mounter, true);
    let mp = mount_point(&tmpdir, "grfs");
    std::fs::create_dir_all(&mp.path).unwrap();
    std::fs::write(mp.path.join("file.txt"), "data").unwrap();

    let err = supervisor(&mounter)
        .mount(&mp, &launcher)
        .await
        .expect_err("a non-empty directory should not be mounted over");
    assert!(matches!(err, Error::MountPointNotEmpty(ref p) if p == &mp.path));
    assert_eq!(launcher.launches(), 0);
}

#[rstest]
#[case(MountPointStatus::Lost)]
#[case(MountPointStatus::Error)]
#[tokio::test]
async fn test_mount_cleans_up_stale_mount(
    tmpdir: tempfile::TempDir,
    #[case] stale: MountPointStatus,
) {
    let mounter = FakeMounter::default();
    let launcher = FakeLauncher::new(&mounter, true);
    let mp = mount_point(&tmpdir, "grfs");
    std::fs::create_dir_all(&mp.path).unwrap();
    mounter.set(&mp.path, stale);

    supervisor(&mounter).mount(&mp, &launcher).await.unwrap();
    assert_eq!(mounter.unmounts(), 1, "stale mount should be unmounted");
    assert_eq!(launcher.launches(), 1);
}

#[rstest]
#[tokio::test]
async fn test_mount_timeout_names_log_file(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let launcher = FakeLauncher::new(&mounter, false);
    let mp = mount_point(&tmpdir, "grfs");

    let err = supervisor(&mounter)
        .mount(&mp, &launcher)
        .await
        .expect_err("mount should time out when the daemon never mounts");
    match &err {
        Error::MountPointTimeout { status, log, .. } => {
            assert_eq!(*status, MountPointStatus::Unmounted);
            assert_eq!(log, &mp.log_path);
        }
        err => panic!("expected a timeout, got {err:?}"),
    }
    assert!(err.to_string().contains(&*mp.log_path.to_string_lossy()));
}

#[rstest]
#[tokio::test]
async fn test_mount_fails_fast_when_daemon_exits(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let launcher = FakeLauncher::exiting(&mounter);
    let mp = mount_point(&tmpdir, "grfs");
    let supervisor = Supervisor::new(
        mounter.clone(),
        Duration::from_secs(10),
        Duration::from_millis(10),
    );

    let start = std::time::Instant::now();
    let err = supervisor
        .mount(&mp, &launcher)
        .await
        .expect_err("mount should fail once the daemon has exited");
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "an exited daemon should not wait for the full timeout"
    );
    match &err {
        Error::DaemonExited { status, log, path } => {
            assert!(!status.success());
            assert_eq!(log, &mp.log_path);
            assert_eq!(path, &mp.path);
        }
        err => panic!("expected an exited daemon, got {err:?}"),
    }
    assert!(err.to_string().contains(&*mp.log_path.to_string_lossy()));
    assert_eq!(launcher.launches(), 1);
}

#[rstest]
#[tokio::test]
async fn test_unmount_is_idempotent(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let mp = mount_point(&tmpdir, "grfs");

    supervisor(&mounter).unmount(&mp).await.unwrap();
    supervisor(&mounter).unmount(&mp).await.unwrap();
    assert_eq!(mounter.unmounts(), 0, "nothing was mounted");
}

#[rstest]
#[tokio::test]
async fn test_unmount_removes_directory(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let mp = mount_point(&tmpdir, "grfs");
    std::fs::create_dir_all(&mp.path).unwrap();
    mounter.set(&mp.path, MountPointStatus::Mounted);

    supervisor(&mounter).unmount(&mp).await.unwrap();
    assert_eq!(mounter.unmounts(), 1);
    assert!(!mp.path.exists());
    assert_eq!(supervisor(&mounter).status(&mp.path).0, MountPointStatus::Unmounted);
}

#[rstest]
#[tokio::test]
async fn test_unmount_non_empty_directory_fails(tmpdir: tempfile::TempDir) {
    let mounter = FakeMounter::default();
    let mp = mount_point(&tmpdir, "grfs");
    std::fs::create_dir_all(&mp.path).unwrap();
    std::fs::write(mp.path.join("file.txt"), "data").unwrap();

    supervisor(&mounter)
        .unmount(&mp)
        .await
        .expect_err("a non-empty directory cannot be removed");
}
