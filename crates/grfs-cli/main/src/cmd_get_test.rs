// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::path::PathBuf;

use grfs::{MountPoint, MountPointDisplay, MountPointStatus, Repository};
use rstest::rstest;

use super::format_table;

fn display(repo: Repository, path: &str, status: MountPointStatus) -> MountPointDisplay {
    MountPointDisplay {
        mount_point: MountPoint {
            repo,
            path: PathBuf::from(path),
            log_path: PathBuf::from("/tmp/grfs/logs/repo"),
            create_time: chrono::Utc::now(),
        },
        status,
        error_message: None,
    }
}

#[rstest]
fn test_format_table_aligns_columns() {
    colored::control::set_override(false);
    let items = vec![
        display(
            Repository::new("github.com", "fioncat", "grfs").with_reference("main"),
            "/mnt/grfs",
            MountPointStatus::Mounted,
        ),
        display(
            Repository::new("my-gitlab.com", "k8s/devops", "etcdhelper"),
            "/mnt/etcdhelper",
            MountPointStatus::Unmounted,
        ),
    ];

    let table = format_table(&items);
    let lines: Vec<_> = table.lines().collect();
    assert_eq!(
        lines,
        vec![
            "REPOSITORY                           STATUS     PATH",
            "github.com:fioncat/grfs@main         mounted    /mnt/grfs",
            "my-gitlab.com:k8s/devops/etcdhelper  unmounted  /mnt/etcdhelper",
        ]
    );
}
