// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use grfs::mountpoint::DaemonLauncher;
use grfs::{Provider, ProviderHandle};

use crate::flags;

/// Mount a repository onto a local directory
///
/// Without any url, every known mountpoint is mounted again, which is
/// useful after a reboot.
#[derive(Debug, Args)]
pub struct CmdMount {
    /// The repository to mount, as a web url or '[git@]<domain>:<owner>/<name>[@ref]'
    #[clap(value_name = "URL")]
    url: Option<String>,

    /// The directory to mount on, defaults to the existing mountpoint of the repository
    #[clap(value_name = "PATH")]
    path: Option<PathBuf>,
}

impl CmdMount {
    pub async fn run(&mut self, config: &grfs::Config) -> Result<i32> {
        let manager = flags::manager(config);
        let launcher = DaemonLauncher::current_exe()?.with_debug(config.filesystem.debug);

        let Some(url) = &self.url else {
            let mounted = manager
                .mount_all(&launcher, |repo| {
                    let provider = ProviderHandle::open(repo, config)?;
                    Ok(Box::new(provider) as Box<dyn Provider>)
                })
                .await
                .context("Failed to mount all repositories")?;
            for mount_point in mounted.iter() {
                println!(
                    "{} {} on {}",
                    "Mounted".green(),
                    mount_point.repo,
                    mount_point.path.display()
                );
            }
            tracing::debug!(count = mounted.len(), "mounted all repositories");
            return Ok(0);
        };

        let repo = flags::resolve_repository(url, config, &manager).await?;
        let mount_point = manager
            .mount(&repo, self.path.as_deref(), &launcher)
            .await
            .with_context(|| format!("Failed to mount {repo}"))?;
        println!(
            "{} {} on {}",
            "Mounted".green(),
            mount_point.repo,
            mount_point.path.display()
        );
        Ok(0)
    }
}
