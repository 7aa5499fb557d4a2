// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::flags;

/// Unmount a repository and forget its mountpoint
///
/// Without any url, every known mountpoint is unmounted.
#[derive(Debug, Args)]
pub struct CmdUnmount {
    /// The repository to unmount
    #[clap(value_name = "URL")]
    url: Option<String>,
}

impl CmdUnmount {
    pub async fn run(&mut self, config: &grfs::Config) -> Result<i32> {
        let manager = flags::manager(config);

        let unmounted = match &self.url {
            None => manager
                .unmount_all()
                .await
                .context("Failed to unmount all repositories")?,
            Some(url) => {
                let repo = flags::resolve_repository(url, config, &manager).await?;
                let mount_point = manager
                    .unmount(&repo)
                    .await
                    .with_context(|| format!("Failed to unmount {repo}"))?;
                vec![mount_point]
            }
        };
        for mount_point in unmounted.iter() {
            println!("{} {}", "Unmounted".yellow(), mount_point.repo);
        }
        Ok(0)
    }
}
