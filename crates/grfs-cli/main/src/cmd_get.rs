// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use grfs::{MountPointDisplay, MountPointStatus};

use crate::flags;

#[cfg(test)]
#[path = "./cmd_get_test.rs"]
mod cmd_get_test;

const HEADERS: [&str; 3] = ["REPOSITORY", "STATUS", "PATH"];

/// Show mountpoints and whether they are currently mounted
#[derive(Debug, Args)]
pub struct CmdGet {
    /// Only show the mountpoint of this repository
    #[clap(value_name = "URL")]
    url: Option<String>,

    /// Print the mountpoints as json
    #[clap(long, short = 'J')]
    json: bool,
}

impl CmdGet {
    pub async fn run(&mut self, config: &grfs::Config) -> Result<i32> {
        let manager = flags::manager(config);
        let items = match &self.url {
            None => manager.list().await?,
            Some(url) => {
                let repo = flags::resolve_repository(url, config, &manager).await?;
                vec![
                    manager
                        .get(&repo)
                        .await
                        .with_context(|| format!("Failed to get mountpoint of {repo}"))?,
                ]
            }
        };

        if self.json {
            let data = serde_json::to_string_pretty(&items)
                .context("Failed to serialize mountpoints")?;
            println!("{data}");
            return Ok(0);
        }
        if items.is_empty() {
            println!("No mountpoint");
            return Ok(0);
        }
        print!("{}", format_table(&items));
        Ok(0)
    }
}

/// Render mountpoints as an aligned table with a header row.
fn format_table(items: &[MountPointDisplay]) -> String {
    let rows: Vec<(String, MountPointStatus, String)> = items
        .iter()
        .map(|item| {
            (
                item.mount_point.repo.to_string(),
                item.status,
                item.mount_point.path.display().to_string(),
            )
        })
        .collect();
    let repo_width = rows
        .iter()
        .map(|(repo, _, _)| repo.len())
        .chain([HEADERS[0].len()])
        .max()
        .unwrap_or_default();
    let status_width = rows
        .iter()
        .map(|(_, status, _)| status.to_string().len())
        .chain([HEADERS[1].len()])
        .max()
        .unwrap_or_default();

    let mut out = format!(
        "{:<repo_width$}  {:<status_width$}  {}\n",
        HEADERS[0], HEADERS[1], HEADERS[2]
    );
    for (repo, status, path) in rows {
        let padded = format!("{:<status_width$}", status.to_string());
        let status = match status {
            MountPointStatus::Mounted => padded.green(),
            MountPointStatus::Unmounted => padded.yellow(),
            MountPointStatus::Lost | MountPointStatus::Error => padded.red(),
        };
        out.push_str(&format!("{repo:<repo_width$}  {status}  {path}\n"));
    }
    out
}
