// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::flags;

#[cfg(test)]
#[path = "./cmd_logs_test.rs"]
mod cmd_logs_test;

const FOLLOW_INTERVAL: Duration = Duration::from_millis(200);

/// Show the output of a filesystem daemon
///
/// Without any url, the logs of the most recently created mountpoint
/// are shown.
#[derive(Debug, Args)]
pub struct CmdLogs {
    /// The repository whose logs to show
    #[clap(value_name = "URL")]
    url: Option<String>,

    /// Print the entire log file
    #[clap(long, short)]
    all: bool,

    /// Keep printing new output as it is written
    #[clap(long, short)]
    follow: bool,

    /// The number of lines to print from the end of the log
    #[clap(long, short, default_value_t = 10)]
    num: usize,
}

impl CmdLogs {
    pub async fn run(&mut self, config: &grfs::Config) -> Result<i32> {
        let manager = flags::manager(config);
        let mount_point = match &self.url {
            None => manager
                .latest()
                .await?
                .ok_or_else(|| anyhow!("No mountpoint, no log to display"))?,
            Some(url) => {
                let repo = flags::resolve_repository(url, config, &manager).await?;
                manager
                    .get(&repo)
                    .await
                    .with_context(|| format!("Failed to get mountpoint of {repo}"))?
                    .mount_point
            }
        };
        tracing::debug!(path = %mount_point.log_path.display(), "reading log file");

        let mut stdout = tokio::io::stdout();
        if self.all {
            let mut file = tokio::fs::File::open(&mount_point.log_path)
                .await
                .with_context(|| format!("Failed to open {}", mount_point.log_path.display()))?;
            tokio::io::copy(&mut file, &mut stdout)
                .await
                .context("Failed to read log file")?;
            stdout.flush().await?;
            return Ok(0);
        }

        let offset = write_tail(&mount_point.log_path, self.num, &mut stdout).await?;
        if self.follow {
            follow(&mount_point.log_path, offset, &mut stdout).await?;
        }
        Ok(0)
    }
}

/// The portion of `data` holding its last `num` lines.
fn tail(data: &[u8], num: usize) -> &[u8] {
    if num == 0 {
        return &data[data.len()..];
    }
    let body = data.strip_suffix(b"\n").unwrap_or(data);
    let start = body
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, b)| **b == b'\n')
        .nth(num - 1)
        .map(|(i, _)| i + 1)
        .unwrap_or_default();
    &data[start..]
}

/// Write the last `num` lines of a file, returning the size read.
async fn write_tail<W>(path: &Path, num: usize, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    out.write_all(tail(&data, num)).await?;
    out.flush().await?;
    Ok(data.len() as u64)
}

/// Write everything appended to a file after `offset`, until an error occurs.
async fn follow<W>(path: &Path, offset: u64, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = file
            .read_to_end(&mut buf)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if read == 0 {
            tokio::time::sleep(FOLLOW_INTERVAL).await;
            continue;
        }
        out.write_all(&buf).await?;
        out.flush().await?;
    }
}
