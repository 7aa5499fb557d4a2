// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use grfs_cli_common as cli;

mod cmd_get;
mod cmd_logs;
mod cmd_mount;
mod cmd_start;
mod cmd_unmount;
mod cmd_version;
mod flags;

cli::main!(Opt);

/// Mount a remote GitHub or GitLab repository as a read-only filesystem
#[derive(Debug, Parser)]
#[clap(name = "grfs", about, version = grfs::VERSION)]
pub struct Opt {
    /// Make output more verbose, can be specified more than once
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub cmd: Command,
}

impl cli::LogOptions for Opt {
    fn verbosity(&self) -> usize {
        let debug = matches!(&self.cmd, Command::Start(cmd) if cmd.debug);
        self.verbose as usize + usize::from(debug)
    }

    fn log_timestamps(&self) -> bool {
        // the daemon's output only ever ends up in its log file
        matches!(self.cmd, Command::Start(_))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Start(cmd_start::CmdStart),
    Mount(cmd_mount::CmdMount),
    #[clap(visible_alias = "umount")]
    Unmount(cmd_unmount::CmdUnmount),
    Get(cmd_get::CmdGet),
    Logs(cmd_logs::CmdLogs),
    Version(cmd_version::CmdVersion),
}

impl Opt {
    async fn run(&mut self, config: &grfs::Config) -> Result<i32> {
        match &mut self.cmd {
            Command::Start(cmd) => cmd.run(config).await,
            Command::Mount(cmd) => cmd.run(config).await,
            Command::Unmount(cmd) => cmd.run(config).await,
            Command::Get(cmd) => cmd.run(config).await,
            Command::Logs(cmd) => cmd.run(config).await,
            Command::Version(cmd) => cmd.run(config),
        }
    }
}
