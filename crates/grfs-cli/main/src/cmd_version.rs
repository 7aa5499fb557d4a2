// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use anyhow::Result;
use clap::Args;

/// Print the grfs version information
#[derive(Debug, Args)]
pub struct CmdVersion {}

impl CmdVersion {
    pub fn run(&self, config: &grfs::Config) -> Result<i32> {
        println!("grfs {}", grfs::VERSION);
        match grfs::config::user_config_path() {
            Some(path) => println!("config: {}", path.display()),
            None => println!("config: <none>"),
        }
        println!("storage: {}", config.storage.root.display());
        Ok(0)
    }
}
