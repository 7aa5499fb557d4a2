// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use grfs::{Manager, ProviderHandle, Repository};

/// Open the mountpoint manager for the given config.
pub fn manager(config: &grfs::Config) -> Manager {
    Manager::from_config(Arc::new(config.clone()))
}

/// Parse a repository url and make sure that it can be reached.
///
/// An empty ref is replaced with the default branch of the
/// repository, which is how mountpoints are identified once stored.
pub async fn resolve_repository(
    url: &str,
    config: &grfs::Config,
    manager: &Manager,
) -> Result<Repository> {
    let repo = Repository::from_str(url)?;
    let provider = ProviderHandle::open(&repo, config)
        .with_context(|| format!("Failed to open provider for {repo}"))?;
    manager
        .resolve(repo.clone(), &provider)
        .await
        .with_context(|| format!("Failed to check repository {repo}"))
}
