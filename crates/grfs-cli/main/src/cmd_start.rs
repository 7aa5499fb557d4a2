// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use grfs::{ProviderHandle, Repository};
use grfs_vfs::{Config, Node, Ownership, Session};
use tokio::signal::unix::{SignalKind, signal};

const SESSION_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Serve a repository filesystem in the foreground
///
/// This is normally launched in the background by the mount command,
/// with all output going to the log file of the mountpoint.
#[derive(Debug, Args)]
pub struct CmdStart {
    /// The directory to mount the repository on
    #[clap(long, short)]
    path: PathBuf,

    /// The domain of the repository host
    #[clap(long, short)]
    domain: String,

    /// The owner of the repository, including any nested groups
    #[clap(long, short)]
    owner: String,

    /// The name of the repository
    #[clap(long, short)]
    name: String,

    /// The branch, tag or commit to serve, defaults to the default branch
    #[clap(long = "ref", short, default_value = "")]
    reference: String,

    /// Log debug messages, equivalent to -v
    #[clap(long)]
    pub debug: bool,
}

impl CmdStart {
    pub async fn run(&mut self, config: &grfs::Config) -> Result<i32> {
        let repo = Repository::new(&self.domain, &self.owner, &self.name)
            .with_reference(&self.reference);
        repo.validate()?;

        let provider = ProviderHandle::open(&repo, config)
            .with_context(|| format!("Failed to open provider for {repo}"))?;
        let root = Node::root(Arc::new(provider), Ownership::current());

        let opts = Config::new(
            config.filesystem.entry_timeout(),
            config.filesystem.allow_other,
        );
        tracing::debug!("FUSE Config: {opts:#?}");

        tracing::debug!("Establishing fuse session...");
        let mount_opts = opts.mount_options();
        let mut session = fuser::Session::new(Session::new(root, opts), &self.path, &mount_opts)
            .with_context(|| format!("Failed to mount {}", self.path.display()))?;
        let mut unmounter = session.unmount_callable();

        let mut interrupt = signal(SignalKind::interrupt()).context("interrupt signal handler")?;
        let mut quit = signal(SignalKind::quit()).context("quit signal handler")?;
        let mut terminate = signal(SignalKind::terminate()).context("terminate signal handler")?;

        tracing::info!(%repo, path = %self.path.display(), "Starting FUSE filesystem");
        // the session loop blocks its thread until the filesystem is
        // unmounted, so it gets a thread of its own from the runtime
        let mut fut = tokio::task::spawn_blocking(move || session.run());
        let received = tokio::select! {
            res = &mut fut => {
                tracing::info!("Filesystem was unmounted, shutting down");
                res.context("FUSE session panicked")?
                    .context("FUSE session failed")?;
                return Ok(0);
            }
            _ = terminate.recv() => "Terminate",
            _ = interrupt.recv() => "Interrupt",
            _ = quit.recv() => "Quit",
        };

        tracing::info!("{received} signal received, filesystem shutting down");
        if let Err(err) = unmounter.unmount() {
            tracing::warn!("Failed to unmount {}: {err}", self.path.display());
        }
        match tokio::time::timeout(SESSION_EXIT_TIMEOUT, fut).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => tracing::warn!("FUSE session failed: {err}"),
            Ok(Err(err)) => tracing::warn!("FUSE session panicked: {err}"),
            Err(_) => tracing::warn!("FUSE session did not stop in time"),
        }
        Ok(0)
    }
}
