// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Mountpoint management across the metadata store and the supervisor.

use std::path::Path;
use std::sync::Arc;

use crate::mountpoint::{
    Launcher,
    MountPoint,
    MountPointDisplay,
    Mounter,
    Supervisor,
    SystemMounter,
};
use crate::provider::Provider;
use crate::storage::{FsMountPointStorage, MountPointStorage};
use crate::{Config, Error, Repository, Result};

#[cfg(test)]
#[path = "./manager_test.rs"]
mod manager_test;

/// Keeps the stored mountpoint records in line with what is mounted.
pub struct Manager<S = FsMountPointStorage, M = SystemMounter> {
    config: Arc<Config>,
    storage: S,
    supervisor: Supervisor<M>,
}

impl Manager {
    pub fn from_config(config: Arc<Config>) -> Self {
        let storage = FsMountPointStorage::from_config(&config);
        let supervisor = Supervisor::from_config(&config);
        Self::new(config, storage, supervisor)
    }
}

impl<S, M> Manager<S, M>
where
    S: MountPointStorage,
    M: Mounter,
{
    pub fn new(config: Arc<Config>, storage: S, supervisor: Supervisor<M>) -> Self {
        Self {
            config,
            storage,
            supervisor,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn supervisor(&self) -> &Supervisor<M> {
        &self.supervisor
    }

    /// Verify that a repository is reachable, filling in its default branch.
    pub async fn resolve(&self, mut repo: Repository, provider: &dyn Provider) -> Result<Repository> {
        let default_branch = provider.check().await?;
        if repo.reference.is_empty() {
            if let Some(branch) = default_branch {
                tracing::debug!(%repo, %branch, "using default branch");
                repo.reference = branch;
            }
        }
        Ok(repo)
    }

    /// Mount a repository, creating its record when a path is given.
    ///
    /// Without a path, the repository must already have a record
    /// which is mounted again at its stored location.
    pub async fn mount(
        &self,
        repo: &Repository,
        path: Option<&Path>,
        launcher: &dyn Launcher,
    ) -> Result<MountPoint> {
        let Some(path) = path else {
            let mount_point = self.storage.get(repo).await?;
            self.supervisor.mount(&mount_point, launcher).await?;
            return Ok(mount_point);
        };
        let path = std::path::absolute(path)
            .map_err(|err| Error::MountPointIoError(path.to_owned(), err))?;

        match self.storage.get(repo).await {
            Ok(mount_point) if mount_point.path == path => {
                self.supervisor.mount(&mount_point, launcher).await?;
                Ok(mount_point)
            }
            Ok(mount_point) => Err(Error::MountPointConflict {
                repo: repo.to_string(),
                path: mount_point.path,
            }),
            Err(err) if err.is_not_found() => {
                if let Some(existing) = self
                    .storage
                    .list()
                    .await?
                    .into_iter()
                    .find(|mp| mp.path == path)
                {
                    return Err(Error::PathInUse {
                        path,
                        repo: existing.repo.to_string(),
                    });
                }
                let mount_point = MountPoint::new(repo.clone(), path, &self.config)?;
                self.supervisor.mount(&mount_point, launcher).await?;
                self.storage.put(&mount_point).await?;
                tracing::debug!(repo = %mount_point.repo, "stored new mountpoint");
                Ok(mount_point)
            }
            Err(err) => Err(err),
        }
    }

    /// Mount every stored record, stopping at the first failure.
    ///
    /// Each repository is opened with `open` and must still be reachable
    /// before its daemon is launched.
    pub async fn mount_all<F>(
        &self,
        launcher: &dyn Launcher,
        open: F,
    ) -> Result<Vec<MountPoint>>
    where
        F: Fn(&Repository) -> Result<Box<dyn Provider>>,
    {
        let mount_points = self.storage.list().await?;
        for mount_point in mount_points.iter() {
            let provider = open(&mount_point.repo)?;
            provider.check().await?;
            self.supervisor.mount(mount_point, launcher).await?;
        }
        Ok(mount_points)
    }

    /// Unmount a repository and forget its record.
    pub async fn unmount(&self, repo: &Repository) -> Result<MountPoint> {
        let mount_point = self.storage.get(repo).await?;
        self.unmount_record(&mount_point).await?;
        Ok(mount_point)
    }

    /// Unmount every stored record, stopping at the first failure.
    pub async fn unmount_all(&self) -> Result<Vec<MountPoint>> {
        let mount_points = self.storage.list().await?;
        for mount_point in mount_points.iter() {
            self.unmount_record(mount_point).await?;
        }
        Ok(mount_points)
    }

    async fn unmount_record(&self, mount_point: &MountPoint) -> Result<()> {
        self.supervisor.unmount(mount_point).await?;
        self.storage.remove(&mount_point.repo).await
    }

    /// The stored record for a repository along with its current status.
    pub async fn get(&self, repo: &Repository) -> Result<MountPointDisplay> {
        let mount_point = self.storage.get(repo).await?;
        Ok(self.supervisor.display(mount_point))
    }

    /// All stored records along with their current status.
    pub async fn list(&self) -> Result<Vec<MountPointDisplay>> {
        let mount_points = self.storage.list().await?;
        Ok(mount_points
            .into_iter()
            .map(|mp| self.supervisor.display(mp))
            .collect())
    }

    /// The most recently created record, if there is one.
    pub async fn latest(&self) -> Result<Option<MountPoint>> {
        let mount_points = self.storage.list().await?;
        Ok(mount_points.into_iter().max_by_key(|mp| mp.create_time))
    }
}
