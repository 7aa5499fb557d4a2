// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Durable storage of mountpoint records.

use std::io::Write;
use std::path::{Path, PathBuf};

use data_encoding::BASE32_NOPAD;

use crate::mountpoint::MountPoint;
use crate::{Config, Error, Repository, Result};

#[cfg(test)]
#[path = "./storage_test.rs"]
mod storage_test;

/// A place where mountpoint records are kept, keyed by repository.
#[async_trait::async_trait]
pub trait MountPointStorage: Send + Sync {
    /// Insert or replace the record for the mountpoint's repository.
    async fn put(&self, mount_point: &MountPoint) -> Result<()>;

    /// Load the record for a repository.
    ///
    /// # Errors
    /// [`Error::MountPointNotFound`] when no record exists.
    async fn get(&self, repo: &Repository) -> Result<MountPoint>;

    /// All stored records, ordered by repository.
    async fn list(&self) -> Result<Vec<MountPoint>>;

    /// Delete the record for a repository, if any.
    async fn remove(&self, repo: &Repository) -> Result<()>;
}

/// Keeps one json document per mountpoint in a local directory.
#[derive(Debug, Clone)]
pub struct FsMountPointStorage {
    root: PathBuf,
}

impl FsMountPointStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.storage.mountpoints_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, repo: &Repository) -> PathBuf {
        self.root
            .join(BASE32_NOPAD.encode(repo.to_string().as_bytes()))
    }

    async fn read_record(path: &Path) -> Result<MountPoint> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| Error::StorageReadError(path.to_owned(), err))?;
        serde_json::from_slice(&data).map_err(|err| Error::CorruptRecord(path.to_owned(), err))
    }
}

#[async_trait::async_trait]
impl MountPointStorage for FsMountPointStorage {
    async fn put(&self, mount_point: &MountPoint) -> Result<()> {
        let path = self.record_path(&mount_point.repo);
        let data = serde_json::to_vec_pretty(mount_point)
            .map_err(|err| Error::CorruptRecord(path.clone(), err))?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&root)
                .map_err(|err| Error::StorageWriteError(root.clone(), err))?;
            let mut tmp = tempfile::NamedTempFile::new_in(&root)
                .map_err(|err| Error::StorageWriteError(root.clone(), err))?;
            tmp.write_all(&data)
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(|err| Error::StorageWriteError(tmp.path().to_owned(), err))?;
            tmp.persist(&path)
                .map_err(|err| Error::StorageWriteError(path.clone(), err.error))?;
            Ok(())
        })
        .await
        .map_err(|err| Error::StorageWriteError(self.root.clone(), std::io::Error::other(err)))??;
        tracing::debug!(repo = %mount_point.repo, "stored mountpoint record");
        Ok(())
    }

    async fn get(&self, repo: &Repository) -> Result<MountPoint> {
        let path = self.record_path(repo);
        match Self::read_record(&path).await {
            Err(Error::StorageReadError(_, err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::MountPointNotFound(repo.to_string()))
            }
            res => res,
        }
    }

    async fn list(&self) -> Result<Vec<MountPoint>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::StorageReadError(self.root.clone(), err)),
        };
        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| Error::StorageReadError(self.root.clone(), err))?
        {
            let path = entry.path();
            let name = entry.file_name();
            // skip leftovers of interrupted writes and anything foreign
            let Some(name) = name.to_str() else { continue };
            if BASE32_NOPAD.decode(name.as_bytes()).is_err() {
                continue;
            }
            records.push(Self::read_record(&path).await?);
        }
        records.sort_by_cached_key(|mp| mp.repo.to_string());
        Ok(records)
    }

    async fn remove(&self, repo: &Repository) -> Result<()> {
        let path = self.record_path(repo);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(%repo, "removed mountpoint record");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::StorageWriteError(path, err)),
        }
    }
}
