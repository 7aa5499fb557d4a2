// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Lazily loaded tree of repository entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime};

use bytes::Bytes;
use fuser::{FileAttr, FileType};
use grfs::{Entry, Provider};
use tokio::sync::OnceCell;

use crate::attr::{self, BLOCK_SIZE, Ownership};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./node_test.rs"]
mod node_test;

/// The inode of the repository root, as required by fuse.
pub const ROOT_INODE: u64 = 1;

/// State shared by every node of one mounted repository.
struct Tree {
    provider: Arc<dyn Provider>,
    ownership: Ownership,
    next_inode: AtomicU64,
}

impl Tree {
    fn allocate_inode(&self) -> u64 {
        self.next_inode.fetch_add(1, Ordering::Relaxed)
    }
}

/// One item of a directory listing.
///
/// The inode is assigned when the listing is first loaded and the
/// node itself is only created once it is looked up.
pub struct Child {
    ino: u64,
    entry: Entry,
    node: OnceLock<Arc<Node>>,
}

impl Child {
    /// The inode assigned to this child.
    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// The name of this child within its directory.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// The fuse file type of this child.
    pub fn kind(&self) -> FileType {
        attr::file_type(&self.entry)
    }

    /// The entry as reported by the provider.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }
}

/// Filesystem totals, which are not known for remote repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct FsStats {
    pub blocks: u64,
    pub files: u64,
    pub block_size: u32,
    pub name_len: u32,
    pub fragment_size: u32,
}

impl Default for FsStats {
    fn default() -> Self {
        Self {
            blocks: 0,
            files: 0,
            block_size: BLOCK_SIZE,
            name_len: u32::MAX,
            fragment_size: BLOCK_SIZE,
        }
    }
}

/// A file, directory or symlink in a mounted repository.
///
/// Directory listings and file contents are loaded from the
/// provider on first access and kept for the lifetime of the node.
pub struct Node {
    tree: Arc<Tree>,
    ino: u64,
    entry: Entry,
    created: SystemTime,
    children: OnceCell<Vec<Child>>,
    content: OnceCell<Bytes>,
}

impl Node {
    /// Create the root directory node of a repository.
    pub fn root(provider: Arc<dyn Provider>, ownership: Ownership) -> Arc<Self> {
        let tree = Arc::new(Tree {
            provider,
            ownership,
            next_inode: AtomicU64::new(ROOT_INODE + 1),
        });
        Arc::new(Self::new(tree, ROOT_INODE, Entry::root()))
    }

    fn new(tree: Arc<Tree>, ino: u64, entry: Entry) -> Self {
        Self {
            tree,
            ino,
            entry,
            created: SystemTime::now(),
            children: OnceCell::new(),
            content: OnceCell::new(),
        }
    }

    /// The inode of this node.
    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// The entry as reported by the provider.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// True if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.entry.is_dir()
    }

    /// The synthesized attributes of this node.
    pub fn attr(&self) -> FileAttr {
        attr::file_attr(&self.entry, self.ino, self.created, &self.tree.ownership)
    }

    /// The sorted listing of this directory.
    pub async fn readdir(&self) -> Result<&[Child]> {
        if !self.is_dir() {
            return Err(Error::NotADirectory(self.entry.path.clone()));
        }
        let children = self
            .children
            .get_or_try_init(|| async {
                let start = Instant::now();
                let mut entries = self
                    .tree
                    .provider
                    .read_dir(&self.entry.path)
                    .await
                    .map_err(|source| self.provider_error(source))?;
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                tracing::debug!(
                    path = %self.entry.path,
                    count = entries.len(),
                    "listed directory in {:?}",
                    start.elapsed()
                );
                let children = entries
                    .into_iter()
                    .map(|entry| Child {
                        ino: self.tree.allocate_inode(),
                        entry,
                        node: OnceLock::new(),
                    })
                    .collect::<Vec<_>>();
                Ok::<_, Error>(children)
            })
            .await?;
        Ok(children.as_slice())
    }

    /// Find a direct child of this directory by name.
    pub async fn lookup(&self, name: &str) -> Result<Arc<Node>> {
        let children = self.readdir().await?;
        let Ok(index) = children.binary_search_by(|c| c.name().cmp(name)) else {
            return Err(Error::NotFound {
                parent: self.entry.path.clone(),
                name: name.to_string(),
            });
        };
        let child = &children[index];
        let node = child.node.get_or_init(|| {
            Arc::new(Node::new(
                Arc::clone(&self.tree),
                child.ino,
                child.entry.clone(),
            ))
        });
        Ok(Arc::clone(node))
    }

    /// Prepare this file for reading, loading its content if needed.
    ///
    /// The filesystem is mounted read-only, so the open flags are
    /// only logged.
    pub async fn open(&self, flags: i32) -> Result<()> {
        tracing::trace!(path = %self.entry.path, flags, "open");
        self.content().await.map(|_| ())
    }

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Reading beyond the end of the file returns no data.
    pub async fn read(&self, offset: i64, size: u32) -> Result<Bytes> {
        let content = self.content().await?;
        let len = content.len();
        let start = usize::try_from(offset).unwrap_or_default().min(len);
        let end = start.saturating_add(size as usize).min(len);
        Ok(content.slice(start..end))
    }

    async fn content(&self) -> Result<&Bytes> {
        if self.is_dir() {
            return Err(Error::IsADirectory(self.entry.path.clone()));
        }
        self.content
            .get_or_try_init(|| async {
                let start = Instant::now();
                let content = self
                    .tree
                    .provider
                    .read_file(&self.entry.path)
                    .await
                    .map_err(|source| self.provider_error(source))?;
                tracing::debug!(
                    path = %self.entry.path,
                    size = content.len(),
                    "fetched file in {:?}",
                    start.elapsed()
                );
                Ok::<_, Error>(content)
            })
            .await
    }

    /// The target of this symlink.
    pub fn readlink(&self) -> Result<&[u8]> {
        if !self.entry.is_symlink() {
            return Err(Error::NotASymlink(self.entry.path.clone()));
        }
        Ok(self.entry.link_name.as_bytes())
    }

    /// Extended attributes are not supported, so none can be found.
    pub fn getxattr(&self, name: &str) -> Result<Vec<u8>> {
        Err(Error::NoAttribute(name.to_string()))
    }

    /// The null-separated names of all extended attributes, always empty.
    pub fn listxattr(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Totals for the filesystem containing this node.
    pub fn statfs(&self) -> FsStats {
        FsStats::default()
    }

    fn provider_error(&self, source: grfs::Error) -> Error {
        tracing::error!(path = %self.entry.path, "provider request failed: {source}");
        Error::Provider {
            path: self.entry.path.clone(),
            source,
        }
    }
}
