// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use fuser::consts::*;
use fuser::{MountOption, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen, ReplyXattr, Request};
use grfs::OsError;

use crate::node::{Node, ROOT_INODE};

#[cfg(test)]
#[path = "./fuse_test.rs"]
mod fuse_test;

/// Options to configure the FUSE filesystem and
/// its behavior at runtime
#[derive(Debug, Clone)]
pub struct Config {
    /// How long the kernel may cache entries and attributes
    pub ttl: Duration,
    /// Mount options to be used when setting up
    pub mount_options: HashSet<MountOption>,
}

impl Config {
    /// The options used for every grfs mount.
    pub fn new(ttl: Duration, allow_other: bool) -> Self {
        let mut mount_options: HashSet<_> = [
            MountOption::RO,
            MountOption::FSName(String::from("grfs")),
            MountOption::Subtype(String::from("grfs")),
        ]
        .into_iter()
        .collect();
        if allow_other {
            mount_options.insert(MountOption::AllowOther);
        }
        Self { ttl, mount_options }
    }

    /// The mount options as a list for [`fuser::Session::new`].
    pub fn mount_options(&self) -> Vec<MountOption> {
        self.mount_options.iter().cloned().collect()
    }
}

/// Handles the tracking of inodes and open handles, and async
/// responses to all FUSE requests
struct Filesystem {
    ttl: Duration,
    next_handle: AtomicU64,
    inodes: DashMap<u64, Arc<Node>>,
    handles: DashMap<u64, Handle>,
}

impl Filesystem {
    fn new(root: Arc<Node>, opts: &Config) -> Self {
        let inodes = DashMap::new();
        inodes.insert(ROOT_INODE, root);
        Self {
            ttl: opts.ttl,
            // we do not allocate handle 0, so skip it for now
            next_handle: AtomicU64::new(1),
            inodes,
            handles: Default::default(),
        }
    }

    fn node(&self, ino: u64) -> Option<Arc<Node>> {
        self.inodes.get(&ino).map(|kv| Arc::clone(kv.value()))
    }

    fn allocate_handle(&self, data: Handle) -> u64 {
        loop {
            let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
            if id == 0 {
                // the 'empty/zero' handle value is never allocated
                continue;
            }
            match self.handles.entry(id) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(data);
                    break id;
                }
            }
        }
    }
}

/// Extract the ok value from a result, or reply with an error in FUSE
macro_rules! unwrap {
    ($reply:ident, $op:expr) => {{
        match $op {
            Ok(r) => r,
            Err(err) => err!($reply, err),
        }
    }};
}

/// Reply with an error to FUSE and return
macro_rules! err {
    ($reply:ident, $err:expr) => {{
        let err = $err;
        let errno = err.os_error().unwrap_or(libc::EIO);
        if errno == libc::ENOENT || errno == libc::ENODATA {
            tracing::trace!("{err}");
        } else {
            tracing::error!("{err:?}");
        }
        $reply.error(errno);
        return;
    }};
}

// these functions mirror the actual fuse ones and
// so we don't have much control over the shape
#[allow(clippy::too_many_arguments)]
impl Filesystem {
    async fn statfs(&self, ino: u64, reply: fuser::ReplyStatfs) {
        let Some(node) = self.node(ino).or_else(|| self.node(ROOT_INODE)) else {
            reply.error(libc::ENOENT);
            return;
        };
        let stats = node.statfs();
        reply.statfs(
            stats.blocks,
            0,
            0,
            stats.files,
            0,
            stats.block_size,
            stats.name_len,
            stats.fragment_size,
        )
    }

    async fn lookup(&self, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };

        let Some(parent) = self.node(parent) else {
            reply.error(libc::ENOENT);
            return;
        };

        tracing::trace!("lookup {name} in {}", parent.ino());
        let node = unwrap!(reply, parent.lookup(name).await);
        let attr = node.attr();
        self.inodes.entry(node.ino()).or_insert(node);
        reply.entry(&self.ttl, &attr, 0);
    }

    async fn forget(&self, _ino: u64, _nlookup: u64) {
        // nothing to do, nodes are kept by their parent directory
        // for the lifetime of the filesystem anyway
    }

    async fn getattr(&self, ino: u64, reply: fuser::ReplyAttr) {
        let Some(node) = self.node(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        reply.attr(&self.ttl, &node.attr());
    }

    async fn readlink(&self, ino: u64, reply: ReplyData) {
        let Some(node) = self.node(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let target = unwrap!(reply, node.readlink());
        reply.data(target);
    }

    async fn open(&self, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(node) = self.node(ino) else {
            tracing::debug!("open {ino} = ENOENT");
            reply.error(libc::ENOENT);
            return;
        };

        unwrap!(reply, node.open(flags).await);
        let fh = self.allocate_handle(Handle::File { node });
        tracing::trace!("open {ino} = {fh}");
        reply.opened(fh, FOPEN_KEEP_CACHE);
    }

    async fn read(
        &self,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(node) = self.handles.get(&fh).map(|h| h.value().node_owned()) else {
            tracing::debug!("read {fh} = EBADF");
            reply.error(libc::EBADF);
            return;
        };

        let data = unwrap!(reply, node.read(offset, size).await);
        tracing::trace!("read {fh} = {}/{size}", data.len());
        reply.data(&data);
    }

    async fn release(
        &self,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        // ignore flush because we don't support write operations
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        let Some((_, _handle)) = self.handles.remove(&fh) else {
            reply.error(libc::EBADF);
            return;
        };

        reply.ok();
    }

    async fn opendir(&self, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(node) = self.node(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        if !node.is_dir() {
            reply.error(libc::ENOTDIR);
            return;
        }

        let fh = self.allocate_handle(Handle::Dir { node });
        tracing::trace!("opendir {ino} = {fh}");
        reply.opened(fh, FOPEN_CACHE_DIR);
    }

    async fn readdir(&self, _ino: u64, fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(node) = self.handles.get(&fh).map(|h| h.value().node_owned()) else {
            reply.error(libc::EBADF);
            return;
        };

        let children = unwrap!(reply, node.readdir().await);
        let skip = resume_index(children.iter().map(|c| c.ino()), offset);
        for child in &children[skip..] {
            let ino = child.ino();
            let buffer_full = reply.add(ino, ino as i64, child.kind(), child.name());
            if buffer_full {
                break;
            }
        }
        reply.ok();
    }

    async fn releasedir(&self, _ino: u64, fh: u64, _flags: i32, reply: fuser::ReplyEmpty) {
        let Some((_, _handle)) = self.handles.remove(&fh) else {
            reply.error(libc::EBADF);
            return;
        };
        reply.ok()
    }

    async fn getxattr(&self, ino: u64, name: &OsStr, _size: u32, reply: ReplyXattr) {
        let Some(node) = self.node(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let value = unwrap!(reply, node.getxattr(&name.to_string_lossy()));
        reply.data(&value);
    }

    async fn listxattr(&self, ino: u64, size: u32, reply: ReplyXattr) {
        let Some(node) = self.node(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let names = node.listxattr();
        if size == 0 {
            reply.size(names.len() as u32);
        } else {
            reply.data(&names);
        }
    }
}

/// Represents a connected FUSE session.
///
/// This implements the [`fuser::Filesystem`] trait, receives
/// all requests and arranges for their async execution in the
/// grfs virtual filesystem.
pub struct Session {
    inner: Arc<Filesystem>,
}

impl Session {
    /// Construct a new session which serves the repository
    /// rooted at the given node
    pub fn new(root: Arc<Node>, opts: Config) -> Self {
        Self {
            inner: Arc::new(Filesystem::new(root, &opts)),
        }
    }
}

impl fuser::Filesystem for Session {
    fn init(
        &mut self,
        _req: &Request<'_>,
        config: &mut fuser::KernelConfig,
    ) -> std::result::Result<(), libc::c_int> {
        let desired = [
            ("FUSE_ASYNC_READ", FUSE_ASYNC_READ),
            ("FUSE_PARALLEL_DIROPS", FUSE_PARALLEL_DIROPS),
            ("FUSE_CACHE_SYMLINKS", FUSE_CACHE_SYMLINKS),
        ];
        let all_desired = desired.iter().fold(0, |prev, (_, i)| prev | i);
        if let Err(unsupported) = config.add_capabilities(all_desired) {
            let rejected = desired
                .iter()
                .filter_map(|d| (d.1 & unsupported != 0).then_some(d.0));
            for name in rejected {
                tracing::warn!("FUSE feature rejected: {name}");
            }
            if config.add_capabilities(all_desired & !unsupported).is_err() {
                tracing::warn!("FUSE capabilities could not be negotiated, using defaults");
            }
        }
        tracing::info!("Filesystem initialized");
        Ok(())
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: fuser::ReplyStatfs) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.statfs(ino, reply).await });
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = name.to_owned();
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.lookup(parent, &name, reply).await });
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.forget(ino, nlookup).await });
    }

    fn getattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.getattr(ino, reply).await });
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.readlink(ino, reply).await });
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.open(ino, flags, reply).await });
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        flags: i32,
        lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move {
            fs.read(ino, fh, offset, size, flags, lock_owner, reply)
                .await
        });
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        flags: i32,
        lock_owner: Option<u64>,
        flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move {
            fs.release(ino, fh, flags, lock_owner, flush, reply).await
        });
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.opendir(ino, flags, reply).await });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        reply: ReplyDirectory,
    ) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.readdir(ino, fh, offset, reply).await });
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        flags: i32,
        reply: fuser::ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.releasedir(ino, fh, flags, reply).await });
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: ReplyXattr,
    ) {
        let name = name.to_owned();
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.getxattr(ino, &name, size, reply).await });
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        let fs = Arc::clone(&self.inner);
        tokio::task::spawn(async move { fs.listxattr(ino, size, reply).await });
    }
}

enum Handle {
    File { node: Arc<Node> },
    Dir { node: Arc<Node> },
}

impl Handle {
    fn node_owned(&self) -> Arc<Node> {
        match self {
            Self::File { node } | Self::Dir { node } => Arc::clone(node),
        }
    }
}

/// The position in a directory listing to continue from.
///
/// Inode numbers are used as dir offsets, so a non-zero offset names the
/// last entry the kernel received. An offset that names no entry ends
/// the listing.
fn resume_index(inos: impl IntoIterator<Item = u64>, offset: i64) -> usize {
    if offset == 0 {
        return 0;
    }
    let mut count = 0;
    for ino in inos {
        count += 1;
        if ino == offset as u64 {
            break;
        }
    }
    count
}
