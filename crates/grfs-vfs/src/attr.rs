// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Attributes synthesized for repository entries.

use std::sync::OnceLock;
use std::time::SystemTime;

use fuser::{FileAttr, FileType};
use grfs::{Entry, EntryKind};

/// The block size reported for every file and for the filesystem itself.
pub const BLOCK_SIZE: u32 = 4096;

const SECTOR_SIZE: u64 = 512;
const DIR_MODE: u16 = 0o777;
const FILE_MODE: u16 = 0o644;

/// The owner reported for every file in the filesystem.
///
/// The invoking user is resolved on first use and then reused for
/// the rest of the session.
#[derive(Debug, Default)]
pub struct Ownership {
    ids: OnceLock<(u32, u32)>,
}

impl Ownership {
    /// Report the user that runs this process.
    pub fn current() -> Self {
        Self::default()
    }

    /// Report a specific user and group.
    pub fn fixed(uid: u32, gid: u32) -> Self {
        let ids = OnceLock::new();
        let _ = ids.set((uid, gid));
        Self { ids }
    }

    /// The uid and gid to report.
    pub fn ids(&self) -> (u32, u32) {
        *self.ids.get_or_init(resolve_current_user)
    }
}

fn resolve_current_user() -> (u32, u32) {
    let uid = nix::unistd::getuid();
    match nix::unistd::User::from_uid(uid) {
        Ok(Some(user)) => (user.uid.as_raw(), user.gid.as_raw()),
        Ok(None) => {
            tracing::warn!("no user found for uid {uid}, files will be owned by root");
            (0, 0)
        }
        Err(err) => {
            tracing::warn!("failed to resolve current user, files will be owned by root: {err}");
            (0, 0)
        }
    }
}

/// The fuse file type of an entry.
pub fn file_type(entry: &Entry) -> FileType {
    match entry.kind {
        EntryKind::Dir => FileType::Directory,
        EntryKind::Symlink => FileType::Symlink,
        EntryKind::File => FileType::RegularFile,
    }
}

/// Synthesize the attributes reported for an entry.
///
/// Remote repositories do not carry any of this information, so
/// all timestamps are the given time and permissions are fixed.
pub fn file_attr(entry: &Entry, ino: u64, time: SystemTime, ownership: &Ownership) -> FileAttr {
    let size = if entry.is_symlink() {
        entry.link_name.len() as u64
    } else {
        entry.size
    };
    let (uid, gid) = ownership.ids();
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(BLOCK_SIZE as u64) * (BLOCK_SIZE as u64 / SECTOR_SIZE),
        atime: time,
        mtime: time,
        ctime: time,
        crtime: time,
        kind: file_type(entry),
        perm: if entry.is_dir() { DIR_MODE } else { FILE_MODE },
        nlink: if entry.is_dir() { 2 } else { 1 },
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}
