// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

/// The kind of item an [`Entry`] points to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    Dir,
    #[default]
    File,
    Symlink,
}

/// One item of a repository directory listing, as reported by a provider.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The full path of this item relative to the repository root
    pub path: String,
    /// The final component of `path`
    pub name: String,
    pub kind: EntryKind,
    /// The target of a symlink, empty for anything else
    pub link_name: String,
    pub size: u64,
    /// Where this item can be viewed in a browser
    pub web_url: String,
}

impl Entry {
    /// The root directory of a repository.
    pub fn root() -> Self {
        Self {
            kind: EntryKind::Dir,
            ..Default::default()
        }
    }

    pub fn dir<P: Into<String>>(path: P) -> Self {
        Self::new(path, EntryKind::Dir)
    }

    pub fn file<P: Into<String>>(path: P, size: u64) -> Self {
        let mut entry = Self::new(path, EntryKind::File);
        entry.size = size;
        entry
    }

    pub fn symlink<P: Into<String>, T: Into<String>>(path: P, target: T) -> Self {
        let mut entry = Self::new(path, EntryKind::Symlink);
        entry.link_name = target.into();
        entry
    }

    fn new<P: Into<String>>(path: P, kind: EntryKind) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            path,
            name,
            kind,
            ..Default::default()
        }
    }

    pub fn with_web_url<U: Into<String>>(mut self, url: U) -> Self {
        self.web_url = url.into();
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}
