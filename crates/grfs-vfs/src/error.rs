// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use grfs::OsError;
use miette::Diagnostic;
use thiserror::Error;

/// A result whose error is a filesystem [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors specific to filesystem operations.
#[derive(Diagnostic, Debug, Error)]
pub enum Error {
    /// The provider failed to serve a request for the given path.
    #[error("Failed to fetch {path:?} from the remote repository")]
    Provider {
        /// The repository path being accessed
        path: String,
        /// The underlying provider error
        #[source]
        source: grfs::Error,
    },

    /// A directory has no child with the requested name.
    #[error("No such entry {name:?} in {parent:?}")]
    NotFound {
        /// The path of the directory that was searched
        parent: String,
        /// The name that was not found
        name: String,
    },

    /// A directory operation was attempted on something else.
    #[error("Not a directory: {0:?}")]
    NotADirectory(String),

    /// A file operation was attempted on a directory.
    #[error("Is a directory: {0:?}")]
    IsADirectory(String),

    /// A link target was requested from something else.
    #[error("Not a symlink: {0:?}")]
    NotASymlink(String),

    /// Extended attributes are never stored.
    #[error("No such attribute: {0}")]
    NoAttribute(String),
}

impl OsError for Error {
    fn os_error(&self) -> Option<i32> {
        match self {
            // remote failures are never passed through as-is, the
            // kernel only ever sees a generic io error for them
            Self::Provider { .. } => Some(libc::EIO),
            Self::NotFound { .. } => Some(libc::ENOENT),
            Self::NotADirectory(_) => Some(libc::ENOTDIR),
            Self::IsADirectory(_) => Some(libc::EISDIR),
            Self::NotASymlink(_) => Some(libc::EINVAL),
            Self::NoAttribute(_) => Some(libc::ENODATA),
        }
    }
}
