// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::mountpoint::MountPointStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://github.com/fioncat/grfs#{}",
        self.code().unwrap_or_else(|| Box::new("grfs::generic"))
    )
)]
pub enum Error {
    #[error("Invalid repository {input:?}: {reason}")]
    #[diagnostic(
        code("grfs::invalid_repository"),
        help("Use a web url or the form '[git@]<domain>:<owner>/<name>[@ref]'")
    )]
    InvalidRepository { input: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Cannot load config, lock has been poisoned: {0}")]
    LockPoisonedRead(String),
    #[error("Cannot update config, lock has been poisoned: {0}")]
    LockPoisonedWrite(String),

    #[error("Request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Request to {url} returned {status}: {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
    #[error("Failed to decode response from {url}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Mountpoint {0} is not empty")]
    #[diagnostic(
        code("grfs::mountpoint_not_empty"),
        help("Only an empty directory can be used as a mountpoint")
    )]
    MountPointNotEmpty(PathBuf),
    #[error(
        "Timed out waiting for {path} to be mounted (status: {status}), please check log file {log}"
    )]
    MountPointTimeout {
        path: PathBuf,
        status: MountPointStatus,
        log: PathBuf,
    },
    #[error("{repo} is already mounted to {path}")]
    #[diagnostic(help("Unmount it first, or mount it again without a path"))]
    MountPointConflict { repo: String, path: PathBuf },
    #[error("Path {path} is already used by {repo}")]
    PathInUse { path: PathBuf, repo: String },
    #[error("Failed to unmount {path}: {message}")]
    UnmountFailed { path: PathBuf, message: String },
    #[error("Failed to launch filesystem daemon for {repo}")]
    LaunchFailed {
        repo: String,
        #[source]
        source: io::Error,
    },
    #[error("Filesystem daemon for {path} exited early ({status}), please check log file {log}")]
    DaemonExited {
        path: PathBuf,
        status: std::process::ExitStatus,
        log: PathBuf,
    },
    #[error("Mountpoint I/O error: {0}")]
    MountPointIoError(PathBuf, #[source] io::Error),

    #[error("Mountpoint not found: {0}")]
    #[diagnostic(code("grfs::mountpoint_not_found"))]
    MountPointNotFound(String),
    #[error("Mountpoint record is corrupt: {0}")]
    CorruptRecord(PathBuf, #[source] serde_json::Error),
    #[error("Storage read error: {0}")]
    StorageReadError(PathBuf, #[source] io::Error),
    #[error("Storage write error: {0}")]
    StorageWriteError(PathBuf, #[source] io::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// True if this error represents a missing mountpoint record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::MountPointNotFound(_))
    }
}

/// An error that can be reported to the operating system as an errno.
pub trait OsError {
    /// The underlying os error number, if any.
    fn os_error(&self) -> Option<i32>;
}

impl OsError for io::Error {
    fn os_error(&self) -> Option<i32> {
        self.raw_os_error()
    }
}

impl OsError for Error {
    fn os_error(&self) -> Option<i32> {
        match self {
            Error::HttpStatus { status: 404, .. } => Some(libc::ENOENT),
            Error::HttpStatus { status: 401 | 403, .. } => Some(libc::EACCES),
            Error::MountPointNotFound(_) => Some(libc::ENOENT),
            Error::MountPointIoError(_, err) => err.os_error(),
            Error::StorageReadError(_, err) => err.os_error(),
            Error::StorageWriteError(_, err) => err.os_error(),
            _ => None,
        }
    }
}
