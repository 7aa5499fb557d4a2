// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Mount remote source repositories as read-only filesystems.

#![deny(unsafe_op_in_unsafe_fn)]

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub mod fixtures;

pub mod config;
mod entry;
mod error;
pub mod manager;
pub mod mountpoint;
pub mod provider;
mod repository;
pub mod storage;

// re-exported to make downstream implementations easier
pub use async_trait::async_trait;
pub use entry::{Entry, EntryKind};
pub use error::{Error, OsError, Result};
pub use manager::Manager;
pub use mountpoint::{MountPoint, MountPointDisplay, MountPointStatus};
pub use provider::{Provider, ProviderHandle};
pub use repository::Repository;
pub use storage::{FsMountPointStorage, MountPointStorage};

pub use self::config::{Config, get_config, load_config};
