// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Virtual Filesystem Implementation for grfs
//!
//! Serves the content of a remote repository over FUSE, loading
//! directories and files from a [`grfs::Provider`] as they are
//! first accessed.

#![deny(missing_docs)]

pub mod attr;
mod error;
mod fuse;
pub mod node;

pub use attr::Ownership;
pub use error::{Error, Result};
pub use fuse::{Config, Session};
pub use node::{Node, ROOT_INODE};
