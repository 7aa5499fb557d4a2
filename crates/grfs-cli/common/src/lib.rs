// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Common macros and argument structures for the grfs command line

mod args;

pub use args::{LogOptions, configure_logging, help_for};

#[doc(hidden)]
pub mod __private {
    pub use {grfs, tokio, tracing};
}
