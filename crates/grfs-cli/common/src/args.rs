// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use anyhow::Error;
use tracing_subscriber::prelude::*;

const GRFS_LOG: &str = "GRFS_LOG";

/// Trait all grfs cli command parsers must implement to describe
/// how logging should be configured for the parsed command.
pub trait LogOptions {
    /// The requested verbosity, zero being the default.
    fn verbosity(&self) -> usize;

    /// Whether log lines should include a timestamp.
    ///
    /// This is generally only useful for long running processes
    /// whose output ends up in a file.
    fn log_timestamps(&self) -> bool {
        false
    }
}

pub fn configure_logging(verbosity: usize, timestamps: bool) {
    let mut config = match verbosity {
        0 => {
            if let Ok(existing) = std::env::var(GRFS_LOG) {
                existing
            } else {
                "grfs=info,warn".to_string()
            }
        }
        1 => "grfs=debug,info".to_string(),
        2 => "grfs=trace,info".to_string(),
        3 => "grfs=trace,debug".to_string(),
        _ => "trace".to_string(),
    };
    if let Ok(overrides) = std::env::var("RUST_LOG") {
        config.push(',');
        config.push_str(&overrides);
    }
    let env_filter = tracing_subscriber::filter::EnvFilter::new(config);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(verbosity > 2)
        .with_writer(std::io::stderr);
    let result = if timestamps {
        let sub = tracing_subscriber::registry().with(fmt_layer.with_filter(env_filter));
        tracing::subscriber::set_global_default(sub)
    } else {
        let sub = tracing_subscriber::registry()
            .with(fmt_layer.without_time().with_filter(env_filter));
        tracing::subscriber::set_global_default(sub)
    };
    if let Err(err) = result {
        eprintln!("failed to configure logging: {err}");
    }
}

/// Find any additional help that can be shown for an error.
pub fn help_for(err: &Error) -> Option<String> {
    err.chain()
        .filter_map(|e| e.downcast_ref::<grfs::Error>())
        .find_map(|e| miette::Diagnostic::help(e).map(|h| h.to_string()))
}

#[macro_export]
macro_rules! main {
    ($cmd:ident) => {
        fn main() {
            // because this function exits right away it does not
            // properly handle destruction of data, so we put the actual
            // logic into a separate function/scope
            std::process::exit(main2())
        }
        fn main2() -> i32 {
            let mut opt = $cmd::parse();
            let config = $crate::configure!(opt);
            let rt = match $crate::__private::tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Err(err) => {
                    $crate::__private::tracing::error!("Failed to establish runtime: {:?}", err);
                    return 1;
                }
                Ok(rt) => rt,
            };
            let result = rt.block_on(opt.run(&config));
            // we generally expect at this point that the command is complete
            // and nothing else should be executing, but it's possible that
            // we've launched long running tasks that are waiting for signals or
            // events which will never come and so we don't want to block forever
            // when the runtime is dropped.
            rt.shutdown_timeout(std::time::Duration::from_millis(250));

            $crate::handle_result!(result)
        }
    };
}

#[macro_export]
macro_rules! configure {
    ($opt:ident) => {{
        $crate::configure_logging(
            $crate::LogOptions::verbosity(&$opt),
            $crate::LogOptions::log_timestamps(&$opt),
        );

        match $crate::__private::grfs::get_config() {
            Err(err) => {
                $crate::__private::tracing::error!(err = ?err, "failed to load config");
                return 1;
            }
            Ok(config) => config,
        }
    }};
}

#[macro_export]
macro_rules! handle_result {
    ($result:ident) => {{
        match $result {
            Err(err) => {
                $crate::__private::tracing::error!("{err:#}");
                if let Some(help) = $crate::help_for(&err) {
                    $crate::__private::tracing::info!("help: {help}");
                }
                1
            }
            Ok(code) => code,
        }
    }};
}
