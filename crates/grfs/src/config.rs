// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

static CONFIG: OnceCell<RwLock<Arc<Config>>> = OnceCell::new();

/// Names a single configuration file to load instead of the user config.
pub const CONFIG_PATH_ENV: &str = "GRFS_CONFIG_PATH";
/// Overrides the root directory of all grfs data.
pub const BASE_PATH_ENV: &str = "GRFS_BASE_PATH";

const SYSTEM_CONFIG: &str = "/etc/grfs/config";
const USER_CONFIG: &str = "grfs/config";

const MIN_ENTRY_TIMEOUT_MS: u64 = 100;
const MAX_ENTRY_TIMEOUT_MS: u64 = 10 * 60 * 1000;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Storage {
    /// Root directory for mountpoint records and daemon logs
    pub root: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("grfs"),
        }
    }
}

impl Storage {
    /// The directory holding one record per mountpoint.
    pub fn mountpoints_root(&self) -> PathBuf {
        self.root.join("mountpoints")
    }

    /// The directory holding one log file per mountpoint.
    pub fn logs_root(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Filesystem {
    /// Let users other than the mount owner access the filesystem
    ///
    /// This requires `user_allow_other` to be enabled in /etc/fuse.conf
    pub allow_other: bool,

    /// How long the kernel may cache entries and attributes, in milliseconds
    pub entry_timeout_ms: u64,

    /// Run filesystem daemons with debug logging
    pub debug: bool,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self {
            allow_other: false,
            entry_timeout_ms: 10_000,
            debug: false,
        }
    }
}

impl Filesystem {
    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.entry_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Mount {
    /// Maximum time to wait for a new daemon to report its mount, in milliseconds
    pub ready_timeout_ms: u64,

    /// How often the mount status is probed while waiting, in milliseconds
    pub ready_interval_ms: u64,
}

impl Default for Mount {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 3_000,
            ready_interval_ms: 100,
        }
    }
}

impl Mount {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms)
    }
}

/// Configuration values for grfs.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // These sub-types should aim to only have one level of
    // values within them, otherwise they become impossible to address
    // with environment variables.
    pub storage: Storage,
    pub filesystem: Filesystem,
    pub mount: Mount,

    /// Access tokens by repository domain, eg: `github.com: $GITHUB_TOKEN`
    pub auths: HashMap<String, String>,
}

impl Config {
    /// Get the current loaded config, loading it if needed
    pub fn current() -> Result<Arc<Self>> {
        get_config()
    }

    /// Load a config from a yaml string, mostly useful in tests.
    pub fn load_string<S: AsRef<str>>(conf: S) -> Result<Self> {
        use config::{Config as RawConfig, File, FileFormat};

        let config = RawConfig::builder()
            .add_source(File::from_str(conf.as_ref(), FileFormat::Yaml))
            .build()?;
        let config = Config::deserialize(config)?;
        config.validate()?;
        Ok(config)
    }

    /// Make this config the current global one
    pub fn make_current(self) -> Result<Arc<Self>> {
        // Note we don't know if we won the race to set the value here,
        // so we still need to try to update it.
        let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<Config>>> {
            Ok(RwLock::new(Arc::new(self.clone())))
        })?;

        let mut lock = config
            .write()
            .map_err(|err| Error::LockPoisonedWrite(err.to_string()))?;
        *Arc::make_mut(&mut lock) = self;
        Ok(Arc::clone(&lock))
    }

    /// Check that all values are within their allowed ranges.
    pub fn validate(&self) -> Result<()> {
        let timeout = self.filesystem.entry_timeout_ms;
        if !(MIN_ENTRY_TIMEOUT_MS..=MAX_ENTRY_TIMEOUT_MS).contains(&timeout) {
            return Err(Error::InvalidConfig(format!(
                "filesystem.entry_timeout_ms must be between {MIN_ENTRY_TIMEOUT_MS} and {MAX_ENTRY_TIMEOUT_MS}, got {timeout}"
            )));
        }
        if self.mount.ready_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "mount.ready_interval_ms must be greater than zero".into(),
            ));
        }
        if self.mount.ready_timeout_ms < self.mount.ready_interval_ms {
            return Err(Error::InvalidConfig(
                "mount.ready_timeout_ms cannot be shorter than mount.ready_interval_ms".into(),
            ));
        }
        for domain in self.auths.keys() {
            if domain.is_empty() {
                return Err(Error::InvalidConfig("auths cannot contain an empty domain".into()));
            }
        }
        Ok(())
    }

    /// The access token to use for the given domain, if any.
    ///
    /// Environment variable references in the configured value are
    /// expanded. GitHub and GitLab fall back to the conventional
    /// `GITHUB_TOKEN` and `GITLAB_TOKEN` variables.
    pub fn token_for(&self, domain: &str) -> Result<Option<String>> {
        if let Some(raw) = self.auths.get(domain) {
            let token = shellexpand::env(raw).map_err(|err| {
                Error::InvalidConfig(format!("auths.{domain}: {err}"))
            })?;
            let token = token.trim();
            if token.is_empty() {
                return Ok(None);
            }
            return Ok(Some(token.to_string()));
        }
        let fallback = match domain {
            "github.com" | "www.github.com" => "GITHUB_TOKEN",
            "gitlab.com" => "GITLAB_TOKEN",
            _ => return Ok(None),
        };
        Ok(std::env::var(fallback).ok().filter(|t| !t.is_empty()))
    }
}

/// Get the current grfs config, fetching it from disk if needed.
pub fn get_config() -> Result<Arc<Config>> {
    let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<Config>>> {
        Ok(RwLock::new(Arc::new(load_config()?)))
    })?;
    let lock = config
        .read()
        .map_err(|err| Error::LockPoisonedRead(err.to_string()))?;
    Ok(Arc::clone(&*lock))
}

/// The configuration file read for the current user.
///
/// This is the file named by `GRFS_CONFIG_PATH` when set, otherwise
/// the user config file without its extension. The file may not exist.
pub fn user_config_path() -> Option<PathBuf> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => dirs::config_dir().map(|dir| dir.join(USER_CONFIG)),
    }
}

/// Load the grfs configuration from disk, even if it's already been loaded.
///
/// This includes the system and user configurations, if they exist, followed
/// by any `GRFS_<SECTION>_<NAME>` environment variable overrides.
pub fn load_config() -> Result<Config> {
    use config::{Config as RawConfig, File};

    let mut config_builder = RawConfig::builder();
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => {
            config_builder = config_builder.add_source(File::with_name(&path).required(false));
        }
        _ => {
            // both files can be in any supported format: yaml, toml, json, etc
            config_builder =
                config_builder.add_source(File::with_name(SYSTEM_CONFIG).required(false));
            if let Some(user_dir) = dirs::config_dir() {
                let user_config = user_dir.join(USER_CONFIG);
                config_builder = config_builder
                    .add_source(File::with_name(&user_config.to_string_lossy()).required(false));
            }
        }
    }

    for (var, value) in std::env::vars() {
        if var == BASE_PATH_ENV {
            config_builder = config_builder.set_override("storage.root", value)?;
            continue;
        }
        if var == CONFIG_PATH_ENV {
            continue;
        }
        let Some(tail) = var.strip_prefix("GRFS_") else {
            continue;
        };
        let Some((section, name)) = tail.split_once('_') else {
            // typically, a value with no section is not a configuration
            // value, and can be skipped (eg: GRFS_LOG)
            continue;
        };

        let key = format!("{}.{}", section.to_lowercase(), name.to_lowercase());
        config_builder = config_builder.set_override(key, value)?;
    }

    let config = config_builder.build()?;
    let config = Config::deserialize(config)?;
    config.validate()?;
    Ok(config)
}
