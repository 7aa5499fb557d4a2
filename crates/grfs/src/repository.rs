// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use std::fmt::Display;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./repository_test.rs"]
mod repository_test;

static SSH_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(git@)?([^:/@]+):([^@]*)(@.*)?$").expect("valid repository ssh url pattern")
});

const GITHUB_HOSTS: &[&str] = &["github.com", "www.github.com"];

/// Identifies one remote repository and, optionally, the ref to browse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub domain: String,
    /// The owner path, which for some hosts can contain nested groups
    pub owner: String,
    pub name: String,
    /// The branch, tag or commit, empty for the default branch
    #[serde(rename = "ref", default)]
    pub reference: String,
}

impl Repository {
    pub fn new<D, O, N>(domain: D, owner: O, name: N) -> Self
    where
        D: Into<String>,
        O: Into<String>,
        N: Into<String>,
    {
        Self {
            domain: domain.into(),
            owner: owner.into(),
            name: name.into(),
            reference: String::new(),
        }
    }

    pub fn with_reference<R: Into<String>>(mut self, reference: R) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn is_github(&self) -> bool {
        GITHUB_HOSTS.contains(&self.domain.as_str())
    }

    /// The `owner/name` path of this repository on its host.
    pub fn path(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn validate(&self) -> Result<()> {
        let reason = if self.domain.is_empty() {
            "domain is empty"
        } else if self.owner.is_empty() {
            "owner is empty"
        } else if self.name.is_empty() {
            "name is empty"
        } else {
            return Ok(());
        };
        Err(Error::InvalidRepository {
            input: self.to_string(),
            reason: reason.into(),
        })
    }

    fn parse_web_url(input: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidRepository {
            input: input.to_string(),
            reason,
        };
        let url = url::Url::parse(input).map_err(|err| invalid(err.to_string()))?;
        let domain = url
            .host_str()
            .ok_or_else(|| invalid("url has no host".into()))?
            .to_lowercase();

        let path = url.path().trim_matches('/');
        let (path, explicit_ref) = match path.split_once('@') {
            Some((path, reference)) => (path.trim_end_matches('/'), Some(reference)),
            None => (path, None),
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut repo = if GITHUB_HOSTS.contains(&domain.as_str()) {
            // /<owner>/<name>[/tree|blob/<ref...>]
            let mut parts = segments.iter();
            let owner = parts.next().copied().unwrap_or_default();
            let name = parts.next().copied().unwrap_or_default();
            let reference = match parts.next() {
                Some(&"tree") | Some(&"blob") => parts.copied().collect::<Vec<_>>().join("/"),
                _ => String::new(),
            };
            Self::new(domain, owner, strip_git_suffix(name)).with_reference(reference)
        } else {
            // /<owner...>/<name>[/-/tree|blob/<ref...>]
            let (repo_path, reference) = match segments.iter().position(|s| *s == "-") {
                Some(idx) => {
                    let rest = &segments[idx + 1..];
                    let reference = match rest.first() {
                        Some(&"tree") | Some(&"blob") => rest[1..].join("/"),
                        _ => String::new(),
                    };
                    (&segments[..idx], reference)
                }
                None => (segments.as_slice(), String::new()),
            };
            let (owner, name) = match repo_path.split_last() {
                Some((name, owner)) => (owner.join("/"), *name),
                None => (String::new(), ""),
            };
            Self::new(domain, owner, strip_git_suffix(name)).with_reference(reference)
        };

        if let Some(reference) = explicit_ref {
            repo.reference = reference.trim().to_string();
        }
        Ok(repo)
    }

    fn parse_ssh_url(input: &str) -> Result<Self> {
        let Some(captures) = SSH_URL.captures(input) else {
            return Err(Error::InvalidRepository {
                input: input.to_string(),
                reason: "expected '[git@]<domain>:<owner>/<name>[@ref]'".into(),
            });
        };
        let domain = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        let path = captures
            .get(3)
            .map(|m| m.as_str().trim_matches('/'))
            .unwrap_or_default();
        let reference = captures
            .get(4)
            .map(|m| m.as_str().trim_start_matches('@').trim())
            .unwrap_or_default();

        let (owner, name) = path.rsplit_once('/').unwrap_or(("", path));
        Ok(Self::new(domain.to_lowercase(), owner, strip_git_suffix(name)).with_reference(reference))
    }
}

fn strip_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

impl Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.domain, self.owner, self.name)?;
        if !self.reference.is_empty() {
            write!(f, "@{}", self.reference)?;
        }
        Ok(())
    }
}

impl FromStr for Repository {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        let repo = if input.starts_with("http://") || input.starts_with("https://") {
            Self::parse_web_url(input)?
        } else {
            Self::parse_ssh_url(input)?
        };
        repo.validate().map_err(|err| match err {
            Error::InvalidRepository { reason, .. } => Error::InvalidRepository {
                input: input.to_string(),
                reason,
            },
            err => err,
        })?;
        Ok(repo)
    }
}
