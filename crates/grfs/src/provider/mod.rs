// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

//! Read access to remote repository hosting services.

mod github;
mod gitlab;
mod http;

use bytes::Bytes;
pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;

use crate::{Config, Entry, Repository, Result};

/// Read-only access to the content of one repository at one ref.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Verify that the repository can be reached.
    ///
    /// Returns the default branch of the repository, if the
    /// backend reports one.
    async fn check(&self) -> Result<Option<String>>;

    /// List the entries of a directory, the root being the empty path.
    async fn read_dir(&self, path: &str) -> Result<Vec<Entry>>;

    /// Fetch the full content of a file.
    async fn read_file(&self, path: &str) -> Result<Bytes>;
}

/// The set of known provider implementations.
#[derive(Debug)]
pub enum ProviderHandle {
    GitHub(GitHubProvider),
    GitLab(GitLabProvider),
}

impl ProviderHandle {
    /// Open the appropriate provider for a repository based on its domain.
    pub fn open(repo: &Repository, config: &Config) -> Result<Self> {
        let token = config.token_for(&repo.domain)?;
        if repo.is_github() {
            tracing::debug!(%repo, "using github provider");
            Ok(GitHubProvider::new(repo.clone(), token.as_deref())?.into())
        } else {
            tracing::debug!(%repo, "using gitlab provider");
            Ok(GitLabProvider::new(repo.clone(), token.as_deref())?.into())
        }
    }
}

impl From<GitHubProvider> for ProviderHandle {
    fn from(provider: GitHubProvider) -> Self {
        Self::GitHub(provider)
    }
}

impl From<GitLabProvider> for ProviderHandle {
    fn from(provider: GitLabProvider) -> Self {
        Self::GitLab(provider)
    }
}

#[async_trait::async_trait]
impl Provider for ProviderHandle {
    async fn check(&self) -> Result<Option<String>> {
        match self {
            Self::GitHub(p) => p.check().await,
            Self::GitLab(p) => p.check().await,
        }
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<Entry>> {
        match self {
            Self::GitHub(p) => p.read_dir(path).await,
            Self::GitLab(p) => p.read_dir(path).await,
        }
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        match self {
            Self::GitHub(p) => p.read_file(path).await,
            Self::GitLab(p) => p.read_file(path).await,
        }
    }
}
