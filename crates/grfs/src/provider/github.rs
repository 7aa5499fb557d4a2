// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use bytes::Bytes;
use hyper::Method;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use url::Url;

use super::http::{HttpClient, endpoint, path_segments};
use crate::{Entry, Error, Repository, Result};

#[cfg(test)]
#[path = "./github_test.rs"]
mod github_test;

const API_VERSION: &str = "2022-11-28";

/// Reads repositories hosted on github.com or a GitHub Enterprise server.
#[derive(Debug)]
pub struct GitHubProvider {
    repo: Repository,
    api: Url,
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Contents {
    Dir(Vec<Content>),
    Item(Box<Content>),
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    #[serde(default)]
    default_branch: Option<String>,
}

impl GitHubProvider {
    pub fn new(repo: Repository, token: Option<&str>) -> Result<Self> {
        let api = if repo.is_github() {
            "https://api.github.com".to_string()
        } else {
            format!("https://{}/api/v3", repo.domain)
        };
        let api = Url::parse(&api).map_err(|err| Error::InvalidRepository {
            input: repo.to_string(),
            reason: err.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(API_VERSION),
        );
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                HttpClient::sensitive_header(&format!("Bearer {token}"))?,
            );
        }

        Ok(Self {
            repo,
            api,
            client: HttpClient::new(headers),
        })
    }

    fn contents_url(&self, path: &str) -> Result<Url> {
        let segments = [
            "repos",
            self.repo.owner.as_str(),
            self.repo.name.as_str(),
            "contents",
        ];
        let mut url = endpoint(&self.api, segments.into_iter().chain(path_segments(path)))?;
        if !self.repo.reference.is_empty() {
            url.query_pairs_mut()
                .append_pair("ref", &self.repo.reference);
        }
        Ok(url)
    }

    /// Fetch the target of a symlink that was listed without one.
    async fn resolve_symlink(&self, path: &str) -> Result<String> {
        let url = self.contents_url(path)?;
        let (contents, _) = self.client.get_json::<Contents>(&url).await?;
        match contents {
            Contents::Item(item) if item.kind == "symlink" => {
                Ok(item.target.unwrap_or_default())
            }
            _ => Ok(String::new()),
        }
    }
}

/// Convert one listed item into an entry.
///
/// Symlinks may come back with an empty target, which
/// the caller is expected to resolve.
fn entry_from_content(url: &Url, content: Content) -> Result<Entry> {
    let invalid = |message: String| Error::InvalidResponse {
        url: url.to_string(),
        message,
    };
    if content.path.is_empty() || content.name.is_empty() {
        return Err(invalid("entry with an empty name or path".into()));
    }
    let entry = match content.kind.as_str() {
        // submodules are shown as empty directories
        "dir" | "submodule" => Entry::dir(content.path),
        "file" => Entry::file(content.path, content.size),
        "symlink" => Entry::symlink(content.path, content.target.unwrap_or_default()),
        "" => return Err(invalid(format!("entry type is empty for {:?}", content.path))),
        kind => {
            return Err(invalid(format!(
                "unknown entry type {kind:?} for {:?}",
                content.path
            )));
        }
    };
    Ok(entry.with_web_url(content.html_url.unwrap_or_default()))
}

#[async_trait::async_trait]
impl super::Provider for GitHubProvider {
    async fn check(&self) -> Result<Option<String>> {
        let url = endpoint(
            &self.api,
            ["repos", self.repo.owner.as_str(), self.repo.name.as_str()],
        )?;
        let (info, _) = self.client.get_json::<RepositoryInfo>(&url).await?;
        Ok(info.default_branch.filter(|b| !b.is_empty()))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<Entry>> {
        let url = self.contents_url(path)?;
        let (contents, _) = self.client.get_json::<Contents>(&url).await?;
        let items = match contents {
            Contents::Dir(items) => items,
            Contents::Item(item) if item.kind == "submodule" => Vec::new(),
            Contents::Item(_) => {
                return Err(Error::InvalidResponse {
                    url: url.to_string(),
                    message: format!("{path:?} is a file, not a directory"),
                });
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let mut entry = entry_from_content(&url, item)?;
            if entry.is_symlink() && entry.link_name.is_empty() {
                entry.link_name = self.resolve_symlink(&entry.path).await?;
                if entry.link_name.is_empty() {
                    return Err(Error::InvalidResponse {
                        url: url.to_string(),
                        message: format!("entry {:?} is a symlink, but its target is empty", entry.path),
                    });
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let url = self.contents_url(path)?;
        let response = self
            .client
            .send(
                Method::GET,
                &url,
                &[(header::ACCEPT, "application/vnd.github.raw")],
            )
            .await?;
        Ok(response.body)
    }
}
