// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use hyper::Method;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use super::http::{HttpClient, endpoint};
use crate::{Entry, Error, Repository, Result};

#[cfg(test)]
#[path = "./gitlab_test.rs"]
mod gitlab_test;

const PAGE_SIZE: &str = "100";
const SYMLINK_MODE: &str = "120000";
const NEXT_PAGE: HeaderName = HeaderName::from_static("x-next-page");
const FILE_SIZE: HeaderName = HeaderName::from_static("x-gitlab-size");
const PRIVATE_TOKEN: HeaderName = HeaderName::from_static("private-token");

/// The number of file metadata requests that can run concurrently
/// while listing a single directory.
pub const MAX_CONCURRENT_METADATA: usize = 16;

/// Reads repositories hosted on a GitLab server.
#[derive(Debug)]
pub struct GitLabProvider {
    repo: Repository,
    api: Url,
    client: HttpClient,
    reference: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct TreeNode {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    mode: String,
}

#[derive(Debug, Deserialize)]
struct Project {
    #[serde(default)]
    default_branch: Option<String>,
}

/// What still needs to be fetched to complete a listed tree node.
#[derive(Debug, PartialEq, Eq)]
enum Pending {
    Done(Entry),
    Size(String),
    Target(String),
}

impl GitLabProvider {
    pub fn new(repo: Repository, token: Option<&str>) -> Result<Self> {
        let api = Url::parse(&format!("https://{}/api/v4", repo.domain)).map_err(|err| {
            Error::InvalidRepository {
                input: repo.to_string(),
                reason: err.to_string(),
            }
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            headers.insert(PRIVATE_TOKEN, HttpClient::sensitive_header(token)?);
        }

        Ok(Self {
            repo,
            api,
            client: HttpClient::new(headers),
            reference: OnceCell::new(),
        })
    }

    fn project_url<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let project = self.repo.path();
        let base = endpoint(&self.api, ["projects", project.as_str()])?;
        endpoint(&base, segments)
    }

    /// The ref to read from, the default branch if none was given.
    async fn reference(&self) -> Result<&str> {
        let reference = self
            .reference
            .get_or_try_init(|| async {
                if !self.repo.reference.is_empty() {
                    return Ok(self.repo.reference.clone());
                }
                let branch = self.default_branch().await?;
                branch.ok_or_else(|| Error::InvalidResponse {
                    url: self.api.to_string(),
                    message: format!("{} has no default branch", self.repo),
                })
            })
            .await?;
        Ok(reference.as_str())
    }

    async fn default_branch(&self) -> Result<Option<String>> {
        let url = self.project_url([])?;
        let (project, _) = self.client.get_json::<Project>(&url).await?;
        Ok(project.default_branch.filter(|b| !b.is_empty()))
    }

    fn web_url(&self, reference: &str, kind: &str, path: &str) -> String {
        format!(
            "https://{}/{}/-/{kind}/{reference}/{path}",
            self.repo.domain,
            self.repo.path(),
        )
    }

    async fn list_tree(&self, path: &str, reference: &str) -> Result<Vec<TreeNode>> {
        let mut nodes = Vec::new();
        let mut page = String::from("1");
        loop {
            let mut url = self.project_url(["repository", "tree"])?;
            {
                let mut query = url.query_pairs_mut();
                if !path.is_empty() {
                    query.append_pair("path", path);
                }
                query
                    .append_pair("ref", reference)
                    .append_pair("per_page", PAGE_SIZE)
                    .append_pair("page", &page);
            }
            let (batch, headers) = self.client.get_json::<Vec<TreeNode>>(&url).await?;
            nodes.extend(batch);
            match headers
                .get(NEXT_PAGE)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
            {
                Some(next) if !next.is_empty() => page = next.to_string(),
                _ => break,
            }
        }
        Ok(nodes)
    }

    fn classify(&self, url: &Url, reference: &str, node: TreeNode) -> Result<Pending> {
        if node.path.is_empty() || node.name.is_empty() {
            return Err(Error::InvalidResponse {
                url: url.to_string(),
                message: "entry with an empty name or path".into(),
            });
        }
        let pending = match node.kind.as_str() {
            // submodules are shown as empty directories
            "tree" | "commit" => Pending::Done(
                Entry::dir(&node.path).with_web_url(self.web_url(reference, "tree", &node.path)),
            ),
            "blob" if node.mode == SYMLINK_MODE => Pending::Target(node.path),
            "blob" => Pending::Size(node.path),
            kind => {
                return Err(Error::InvalidResponse {
                    url: url.to_string(),
                    message: format!("unknown entry type {kind:?} for {:?}", node.path),
                });
            }
        };
        Ok(pending)
    }

    async fn complete(&self, reference: &str, pending: Pending) -> Result<Entry> {
        match pending {
            Pending::Done(entry) => Ok(entry),
            Pending::Size(path) => {
                let size = self.file_size(&path, reference).await?;
                let web_url = self.web_url(reference, "blob", &path);
                Ok(Entry::file(path, size).with_web_url(web_url))
            }
            Pending::Target(path) => {
                let target = self.raw_file(&path, reference).await?;
                let target = String::from_utf8_lossy(&target).trim_end().to_string();
                if target.is_empty() {
                    return Err(Error::InvalidResponse {
                        url: self.web_url(reference, "blob", &path),
                        message: format!("entry {path:?} is a symlink, but its target is empty"),
                    });
                }
                let web_url = self.web_url(reference, "blob", &path);
                Ok(Entry::symlink(path, target).with_web_url(web_url))
            }
        }
    }

    async fn file_size(&self, path: &str, reference: &str) -> Result<u64> {
        let mut url = self.project_url(["repository", "files", path])?;
        url.query_pairs_mut().append_pair("ref", reference);
        let response = self.client.send(Method::HEAD, &url, &[]).await?;
        response
            .headers
            .get(FILE_SIZE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| Error::InvalidResponse {
                url: url.to_string(),
                message: format!("missing or invalid {FILE_SIZE} header"),
            })
    }

    async fn raw_file(&self, path: &str, reference: &str) -> Result<Bytes> {
        let mut url = self.project_url(["repository", "files", path, "raw"])?;
        url.query_pairs_mut().append_pair("ref", reference);
        let response = self
            .client
            .send(Method::GET, &url, &[(header::ACCEPT, "*/*")])
            .await?;
        Ok(response.body)
    }
}

#[async_trait::async_trait]
impl super::Provider for GitLabProvider {
    async fn check(&self) -> Result<Option<String>> {
        let branch = self.default_branch().await?;
        if self.repo.reference.is_empty() {
            if let Some(branch) = &branch {
                let _ = self.reference.set(branch.clone());
            }
        }
        Ok(branch)
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<Entry>> {
        let reference = self.reference().await?;
        let nodes = self.list_tree(path, reference).await?;
        let url = self.project_url(["repository", "tree"])?;
        let pending = nodes
            .into_iter()
            .map(|node| self.classify(&url, reference, node))
            .collect::<Result<Vec<_>>>()?;
        futures::stream::iter(pending)
            .map(|p| self.complete(reference, p))
            .buffered(MAX_CONCURRENT_METADATA)
            .try_collect()
            .await
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let reference = self.reference().await?;
        self.raw_file(path, reference).await
    }
}
