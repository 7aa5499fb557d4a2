// Copyright (c) Contributors to the grfs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/fioncat/grfs

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./http_test.rs"]
mod http_test;

type Connector = hyper_rustls::HttpsConnector<HttpConnector>;

const USER_AGENT: &str = concat!("grfs/", env!("CARGO_PKG_VERSION"));

// longest part of an error response body to include in error messages
const MAX_ERROR_BODY: usize = 256;

/// A small https client shared by the provider implementations.
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Client<Connector, Empty<Bytes>>,
    headers: HeaderMap,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

/// A fully read response.
pub(crate) struct Response {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpClient {
    /// Create a client that sends the given headers with every request.
    pub fn new(headers: HeaderMap) -> Self {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Self { client, headers }
    }

    /// Build a header value holding a secret, so that it is never logged.
    pub fn sensitive_header(value: &str) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(value)
            .map_err(|err| Error::InvalidConfig(format!("invalid access token: {err}")))?;
        value.set_sensitive(true);
        Ok(value)
    }

    pub async fn send(
        &self,
        method: Method,
        url: &Url,
        extra: &[(HeaderName, &'static str)],
    ) -> Result<Response> {
        let mut builder = hyper::Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(header::USER_AGENT, USER_AGENT);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
            for (name, value) in extra {
                headers.insert(name.clone(), HeaderValue::from_static(*value));
            }
        }
        let request = builder.body(Empty::new()).map_err(|err| Error::Http {
            url: url.to_string(),
            source: Box::new(err),
        })?;

        tracing::trace!(%method, %url, "sending request");
        let response = self.client.request(request).await.map_err(|err| Error::Http {
            url: url.to_string(),
            source: Box::new(err),
        })?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|err| Error::Http {
                url: url.to_string(),
                source: Box::new(err),
            })?
            .to_bytes();
        tracing::trace!(%method, %url, status = %parts.status, size = body.len(), "received response");

        if !parts.status.is_success() {
            return Err(status_error(url, parts.status, &body));
        }
        Ok(Response {
            headers: parts.headers,
            body,
        })
    }

    /// Fetch and decode a json document.
    ///
    /// The accept header is left to the defaults given to [`HttpClient::new`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<(T, HeaderMap)> {
        let response = self.send(Method::GET, url, &[]).await?;
        let value = serde_json::from_slice(&response.body).map_err(|source| Error::Json {
            url: url.to_string(),
            source,
        })?;
        Ok((value, response.headers))
    }
}

fn status_error(url: &Url, status: StatusCode, body: &[u8]) -> Error {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(alias = "error")]
        message: serde_json::Value,
    }

    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: serde_json::Value::String(message),
        }) => message,
        Ok(ErrorBody { message }) => message.to_string(),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            match text.char_indices().nth(MAX_ERROR_BODY) {
                Some((idx, _)) => format!("{}...", &text[..idx]),
                None if text.is_empty() => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
                None => text.to_string(),
            }
        }
    };
    Error::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
        message,
    }
}

/// Append path segments to a base api url.
///
/// Each segment is percent-encoded on its own, so a segment
/// containing a slash stays a single segment.
pub(crate) fn endpoint<'a, I>(base: &Url, segments: I) -> Result<Url>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::InvalidConfig(format!("{base} cannot be used as an api url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Split a repository path into non-empty segments.
pub(crate) fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
