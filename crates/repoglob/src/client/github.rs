//! GitHub contents API client.

use std::time::Duration;

use async_trait::async_trait;
use repoglob_types::{ContentError, ContentListing, ContentRequest, ContentResult, RemoteEntry};
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value as JsonValue;

use super::ContentClient;
use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, Result};

const MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const RATE_LIMIT_HEADER: &str = "x-ratelimit-remaining";

/// Lists directories through `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_base: Url,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_base", &self.api_base.as_str())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    /// Build a client from `config`.
    ///
    /// Explicit `credentials` win over the configured token.
    pub fn from_config(config: &ClientConfig, credentials: Option<Credentials>) -> Result<Self> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| Error::Config(format!("invalid api_base {:?}: {e}", config.api_base)))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::Config(format!("api_base cannot be a base URL: {api_base}")));
        }

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;

        let credentials = credentials.or_else(|| {
            config
                .token
                .clone()
                .map(|token| Credentials::Token { token })
        });

        Ok(Self {
            http,
            api_base,
            credentials,
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Contents URL for `request`.
    pub fn contents_url(&self, request: &ContentRequest) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", request.owner.as_str(), request.repo.as_str(), "contents"])
                .extend(request.path.split('/').filter(|s| !s.is_empty()));
        }
        if let Some(branch) = &request.branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }
        url
    }
}

#[async_trait]
impl ContentClient for GithubClient {
    async fn list_directory(&self, request: &ContentRequest) -> ContentResult<ContentListing> {
        let url = self.contents_url(request);
        tracing::trace!(url = %url, "GET contents");

        let mut builder = self
            .http
            .get(url)
            .header(ACCEPT, MEDIA_TYPE)
            .header(API_VERSION_HEADER, API_VERSION);
        builder = match &self.credentials {
            Some(Credentials::Token { token }) => builder.bearer_auth(token),
            Some(Credentials::Basic { username, password }) => builder.basic_auth(username, Some(password)),
            None => builder,
        };

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let remaining = rate_limit_remaining(response.headers());
        let body = response.text().await.map_err(transport_error)?;

        parse_listing(status, remaining, &request.path, &body)
    }
}

fn transport_error(err: reqwest::Error) -> ContentError {
    if err.is_timeout() {
        ContentError::Timeout(err.to_string())
    } else {
        ContentError::Transport(err.to_string())
    }
}

/// Value of the rate-limit-remaining header, if present and numeric.
pub(crate) fn rate_limit_remaining(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RATE_LIMIT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Turn a contents API response into a listing.
pub(crate) fn parse_listing(
    status: StatusCode,
    remaining: Option<u64>,
    path: &str,
    body: &str,
) -> ContentResult<ContentListing> {
    if !status.is_success() {
        return Err(status_error(status, remaining, path, body));
    }

    match serde_json::from_str::<JsonValue>(body)? {
        JsonValue::Array(items) => {
            let entries = items
                .into_iter()
                .map(serde_json::from_value::<RemoteEntry>)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ContentListing {
                entries,
                rate_limit_remaining: remaining,
            })
        }
        JsonValue::Object(_) => Err(ContentError::NotADirectory(path.to_string())),
        other => Err(ContentError::Decode(format!(
            "expected a directory listing for {path:?}, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn status_error(status: StatusCode, remaining: Option<u64>, path: &str, body: &str) -> ContentError {
    let message = serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(JsonValue::as_str).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::UNAUTHORIZED => ContentError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => ContentError::RateLimited(message),
        StatusCode::FORBIDDEN if remaining == Some(0) => ContentError::RateLimited(message),
        StatusCode::NOT_FOUND => ContentError::NotFound(path.to_string()),
        _ => ContentError::Http {
            status: status.as_u16(),
            message,
        },
    }
}
