//! Session options and client configuration.
//!
//! Client configuration is loaded from `~/.config/repoglob/config.toml`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use repoglob_types::RepoTarget;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::client::ContentClient;
use crate::error::{Error, Result};

/// Environment variable consulted when the config file has no token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

fn default_fetch_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

/// Credentials applied to the default GitHub client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Personal access or OAuth token, sent as a bearer token.
    #[serde(alias = "oauth")]
    Token { token: String },
    /// Username and password (or token) via HTTP basic auth.
    Basic { username: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token { .. } => f.write_str("Token { token: <redacted> }"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Options for one glob session.
///
/// Deserializable so sessions can be described in JSON or TOML; `user` and
/// `glob` are accepted as aliases for `owner` and `pattern`. The cache store
/// and client can only be supplied in code.
#[derive(Clone, Deserialize)]
pub struct RunOptions {
    #[serde(alias = "user")]
    pub owner: String,
    pub repo: String,
    #[serde(alias = "glob")]
    pub pattern: String,
    /// Branch, tag, or commit; the remote's default branch when absent.
    #[serde(default)]
    pub branch: Option<String>,
    /// Cache store to read and fill; the process-wide store when absent.
    #[serde(skip)]
    pub cache: Option<CacheStore>,
    /// Pre-built client; a GitHub client from `ClientConfig` when absent.
    #[serde(skip)]
    pub client: Option<Arc<dyn ContentClient>>,
    /// Credentials for the default client. Ignored when `client` is set.
    #[serde(default)]
    pub authenticate: Option<Credentials>,
    /// Per-fetch time limit; `None` waits forever.
    #[serde(skip, default = "default_fetch_timeout")]
    pub fetch_timeout: Option<Duration>,
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("pattern", &self.pattern)
            .field("branch", &self.branch)
            .field("cache", &self.cache.as_ref().map(|_| "..."))
            .field("client", &self.client.as_ref().map(|_| "..."))
            .field("authenticate", &self.authenticate)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl RunOptions {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            pattern: pattern.into(),
            branch: None,
            cache: None,
            client: None,
            authenticate: None,
            fetch_timeout: default_fetch_timeout(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_client(mut self, client: Arc<dyn ContentClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.authenticate = Some(credentials);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("owner", &self.owner), ("repo", &self.repo), ("pattern", &self.pattern)] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("missing `{name}`")));
            }
        }
        for (name, value) in [("owner", &self.owner), ("repo", &self.repo)] {
            if value.contains('/') {
                return Err(Error::Config(format!("`{name}` must not contain '/': {value}")));
            }
        }
        if self.branch.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(Error::Config("`branch` is empty".to_string()));
        }
        Ok(())
    }

    pub fn target(&self) -> RepoTarget {
        RepoTarget {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
        }
    }
}

/// Settings for the default GitHub client.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// User-Agent header (GitHub rejects requests without one).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Token used when a session supplies no credentials.
    #[serde(default)]
    pub token: Option<String>,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    format!("repoglob/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            token: None,
            timeout_ms: default_timeout(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from the default path, then fill a missing token
    /// from `GITHUB_TOKEN`.
    ///
    /// If the config file doesn't exist, starts from defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        Ok(config.with_env_token(std::env::var(TOKEN_ENV).ok()))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Get the default config file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "repoglob")
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    fn with_env_token(mut self, token: Option<String>) -> Self {
        if self.token.is_none() {
            self.token = token.filter(|t| !t.trim().is_empty());
        }
        self
    }
}
