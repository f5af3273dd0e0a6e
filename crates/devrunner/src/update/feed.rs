//! Release feed: GitHub-style "latest release" JSON

use std::env;
use std::future::Future;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use semver::Version;
use serde::Deserialize;

use super::UpdateError;

pub const DEFAULT_FEED_URL: &str = "https://api.github.com/repos/devrunner/devrunner/releases/latest";

/// Overrides [`DEFAULT_FEED_URL`]
pub const FEED_URL_ENV: &str = "DEVRUNNER_UPDATE_URL";

/// GitHub API response for a release
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    /// Release notes (markdown)
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// GitHub API response for a release asset
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    /// `sha256:<hex>` as published by GitHub
    #[serde(default)]
    pub digest: Option<String>,
}

impl Release {
    pub fn version(&self) -> Result<Version, UpdateError> {
        parse_version(&self.tag_name)
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

impl Asset {
    /// Hex SHA-256 from the digest field
    pub fn sha256(&self) -> Option<&str> {
        self.digest
            .as_deref()
            .and_then(|d| d.strip_prefix("sha256:"))
            .filter(|hex| !hex.is_empty())
    }
}

/// Parse a tag like `v1.2.3` or `1.2.3`
pub fn parse_version(tag: &str) -> Result<Version, UpdateError> {
    let trimmed = tag.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|_| UpdateError::InvalidVersion(tag.to_string()))
}

/// Release asset name for this platform
pub fn platform_asset_name() -> String {
    format!(
        "devrunner-{}-{}{}",
        env::consts::ARCH,
        env::consts::OS,
        env::consts::EXE_SUFFIX
    )
}

pub fn feed_url() -> String {
    env::var(FEED_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FEED_URL.to_string())
}

/// Where releases come from. Timeouts are applied by the caller.
pub trait ReleaseSource {
    fn latest(&self) -> impl Future<Output = Result<Release, UpdateError>>;

    fn download(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, UpdateError>>;
}

/// Release feed over HTTPS
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Result<Self, UpdateError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl ReleaseSource for HttpSource {
    async fn latest(&self) -> Result<Release, UpdateError> {
        let release = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("devrunner/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?
            .json::<Release>()
            .await?;
        Ok(release)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, UpdateError> {
        let bytes = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("devrunner/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
