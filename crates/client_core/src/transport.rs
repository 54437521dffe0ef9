use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::{
    domain::CatalogKind,
    protocol::{parse_catalog_snapshot, CatalogRecord},
};
use tracing::debug;
use url::Url;

pub type SettingsMap = BTreeMap<String, String>;

const UPDATE_SETTINGS_PATH: &str = "/internal/update_settings";

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_fragment(&self, path: &str) -> Result<String>;
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_snapshot(&self, kind: CatalogKind) -> Result<Vec<CatalogRecord>>;
}

#[async_trait]
pub trait SettingsSync: Send + Sync {
    async fn update_settings(&self, settings: &SettingsMap) -> Result<SettingsMap>;
}

pub struct MissingServer;

#[async_trait]
impl ContentFetcher for MissingServer {
    async fn fetch_fragment(&self, path: &str) -> Result<String> {
        Err(anyhow!("no server configured to fetch {path}"))
    }
}

#[async_trait]
impl CatalogSource for MissingServer {
    async fn fetch_snapshot(&self, kind: CatalogKind) -> Result<Vec<CatalogRecord>> {
        Err(anyhow!("no server configured to fetch {kind} snapshot"))
    }
}

#[async_trait]
impl SettingsSync for MissingServer {
    async fn update_settings(&self, _settings: &SettingsMap) -> Result<SettingsMap> {
        Err(anyhow!("no server configured to sync settings"))
    }
}

#[derive(Clone)]
pub struct HttpServerApi {
    http: Client,
    base: Url,
}

impl HttpServerApi {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self> {
        let base = Url::parse(server_url)
            .with_context(|| format!("invalid server url: {server_url}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("server_url must start with http:// or https://"));
        }
        Ok(Self { http, base })
    }

    pub fn http_client(&self) -> Client {
        self.http.clone()
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("invalid path `{path}` for {}", self.base))
    }
}

#[async_trait]
impl ContentFetcher for HttpServerApi {
    async fn fetch_fragment(&self, path: &str) -> Result<String> {
        let url = self.endpoint(path)?;
        debug!(%url, "fetching layer content");
        let body = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl CatalogSource for HttpServerApi {
    async fn fetch_snapshot(&self, kind: CatalogKind) -> Result<Vec<CatalogRecord>> {
        let url = self.endpoint(kind.snapshot_path())?;
        let snapshot: Value = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("{kind} snapshot is not JSON"))?;
        Ok(parse_catalog_snapshot(kind, snapshot)?)
    }
}

#[async_trait]
impl SettingsSync for HttpServerApi {
    async fn update_settings(&self, settings: &SettingsMap) -> Result<SettingsMap> {
        let url = self.endpoint(UPDATE_SETTINGS_PATH)?;
        let echoed: BTreeMap<String, Value> = self
            .http
            .post(url.clone())
            .form(settings)
            .send()
            .await
            .with_context(|| format!("failed to post {url}"))?
            .error_for_status()?
            .json()
            .await?;
        Ok(echoed
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
