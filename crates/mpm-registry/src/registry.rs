//! The npm registry as a [`ManifestSource`].

use async_trait::async_trait;
use reqwest::Client;

use mpm_core::package::PackageManifest;
use mpm_resolver::source::ManifestSource;
use mpm_util::errors::{MpmError, MpmResult};

use crate::download;

/// Fetches packuments from `GET {registry}/{name}`.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Packument URL for `name`. The slash of a scoped name is escaped, as
    /// the registry expects.
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.replace('/', "%2f"))
    }
}

#[async_trait]
impl ManifestSource for RegistryClient {
    async fn fetch(&self, name: &str) -> MpmResult<PackageManifest> {
        let url = self.package_url(name);
        tracing::debug!(package = name, url = %url, "GET packument");
        let body = download::download_bytes(&self.client, &url)
            .await
            .map_err(|e| MpmError::Fetch {
                name: name.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| MpmError::Fetch {
                name: name.to_string(),
                message: format!("not found in registry {}", self.base_url),
            })?;
        parse_manifest(name, &body)
    }
}

/// Decode a packument body. Only `versions` is read.
pub fn parse_manifest(name: &str, body: &[u8]) -> MpmResult<PackageManifest> {
    serde_json::from_slice(body).map_err(|e| {
        MpmError::Fetch {
            name: name.to_string(),
            message: format!("invalid manifest JSON: {e}"),
        }
        .into()
    })
}
