//! Where package manifests come from, and the per-process cache in front of it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};

use mpm_core::package::PackageManifest;
use mpm_util::errors::MpmResult;

/// Provides the full catalog of published versions for a package.
///
/// Implementations must be idempotent: fetching the same name twice returns
/// the same manifest.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch(&self, name: &str) -> MpmResult<PackageManifest>;
}

#[async_trait]
impl<S: ManifestSource + ?Sized> ManifestSource for Arc<S> {
    async fn fetch(&self, name: &str) -> MpmResult<PackageManifest> {
        (**self).fetch(name).await
    }
}

/// Caches manifests by name for the lifetime of the process.
///
/// Concurrent requests for the same name share one underlying fetch. A
/// failed fetch is not cached.
pub struct ManifestCache<S> {
    source: S,
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<PackageManifest>>>>>,
}

impl<S: ManifestSource> ManifestCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached manifest for `name`, fetching it on first use.
    pub async fn get(&self, name: &str) -> MpmResult<Arc<PackageManifest>> {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(name.to_string()).or_default().clone()
        };
        let manifest = cell
            .get_or_try_init(|| async {
                tracing::debug!(package = name, "fetching manifest");
                self.source.fetch(name).await.map(Arc::new)
            })
            .await?;
        Ok(manifest.clone())
    }
}
