//! The lock store: every resolution decision keyed by `name@constraint`.
//!
//! The key couples the package name with the literal constraint text that
//! produced the entry. `foo@^1.0.0` and `foo@^1.2.0` are distinct entries
//! even when they pin the same version.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mpm_util::errors::{MpmError, MpmResult};
use mpm_util::fs::{find_ancestor_with, write_atomic};

use crate::package::{Dependencies, Dist, VersionManifest};

/// File name of the persisted lock.
pub const LOCKFILE_NAME: &str = "mpm-lock.json";

/// A pinned resolution of one `name@constraint` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub version: String,
    pub resolved: String,
    pub integrity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
}

impl LockEntry {
    /// Build an entry from the registry metadata of the chosen version.
    pub fn from_manifest(version: &str, meta: &VersionManifest) -> Self {
        Self {
            version: version.to_string(),
            resolved: meta.dist.tarball.clone(),
            integrity: meta.dist.shasum.clone(),
            dependencies: meta.dependencies.clone(),
        }
    }

    /// View this entry as the registry metadata of its single version.
    pub fn to_version_manifest(&self) -> VersionManifest {
        VersionManifest {
            dependencies: self.dependencies.clone(),
            dist: Dist {
                shasum: self.integrity.clone(),
                tarball: self.resolved.clone(),
            },
        }
    }
}

/// In-memory lock table plus the location it was loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockStore {
    entries: BTreeMap<String, LockEntry>,
    path: Option<PathBuf>,
}

impl LockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite key for a name and the exact constraint text.
    pub fn key(name: &str, constraint: &str) -> String {
        format!("{name}@{constraint}")
    }

    /// Search upward from `start` for a lockfile and load it.
    ///
    /// A missing lockfile yields an empty store.
    pub fn load(start: &Path) -> MpmResult<Self> {
        match find_ancestor_with(start, LOCKFILE_NAME) {
            Some(dir) => Self::from_path(&dir.join(LOCKFILE_NAME)),
            None => {
                tracing::debug!(start = %start.display(), "no lockfile found");
                Ok(Self::new())
            }
        }
    }

    /// Load and parse a lockfile from an explicit path.
    pub fn from_path(path: &Path) -> MpmResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MpmError::MalformedLockFile {
            path: path.to_path_buf(),
            message: format!("Failed to read lockfile: {e}"),
        })?;
        let mut store = Self::parse(&content).map_err(|e| MpmError::MalformedLockFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        store.path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), entries = store.len(), "loaded lockfile");
        Ok(store)
    }

    /// Parse lockfile content without recording a location.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let entries: BTreeMap<String, LockEntry> = serde_json::from_str(content)?;
        Ok(Self {
            entries,
            path: None,
        })
    }

    /// Exact composite-key match.
    pub fn lookup(&self, name: &str, constraint: &str) -> Option<&LockEntry> {
        self.entries.get(&Self::key(name, constraint))
    }

    /// Insert or overwrite the entry for `name@constraint`.
    pub fn upsert(&mut self, name: &str, constraint: &str, entry: LockEntry) {
        self.entries.insert(Self::key(name, constraint), entry);
    }

    /// Insert or overwrite by an already composed key.
    pub fn upsert_key(&mut self, key: String, entry: LockEntry) {
        self.entries.insert(key, entry);
    }

    pub fn entries(&self) -> &BTreeMap<String, LockEntry> {
        &self.entries
    }

    /// Where the store was loaded from, if it was loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize with keys sorted, pretty-printed with two-space indentation.
    pub fn to_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Write the store to the path it was loaded from, or to
    /// `default_dir/mpm-lock.json` when it was never loaded from disk.
    ///
    /// Returns the path written.
    pub fn persist(&self, default_dir: &Path) -> MpmResult<PathBuf> {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| default_dir.join(LOCKFILE_NAME));
        let mut content = self.to_string_pretty().map_err(|e| MpmError::Generic {
            message: format!("Failed to serialize lockfile: {e}"),
        })?;
        content.push('\n');
        write_atomic(&path, content.as_bytes()).map_err(MpmError::Io)?;
        tracing::debug!(path = %path.display(), entries = self.len(), "persisted lockfile");
        Ok(path)
    }
}
