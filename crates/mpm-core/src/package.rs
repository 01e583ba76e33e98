//! Registry-side package metadata: every published version of one package.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dependency declarations: package name to version constraint.
pub type Dependencies = BTreeMap<String, String>;

/// Distribution metadata for one published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dist {
    /// SHA-1 hex digest of the tarball.
    #[serde(default)]
    pub shasum: String,
    /// Download URL of the tarball.
    pub tarball: String,
}

/// Metadata for a single published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
    pub dist: Dist,
}

/// The catalog of every publishable version of one package, keyed by version.
///
/// Deserializes directly from a registry packument; fields other than
/// `versions` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub versions: BTreeMap<String, VersionManifest>,
}

impl PackageManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper used when assembling manifests by hand.
    pub fn with_version(mut self, version: &str, meta: VersionManifest) -> Self {
        self.versions.insert(version.to_string(), meta);
        self
    }

    pub fn get(&self, version: &str) -> Option<&VersionManifest> {
        self.versions.get(version)
    }

    /// All published version strings.
    pub fn version_strings(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_packument() {
        let json = r#"{
            "name": "left-pad",
            "dist-tags": { "latest": "1.3.0" },
            "versions": {
                "1.3.0": {
                    "name": "left-pad",
                    "version": "1.3.0",
                    "dependencies": { "repeat-string": "^1.0.0" },
                    "dist": {
                        "shasum": "5b8a3a7765dfe001261dde915589e782f8c94d1e",
                        "tarball": "https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz",
                        "integrity": "sha512-abc"
                    }
                },
                "1.0.0": {
                    "dist": { "tarball": "https://registry.npmjs.org/left-pad/-/left-pad-1.0.0.tgz" }
                }
            }
        }"#;
        let manifest: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.versions.len(), 2);
        let latest = manifest.get("1.3.0").unwrap();
        assert_eq!(
            latest.dependencies.as_ref().unwrap().get("repeat-string"),
            Some(&"^1.0.0".to_string())
        );
        assert_eq!(latest.dist.shasum, "5b8a3a7765dfe001261dde915589e782f8c94d1e");
        let first = manifest.get("1.0.0").unwrap();
        assert!(first.dependencies.is_none());
        assert!(first.dist.shasum.is_empty());
    }

    #[test]
    fn missing_versions_is_empty() {
        let manifest: PackageManifest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(manifest.is_empty());
    }
}
