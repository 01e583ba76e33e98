//! The project manifest (`package.json`): reading and writing dependency groups.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use mpm_util::errors::{MpmError, MpmResult};
use mpm_util::fs::find_ancestor_with;

use crate::package::Dependencies;

/// File name searched for when locating the project root.
pub const MANIFEST_NAME: &str = "package.json";

/// One of the dependency groups a project manifest declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyGroup {
    Dependencies,
    DevDependencies,
}

impl DependencyGroup {
    /// The key this group uses in `package.json`.
    pub fn key(self) -> &'static str {
        match self {
            DependencyGroup::Dependencies => "dependencies",
            DependencyGroup::DevDependencies => "devDependencies",
        }
    }
}

impl fmt::Display for DependencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The dependency groups of a project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenciesMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
    #[serde(
        default,
        rename = "devDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub dev_dependencies: Option<Dependencies>,
}

impl DependenciesMap {
    pub fn group(&self, group: DependencyGroup) -> Option<&Dependencies> {
        match group {
            DependencyGroup::Dependencies => self.dependencies.as_ref(),
            DependencyGroup::DevDependencies => self.dev_dependencies.as_ref(),
        }
    }

    /// Mutable access to a group, creating it if absent.
    pub fn group_mut(&mut self, group: DependencyGroup) -> &mut Dependencies {
        match group {
            DependencyGroup::Dependencies => self.dependencies.get_or_insert_with(Default::default),
            DependencyGroup::DevDependencies => {
                self.dev_dependencies.get_or_insert_with(Default::default)
            }
        }
    }

    /// Iterate over every `(group, name, constraint)` declaration.
    pub fn iter(&self) -> impl Iterator<Item = (DependencyGroup, &str, &str)> {
        [DependencyGroup::Dependencies, DependencyGroup::DevDependencies]
            .into_iter()
            .flat_map(move |group| {
                self.group(group)
                    .into_iter()
                    .flatten()
                    .map(move |(name, constraint)| (group, name.as_str(), constraint.as_str()))
            })
    }

    /// Record newly requested packages with an empty (unpinned) constraint.
    ///
    /// Packages already declared in `group` are reset to unpinned as well, so
    /// the next resolution picks the newest version again.
    pub fn add_packages(&mut self, names: &[String], group: DependencyGroup) {
        if names.is_empty() {
            return;
        }
        let deps = self.group_mut(group);
        for name in names {
            deps.insert(name.clone(), String::new());
        }
    }

    /// Total number of declarations across both groups.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A located `package.json` on disk.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    path: PathBuf,
}

impl ProjectManifest {
    /// Search upward from `start` for `package.json`.
    pub fn find(start: &Path) -> MpmResult<Self> {
        let dir = find_ancestor_with(start, MANIFEST_NAME).ok_or_else(|| {
            MpmError::MissingManifest {
                filename: MANIFEST_NAME.to_string(),
                dir: start.to_path_buf(),
            }
        })?;
        Ok(Self {
            path: dir.join(MANIFEST_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory containing the manifest.
    pub fn root(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Read the `dependencies` and `devDependencies` groups.
    pub fn dependencies_map(&self) -> MpmResult<DependenciesMap> {
        let document = self.read_document()?;
        serde_json::from_value(Value::Object(document)).map_err(|e| {
            MpmError::Manifest {
                message: format!("Invalid dependency declarations: {e}"),
            }
            .into()
        })
    }

    /// Write both dependency groups back, leaving every other field untouched.
    ///
    /// Groups are written key-sorted; empty groups are removed.
    pub fn write_dependencies_map(&self, map: &DependenciesMap) -> MpmResult<()> {
        let mut document = self.read_document()?;

        for group in [DependencyGroup::Dependencies, DependencyGroup::DevDependencies] {
            match map.group(group).filter(|deps| !deps.is_empty()) {
                Some(deps) => {
                    let sorted: Map<String, Value> = deps
                        .iter()
                        .map(|(name, constraint)| (name.clone(), Value::String(constraint.clone())))
                        .collect();
                    document.insert(group.key().to_string(), Value::Object(sorted));
                }
                None => {
                    document.shift_remove(group.key());
                }
            }
        }

        let mut content =
            serde_json::to_string_pretty(&Value::Object(document)).map_err(|e| {
                MpmError::Manifest {
                    message: format!("Failed to serialize {MANIFEST_NAME}: {e}"),
                }
            })?;
        content.push('\n');
        std::fs::write(&self.path, content).map_err(MpmError::Io)?;
        tracing::debug!(path = %self.path.display(), "wrote dependency groups");
        Ok(())
    }

    fn read_document(&self) -> MpmResult<Map<String, Value>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| MpmError::Manifest {
            message: format!("Failed to read {}: {e}", self.path.display()),
        })?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(MpmError::Manifest {
                message: format!("{} must contain a JSON object", self.path.display()),
            }
            .into()),
            Err(e) => Err(MpmError::Manifest {
                message: format!("Failed to parse {}: {e}", self.path.display()),
            }
            .into()),
        }
    }
}
