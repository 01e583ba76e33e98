//! Where each resolved package gets installed: one shared top-level copy per
//! name, plus nested copies for requirements the shared copy can't satisfy.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use mpm_util::errors::{MpmError, MpmResult};

use crate::path::AncestorPath;
use crate::version;

/// The single shared install chosen for a package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelEntry {
    pub url: String,
    pub version: String,
}

/// A second copy of a package nested beneath `parent`.
///
/// `parent` is a `node_modules`-relative chain such as
/// `a/node_modules/b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub name: String,
    pub parent: String,
    pub url: String,
}

/// The outcome of one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementResult {
    pub top_level: BTreeMap<String, TopLevelEntry>,
    pub conflicts: Vec<ConflictEntry>,
}

/// A single download-and-unpack job derived from a placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub name: String,
    pub url: String,
    /// Project-relative directory whose `node_modules` receives the package;
    /// empty for top-level installs.
    pub location: String,
}

/// What [`PlacementResult::place`] decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// First sighting of the name: it became the shared copy.
    TopLevel,
    /// A nested copy was recorded under `parent`.
    Nested { parent: String },
    /// The shared copy serves this request; nothing was recorded.
    Reused,
}

impl PlacementResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide where `version` of `name`, requested with `constraint` along
    /// `path`, goes.
    ///
    /// A name that already has a top-level copy satisfying `constraint` is
    /// nested under the first ancestor that can host `version` (see
    /// [`AncestorPath::attachment_index`]), or reused when no ancestor can.
    /// A top-level copy that does not satisfy `constraint` forces a nested
    /// copy under the immediate parent; the existing top-level entry is never
    /// replaced.
    pub fn place(
        &mut self,
        name: &str,
        constraint: &str,
        version: &str,
        url: &str,
        path: &AncestorPath,
    ) -> MpmResult<Placement> {
        let existing = match self.top_level.get(name) {
            Some(entry) => entry.version.clone(),
            None => {
                self.top_level.insert(
                    name.to_string(),
                    TopLevelEntry {
                        url: url.to_string(),
                        version: version.to_string(),
                    },
                );
                return Ok(Placement::TopLevel);
            }
        };

        let parent = if version::satisfies(&existing, constraint) {
            match path.attachment_index(name, version) {
                Some(index) => path.nested_parent(index),
                None => return Ok(Placement::Reused),
            }
        } else {
            match path.parent() {
                Some(frame) => frame.name.clone(),
                None => {
                    return Err(MpmError::Resolution {
                        message: format!(
                            "{name} is required at '{constraint}' by the project, \
                             but {name}@{existing} is already installed at the top level"
                        ),
                    }
                    .into())
                }
            }
        };

        tracing::debug!(package = name, version, parent = %parent, "nested placement");
        self.conflicts.push(ConflictEntry {
            name: name.to_string(),
            parent: parent.clone(),
            url: url.to_string(),
        });
        Ok(Placement::Nested { parent })
    }

    /// Number of packages to install.
    pub fn len(&self) -> usize {
        self.top_level.len() + self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top_level.is_empty() && self.conflicts.is_empty()
    }

    /// Top-level installs first, then nested ones in the order they were
    /// recorded.
    ///
    /// Each destination gets exactly one job. When several conflicts nest the
    /// same name under the same parent, the last one recorded wins and keeps
    /// the position of the first.
    pub fn install_targets(&self) -> Vec<InstallTarget> {
        let mut targets: Vec<InstallTarget> = self
            .top_level
            .iter()
            .map(|(name, entry)| InstallTarget {
                name: name.clone(),
                url: entry.url.clone(),
                location: String::new(),
            })
            .collect();
        let mut slots: HashMap<(String, String), usize> = HashMap::new();
        for conflict in &self.conflicts {
            let target = InstallTarget {
                name: conflict.name.clone(),
                url: conflict.url.clone(),
                location: format!("node_modules/{}", conflict.parent),
            };
            let key = (target.location.clone(), target.name.clone());
            match slots.get(&key) {
                Some(&index) => {
                    if targets[index].url != target.url {
                        tracing::warn!(
                            package = %target.name,
                            location = %target.location,
                            replaced = %targets[index].url,
                            url = %target.url,
                            "two nested copies share a destination"
                        );
                    }
                    targets[index] = target;
                }
                None => {
                    slots.insert(key, targets.len());
                    targets.push(target);
                }
            }
        }
        targets
    }
}

impl fmt::Display for PlacementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Top-level packages ({}):", self.top_level.len())?;
        for (name, entry) in &self.top_level {
            writeln!(f, "  {name}@{}", entry.version)?;
        }
        if self.conflicts.is_empty() {
            return write!(f, "No nested packages.");
        }
        writeln!(f, "Nested packages ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ConflictEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} under {} ({})", self.name, self.parent, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::AncestorFrame;

    fn frame(name: &str, deps: &[(&str, &str)]) -> AncestorFrame {
        AncestorFrame {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            dependencies: deps
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
        }
    }

    #[test]
    fn first_sighting_goes_top_level() {
        let mut result = PlacementResult::new();
        let outcome = result
            .place("c", "^2.0.0", "2.1.0", "u:c-2.1.0", &AncestorPath::root())
            .unwrap();
        assert_eq!(outcome, Placement::TopLevel);
        assert_eq!(result.top_level["c"].version, "2.1.0");
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn incompatible_top_level_nests_under_parent() {
        let mut result = PlacementResult::new();
        result
            .place("c", "^2.0.0", "2.1.0", "u:c-2.1.0", &AncestorPath::root())
            .unwrap();
        let path = AncestorPath::root().push(frame("b", &[("c", "^1.0.0")]));
        let outcome = result
            .place("c", "^1.0.0", "1.4.0", "u:c-1.4.0", &path)
            .unwrap();
        assert_eq!(
            outcome,
            Placement::Nested {
                parent: "b".to_string()
            }
        );
        assert_eq!(result.top_level["c"].version, "2.1.0");
        assert_eq!(
            result.conflicts,
            vec![ConflictEntry {
                name: "c".to_string(),
                parent: "b".to_string(),
                url: "u:c-1.4.0".to_string(),
            }]
        );
    }

    #[test]
    fn compatible_top_level_at_root_is_reused() {
        let mut result = PlacementResult::new();
        result
            .place("c", "^1.0.0", "1.4.0", "u:c-1.4.0", &AncestorPath::root())
            .unwrap();
        let outcome = result
            .place("c", "^1.2.0", "1.4.0", "u:c-1.4.0", &AncestorPath::root())
            .unwrap();
        assert_eq!(outcome, Placement::Reused);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn compatible_top_level_below_root_nests_at_attachment() {
        let mut result = PlacementResult::new();
        result
            .place("x", "^1.0.0", "1.4.0", "u:x-1.4.0", &AncestorPath::root())
            .unwrap();
        let path = AncestorPath::root()
            .push(frame("a", &[]))
            .push(frame("b", &[("x", "^1.0.0")]));
        let outcome = result
            .place("x", "^1.0.0", "1.4.0", "u:x-1.4.0", &path)
            .unwrap();
        assert_eq!(
            outcome,
            Placement::Nested {
                parent: "a/node_modules/b".to_string()
            }
        );
    }

    #[test]
    fn root_level_incompatibility_is_an_error() {
        let mut result = PlacementResult::new();
        result
            .place("c", "^2.0.0", "2.1.0", "u:c-2.1.0", &AncestorPath::root())
            .unwrap();
        let err = result
            .place("c", "^1.0.0", "1.4.0", "u:c-1.4.0", &AncestorPath::root())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MpmError>(),
            Some(MpmError::Resolution { .. })
        ));
        assert_eq!(result.top_level["c"].version, "2.1.0");
    }

    #[test]
    fn install_targets_dedupe_nested_jobs() {
        let mut result = PlacementResult::new();
        result.top_level.insert(
            "c".to_string(),
            TopLevelEntry {
                url: "u:c-2".to_string(),
                version: "2.0.0".to_string(),
            },
        );
        for _ in 0..2 {
            result.conflicts.push(ConflictEntry {
                name: "c".to_string(),
                parent: "b".to_string(),
                url: "u:c-1".to_string(),
            });
        }
        let targets = result.install_targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].location, "");
        assert_eq!(targets[1].location, "node_modules/b");
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn install_targets_keep_one_job_per_destination() {
        let mut result = PlacementResult::new();
        for (name, parent, url) in [
            ("x", "b", "u:x-1"),
            ("y", "b", "u:y-1"),
            ("x", "b", "u:x-2"),
            ("x", "d", "u:x-1"),
        ] {
            result.conflicts.push(ConflictEntry {
                name: name.to_string(),
                parent: parent.to_string(),
                url: url.to_string(),
            });
        }
        let targets = result.install_targets();
        let jobs: Vec<(&str, &str, &str)> = targets
            .iter()
            .map(|t| (t.name.as_str(), t.location.as_str(), t.url.as_str()))
            .collect();
        assert_eq!(
            jobs,
            vec![
                ("x", "node_modules/b", "u:x-2"),
                ("y", "node_modules/b", "u:y-1"),
                ("x", "node_modules/d", "u:x-1"),
            ]
        );
    }

    #[test]
    fn display_lists_both_sections() {
        let mut result = PlacementResult::new();
        result
            .place("c", "^2.0.0", "2.1.0", "u:c-2.1.0", &AncestorPath::root())
            .unwrap();
        let s = result.to_string();
        assert!(s.contains("Top-level packages (1):"));
        assert!(s.contains("c@2.1.0"));
        assert!(s.ends_with("No nested packages."));
    }
}
