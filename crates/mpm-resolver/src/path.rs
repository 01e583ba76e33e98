//! The chain of packages leading from the project root to the package being
//! resolved.
//!
//! Paths are immutable: [`AncestorPath::push`] returns a new path sharing the
//! existing frames, so sibling branches resolved concurrently never observe
//! each other's frames.

use std::fmt;
use std::sync::Arc;

use mpm_core::package::Dependencies;

use crate::version;

/// One resolved package on the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorFrame {
    pub name: String,
    pub version: String,
    pub dependencies: Dependencies,
}

/// Root-to-node sequence of frames. The project root itself is not a frame.
#[derive(Debug, Clone, Default)]
pub struct AncestorPath {
    frames: Vec<Arc<AncestorFrame>>,
}

impl AncestorPath {
    /// The empty path of a root dependency.
    pub fn root() -> Self {
        Self::default()
    }

    /// A new path extended by `frame`.
    pub fn push(&self, frame: AncestorFrame) -> Self {
        let mut frames = Vec::with_capacity(self.frames.len() + 1);
        frames.extend(self.frames.iter().cloned());
        frames.push(Arc::new(frame));
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The immediate parent: the last frame.
    pub fn parent(&self) -> Option<&AncestorFrame> {
        self.frames.last().map(|f| f.as_ref())
    }

    pub fn frames(&self) -> impl Iterator<Item = &AncestorFrame> {
        self.frames.iter().map(|f| f.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.frames().map(|f| f.name.as_str()).collect()
    }

    /// Cycle guard: whether some ancestor already is `name` at a version
    /// satisfying `constraint`.
    pub fn has_compatible(&self, name: &str, constraint: &str) -> bool {
        self.frames()
            .any(|f| f.name == name && version::satisfies(&f.version, constraint))
    }

    /// The first frame, from the root down, under which `version` of `name`
    /// can live: one that does not declare `name` (an empty declaration
    /// counts as none) or whose declared range accepts `version`.
    ///
    /// `None` means every ancestor declares `name` at an incompatible range.
    pub fn attachment_index(&self, name: &str, version: &str) -> Option<usize> {
        self.frames().position(|f| match f.dependencies.get(name) {
            None => true,
            Some(declared) if declared.is_empty() => true,
            Some(declared) => version::satisfies(version, declared),
        })
    }

    /// `node_modules`-relative parent path for a nested copy attached at
    /// `attachment`.
    ///
    /// Takes the ancestor names from two frames above the attachment point to
    /// the end of the path. When that offset falls before the root it counts
    /// back from the end of the path instead, clamped to the first frame.
    pub fn nested_parent(&self, attachment: usize) -> String {
        let len = self.frames.len() as isize;
        let offset = attachment as isize - 2;
        let start = if offset < 0 {
            (len + offset).max(0)
        } else {
            offset.min(len)
        };
        self.names()[start as usize..].join("/node_modules/")
    }
}

impl fmt::Display for AncestorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return f.write_str("<root>");
        }
        let rendered: Vec<String> = self
            .frames()
            .map(|frame| format!("{}@{}", frame.name, frame.version))
            .collect();
        f.write_str(&rendered.join(" > "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, version: &str, deps: &[(&str, &str)]) -> AncestorFrame {
        AncestorFrame {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: deps
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
        }
    }

    #[test]
    fn push_does_not_alias() {
        let base = AncestorPath::root().push(frame("a", "1.0.0", &[]));
        let left = base.push(frame("b", "1.0.0", &[]));
        let right = base.push(frame("c", "1.0.0", &[]));
        assert_eq!(base.names(), vec!["a"]);
        assert_eq!(left.names(), vec!["a", "b"]);
        assert_eq!(right.names(), vec!["a", "c"]);
        assert_eq!(right.parent().unwrap().name, "c");
    }

    #[test]
    fn cycle_guard_requires_compatible_version() {
        let path = AncestorPath::root()
            .push(frame("a", "1.2.0", &[("b", "^1.0.0")]))
            .push(frame("b", "1.0.0", &[("a", "^1.0.0")]));
        assert!(path.has_compatible("a", "^1.0.0"));
        assert!(!path.has_compatible("a", "^2.0.0"));
        assert!(!path.has_compatible("c", ""));
    }

    #[test]
    fn attachment_skips_incompatible_declarations() {
        let path = AncestorPath::root()
            .push(frame("a", "1.0.0", &[("x", "^2.0.0")]))
            .push(frame("b", "1.0.0", &[("x", "^2.0.0")]))
            .push(frame("c", "1.0.0", &[("x", "^1.0.0")]));
        assert_eq!(path.attachment_index("x", "1.5.0"), Some(2));
        assert_eq!(path.attachment_index("x", "2.1.0"), Some(0));
        assert_eq!(path.attachment_index("x", "3.0.0"), None);
        assert_eq!(path.attachment_index("y", "3.0.0"), Some(0));
    }

    #[test]
    fn empty_declaration_is_an_attachment_point() {
        let path = AncestorPath::root().push(frame("a", "1.0.0", &[("x", "")]));
        assert_eq!(path.attachment_index("x", "9.9.9"), Some(0));
    }

    #[test]
    fn nested_parent_offsets() {
        let path = AncestorPath::root()
            .push(frame("a", "1.0.0", &[]))
            .push(frame("b", "1.0.0", &[]))
            .push(frame("c", "1.0.0", &[]))
            .push(frame("d", "1.0.0", &[]));
        // offsets before the root count back from the end
        assert_eq!(path.nested_parent(0), "c/node_modules/d");
        assert_eq!(path.nested_parent(1), "d");
        assert_eq!(path.nested_parent(2), "a/node_modules/b/node_modules/c/node_modules/d");
        assert_eq!(path.nested_parent(3), "b/node_modules/c/node_modules/d");

        let short = AncestorPath::root().push(frame("only", "1.0.0", &[]));
        assert_eq!(short.nested_parent(0), "only");
    }

    #[test]
    fn display_renders_chain() {
        assert_eq!(AncestorPath::root().to_string(), "<root>");
        let path = AncestorPath::root()
            .push(frame("a", "1.0.0", &[]))
            .push(frame("b", "2.0.0", &[]));
        assert_eq!(path.to_string(), "a@1.0.0 > b@2.0.0");
    }
}
