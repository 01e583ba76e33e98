//! Dependency resolution engine: npm-style range matching, concurrent
//! transitive expansion, top-level/nested placement, and lock-state updates.

pub mod path;
pub mod placement;
pub mod resolver;
pub mod source;
pub mod version;
