//! Core data types for mpm.
//!
//! This crate defines the types shared by the resolver, the registry client
//! and the install operation: the project manifest (`package.json`), the
//! registry's per-package manifests, the lock store, and global configuration.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod config;
pub mod lockfile;
pub mod manifest;
pub mod package;
