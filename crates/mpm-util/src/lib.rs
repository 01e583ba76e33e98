//! Shared utilities for mpm.
//!
//! This crate provides cross-cutting concerns used by all other mpm crates:
//! error types, filesystem helpers, content hashing, and terminal progress
//! indicators.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod progress;
