use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all mpm operations.
#[derive(Debug, Error, Diagnostic)]
pub enum MpmError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The project manifest could not be located.
    #[error("Could not find {filename} in {} or any parent directory", dir.display())]
    #[diagnostic(help("Create a package.json in the project root first"))]
    MissingManifest { filename: String, dir: PathBuf },

    /// Invalid or malformed project manifest (package.json).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your package.json for syntax errors"))]
    Manifest { message: String },

    /// The persisted lockfile could not be parsed.
    #[error("Failed to parse lockfile {}: {message}", path.display())]
    #[diagnostic(help("Delete the lockfile to re-resolve every dependency from the registry"))]
    MalformedLockFile { path: PathBuf, message: String },

    /// No published version satisfies a requested constraint.
    #[error("No version of {name} satisfies '{constraint}'")]
    UnsatisfiableConstraint { name: String, constraint: String },

    /// The manifest source could not provide a package manifest.
    #[error("Failed to fetch manifest for {name}: {message}")]
    Fetch { name: String, message: String },

    /// Dependency resolution failed for a reason other than a missing version.
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// Network request or download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Unpacking a package into node_modules failed.
    #[error("Failed to install {name}: {message}")]
    Install { name: String, message: String },

    /// Global configuration could not be read.
    #[error("Config error: {message}")]
    #[diagnostic(help("Check ~/.mpm/config.toml for syntax errors"))]
    Config { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type MpmResult<T> = miette::Result<T>;
