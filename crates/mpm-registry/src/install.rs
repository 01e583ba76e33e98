//! Download package tarballs and unpack them into `node_modules`.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use reqwest::Client;

use mpm_resolver::placement::InstallTarget;
use mpm_util::errors::{MpmError, MpmResult};
use mpm_util::fs::ensure_dir;
use mpm_util::hash;

use crate::download;

/// Installs packages beneath one project root.
#[derive(Debug, Clone)]
pub struct Installer {
    client: Client,
    project_root: PathBuf,
}

impl Installer {
    pub fn new(client: Client, project_root: &Path) -> Self {
        Self {
            client,
            project_root: project_root.to_path_buf(),
        }
    }

    /// `<root>/<location>/node_modules/<name>`.
    pub fn destination(&self, target: &InstallTarget) -> PathBuf {
        let mut dest = self.project_root.clone();
        if !target.location.is_empty() {
            dest.push(&target.location);
        }
        dest.join("node_modules").join(&target.name)
    }

    /// Download `target`, check it against `integrity` (a SHA-1 hex digest;
    /// empty skips the check), and unpack it. Returns the package directory.
    pub async fn install(&self, target: &InstallTarget, integrity: &str) -> MpmResult<PathBuf> {
        let bytes = download::download_bytes(&self.client, &target.url)
            .await?
            .ok_or_else(|| MpmError::Install {
                name: target.name.clone(),
                message: format!("tarball not found at {}", target.url),
            })?;

        let dest = self.destination(target);
        let name = target.name.clone();
        let integrity = integrity.to_string();
        let unpack_dest = dest.clone();
        tokio::task::spawn_blocking(move || extract_verified(&name, &bytes, &integrity, &unpack_dest))
            .await
            .map_err(|e| MpmError::Install {
                name: target.name.clone(),
                message: format!("unpack task failed: {e}"),
            })??;

        tracing::debug!(package = %target.name, dest = %dest.display(), "installed");
        Ok(dest)
    }
}

/// Verify `bytes` and unpack them into `dest`, replacing anything there.
pub fn extract_verified(name: &str, bytes: &[u8], integrity: &str, dest: &Path) -> MpmResult<()> {
    if !integrity.is_empty() && !hash::verify_sha1(bytes, integrity) {
        return Err(MpmError::Install {
            name: name.to_string(),
            message: format!(
                "integrity mismatch: expected {integrity}, got {}",
                hash::sha1_bytes(bytes)
            ),
        }
        .into());
    }
    unpack(bytes, dest).map_err(|e| {
        MpmError::Install {
            name: name.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Unpack a gzipped tarball into `dest`, dropping the leading directory
/// every npm tarball wraps its files in (usually `package/`).
///
/// Entries that would escape `dest` are skipped.
pub fn unpack<R: Read>(tarball: R, dest: &Path) -> std::io::Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    ensure_dir(dest)?;

    let mut archive = tar::Archive::new(GzDecoder::new(tarball));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let Some(relative) = strip_first_component(&entry.path()?) else {
            continue;
        };
        let full_dest = dest.join(relative);

        if entry.header().entry_type().is_dir() {
            ensure_dir(&full_dest)?;
            continue;
        }
        if let Some(parent) = full_dest.parent() {
            ensure_dir(parent)?;
        }
        entry.unpack(&full_dest)?;
    }
    Ok(())
}

fn strip_first_component(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;
    let mut stripped = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => stripped.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}
