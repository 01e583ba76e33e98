//! Operation: resolve the project's dependencies, update the lockfile, and
//! unpack every package into `node_modules`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use mpm_core::config::GlobalConfig;
use mpm_core::lockfile::LockStore;
use mpm_core::manifest::{DependenciesMap, DependencyGroup, ProjectManifest};
use mpm_registry::download;
use mpm_registry::install::Installer;
use mpm_registry::registry::RegistryClient;
use mpm_resolver::placement::InstallTarget;
use mpm_resolver::resolver::{Resolution, Resolver};
use mpm_util::errors::MpmError;
use mpm_util::progress::{progress_bar, spinner, status, status_warn};

/// What `mpm install` was asked to do.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Packages to add, unpinned, before resolving.
    pub packages: Vec<String>,
    /// Add `packages` to `devDependencies` instead of `dependencies`.
    pub save_dev: bool,
    /// Leave `devDependencies` out of resolution and installation.
    pub production: bool,
    pub verbose: bool,
}

/// The result of a successful install.
#[derive(Debug)]
pub struct InstallSummary {
    pub resolution: Resolution,
    pub lockfile: PathBuf,
    pub installed: usize,
}

/// Install the dependencies of the project containing `start`.
pub async fn install(start: &Path, opts: &InstallOptions) -> miette::Result<InstallSummary> {
    let manifest = ProjectManifest::find(start)?;
    let root = manifest.root().to_path_buf();
    let mut map = manifest.dependencies_map()?;
    let group = if opts.save_dev {
        DependencyGroup::DevDependencies
    } else {
        DependencyGroup::Dependencies
    };
    map.add_packages(&opts.packages, group);
    let roots = resolution_roots(&map, opts.production);

    let config = GlobalConfig::load()?;
    let mut lock = LockStore::load(&root)?;
    let client = download::build_client(Duration::from_secs(config.network.timeout_secs))?;
    let resolver = Resolver::new(RegistryClient::new(client.clone(), config.registry_url()))
        .with_max_concurrent_fetches(config.network.max_concurrent_fetches);

    let sp = spinner(&format!("Resolving {} dependencies...", roots.len()));
    let resolved = resolver.resolve_project(&mut lock, &roots).await;
    sp.finish_and_clear();
    let resolution = resolved?;

    // written before any download, so a failed install still keeps the new resolution
    let lockfile = lock.persist(&root)?;
    status(
        "Locked",
        &format!("{} entries in {}", lock.len(), lockfile.display()),
    );
    if opts.verbose {
        eprintln!("{}", resolution.placement);
    } else if !resolution.placement.conflicts.is_empty() {
        status_warn(
            "Nested",
            &format!(
                "{} packages need their own copy (run with --verbose for details)",
                resolution.placement.conflicts.len()
            ),
        );
    }

    let installer = Installer::new(client, &root);
    let integrity = integrity_index(&lock);
    let targets = resolution.placement.install_targets();
    let pb = progress_bar(targets.len() as u64, "Installing");
    let mut installed = 0;
    for wave in install_waves(targets) {
        installed += install_wave(
            &installer,
            wave,
            &integrity,
            config.network.max_concurrent_fetches,
            &pb,
        )
        .await
        .inspect_err(|_| pb.abandon())?;
    }
    pb.finish_and_clear();

    resolution.apply_inferred(&mut map);
    manifest.write_dependencies_map(&map)?;

    status("Installed", &format!("{installed} packages"));
    Ok(InstallSummary {
        resolution,
        lockfile,
        installed,
    })
}

/// The declarations that take part in resolution.
pub fn resolution_roots(map: &DependenciesMap, production: bool) -> DependenciesMap {
    let mut roots = map.clone();
    if production {
        roots.dev_dependencies = None;
    }
    roots
}

/// Tarball URL to expected SHA-1, from the lock entries.
pub fn integrity_index(lock: &LockStore) -> HashMap<String, String> {
    lock.entries()
        .values()
        .filter(|entry| !entry.integrity.is_empty())
        .map(|entry| (entry.resolved.clone(), entry.integrity.clone()))
        .collect()
}

/// Group targets by nesting depth, shallowest first.
///
/// Unpacking replaces the destination directory, so a package must be in
/// place before anything nested inside it is unpacked.
pub fn install_waves(targets: Vec<InstallTarget>) -> Vec<Vec<InstallTarget>> {
    let mut waves: BTreeMap<usize, Vec<InstallTarget>> = BTreeMap::new();
    for target in targets {
        let depth = if target.location.is_empty() {
            0
        } else {
            target.location.matches("node_modules").count()
        };
        waves.entry(depth).or_default().push(target);
    }
    waves.into_values().collect()
}

async fn install_wave(
    installer: &Installer,
    targets: Vec<InstallTarget>,
    integrity: &HashMap<String, String>,
    limit: usize,
    pb: &ProgressBar,
) -> miette::Result<usize> {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut join_set = JoinSet::new();

    for target in targets {
        let installer = installer.clone();
        let sem = semaphore.clone();
        let digest = integrity.get(&target.url).cloned().unwrap_or_default();
        join_set.spawn(async move {
            let _permit = sem.acquire_owned().await;
            installer.install(&target, &digest).await.map(|_| target)
        });
    }

    let mut installed = 0;
    while let Some(joined) = join_set.join_next().await {
        let result = joined.map_err(|e| MpmError::Generic {
            message: format!("Install task failed: {e}"),
        })?;
        match result {
            Ok(target) => {
                tracing::info!(package = %target.name, location = %target.location, "installed");
                pb.set_message(target.name);
                pb.inc(1);
                installed += 1;
            }
            Err(err) => {
                join_set.abort_all();
                return Err(err);
            }
        }
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpm_core::lockfile::LockEntry;

    fn target(name: &str, location: &str) -> InstallTarget {
        InstallTarget {
            name: name.to_string(),
            url: format!("u:{name}"),
            location: location.to_string(),
        }
    }

    #[test]
    fn waves_order_by_depth() {
        let waves = install_waves(vec![
            target("y", "node_modules/b/node_modules/x"),
            target("x", "node_modules/b"),
            target("b", ""),
            target("c", ""),
        ]);
        let names: Vec<Vec<&str>> = waves
            .iter()
            .map(|wave| wave.iter().map(|t| t.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["b", "c"], vec!["x"], vec!["y"]]);
    }

    #[test]
    fn production_drops_dev_group_from_resolution_only() {
        let mut map = DependenciesMap::default();
        map.group_mut(DependencyGroup::Dependencies)
            .insert("a".to_string(), "^1.0.0".to_string());
        map.group_mut(DependencyGroup::DevDependencies)
            .insert("jest".to_string(), "^29.0.0".to_string());

        let roots = resolution_roots(&map, true);
        assert!(roots.dev_dependencies.is_none());
        assert_eq!(roots.len(), 1);
        assert_eq!(map.len(), 2);
        assert_eq!(resolution_roots(&map, false), map);
    }

    #[test]
    fn integrity_is_keyed_by_tarball() {
        let mut lock = LockStore::new();
        lock.upsert(
            "a",
            "^1.0.0",
            LockEntry {
                version: "1.0.0".to_string(),
                resolved: "u:a-1.0.0".to_string(),
                integrity: "abc".to_string(),
                dependencies: None,
            },
        );
        lock.upsert(
            "b",
            "^1.0.0",
            LockEntry {
                version: "1.0.0".to_string(),
                resolved: "u:b-1.0.0".to_string(),
                integrity: String::new(),
                dependencies: None,
            },
        );
        let index = integrity_index(&lock);
        assert_eq!(index.len(), 1);
        assert_eq!(index["u:a-1.0.0"], "abc");
    }
}
