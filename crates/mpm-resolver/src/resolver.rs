//! Core dependency resolution: level-by-level expansion with concurrent
//! manifest fetches and a single writer for placement and lock state.
//!
//! Every request carries its own [`AncestorPath`]. The requests of one depth
//! level are fetched concurrently; once all of them are in, they are settled
//! one at a time in a fixed order (roots in manifest order, children in the
//! order their parents were settled, siblings by name). Settling selects a
//! version, places it, stages a lock entry, and queues the children for the
//! next level. Nothing reaches the caller's [`LockStore`] until the whole
//! run has succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use mpm_core::lockfile::{LockEntry, LockStore};
use mpm_core::manifest::{DependenciesMap, DependencyGroup};
use mpm_core::package::{Dependencies, PackageManifest, VersionManifest};
use mpm_util::errors::{MpmError, MpmResult};

use crate::path::{AncestorFrame, AncestorPath};
use crate::placement::{Placement, PlacementResult};
use crate::source::{ManifestCache, ManifestSource};
use crate::version;

const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// The output of one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub placement: PlacementResult,
    /// Ranges chosen for root dependencies that were declared without one.
    pub inferred: Vec<InferredRange>,
}

/// `^version` for a root dependency declared with an empty constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredRange {
    pub group: DependencyGroup,
    pub name: String,
    pub range: String,
}

impl Resolution {
    /// Write inferred ranges back into the groups they came from.
    pub fn apply_inferred(&self, map: &mut DependenciesMap) {
        for inferred in &self.inferred {
            map.group_mut(inferred.group)
                .insert(inferred.name.clone(), inferred.range.clone());
        }
    }
}

/// One `name@constraint` to resolve, and where in the graph it was declared.
#[derive(Debug, Clone)]
struct Request {
    name: String,
    constraint: String,
    path: AncestorPath,
    /// Set for root dependencies only.
    group: Option<DependencyGroup>,
}

/// Manifest data a request is resolved against.
enum Candidates {
    /// A lock entry: exactly one version, taken as authoritative.
    Locked(LockEntry),
    Fetched(Arc<PackageManifest>),
}

impl Candidates {
    fn select(&self, name: &str, constraint: &str) -> MpmResult<(String, VersionManifest)> {
        let chosen = match self {
            Candidates::Locked(entry) => version::select([entry.version.as_str()], constraint)
                .map(|v| (v.to_string(), entry.to_version_manifest())),
            Candidates::Fetched(manifest) => {
                version::select(manifest.version_strings(), constraint).and_then(|v| {
                    manifest
                        .get(v)
                        .map(|meta| (v.to_string(), meta.clone()))
                })
            }
        };
        chosen.ok_or_else(|| {
            MpmError::UnsatisfiableConstraint {
                name: name.to_string(),
                constraint: constraint.to_string(),
            }
            .into()
        })
    }
}

/// Mutable state of one run. Owned by the run; dropped on failure.
struct Session<'a> {
    lock: &'a LockStore,
    staged: BTreeMap<String, LockEntry>,
    placement: PlacementResult,
    inferred: Vec<InferredRange>,
}

impl<'a> Session<'a> {
    fn new(lock: &'a LockStore) -> Self {
        Self {
            lock,
            staged: BTreeMap::new(),
            placement: PlacementResult::new(),
            inferred: Vec::new(),
        }
    }

    /// Entries written earlier in this run take precedence over the store.
    fn lookup(&self, name: &str, constraint: &str) -> Option<&LockEntry> {
        self.staged
            .get(&LockStore::key(name, constraint))
            .or_else(|| self.lock.lookup(name, constraint))
    }

    /// Resolve one request against its candidates and return the child
    /// requests to expand next.
    fn settle(&mut self, request: Request, candidates: &Candidates) -> MpmResult<Vec<Request>> {
        let Request {
            name,
            constraint,
            path,
            group,
        } = request;
        let (version, meta) = candidates.select(&name, &constraint)?;
        tracing::debug!(package = %name, constraint = %constraint, version = %version, path = %path, "resolving");

        let outcome = self
            .placement
            .place(&name, &constraint, &version, &meta.dist.tarball, &path)?;

        if constraint.is_empty() {
            if let Some(group) = group {
                self.inferred.push(InferredRange {
                    group,
                    name: name.clone(),
                    range: format!("^{version}"),
                });
            }
        }

        self.staged.insert(
            LockStore::key(&name, &constraint),
            LockEntry::from_manifest(&version, &meta),
        );

        // the shared copy's children were expanded when it was placed
        if outcome == Placement::Reused {
            return Ok(Vec::new());
        }

        let Some(dependencies) = meta.dependencies else {
            return Ok(Vec::new());
        };
        let child_path = path.push(AncestorFrame {
            name,
            version,
            dependencies: dependencies.clone(),
        });
        let children = dependencies
            .into_iter()
            .filter(|(child, child_constraint)| {
                let satisfied = child_path.has_compatible(child, child_constraint);
                if satisfied {
                    tracing::trace!(package = %child, "satisfied by an ancestor, skipping");
                }
                !satisfied
            })
            .map(|(child, child_constraint)| Request {
                name: child,
                constraint: child_constraint,
                path: child_path.clone(),
                group: None,
            })
            .collect();
        Ok(children)
    }

    fn finish(self) -> (BTreeMap<String, LockEntry>, Resolution) {
        (
            self.staged,
            Resolution {
                placement: self.placement,
                inferred: self.inferred,
            },
        )
    }
}

/// Resolves dependency declarations against a [`ManifestSource`].
///
/// Manifests are cached for the lifetime of the resolver, so resolving
/// several times with one resolver fetches each package at most once.
pub struct Resolver<S> {
    cache: Arc<ManifestCache<S>>,
    max_concurrent_fetches: usize,
}

impl<S: ManifestSource + 'static> Resolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            cache: Arc::new(ManifestCache::new(source)),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }

    /// Cap the number of manifest fetches in flight at once.
    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit.max(1);
        self
    }

    /// Resolve a single map of root dependencies.
    ///
    /// On success the lock entries written during the run are committed to
    /// `lock`. On failure `lock` is left untouched.
    pub async fn resolve(
        &self,
        lock: &mut LockStore,
        roots: &Dependencies,
    ) -> MpmResult<Resolution> {
        let requests = roots
            .iter()
            .map(|(name, constraint)| root_request(DependencyGroup::Dependencies, name, constraint))
            .collect();
        self.run(lock, requests).await
    }

    /// Resolve both dependency groups of a project manifest in one run.
    pub async fn resolve_project(
        &self,
        lock: &mut LockStore,
        map: &DependenciesMap,
    ) -> MpmResult<Resolution> {
        let requests = map
            .iter()
            .map(|(group, name, constraint)| root_request(group, name, constraint))
            .collect();
        self.run(lock, requests).await
    }

    async fn run(&self, lock: &mut LockStore, roots: Vec<Request>) -> MpmResult<Resolution> {
        let (staged, resolution) = {
            let mut session = Session::new(lock);
            let mut level = roots;
            let mut depth = 0usize;
            while !level.is_empty() {
                tracing::debug!(depth, requests = level.len(), "resolving level");
                let candidates = self.gather(&session, &level).await?;
                let mut next = Vec::new();
                for (request, candidates) in level.into_iter().zip(candidates) {
                    next.extend(session.settle(request, &candidates)?);
                }
                level = next;
                depth += 1;
            }
            session.finish()
        };

        for (key, entry) in staged {
            lock.upsert_key(key, entry);
        }
        tracing::info!(
            top_level = resolution.placement.top_level.len(),
            nested = resolution.placement.conflicts.len(),
            "resolution complete"
        );
        Ok(resolution)
    }

    /// Collect candidates for every request of a level, in request order.
    ///
    /// Lock hits are answered immediately; everything else is fetched
    /// concurrently. The first failure aborts the remaining fetches.
    async fn gather(&self, session: &Session<'_>, level: &[Request]) -> MpmResult<Vec<Candidates>> {
        let mut slots: Vec<Option<Candidates>> = Vec::with_capacity(level.len());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_fetches));
        let mut join_set = JoinSet::new();

        for (index, request) in level.iter().enumerate() {
            if let Some(entry) = session.lookup(&request.name, &request.constraint) {
                tracing::debug!(package = %request.name, constraint = %request.constraint, "lock hit");
                slots.push(Some(Candidates::Locked(entry.clone())));
                continue;
            }
            slots.push(None);
            let cache = self.cache.clone();
            let sem = semaphore.clone();
            let name = request.name.clone();
            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await;
                (index, cache.get(&name).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| MpmError::Resolution {
                message: format!("Manifest fetch task failed: {e}"),
            })?;
            match result {
                Ok(manifest) => slots[index] = Some(Candidates::Fetched(manifest)),
                Err(err) => {
                    join_set.abort_all();
                    return Err(err);
                }
            }
        }

        slots
            .into_iter()
            .zip(level)
            .map(|(slot, request)| {
                slot.ok_or_else(|| {
                    MpmError::Resolution {
                        message: format!("No manifest was gathered for {}", request.name),
                    }
                    .into()
                })
            })
            .collect()
    }
}

fn root_request(group: DependencyGroup, name: &str, constraint: &str) -> Request {
    Request {
        name: name.to_string(),
        constraint: constraint.to_string(),
        path: AncestorPath::root(),
        group: Some(group),
    }
}
