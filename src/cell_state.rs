//! `DaemonicCellState`: the concurrent cache + dependency-graph +
//! invalidation engine for one cell.
//!
//! Lock discipline: `lock` is taken for **read** by any operation that
//! only inserts (so concurrent inserters never race an invalidator),
//! and for **write** by `invalidate_path`, which needs exclusive access
//! to cascade across every index and cache atomically. Point reads
//! (`lookup_*`, `path_dependent_present_in`) take no lock at all and
//! rely on the concurrent maps' own lock-free `get`.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use log::{debug, error, trace};
use parking_lot::RwLock;

use crate::config::CellDescriptor;
use crate::dep_index::DependencyIndex;
use crate::error::CacheError;
use crate::manifest::{BuildFileManifest, IdentityTargetParser, PackageFileManifest, TargetParser};
use crate::node::{MaybeIncompatibleTargetNode, UnconfiguredTargetNode};
use crate::node_cache::{AnyNodeCache, CacheKind, ComputedNode, ComputedNodeCache, NodeKey};
use crate::path::AbsPath;
use crate::target::{BuildTarget, UnconfiguredBuildTarget, UnflavoredBuildTarget};

type RawNodeCache = ComputedNodeCache<UnconfiguredBuildTarget, Arc<UnconfiguredTargetNode>>;
type ConfiguredNodeCache = ComputedNodeCache<BuildTarget, Arc<MaybeIncompatibleTargetNode>>;

/// A handle to one of the two mandated computed-node caches, returned by
/// `DaemonicCellState::get_cache`. A tagged variant carrying the cache
/// to operate on, so callers that only know a `CacheKind` at runtime
/// (e.g. a generic resolver dispatch) still get type-checked access.
#[derive(Clone)]
pub enum CacheHandle {
    RawNode(Arc<RawNodeCache>),
    ConfiguredNode(Arc<ConfiguredNodeCache>),
}

impl CacheHandle {
    pub fn kind(&self) -> CacheKind {
        match self {
            CacheHandle::RawNode(cache) => cache.kind(),
            CacheHandle::ConfiguredNode(cache) => cache.kind(),
        }
    }

    /// Pure read; never blocks a writer.
    pub fn lookup(&self, key: &NodeKey) -> Option<ComputedNode> {
        match (self, key) {
            (CacheHandle::RawNode(cache), NodeKey::Raw(k)) => cache.lookup(k).map(ComputedNode::Raw),
            (CacheHandle::ConfiguredNode(cache), NodeKey::Configured(k)) => cache.lookup(k).map(ComputedNode::Configured),
            (handle, key) => panic!(
                "CacheHandle::lookup: key kind {:?} does not match cache kind {:?}",
                key.kind(),
                handle.kind()
            ),
        }
    }

    fn put_if_absent(&self, key: NodeKey, value: ComputedNode, raw_target_set: &DashSet<UnflavoredBuildTarget>) -> ComputedNode {
        match (self, key, value) {
            (CacheHandle::RawNode(cache), NodeKey::Raw(k), ComputedNode::Raw(v)) => {
                ComputedNode::Raw(cache.put_if_absent(k, v, |t| raw_target_set.contains(t)))
            }
            (CacheHandle::ConfiguredNode(cache), NodeKey::Configured(k), ComputedNode::Configured(v)) => {
                ComputedNode::Configured(cache.put_if_absent(k, v, |t| raw_target_set.contains(t)))
            }
            (handle, key, _) => panic!(
                "CacheHandle::put_if_absent: key kind {:?} does not match cache kind {:?}",
                key.kind(),
                handle.kind()
            ),
        }
    }
}

/// The per-cell cache, dependency graph and invalidation engine.
pub struct DaemonicCellState {
    descriptor: RwLock<Arc<CellDescriptor>>,
    /// Guards mutation ordering across every field below. Readers take no
    /// lock; pure inserters take `.read()`; `invalidate_path` takes `.write()`.
    lock: RwLock<()>,

    build_manifests: DashMap<AbsPath, Arc<BuildFileManifest>>,
    package_manifests: DashMap<AbsPath, Arc<PackageFileManifest>>,

    raw_node_cache: Arc<RawNodeCache>,
    configured_node_cache: Arc<ConfiguredNodeCache>,

    raw_target_set: DashSet<UnflavoredBuildTarget>,

    build_dep_index: DependencyIndex,
    package_dep_index: DependencyIndex,

    parser: Arc<dyn TargetParser>,
}

impl DaemonicCellState {
    pub fn new(descriptor: CellDescriptor, parsing_parallelism: usize) -> Self {
        Self::with_parser(descriptor, parsing_parallelism, Arc::new(IdentityTargetParser))
    }

    pub fn with_parser(descriptor: CellDescriptor, parsing_parallelism: usize, parser: Arc<dyn TargetParser>) -> Self {
        DaemonicCellState {
            descriptor: RwLock::new(Arc::new(descriptor)),
            lock: RwLock::new(()),
            build_manifests: DashMap::new(),
            package_manifests: DashMap::new(),
            raw_node_cache: Arc::new(ComputedNodeCache::new(CacheKind::RawNode, parsing_parallelism)),
            configured_node_cache: Arc::new(ComputedNodeCache::new(CacheKind::ConfiguredNode, parsing_parallelism)),
            raw_target_set: DashSet::new(),
            build_dep_index: DependencyIndex::new(),
            package_dep_index: DependencyIndex::new(),
            parser,
        }
    }

    pub fn cell(&self) -> Arc<CellDescriptor> {
        self.descriptor.read().clone()
    }

    pub fn cell_root(&self) -> AbsPath {
        self.cell().root().clone()
    }

    /// Swaps in a new descriptor for this cell (reconfiguration). Does not
    /// touch any cache or index; callers that need a fresh cache after a
    /// root change should construct a new `DaemonicCellState` instead.
    pub fn set_cell(&self, descriptor: CellDescriptor) {
        *self.descriptor.write() = Arc::new(descriptor);
    }

    // ---- Manifest operations ----

    pub fn lookup_build_manifest(&self, path: &AbsPath) -> Option<Arc<BuildFileManifest>> {
        self.build_manifests.get(path).map(|entry| entry.value().clone())
    }

    pub fn lookup_package_manifest(&self, path: &AbsPath) -> Option<Arc<PackageFileManifest>> {
        self.package_manifests.get(path).map(|entry| entry.value().clone())
    }

    pub fn put_build_manifest_if_absent(
        &self,
        path: AbsPath,
        manifest: BuildFileManifest,
        dependents: BTreeSet<AbsPath>,
    ) -> Result<Arc<BuildFileManifest>, CacheError> {
        let _guard = self.lock.read();
        let cell = self.cell();

        // Resolve every raw target up front so a parse failure leaves the
        // fails and the cache is left unchanged when the parser errors.
        let mut targets = Vec::with_capacity(manifest.targets.len());
        for (short_name, node) in manifest.targets.iter() {
            targets.push(self.parser.unflavored_target_from_raw(cell.name(), &node.package_path, short_name, node)?);
        }

        let manifest = Arc::new(manifest);
        let mut won = false;
        let stored = self
            .build_manifests
            .entry(path.clone())
            .or_insert_with(|| {
                won = true;
                manifest.clone()
            })
            .value()
            .clone();

        // Every target added to raw_target_set must trace back to a
        // manifest currently cached, so add from the manifest that's
        // actually stored, not necessarily the one this call passed in.
        let effective_targets = if won {
            targets
        } else {
            let mut recomputed = Vec::with_capacity(stored.targets.len());
            for (short_name, node) in stored.targets.iter() {
                recomputed.push(self.parser.unflavored_target_from_raw(cell.name(), &node.package_path, short_name, node)?);
            }
            recomputed
        };
        for target in effective_targets {
            self.raw_target_set.insert(target);
        }

        if won {
            for dependent in dependents {
                self.build_dep_index.add_dependent(&path, dependent);
            }
            debug!("put_build_manifest_if_absent: cached new manifest at {}", path);
        } else {
            trace!("put_build_manifest_if_absent: race lost at {}, kept existing manifest", path);
        }

        Ok(stored)
    }

    pub fn put_package_manifest_if_absent(
        &self,
        path: AbsPath,
        manifest: PackageFileManifest,
        dependents: BTreeSet<AbsPath>,
    ) -> Arc<PackageFileManifest> {
        let _guard = self.lock.read();
        let manifest = Arc::new(manifest);
        let mut won = false;
        let stored = self
            .package_manifests
            .entry(path.clone())
            .or_insert_with(|| {
                won = true;
                manifest.clone()
            })
            .value()
            .clone();

        if won {
            for dependent in dependents {
                self.package_dep_index.add_dependent(&path, dependent);
            }
            debug!("put_package_manifest_if_absent: cached new manifest at {}", path);
        } else {
            trace!("put_package_manifest_if_absent: race lost at {}, kept existing manifest", path);
        }

        stored
    }

    // ---- Computed node operations ----

    pub fn get_cache(&self, kind: CacheKind) -> CacheHandle {
        match kind {
            CacheKind::RawNode => CacheHandle::RawNode(self.raw_node_cache.clone()),
            CacheKind::ConfiguredNode => CacheHandle::ConfiguredNode(self.configured_node_cache.clone()),
        }
    }

    pub fn lookup_computed_node(&self, kind: CacheKind, key: &NodeKey) -> Option<ComputedNode> {
        self.get_cache(kind).lookup(key)
    }

    pub fn put_computed_node_if_absent(&self, kind: CacheKind, key: NodeKey, value: ComputedNode) -> ComputedNode {
        let _guard = self.lock.read();
        self.get_cache(kind).put_if_absent(key, value, &self.raw_target_set)
    }

    fn node_caches(&self) -> [&dyn AnyNodeCache; 2] {
        [self.raw_node_cache.as_ref() as &dyn AnyNodeCache, self.configured_node_cache.as_ref() as &dyn AnyNodeCache]
    }

    // ---- Invalidation engine ----

    pub fn invalidate_path(&self, path: &AbsPath, invalidate_manifests: bool) -> u64 {
        let _guard = self.lock.write();
        let mut in_progress = HashSet::new();
        self.invalidate_path_locked(path, invalidate_manifests, &mut in_progress)
    }

    fn invalidate_path_locked(&self, path: &AbsPath, invalidate_manifests: bool, in_progress: &mut HashSet<AbsPath>) -> u64 {
        // Robustness hedge against malformed cyclic input; a well-formed
        // dependency DAG never needs this; it's a hedge against malformed input.
        if !in_progress.insert(path.clone()) {
            return 0;
        }

        let mut count = self.invalidate_raw_nodes_at(path, invalidate_manifests);

        // Drop the manifests themselves, if asked.
        if invalidate_manifests {
            self.build_manifests.remove(path);
            self.package_manifests.remove(path);
        }

        let is_package_file = self.cell().is_package_file(path);

        // Cascade through build-file dependents.
        for dependent in self.build_dep_index.dependents_of(path) {
            if &dependent == path {
                continue;
            }
            if is_package_file {
                count += self.invalidate_nodes_in_path(&dependent);
            } else {
                count += self.invalidate_path_locked(&dependent, true, in_progress);
            }
        }
        if !is_package_file {
            self.build_dep_index.remove_entry(path);
        }

        // Cascade through package-file dependents.
        for dependent in self.package_dep_index.dependents_of(path) {
            if &dependent == path {
                continue;
            }
            if is_package_file {
                count += self.invalidate_path_locked(&dependent, false, in_progress);
            } else {
                count += self.invalidate_path_locked(&dependent, true, in_progress);
            }
        }
        if !is_package_file {
            self.package_dep_index.remove_entry(path);
        }

        in_progress.remove(path);
        if count > 0 {
            debug!("invalidate_path({}, invalidate_manifests={}): invalidated {} raw node(s)", path, invalidate_manifests, count);
        }
        count
    }

    /// Invalidates every computed-cache kind's entries for the targets
    /// declared at `path`'s build manifest (if any), and, when
    /// `invalidate_manifests` is set, drops those targets from
    /// `raw_target_set` too. Returns the number of raw targets touched.
    fn invalidate_raw_nodes_at(&self, path: &AbsPath, invalidate_manifests: bool) -> u64 {
        let manifest = match self.build_manifests.get(path) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };

        let cell = self.cell();
        let mut count = 0u64;
        for (short_name, node) in manifest.targets.iter() {
            let target = match self.parser.unflavored_target_from_raw(cell.name(), &node.package_path, short_name, node) {
                Ok(target) => target,
                Err(e) => {
                    error!("invalidate_path({}): could not re-derive target '{}': {}", path, short_name, e);
                    continue;
                }
            };
            for cache in self.node_caches() {
                cache.invalidate_for(&target);
            }
            if invalidate_manifests {
                self.raw_target_set.remove(&target);
            }
            count += 1;
        }
        count
    }

    /// Package-file cascade branch: invalidate the node cache for
    /// targets declared in `path`, but leave `path`'s own manifest and
    /// `raw_target_set` membership untouched — a package attribute
    /// change alters what's injected into those nodes, not the build
    /// file's own parse result.
    fn invalidate_nodes_in_path(&self, path: &AbsPath) -> u64 {
        self.invalidate_raw_nodes_at(path, false)
    }

    // ---- Path-dependence query ----

    pub fn path_dependent_present_in(&self, relative_path: impl AsRef<Path>, candidates: &HashSet<AbsPath>) -> bool {
        let resolved = self.cell_root().join(relative_path);
        self.build_dep_index.any_dependent_in(&resolved, candidates)
    }
}
