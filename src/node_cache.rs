//! The per-kind computed node cache and the small sum-typed registry
//! that lets `DaemonicCellState` treat the two mandated cache kinds
//! uniformly where it needs to (invalidation) while keeping typed
//! access where it matters (lookup/insert).

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use log::{error, trace};

use crate::node::{MaybeIncompatibleTargetNode, UnconfiguredTargetNode};
use crate::target::{BuildTarget, UnconfiguredBuildTarget, UnflavoredBuildTarget};

/// A cache key that knows how to project itself down to an
/// `UnconfiguredBuildTarget` and an `UnflavoredBuildTarget` — each kind
/// carries two projection functions.
pub trait CacheKey: Clone + Eq + Hash + Send + Sync + fmt::Debug + 'static {
    fn to_unconfigured(&self) -> UnconfiguredBuildTarget;
    fn to_unflavored(&self) -> UnflavoredBuildTarget;
}

impl CacheKey for UnconfiguredBuildTarget {
    fn to_unconfigured(&self) -> UnconfiguredBuildTarget {
        self.clone()
    }
    fn to_unflavored(&self) -> UnflavoredBuildTarget {
        self.unflavored.clone()
    }
}

impl CacheKey for BuildTarget {
    fn to_unconfigured(&self) -> UnconfiguredBuildTarget {
        self.unconfigured.clone()
    }
    fn to_unflavored(&self) -> UnflavoredBuildTarget {
        self.unconfigured.unflavored.clone()
    }
}

/// A type-tag identifying one of the (currently two) mandated computed
/// caches. Carried alongside `NodeKey`/`ComputedNode` so a `CacheHandle`
/// can check that a key/value pair actually belongs to the cache it's
/// being inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    RawNode,
    ConfiguredNode,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::RawNode => write!(f, "RAW_NODE"),
            CacheKind::ConfiguredNode => write!(f, "CONFIGURED_NODE"),
        }
    }
}

/// A tagged union over the key types of the mandated cache kinds, used at
/// the `DaemonicCellState` boundary where code needs to talk about "a key
/// in some computed cache" without committing to which kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Raw(UnconfiguredBuildTarget),
    Configured(BuildTarget),
}

impl NodeKey {
    pub fn kind(&self) -> CacheKind {
        match self {
            NodeKey::Raw(_) => CacheKind::RawNode,
            NodeKey::Configured(_) => CacheKind::ConfiguredNode,
        }
    }

    pub fn to_unflavored(&self) -> UnflavoredBuildTarget {
        match self {
            NodeKey::Raw(k) => k.to_unflavored(),
            NodeKey::Configured(k) => k.to_unflavored(),
        }
    }
}

/// A tagged union over the value types of the mandated cache kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputedNode {
    Raw(Arc<UnconfiguredTargetNode>),
    Configured(Arc<MaybeIncompatibleTargetNode>),
}

/// Generic per-kind computed node cache.
///
/// `values` is the concurrent point-lookup map; `target_index` is this
/// kind's slice of the overall target index, scoped to this cache's own
/// key type so invalidating one kind can never remove index entries
/// that belong to another.
pub struct ComputedNodeCache<K: CacheKey, V: Clone + Send + Sync + 'static> {
    kind: CacheKind,
    values: DashMap<K, V>,
    target_index: DashMap<UnflavoredBuildTarget, DashSet<K>>,
}

impl<K: CacheKey, V: Clone + Send + Sync + 'static> ComputedNodeCache<K, V> {
    pub fn new(kind: CacheKind, parsing_parallelism: usize) -> Self {
        ComputedNodeCache {
            kind,
            values: DashMap::with_shard_amount(shard_amount(parsing_parallelism)),
            target_index: DashMap::with_shard_amount(shard_amount(parsing_parallelism)),
        }
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// Pure read; never blocks a writer.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Atomic put-if-absent. Must be called with at least a read lock
    /// held on the owning `DaemonicCellState` (enforced by callers in
    /// `cell_state`, not by this type, which has no knowledge of the
    /// outer lock). Crate-private: the only public path to a computed
    /// cache's mutation is through `DaemonicCellState`'s locked methods
    /// (`CacheHandle`/`put_computed_node_if_absent`).
    ///
    /// Asserts I1 (raw-cover) via `raw_cover_holds`; a caller that fails
    /// this check has a programming bug upstream (a computed node was
    /// built for a target that was never seen in a cached manifest).
    pub(crate) fn put_if_absent(&self, key: K, value: V, raw_cover_holds: impl FnOnce(&UnflavoredBuildTarget) -> bool) -> V {
        let unflavored = key.to_unflavored();
        let raw_cover_holds = raw_cover_holds(&unflavored);
        if !raw_cover_holds {
            error!(
                "I1 violated: computed node inserted for {:?} whose unflavored target is not in RawTargetSet",
                unflavored
            );
        }
        debug_assert!(
            raw_cover_holds,
            "I1 violated: computed node inserted for {:?} whose unflavored target is not in RawTargetSet",
            unflavored
        );

        let mut won = false;
        let result = self
            .values
            .entry(key.clone())
            .or_insert_with(|| {
                won = true;
                value
            })
            .value()
            .clone();

        if won {
            self.target_index.entry(unflavored.clone()).or_insert_with(DashSet::new).insert(key.clone());
            trace!("put_if_absent[{}]: inserted {:?}", self.kind, key);
        } else {
            trace!("put_if_absent[{}]: race lost for {:?}, kept existing value", self.kind, key);
        }
        result
    }

    /// Removes every key in `target_index[unflavored_target]` from the
    /// value map, then clears that index entry. Must be called only with
    /// the cell state's write lock held; returns the number of removed
    /// entries. Crate-private for the same reason as `put_if_absent`.
    pub(crate) fn invalidate_for(&self, unflavored_target: &UnflavoredBuildTarget) -> usize {
        match self.target_index.remove(unflavored_target) {
            Some((_, keys)) => {
                let removed = keys.len();
                for key in keys.iter() {
                    self.values.remove(key.key());
                }
                if removed > 0 {
                    trace!("invalidate_for[{}]: removed {} entries for {}", self.kind, removed, unflavored_target);
                }
                removed
            }
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys currently registered for `unflavored_target`; used by tests
    /// and by `DaemonicCellState` consistency checks.
    pub fn keys_for(&self, unflavored_target: &UnflavoredBuildTarget) -> Vec<K> {
        self.target_index.get(unflavored_target).map(|set| set.iter().map(|k| k.key().clone()).collect()).unwrap_or_default()
    }
}

fn shard_amount(parsing_parallelism: usize) -> usize {
    parsing_parallelism.max(1).next_power_of_two()
}

/// Any computed-node cache, type-erased down to the one operation
/// `DaemonicCellState::invalidate_path` needs to perform uniformly across
/// both mandated kinds, so two kinds can never disagree on which
/// targets are live.
pub(crate) trait AnyNodeCache: Send + Sync {
    fn kind(&self) -> CacheKind;
    fn invalidate_for(&self, unflavored_target: &UnflavoredBuildTarget) -> usize;
}

impl<K: CacheKey, V: Clone + Send + Sync + 'static> AnyNodeCache for ComputedNodeCache<K, V> {
    fn kind(&self) -> CacheKind {
        ComputedNodeCache::kind(self)
    }
    fn invalidate_for(&self, unflavored_target: &UnflavoredBuildTarget) -> usize {
        ComputedNodeCache::invalidate_for(self, unflavored_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    fn target(short_name: &str) -> UnconfiguredBuildTarget {
        UnconfiguredBuildTarget::unflavored(UnflavoredBuildTarget::new(StdArc::from("root"), "path/to", short_name))
    }

    #[test]
    fn put_if_absent_returns_first_winner() {
        let cache: ComputedNodeCache<UnconfiguredBuildTarget, u32> = ComputedNodeCache::new(CacheKind::RawNode, 4);
        let key = target("t");
        let v1 = cache.put_if_absent(key.clone(), 1, |_| true);
        let v2 = cache.put_if_absent(key.clone(), 2, |_| true);
        assert_eq!(v1, 1);
        assert_eq!(v2, 1);
        assert_eq!(cache.lookup(&key), Some(1));
    }

    #[test]
    fn invalidate_for_clears_all_keys_of_target() {
        let cache: ComputedNodeCache<UnconfiguredBuildTarget, u32> = ComputedNodeCache::new(CacheKind::RawNode, 4);
        let key = target("t");
        cache.put_if_absent(key.clone(), 1, |_| true);
        assert_eq!(cache.len(), 1);

        let removed = cache.invalidate_for(&key.unflavored);
        assert_eq!(removed, 1);
        assert_eq!(cache.lookup(&key), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn invalidate_for_unknown_target_is_noop() {
        let cache: ComputedNodeCache<UnconfiguredBuildTarget, u32> = ComputedNodeCache::new(CacheKind::RawNode, 4);
        let unrelated = UnflavoredBuildTarget::new(StdArc::from("root"), "other", "t");
        assert_eq!(cache.invalidate_for(&unrelated), 0);
    }

    #[test]
    #[should_panic(expected = "I1 violated")]
    fn put_if_absent_asserts_raw_cover() {
        let cache: ComputedNodeCache<UnconfiguredBuildTarget, u32> = ComputedNodeCache::new(CacheKind::RawNode, 4);
        cache.put_if_absent(target("t"), 1, |_| false);
    }
}
