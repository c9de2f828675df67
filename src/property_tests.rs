//! Property-based test for the invalidation cascade: build a random DAG
//! of build files connected by auxiliary-dependency edges, invalidate a
//! random node, and check that exactly its transitive dependents
//! disappear while everything else survives byte-identical.
//!
//! This uses `quickcheck`/`quickcheck_macros`, in the style of
//! `rls-vfs`'s own randomized-input tests for its IPC layer.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use quickcheck_macros::quickcheck;

use crate::cell_state::DaemonicCellState;
use crate::config::CellDescriptor;
use crate::manifest::{BuildFileManifest, RawTargetNode};
use crate::path::AbsPath;

const NODE_COUNT: u8 = 8;

fn path_for(node: u8) -> AbsPath {
    AbsPath::new(format!("/root/file{}/BUCK", node))
}

/// Normalizes raw quickcheck input into an acyclic edge list: an edge
/// `(dependent, auxiliary)` only survives if `auxiliary < dependent`, so
/// the resulting graph is guaranteed to be a DAG (no cycle guard needed
/// to interpret the *expected* reachable set, independent of whatever
/// robustness hedge `DaemonicCellState` itself applies).
fn acyclic_edges(raw: Vec<(u8, u8)>) -> Vec<(u8, u8)> {
    raw.into_iter()
        .map(|(a, b)| (a % NODE_COUNT, b % NODE_COUNT))
        .filter(|(dependent, auxiliary)| auxiliary < dependent)
        .collect()
}

/// Forward reachability from `start` following `dependent -> auxiliary`
/// edges in reverse (i.e., "who transitively depends on `start`"),
/// computed independently of `DaemonicCellState`'s own cascade so the
/// assertion is a real check, not a tautology.
fn transitive_dependents(edges: &[(u8, u8)], start: u8) -> HashSet<u8> {
    let mut dependents_of: HashMap<u8, Vec<u8>> = HashMap::new();
    for &(dependent, auxiliary) in edges {
        dependents_of.entry(auxiliary).or_default().push(dependent);
    }

    let mut reached = HashSet::new();
    let mut queue = vec![start];
    reached.insert(start);
    while let Some(node) = queue.pop() {
        if let Some(deps) = dependents_of.get(&node) {
            for &d in deps {
                if reached.insert(d) {
                    queue.push(d);
                }
            }
        }
    }
    reached
}

fn seed_state(edges: &[(u8, u8)]) -> DaemonicCellState {
    let state = DaemonicCellState::new(CellDescriptor::new(Arc::<str>::from("root"), AbsPath::new("/root")).unwrap(), 4);

    let mut auxiliaries_of: HashMap<u8, BTreeSet<AbsPath>> = HashMap::new();
    for &(dependent, auxiliary) in edges {
        auxiliaries_of.entry(dependent).or_default().insert(path_for(auxiliary));
    }

    for node in 0..NODE_COUNT {
        let manifest = BuildFileManifest::new().with_target(
            format!("t{}", node),
            RawTargetNode::new(format!("file{}", node), "rule"),
        );
        let dependents = auxiliaries_of.remove(&node).unwrap_or_default();
        state.put_build_manifest_if_absent(path_for(node), manifest, dependents).unwrap();
    }
    state
}

#[quickcheck]
fn prop_invalidate_reaches_exactly_transitive_dependents(raw_edges: Vec<(u8, u8)>, raw_target: u8) -> bool {
    let edges = acyclic_edges(raw_edges);
    let target = raw_target % NODE_COUNT;

    let state = seed_state(&edges);
    let expected_removed = transitive_dependents(&edges, target);

    state.invalidate_path(&path_for(target), true);

    (0..NODE_COUNT).all(|node| {
        let present = state.lookup_build_manifest(&path_for(node)).is_some();
        if expected_removed.contains(&node) {
            !present
        } else {
            present
        }
    })
}

#[quickcheck]
fn prop_unreached_manifests_are_byte_identical(raw_edges: Vec<(u8, u8)>, raw_target: u8) -> bool {
    let edges = acyclic_edges(raw_edges);
    let target = raw_target % NODE_COUNT;

    let state = seed_state(&edges);
    let expected_removed = transitive_dependents(&edges, target);

    let before: HashMap<u8, _> =
        (0..NODE_COUNT).filter(|n| !expected_removed.contains(n)).map(|n| (n, state.lookup_build_manifest(&path_for(n)).unwrap())).collect();

    state.invalidate_path(&path_for(target), true);

    before.into_iter().all(|(node, manifest_before)| {
        match state.lookup_build_manifest(&path_for(node)) {
            Some(manifest_after) => manifest_after.targets == manifest_before.targets,
            None => false,
        }
    })
}
