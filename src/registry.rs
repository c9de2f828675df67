//! `CellStates`: a multi-cell registry layered on top of per-cell
//! `DaemonicCellState` instances.
//!
//! This is explicitly *not* a cross-cell invalidation mechanism: it
//! never cascades an invalidation from one cell's state into another's.
//! It's a lookup convenience so a daemon with several cells has one
//! place to find "the state for cell xplat", mirroring how `rls`'s
//! server holds `Arc<AnalysisHost>`/`Arc<Vfs>` handles that any worker
//! thread can clone and use independently.

use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use crate::cell_state::DaemonicCellState;
use crate::config::CellDescriptor;
use crate::target::CellName;

/// A concurrent registry of per-cell state, keyed by cell name.
#[derive(Default)]
pub struct CellStates {
    cells: DashMap<CellName, Arc<DaemonicCellState>>,
}

impl CellStates {
    pub fn new() -> Self {
        CellStates { cells: DashMap::new() }
    }

    /// Returns the existing state for `descriptor.name()` if one was
    /// already registered, otherwise constructs and registers one. The
    /// first registration for a given cell name wins: a later call with
    /// a different descriptor for the same name does not replace it,
    /// mirroring the put-if-absent race-win convention used throughout
    /// `DaemonicCellState` itself.
    pub fn get_or_create(&self, descriptor: CellDescriptor, parsing_parallelism: usize) -> Arc<DaemonicCellState> {
        let name = descriptor.name().clone();
        let mut created = false;
        let state = self
            .cells
            .entry(name.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(DaemonicCellState::new(descriptor, parsing_parallelism))
            })
            .value()
            .clone();
        if created {
            debug!("CellStates: registered new cell '{}'", name);
        }
        state
    }

    pub fn get(&self, name: &CellName) -> Option<Arc<DaemonicCellState>> {
        self.cells.get(name).map(|entry| entry.value().clone())
    }

    /// Drops a cell's state entirely. Used for cell unloading/reconfiguration
    /// in tests; never invoked by `DaemonicCellState::invalidate_path`, and
    /// has no effect on any other cell's state.
    pub fn remove(&self, name: &CellName) -> Option<Arc<DaemonicCellState>> {
        self.cells.remove(name).map(|(_, state)| state)
    }

    pub fn cell_names(&self) -> Vec<CellName> {
        self.cells.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::AbsPath;
    use std::collections::BTreeSet;
    use std::sync::Arc as StdArc;

    #[test]
    fn get_or_create_registers_once_per_name() {
        let registry = CellStates::new();
        let descriptor = CellDescriptor::new(StdArc::<str>::from("root"), AbsPath::new("/root")).unwrap();
        let a = registry.get_or_create(descriptor.clone(), 4);
        let different_root = CellDescriptor::new(StdArc::<str>::from("root"), AbsPath::new("/different")).unwrap();
        let b = registry.get_or_create(different_root, 4);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.cell_root().to_string(), "/root");
    }

    #[test]
    fn invalidation_in_one_cell_does_not_affect_another() {
        let registry = CellStates::new();
        let root = registry.get_or_create(CellDescriptor::new(StdArc::<str>::from("root"), AbsPath::new("/root")).unwrap(), 4);
        let xplat = registry.get_or_create(CellDescriptor::new(StdArc::<str>::from("xplat"), AbsPath::new("/xplat")).unwrap(), 4);

        let root_buck = AbsPath::new("/root/path/BUCK");
        let xplat_buck = AbsPath::new("/xplat/path/BUCK");
        let manifest = crate::manifest::BuildFileManifest::new()
            .with_target("t", crate::manifest::RawTargetNode::new("path", "rule"));
        root.put_build_manifest_if_absent(root_buck.clone(), manifest.clone(), BTreeSet::new()).unwrap();
        xplat.put_build_manifest_if_absent(xplat_buck.clone(), manifest, BTreeSet::new()).unwrap();

        root.invalidate_path(&root_buck, true);

        assert!(root.lookup_build_manifest(&root_buck).is_none());
        assert!(xplat.lookup_build_manifest(&xplat_buck).is_some());
    }

    #[test]
    fn get_returns_none_for_unknown_cell() {
        let registry = CellStates::new();
        assert!(registry.get(&StdArc::from("nope")).is_none());
    }
}
