//! Dependency indices: `auxiliary_file -> set<dependent_file>` reverse
//! edges, one instance each for build-file and package-file cascades
//! (the cascade rules differ between the two, so they are kept as
//! separate indices rather than one tagged index).

use dashmap::{DashMap, DashSet};

use crate::path::AbsPath;

/// A concurrent reverse-dependency index: `auxiliary -> {dependents}`.
#[derive(Default)]
pub struct DependencyIndex {
    edges: DashMap<AbsPath, DashSet<AbsPath>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        DependencyIndex { edges: DashMap::new() }
    }

    /// Registers `dependent` as depending on `auxiliary`. Idempotent.
    pub fn add_dependent(&self, auxiliary: &AbsPath, dependent: AbsPath) {
        self.edges.entry(auxiliary.clone()).or_insert_with(DashSet::new).insert(dependent);
    }

    /// The current set of dependents of `auxiliary`, or an empty vec if
    /// there's no entry at all.
    pub fn dependents_of(&self, auxiliary: &AbsPath) -> Vec<AbsPath> {
        self.edges.get(auxiliary).map(|set| set.iter().map(|d| d.key().clone()).collect()).unwrap_or_default()
    }

    /// Removes `path`'s own entry entirely. Done for non-package paths
    /// after their dependents have been cascaded through.
    pub fn remove_entry(&self, path: &AbsPath) {
        self.edges.remove(path);
    }

    /// `true` iff `auxiliary` has at least one dependent that is also in
    /// `candidates`.
    pub fn any_dependent_in(&self, auxiliary: &AbsPath, candidates: &std::collections::HashSet<AbsPath>) -> bool {
        match self.edges.get(auxiliary) {
            Some(set) => set.iter().any(|d| candidates.contains(d.key())),
            None => false,
        }
    }

    pub fn contains(&self, path: &AbsPath) -> bool {
        self.edges.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependents_accumulate_and_are_queryable() {
        let index = DependencyIndex::new();
        let aux = AbsPath::new("/root/cell/script.bzl");
        let dep1 = AbsPath::new("/root/cell/path/BUCK");
        let dep2 = AbsPath::new("/root/cell/other/BUCK");

        index.add_dependent(&aux, dep1.clone());
        index.add_dependent(&aux, dep2.clone());

        let mut dependents = index.dependents_of(&aux);
        dependents.sort();
        let mut expected = vec![dep1, dep2];
        expected.sort();
        assert_eq!(dependents, expected);
    }

    #[test]
    fn remove_entry_drops_the_auxiliary_mapping() {
        let index = DependencyIndex::new();
        let aux = AbsPath::new("/root/cell/script.bzl");
        index.add_dependent(&aux, AbsPath::new("/root/cell/path/BUCK"));
        assert!(index.contains(&aux));
        index.remove_entry(&aux);
        assert!(!index.contains(&aux));
    }

    #[test]
    fn any_dependent_in_checks_candidate_intersection() {
        let index = DependencyIndex::new();
        let aux = AbsPath::new("/root/cell/script.bzl");
        let dep = AbsPath::new("/root/cell/path/BUCK");
        index.add_dependent(&aux, dep.clone());

        let mut candidates = std::collections::HashSet::new();
        candidates.insert(dep);
        assert!(index.any_dependent_in(&aux, &candidates));

        let other_candidates = std::collections::HashSet::new();
        assert!(!index.any_dependent_in(&aux, &other_candidates));
    }
}
