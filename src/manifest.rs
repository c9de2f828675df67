//! Manifest value types and the narrow `TargetParser` seam through which
//! raw target nodes become [`UnflavoredBuildTarget`]s.
//!
//! Parsing build files and package files themselves is out of scope;
//! this module only defines the shapes the parser is expected to hand
//! to [`crate::cell_state::CellState::put_build_manifest_if_absent`].

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::CacheError;
use crate::path::AbsPath;
use crate::target::{CellName, UnflavoredBuildTarget};

/// The parser's minimally-interpreted output for one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTargetNode {
    pub package_path: Arc<str>,
    pub rule_type_name: Arc<str>,
    pub visibility: Vec<String>,
    pub within_view: Vec<String>,
    /// Ordered string -> value attribute map, as declared in the build file.
    pub attributes: IndexMap<String, Value>,
}

impl RawTargetNode {
    pub fn new(package_path: impl Into<Arc<str>>, rule_type_name: impl Into<Arc<str>>) -> Self {
        RawTargetNode {
            package_path: package_path.into(),
            rule_type_name: rule_type_name.into(),
            visibility: Vec::new(),
            within_view: Vec::new(),
            attributes: IndexMap::new(),
        }
    }
}

/// The structured parse output of one build file. `targets` preserves
/// insertion order, matching the grammar's declaration order.
#[derive(Debug, Clone, Default)]
pub struct BuildFileManifest {
    pub targets: IndexMap<String, RawTargetNode>,
    pub includes: BTreeSet<AbsPath>,
    pub globs: Vec<String>,
    pub metadata: IndexMap<String, Value>,
}

impl BuildFileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, short_name: impl Into<String>, node: RawTargetNode) -> Self {
        self.targets.insert(short_name.into(), node);
        self
    }

    pub fn with_include(mut self, include: AbsPath) -> Self {
        self.includes.insert(include);
        self
    }
}

/// The structured parse output of one package file: metadata injected
/// into targets defined in sibling/descendant build files.
#[derive(Debug, Clone, Default)]
pub struct PackageFileManifest {
    pub metadata: IndexMap<String, Value>,
    pub parent_package_refs: Vec<PathBuf>,
    pub attributes: IndexMap<String, Value>,
    pub includes: BTreeSet<AbsPath>,
}

impl PackageFileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include(mut self, include: AbsPath) -> Self {
        self.includes.insert(include);
        self
    }
}

/// The narrow interface through which a `RawTargetNode` is turned into an
/// `UnflavoredBuildTarget`. In production this is backed by the real
/// parser's rule-type registry; here it's a seam so `put_build_manifest_if_absent`
/// has somewhere concrete to report a [`CacheError::TargetParse`].
pub trait TargetParser: Send + Sync {
    fn unflavored_target_from_raw(
        &self,
        cell: &CellName,
        package_path: &str,
        short_name: &str,
        node: &RawTargetNode,
    ) -> Result<UnflavoredBuildTarget, CacheError>;
}

/// A deterministic `TargetParser` suitable for tests: it always succeeds,
/// deriving the target identity straight from the manifest's own fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTargetParser;

impl TargetParser for IdentityTargetParser {
    fn unflavored_target_from_raw(
        &self,
        cell: &CellName,
        package_path: &str,
        short_name: &str,
        _node: &RawTargetNode,
    ) -> Result<UnflavoredBuildTarget, CacheError> {
        Ok(UnflavoredBuildTarget::new(cell.clone(), package_path, short_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_file_manifest_preserves_insertion_order() {
        let manifest = BuildFileManifest::new()
            .with_target("z_target", RawTargetNode::new("path/to", "rule"))
            .with_target("a_target", RawTargetNode::new("path/to", "rule"));
        let names: Vec<_> = manifest.targets.keys().collect();
        assert_eq!(names, vec!["z_target", "a_target"]);
    }

    #[test]
    fn identity_parser_derives_target_from_inputs() {
        let parser = IdentityTargetParser;
        let cell: CellName = Arc::from("root");
        let node = RawTargetNode::new("path/to", "rule");
        let target = parser.unflavored_target_from_raw(&cell, "path/to", "target", &node).unwrap();
        assert_eq!(target.to_string(), "root//path/to:target");
    }
}
