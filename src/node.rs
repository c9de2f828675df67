//! Computed node value types: the output of the external resolver that
//! this crate caches but never produces itself.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::target::{BuildTarget, UnconfiguredBuildTarget};

/// A target node derived from a `RawTargetNode` plus cell context, but not
/// yet configured. Cached under `CacheKind::RawNode`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnconfiguredTargetNode {
    pub target: UnconfiguredBuildTarget,
    pub rule_type_name: Arc<str>,
    pub resolved_attributes: IndexMap<String, Value>,
}

/// A fully configured target node, which may turn out to be incompatible
/// with the configuration it was resolved against. Cached under
/// `CacheKind::ConfiguredNode`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaybeIncompatibleTargetNode {
    pub target: BuildTarget,
    pub compatible: bool,
    pub incompatibility_reason: Option<Arc<str>>,
}

impl MaybeIncompatibleTargetNode {
    pub fn compatible(target: BuildTarget) -> Self {
        MaybeIncompatibleTargetNode { target, compatible: true, incompatibility_reason: None }
    }

    pub fn incompatible(target: BuildTarget, reason: impl Into<Arc<str>>) -> Self {
        MaybeIncompatibleTargetNode { target, compatible: false, incompatibility_reason: Some(reason.into()) }
    }
}
