//! Target identity types: [`UnflavoredBuildTarget`], [`UnconfiguredBuildTarget`]
//! and [`BuildTarget`].
//!
//! These are plain, cheaply-`Clone`-able value types; all the interesting
//! behavior lives in `cell_state` and `node_cache`, which use them as map
//! keys.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// The name of a cell, e.g. `"root"` or `"xplat"`.
pub type CellName = Arc<str>;

/// A single orthogonal decoration on a target (e.g. `"#headers"`).
pub type Flavor = Arc<str>;

/// `(cell_name, package_path, short_name)` — a rule as declared in a build
/// file, without configuration or flavor decoration. This is the unit of
/// invalidation: a single build-file edit invalidates one or more
/// `UnflavoredBuildTarget`s, and every flavored/configured variant derived
/// from one goes away with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnflavoredBuildTarget {
    pub cell: CellName,
    pub package_path: Arc<str>,
    pub short_name: Arc<str>,
}

impl UnflavoredBuildTarget {
    pub fn new(cell: CellName, package_path: impl Into<Arc<str>>, short_name: impl Into<Arc<str>>) -> Self {
        UnflavoredBuildTarget { cell, package_path: package_path.into(), short_name: short_name.into() }
    }
}

impl fmt::Display for UnflavoredBuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}:{}", self.cell, self.package_path, self.short_name)
    }
}

/// An [`UnflavoredBuildTarget`] plus an optional, ordered set of flavors.
/// Multiple distinct `UnconfiguredBuildTarget`s share a single unflavored
/// parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnconfiguredBuildTarget {
    pub unflavored: UnflavoredBuildTarget,
    pub flavors: BTreeSet<Flavor>,
}

impl UnconfiguredBuildTarget {
    pub fn new(unflavored: UnflavoredBuildTarget, flavors: BTreeSet<Flavor>) -> Self {
        UnconfiguredBuildTarget { unflavored, flavors }
    }

    pub fn unflavored(unflavored: UnflavoredBuildTarget) -> Self {
        UnconfiguredBuildTarget { unflavored, flavors: BTreeSet::new() }
    }
}

impl fmt::Display for UnconfiguredBuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unflavored)?;
        for flavor in &self.flavors {
            write!(f, "#{}", flavor)?;
        }
        Ok(())
    }
}

/// A configuration reference. The core treats this opaquely: it's a key
/// component of [`BuildTarget`] but the core never interprets its
/// contents, only compares and hashes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigurationRef(pub Arc<str>);

impl fmt::Display for ConfigurationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An [`UnconfiguredBuildTarget`] plus a configuration reference: a fully
/// configured build target, as keys the `CONFIGURED_NODE` cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildTarget {
    pub unconfigured: UnconfiguredBuildTarget,
    pub configuration: ConfigurationRef,
}

impl BuildTarget {
    pub fn unflavored(&self) -> &UnflavoredBuildTarget {
        &self.unconfigured.unflavored
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.unconfigured, self.configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> CellName {
        Arc::from("root")
    }

    #[test]
    fn unflavored_display_matches_buck_style_label() {
        let t = UnflavoredBuildTarget::new(cell(), "path/to", "target");
        assert_eq!(t.to_string(), "root//path/to:target");
    }

    #[test]
    fn distinct_flavors_share_unflavored_parent() {
        let base = UnflavoredBuildTarget::new(cell(), "path/to", "target");
        let a = UnconfiguredBuildTarget::new(base.clone(), {
            let mut s = BTreeSet::new();
            s.insert(Flavor::from("headers"));
            s
        });
        let b = UnconfiguredBuildTarget::unflavored(base.clone());
        assert_ne!(a, b);
        assert_eq!(a.unflavored, base);
        assert_eq!(b.unflavored, base);
    }
}
