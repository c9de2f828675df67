//! `daemonic_cache` is the concurrent cache, dependency-graph and
//! invalidation engine a build daemon uses to memoize per-cell parse
//! results (build-file manifests, package-file manifests, and computed
//! target nodes derived from them) and to precisely invalidate those
//! artifacts when a file on disk changes.
//!
//! The crate is deliberately narrow: it does not parse build files, does
//! not resolve targets, and does not watch the filesystem. It is the
//! cache + dependency graph + invalidation cascade those three
//! collaborators share, with one [`cell_state::DaemonicCellState`] per
//! logical cell and a small [`registry::CellStates`] registry on top for
//! daemons that host more than one cell.
//!
//! See `DaemonicCellState` for the invalidation algorithm and its
//! concurrency contract.

#![warn(rust_2018_idioms)]

pub mod cell_state;
pub mod config;
pub mod dep_index;
pub mod error;
pub mod manifest;
pub mod node;
pub mod node_cache;
pub mod path;
pub mod registry;
pub mod target;

pub use cell_state::{CacheHandle, DaemonicCellState};
pub use config::CellDescriptor;
pub use error::CacheError;
pub use manifest::{BuildFileManifest, IdentityTargetParser, PackageFileManifest, RawTargetNode, TargetParser};
pub use node::{MaybeIncompatibleTargetNode, UnconfiguredTargetNode};
pub use node_cache::{CacheKind, ComputedNode, ComputedNodeCache, NodeKey};
pub use path::AbsPath;
pub use registry::CellStates;
pub use target::{BuildTarget, CellName, ConfigurationRef, Flavor, UnconfiguredBuildTarget, UnflavoredBuildTarget};

/// Crate version, for parity with `rls::version()`'s use in `--version`
/// output.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod property_tests;
