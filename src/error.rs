//! Error types returned by the public operations of `daemonic_cache`.
//!
//! Most of the crate's operations cannot fail in the `Result` sense: an
//! absent key is a normal, cheap-to-represent `None`, and invariant
//! breaches are programmer errors that panic loudly rather than being
//! threaded through `Result` (see `cell_state::CellState` for the
//! `debug_assert!` call sites). `CacheError` exists for the handful of
//! operations that talk to an external collaborator (the target parser)
//! or that validate caller-supplied configuration.

use std::fmt;
use std::path::PathBuf;

quick_error::quick_error! {
    /// Checked failure modes surfaced by `daemonic_cache`'s public API.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CacheError {
        /// The external target parser failed to turn a raw target node into
        /// an `UnflavoredBuildTarget`. The manifest insertion that triggered
        /// this is left with no visible effect on the cache.
        TargetParse(package_path: PathBuf, short_name: String, reason: String) {
            display("failed to parse target '{}' in package '{}': {}", short_name, package_path.display(), reason)
        }
        /// A `CellDescriptor` was constructed with an invalid root or
        /// package-file name.
        InvalidCellDescriptor(reason: String) {
            display("invalid cell descriptor: {}", reason)
        }
    }
}

impl CacheError {
    pub fn target_parse(package_path: impl Into<PathBuf>, short_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        CacheError::TargetParse(package_path.into(), short_name.into(), reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parse_display_mentions_short_name_and_package() {
        let err = CacheError::target_parse("foo/bar", "baz", "bad syntax");
        let rendered = err.to_string();
        assert!(rendered.contains("baz"));
        assert!(rendered.contains("foo/bar"));
        assert!(rendered.contains("bad syntax"));
    }
}
