//! Cell configuration: the root path, canonical name and package-file
//! name a `DaemonicCellState` is constructed with.
//!
//! Mirrors the shape of `rls`'s own `Config`: a small, validated,
//! constructor-time value rather than a pile of hidden globals.

use crate::error::CacheError;
use crate::path::AbsPath;
use crate::target::CellName;

/// The conventional package-file name. Callers may configure a
/// different name via `CellDescriptor::new`.
pub const DEFAULT_PACKAGE_FILE_NAME: &str = "PACKAGE";

/// Identifies a cell: its canonical name, its root on disk, and the file
/// name that marks a package file for cascade-classification purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellDescriptor {
    name: CellName,
    root: AbsPath,
    package_file_name: String,
}

impl CellDescriptor {
    pub fn new(name: impl Into<CellName>, root: AbsPath) -> Result<Self, CacheError> {
        Self::with_package_file_name(name, root, DEFAULT_PACKAGE_FILE_NAME)
    }

    pub fn with_package_file_name(
        name: impl Into<CellName>,
        root: AbsPath,
        package_file_name: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let name = name.into();
        let package_file_name = package_file_name.into();
        if name.is_empty() {
            return Err(CacheError::InvalidCellDescriptor("cell name must not be empty".to_string()));
        }
        if package_file_name.is_empty() {
            return Err(CacheError::InvalidCellDescriptor("package_file_name must not be empty".to_string()));
        }
        Ok(CellDescriptor { name, root, package_file_name })
    }

    pub fn name(&self) -> &CellName {
        &self.name
    }

    pub fn root(&self) -> &AbsPath {
        &self.root
    }

    pub fn package_file_name(&self) -> &str {
        &self.package_file_name
    }

    /// A path is a package file iff its file name matches the
    /// configured package-file name.
    pub fn is_package_file(&self, path: &AbsPath) -> bool {
        path.file_name() == Some(self.package_file_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn rejects_empty_cell_name() {
        let root = AbsPath::new("/root/cell");
        let err = CellDescriptor::new(Arc::<str>::from(""), root).unwrap_err();
        assert!(matches!(err, CacheError::InvalidCellDescriptor(_)));
    }

    #[test]
    fn classifies_package_file_by_name() {
        let root = AbsPath::new("/root/cell");
        let descriptor = CellDescriptor::new(Arc::<str>::from("root"), root).unwrap();
        assert!(descriptor.is_package_file(&AbsPath::new("/root/cell/path/to/PACKAGE")));
        assert!(!descriptor.is_package_file(&AbsPath::new("/root/cell/path/to/BUCK")));
    }

    #[test]
    fn custom_package_file_name_is_honored() {
        let root = AbsPath::new("/root/cell");
        let descriptor =
            CellDescriptor::with_package_file_name(Arc::<str>::from("root"), root, "PACKAGE.bzl").unwrap();
        assert!(descriptor.is_package_file(&AbsPath::new("/root/cell/path/to/PACKAGE.bzl")));
        assert!(!descriptor.is_package_file(&AbsPath::new("/root/cell/path/to/PACKAGE")));
    }
}
