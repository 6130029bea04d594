//! Package archive handles and installed-package records.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// One or more archive parts forming a single logical package.
///
/// A split-installed package carries its base archive plus any number of
/// split archives. The handle is read-only for the engine's lifetime and
/// never cached across analysis requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveHandle {
    base_path: PathBuf,
    split_paths: Vec<PathBuf>,
}

impl ArchiveHandle {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            split_paths: Vec::new(),
        }
    }

    pub fn with_splits(
        base_path: impl Into<PathBuf>,
        split_paths: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            split_paths: split_paths.into_iter().collect(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Every archive part: base first, then splits in supplied order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.base_path.as_path()).chain(self.split_paths.iter().map(|p| p.as_path()))
    }
}

bitflags! {
    /// Install flags of an installed package, as reported by the
    /// platform package registry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PackageFlags: u32 {
        /// Installed on a system partition.
        const SYSTEM = 1 << 0;
        /// A system package replaced by a runtime update.
        const UPDATED_SYSTEM = 1 << 7;
    }
}

impl Default for PackageFlags {
    fn default() -> Self {
        PackageFlags::empty()
    }
}

/// A manifest-declared application component as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppComponentInfo {
    pub name: String,
    pub enabled: bool,
}

/// One installed-package record supplied by the platform package
/// registry collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageRecord {
    pub package_name: String,
    pub flags: PackageFlags,
    /// Platform-private flags bitmask; `None` when unobtainable.
    pub private_flags: Option<u32>,
    /// Public source path of the installed base archive.
    pub source_dir: String,
    pub activities: Vec<AppComponentInfo>,
    pub services: Vec<AppComponentInfo>,
    pub receivers: Vec<AppComponentInfo>,
    pub providers: Vec<AppComponentInfo>,
    /// Raw DER bytes of the signing certificate, when available.
    pub signing_certificate: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_paths_order() {
        let handle = ArchiveHandle::with_splits(
            "/data/app/base.apk",
            vec![
                PathBuf::from("/data/app/split_config.arm64_v8a.apk"),
                PathBuf::from("/data/app/split_config.en.apk"),
            ],
        );
        let paths: Vec<_> = handle.paths().collect();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], Path::new("/data/app/base.apk"));
        assert_eq!(paths[2], Path::new("/data/app/split_config.en.apk"));
    }

    #[test]
    fn flags_combine() {
        let flags = PackageFlags::SYSTEM | PackageFlags::UPDATED_SYSTEM;
        assert!(flags.contains(PackageFlags::SYSTEM));
        assert!(flags.contains(PackageFlags::UPDATED_SYSTEM));
        assert!(!PackageFlags::SYSTEM.contains(PackageFlags::UPDATED_SYSTEM));
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = PackageRecord {
            package_name: "com.example.app".to_string(),
            flags: PackageFlags::SYSTEM | PackageFlags::UPDATED_SYSTEM,
            private_flags: Some(1 << 19),
            source_dir: "/product/app/Example/Example.apk".to_string(),
            ..PackageRecord::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: PackageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.package_name, record.package_name);
        assert_eq!(back.flags, record.flags);
        assert_eq!(back.private_flags, record.private_flags);
    }
}
