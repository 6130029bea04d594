//! Package archive access: zip container reading and advisory feature
//! scanning.

pub mod features;
pub mod zip;

pub use features::{
    has_entry, native_lib_abis, native_lib_entries, scan_features, ArchiveFeatures, HostAbis,
};
pub use zip::{ZipArchive, ZipEntry};
