//! Bytecode-container parsing and class-table analysis.

pub mod enumerator;
pub mod format;
pub mod packages;
pub mod superclass;
#[cfg(test)]
pub(crate) mod testbuild;

pub use enumerator::{DexCounter, DexEntry, DexEntryEnumerator, EnumeratorConfig};
pub use format::{ClassDef, DexDialect, DexFile};
pub use packages::{
    extract_packages, map_to_package, normalize, partition_packages, NormalizeOptions,
    PackageKind, PackagePartition,
};
pub use superclass::{
    resolver_for, ClassLoader, HostLoaderResolver, StaticScanResolver, SuperclassResolver,
};
