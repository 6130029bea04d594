//! Core data types for package analysis, organized by submodule.

pub mod certificate;
pub mod component;
pub mod package;
pub mod section;

// Re-exports for convenient access under crate::core::*
pub use certificate::{CertificateInfo, Fingerprint, PrincipalEntry};
pub use component::{
    ClassifiedComponent, LibMark, MarkedComponent, MergingMarkedComponent, NativeLibEntry,
    PackageComponent,
};
pub use package::{AppComponentInfo, ArchiveHandle, PackageFlags, PackageRecord};
pub use section::{
    ComponentCategory, ComponentCollection, LoadState, Section, SectionedComponents,
};
