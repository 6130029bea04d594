//! apkscope: application package analysis.
//!
//! Parses application archives (zip containers), enumerates their DEX
//! class tables one container at a time, extracts and normalizes code
//! package names, fingerprints signing certificates, scans native-code
//! ABI coverage, attributes install partitions, and classifies the
//! resulting facts against a rule repository into sectioned,
//! presentation-ready results.

pub mod archive;
pub mod cert;
pub mod core;
pub mod dex;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod partition;
pub mod rules;

pub use engine::{AnalysisTarget, ClassificationEngine, CollectionHandle, PackageRegistry};
pub use error::{Result, ScanError};
