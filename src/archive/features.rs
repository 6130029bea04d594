//! Advisory archive feature scanning: native-library ABI coverage and
//! marker entries.
//!
//! Detection is by entry name only; no payload is ever opened here.
//! Opening every entry's content stream is prohibitively slow on large
//! archives, and name patterns are sufficient for every marker we track.
//! Scan failures yield the all-false result rather than an error.

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::archive::zip::ZipArchive;
use crate::core::NativeLibEntry;
use crate::error::Result;

/// Native code entries in package archives: `lib/<abi>/lib<name>.so`.
static LIB_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^lib/([\w-]+)/lib(.+)\.so$").expect("static pattern"));

/// Marker libraries detected by name, in fixed order.
const MARKER_LIBS: [&str; 3] = ["flutter", "reactnativejni", "xamarin-app"];

/// Managed-runtime toolchain markers, matched by exact entry name.
const KOTLIN_ENTRY_NAMES: [&str; 2] = ["kotlin-tooling-metadata.json", "kotlin/kotlin.kotlin_builtins"];

/// The ABI lists of the host device, as supplied by the platform.
#[derive(Debug, Clone, Default)]
pub struct HostAbis {
    /// All supported ABIs, in platform preference order.
    pub supported: Vec<String>,
    pub supported_32: Vec<String>,
    pub supported_64: Vec<String>,
}

impl HostAbis {
    pub fn new(
        supported: impl IntoIterator<Item = String>,
        supported_32: impl IntoIterator<Item = String>,
        supported_64: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            supported_32: supported_32.into_iter().collect(),
            supported_64: supported_64.into_iter().collect(),
        }
    }
}

/// Boolean feature vector from one archive scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFeatures {
    /// A Kotlin toolchain marker entry is present.
    pub kotlin: bool,
    /// "64-bit ABI present whenever any 32-bit ABI is present" against
    /// the host's supported ABI list.
    pub abi64_complete: bool,
    pub flutter: bool,
    pub react_native: bool,
    pub xamarin: bool,
}

/// Scan entry names for ABI coverage and marker libraries.
///
/// Advisory: a corrupt or unreadable archive returns the default
/// (all-false) vector.
pub fn scan_features(path: &Path, abis: &HostAbis) -> ArchiveFeatures {
    match scan_features_inner(path, abis) {
        Ok(features) => features,
        Err(e) => {
            warn!(archive = %path.display(), error = %e, "feature scan failed");
            ArchiveFeatures::default()
        }
    }
}

fn scan_features_inner(path: &Path, abis: &HostAbis) -> Result<ArchiveFeatures> {
    let archive = ZipArchive::open(path)?;

    let mut abi_seen = vec![false; abis.supported.len()];
    let mut marker_seen = [false; MARKER_LIBS.len()];
    let mut kotlin = false;

    for entry in archive.entries() {
        if !kotlin {
            kotlin = KOTLIN_ENTRY_NAMES.iter().any(|n| entry.name == *n);
        }
        if kotlin && abi_seen.iter().all(|b| *b) && marker_seen.iter().all(|b| *b) {
            break;
        }
        if !entry.name.starts_with("lib/") {
            continue;
        }
        let Some(caps) = LIB_ENTRY_RE.captures(&entry.name) else {
            continue;
        };
        let (abi, lib) = (&caps[1], &caps[2]);
        // Markers only count under a host-supported ABI directory.
        if let Some(abi_idx) = abis.supported.iter().position(|a| a == abi) {
            abi_seen[abi_idx] = true;
            if let Some(lib_idx) = MARKER_LIBS.iter().position(|m| *m == lib) {
                marker_seen[lib_idx] = true;
            }
        }
    }

    let has = |list: &[String]| {
        abis.supported
            .iter()
            .enumerate()
            .any(|(i, abi)| abi_seen[i] && list.contains(abi))
    };
    let lib64 = has(&abis.supported_64);
    let lib32 = has(&abis.supported_32);

    Ok(ArchiveFeatures {
        kotlin,
        abi64_complete: !lib32 || lib64,
        flutter: marker_seen[0],
        react_native: marker_seen[1],
        xamarin: marker_seen[2],
    })
}

/// All native-library entries with sizes from the central directory.
pub fn native_lib_entries(path: &Path) -> Result<Vec<NativeLibEntry>> {
    let archive = ZipArchive::open(path)?;
    let mut libs = Vec::new();
    for entry in archive.entries() {
        if !entry.name.starts_with("lib/") {
            continue;
        }
        if LIB_ENTRY_RE.is_match(&entry.name) {
            libs.push(NativeLibEntry {
                path: entry.name.clone(),
                compressed_size: entry.compressed_size,
                size: entry.uncompressed_size,
            });
        }
    }
    Ok(libs)
}

/// The set of ABI directories the archive ships native code for.
pub fn native_lib_abis(path: &Path) -> Result<BTreeSet<String>> {
    let archive = ZipArchive::open(path)?;
    let mut abis = BTreeSet::new();
    for entry in archive.entries() {
        if !entry.name.starts_with("lib/") {
            continue;
        }
        if let Some(caps) = LIB_ENTRY_RE.captures(&entry.name) {
            abis.insert(caps[1].to_string());
        }
    }
    Ok(abis)
}

/// Exact-name probe for a single entry. Advisory; errors report absence.
pub fn has_entry(path: &Path, name: &str) -> bool {
    match ZipArchive::open(path) {
        Ok(archive) => archive.entry_by_name(name).is_some(),
        Err(e) => {
            warn!(archive = %path.display(), error = %e, "entry probe failed");
            false
        }
    }
}
