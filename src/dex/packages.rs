//! Class-table to code-package conversion and normalization.
//!
//! Conversion is pure string work; the only I/O happens in the
//! enumerator feeding [`extract_packages`]. Output sets are sorted and
//! deduplicated by construction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dex::enumerator::DexEntryEnumerator;
use crate::error::Result;

/// Desugaring toolchains rewrite platform namespaces under this marker.
const DESUGAR_MARKER: &str = "j$";
const DESUGAR_TARGET: &str = "java";

/// Reflection internals collapse to this prefix instead of being
/// dropped as minified noise.
const REFLECTION_PREFIX: &str = "kotlin.reflect.jvm.internal";

/// Short package names that are real despite tripping the minification
/// heuristic.
const SHORT_NAME_ALLOW_LIST: [&str; 10] = [
    "android.support.v4",
    "android.support.v7",
    "androidx",
    "kotlin",
    "kotlinx",
    "javax",
    "junit",
    "okio",
    "okhttp3",
    "retrofit2",
];

/// Caller-supplied normalization switches. All passes are optional;
/// conversion from descriptors always happens.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// The analyzed package's own namespace, for ownership filtering.
    pub own_package: Option<String>,
    /// Apply the minification heuristic and allow-list.
    pub collapse_minified: bool,
    /// Rewrite the desugar marker back to the platform namespace.
    pub reverse_desugar: bool,
}

/// Where one normalized name landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    Normal,
    /// Nested under the analyzed package's own namespace.
    OwnNamespace,
    /// Judged to be minifier-obfuscated noise.
    Minified,
}

/// Sorted, deduplicated name sets split by disposition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagePartition {
    pub normal: BTreeSet<String>,
    pub own_namespace: BTreeSet<String>,
    pub minified: BTreeSet<String>,
}

/// Convert one class internal name to its declaring package.
///
/// `Lfoo/bar/Baz;` becomes `foo.bar`; a name with no usable separator
/// keeps its bare form. Blank input yields no value.
pub fn map_to_package(descriptor: &str) -> Option<String> {
    let class_name = descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .map(|s| s.replace('/', "."))
        .unwrap_or_else(|| descriptor.to_string());
    if class_name.trim().is_empty() {
        return None;
    }
    match class_name.rfind('.') {
        Some(end) if end > 0 => Some(class_name[..end].to_string()),
        _ => Some(class_name),
    }
}

/// Drain an enumerator and collect the declaring package of every class.
pub fn extract_packages(enumerator: &mut DexEntryEnumerator) -> Result<BTreeSet<String>> {
    let mut packages = BTreeSet::new();
    while let Some(entry) = enumerator.next_entry()? {
        for class in entry.dex().classes() {
            if let Some(package) = map_to_package(&class?.descriptor) {
                packages.insert(package);
            }
        }
    }
    Ok(packages)
}

/// Normalize one already-converted package name.
///
/// Returns the (possibly rewritten) name and its disposition. Applying
/// the function to its own output changes nothing.
pub fn normalize(name: &str, options: &NormalizeOptions) -> (String, PackageKind) {
    let mut name = name.to_string();

    if options.reverse_desugar {
        if name == DESUGAR_MARKER {
            name = DESUGAR_TARGET.to_string();
        } else if let Some(rest) = name.strip_prefix("j$.") {
            name = format!("{}.{}", DESUGAR_TARGET, rest);
        }
    }

    if let Some(own) = options.own_package.as_deref() {
        if in_namespace(&name, own) {
            return (name, PackageKind::OwnNamespace);
        }
    }

    if options.collapse_minified {
        if in_namespace(&name, REFLECTION_PREFIX) {
            return (REFLECTION_PREFIX.to_string(), PackageKind::Normal);
        }
        if looks_minified(&name) && !is_allow_listed(&name) {
            return (name, PackageKind::Minified);
        }
    }

    (name, PackageKind::Normal)
}

/// Normalize and partition a converted name set.
pub fn partition_packages(
    names: impl IntoIterator<Item = String>,
    options: &NormalizeOptions,
) -> PackagePartition {
    let mut partition = PackagePartition::default();
    for raw in names {
        let (name, kind) = normalize(&raw, options);
        match kind {
            PackageKind::Normal => partition.normal.insert(name),
            PackageKind::OwnNamespace => partition.own_namespace.insert(name),
            PackageKind::Minified => partition.minified.insert(name),
        };
    }
    partition
}

fn in_namespace(name: &str, namespace: &str) -> bool {
    name == namespace
        || (name.len() > namespace.len()
            && name.starts_with(namespace)
            && name.as_bytes()[namespace.len()] == b'.')
}

fn is_allow_listed(name: &str) -> bool {
    SHORT_NAME_ALLOW_LIST
        .iter()
        .any(|prefix| in_namespace(name, prefix))
}

/// Single segment, or a trailing segment of one or two characters with
/// an optional digit suffix.
fn looks_minified(name: &str) -> bool {
    let Some(last) = name.rsplit('.').next() else {
        return false;
    };
    if last.len() == name.len() {
        return true;
    }
    let stem = last.trim_end_matches(|c: char| c.is_ascii_digit());
    !stem.is_empty() && stem.len() <= 2
}
