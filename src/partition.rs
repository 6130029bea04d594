//! Install-partition attribution for batches of package records.
//!
//! Primary method: decode partition bits from the platform's private
//! flags bitmask. Fallback: match the install source path against a
//! table of partition roots and their app subdirectories, including
//! vendor-specific roots observed in the wild. Packages matching
//! neither method are omitted from the result.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::core::{PackageFlags, PackageRecord};

/// Sentinel for a runtime-updated system package whose original
/// partition cannot be determined at all.
pub const PARTITION_UNKNOWN_UPDATED: &str = "/*";
/// Sentinel for a system package with readable private flags carrying
/// no partition bit, replaced by a runtime update.
pub const PARTITION_SYSTEM_UPDATED: &str = "/system/*";

/// System partition roots, in platform definition order.
const SYSTEM_PARTITIONS: [&str; 9] = [
    "/system",
    "/vendor",
    "/odm",
    "/oem",
    "/product",
    "/system_ext",
    "/system/custom",
    "/product_h",
    "/hw_product",
];

/// App subdirectories present under every system partition root.
const APP_DIRS: [&str; 4] = ["app", "priv-app", "overlay", "framework"];

/// Extra roots outside the system partition set. `None` means the root
/// itself (with a trailing slash) is the match prefix.
const ADDITIONAL_ROOTS: [(&str, Option<&str>); 8] = [
    ("/apex", None),
    ("/data", Some("/data/app/")),
    ("/product/data-app", None),
    ("/cust", Some("/cust/app/")),
    ("/product_h/region_comm", None),
    ("/hw_product/region_comm", None),
    ("/system/delapp", None),
    ("/data/preload", None),
];

/// Attribute each record to a partition path. Unattributable packages
/// are omitted.
pub fn attribute(records: &[PackageRecord]) -> BTreeMap<String, String> {
    if records.is_empty() {
        return BTreeMap::new();
    }
    let table = prefix_table();
    let key_len = table
        .iter()
        .map(|(root, _)| root.len())
        .min()
        .unwrap_or(0);
    // Roots sharing a truncated key are tried in table order.
    let mut key_groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, (root, _)) in table.iter().enumerate() {
        key_groups.entry(&root[..key_len]).or_default().push(i);
    }

    let mut out = BTreeMap::new();
    for record in records {
        if record.flags.contains(PackageFlags::SYSTEM) {
            let updated = record.flags.contains(PackageFlags::UPDATED_SYSTEM);
            if let Some(partition) = partition_from_flags(record.private_flags, updated) {
                out.insert(record.package_name.clone(), partition.to_string());
                continue;
            }
        }

        let src = record.source_dir.as_str();
        let Some(key) = src.get(..key_len.min(src.len())) else {
            continue;
        };
        let Some(group) = key_groups.get(key) else {
            debug!(package = %record.package_name, source = %src, "no partition match");
            continue;
        };
        for &i in group {
            let (root, prefixes) = &table[i];
            if prefixes.iter().any(|p| src.starts_with(p.as_str())) {
                out.insert(record.package_name.clone(), sanitize(root).to_string());
                break;
            }
        }
    }
    out
}

/// Decode the private-flags bitmask, checked in fixed bit order.
fn partition_from_flags(private_flags: Option<u32>, updated: bool) -> Option<&'static str> {
    let Some(flags) = private_flags else {
        // An updated package's original path is gone, so the fallback
        // method cannot recover its partition either.
        return updated.then_some(PARTITION_UNKNOWN_UPDATED);
    };
    if flags & (1 << 21) != 0 {
        Some("/system_ext")
    } else if flags & (1 << 19) != 0 {
        Some("/product")
    } else if flags & (1 << 17) != 0 {
        Some("/oem")
    } else if flags & (1 << 30) != 0 {
        Some("/odm")
    } else if flags & (1 << 18) != 0 {
        Some("/vendor")
    } else {
        updated.then_some(PARTITION_SYSTEM_UPDATED)
    }
}

/// Root path to candidate prefix list, in fixed order.
fn prefix_table() -> Vec<(String, Vec<String>)> {
    let mut table: Vec<(String, Vec<String>)> = SYSTEM_PARTITIONS
        .iter()
        .map(|root| {
            let prefixes = APP_DIRS
                .iter()
                .map(|dir| format!("{}/{}/", root, dir))
                .collect();
            (root.to_string(), prefixes)
        })
        .collect();
    for (root, prefix) in ADDITIONAL_ROOTS {
        let prefix = prefix
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/", root));
        table.push((root.to_string(), vec![prefix]));
    }
    table
}

/// Vendor-specific roots report their parent partition.
fn sanitize(root: &str) -> &str {
    match root {
        "/data/preload" => "/data",
        "/product/data-app" => "/product",
        "/product_h/region_comm" => "/product_h",
        "/hw_product/region_comm" => "/hw_product",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, flags: PackageFlags, private: Option<u32>, src: &str) -> PackageRecord {
        PackageRecord {
            package_name: name.to_string(),
            flags,
            private_flags: private,
            source_dir: src.to_string(),
            ..PackageRecord::default()
        }
    }

    #[test]
    fn vendor_app_by_source_path() {
        let records = [record(
            "com.vendor.tool",
            PackageFlags::empty(),
            None,
            "/vendor/app/Foo/Foo.apk",
        )];
        let map = attribute(&records);
        assert_eq!(map.get("com.vendor.tool").map(String::as_str), Some("/vendor"));
    }

    #[test]
    fn system_ext_by_private_flag_bit() {
        let records = [record(
            "com.oem.settings",
            PackageFlags::SYSTEM,
            Some(1 << 21),
            "",
        )];
        let map = attribute(&records);
        assert_eq!(
            map.get("com.oem.settings").map(String::as_str),
            Some("/system_ext")
        );
    }

    #[test]
    fn updated_without_flags_is_unknown_sentinel() {
        let records = [record(
            "com.oem.updated",
            PackageFlags::SYSTEM | PackageFlags::UPDATED_SYSTEM,
            None,
            "/data/app/com.oem.updated/base.apk",
        )];
        let map = attribute(&records);
        assert_eq!(
            map.get("com.oem.updated").map(String::as_str),
            Some(PARTITION_UNKNOWN_UPDATED)
        );
    }

    #[test]
    fn updated_with_empty_flags_is_system_sentinel() {
        let records = [record(
            "com.oem.updated2",
            PackageFlags::SYSTEM | PackageFlags::UPDATED_SYSTEM,
            Some(0),
            "/data/app/com.oem.updated2/base.apk",
        )];
        let map = attribute(&records);
        assert_eq!(
            map.get("com.oem.updated2").map(String::as_str),
            Some(PARTITION_SYSTEM_UPDATED)
        );
    }

    #[test]
    fn system_app_without_bits_falls_back_to_path() {
        let records = [record(
            "com.android.shell",
            PackageFlags::SYSTEM,
            Some(0),
            "/system/priv-app/Shell/Shell.apk",
        )];
        let map = attribute(&records);
        assert_eq!(map.get("com.android.shell").map(String::as_str), Some("/system"));
    }

    #[test]
    fn user_app_on_data() {
        let records = [record(
            "com.example.app",
            PackageFlags::empty(),
            None,
            "/data/app/~~abc==/com.example.app-xyz==/base.apk",
        )];
        let map = attribute(&records);
        assert_eq!(map.get("com.example.app").map(String::as_str), Some("/data"));
    }

    #[test]
    fn vendor_specific_roots_sanitized() {
        let records = [
            record(
                "com.oem.region",
                PackageFlags::empty(),
                None,
                "/hw_product/region_comm/apps/Foo.apk",
            ),
            record(
                "com.oem.dataapp",
                PackageFlags::empty(),
                None,
                "/product/data-app/Bar/Bar.apk",
            ),
        ];
        let map = attribute(&records);
        assert_eq!(map.get("com.oem.region").map(String::as_str), Some("/hw_product"));
        assert_eq!(map.get("com.oem.dataapp").map(String::as_str), Some("/product"));
    }

    #[test]
    fn unmatched_packages_omitted() {
        let records = [record(
            "com.sdcard.app",
            PackageFlags::empty(),
            None,
            "/mnt/expand/app/base.apk",
        )];
        assert!(attribute(&records).is_empty());
    }

    #[test]
    fn system_ext_path_not_confused_with_system() {
        let records = [record(
            "com.sysext.app",
            PackageFlags::empty(),
            None,
            "/system_ext/app/Foo/Foo.apk",
        )];
        let map = attribute(&records);
        assert_eq!(
            map.get("com.sysext.app").map(String::as_str),
            Some("/system_ext")
        );
    }
}
