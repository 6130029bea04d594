//! Immediate-superclass resolution for a set of class names.
//!
//! Two interchangeable strategies. The static scan walks the package's
//! class tables directly and works on any readable archive; the host
//! loader delegates to a platform class-loading facility and is only
//! legal on immutable archive files. Lookup misses are omitted, decode
//! errors are logged and skipped. Neither strategy fails the batch.

use std::collections::BTreeSet;

use tracing::warn;

use crate::core::ArchiveHandle;
use crate::dex::enumerator::{DexEntryEnumerator, EnumeratorConfig};
use crate::error::Result;

/// Host platform class-loading facility, injected by the caller.
pub trait ClassLoader {
    /// The superclass of `class_name` in dotted form, or `None` when the
    /// class has no superclass. A class absent from the loader is an
    /// error mapped to a skip by the resolver.
    fn load_superclass(&self, class_name: &str) -> Result<Option<String>>;
}

/// Expands a class-name set with each member's immediate superclass.
pub trait SuperclassResolver {
    /// Returns the input set plus every resolved superclass name.
    fn resolve(&self, handle: &ArchiveHandle, names: &BTreeSet<String>) -> BTreeSet<String>;
}

/// Resolution by scanning the package's own class tables.
#[derive(Debug, Default)]
pub struct StaticScanResolver {
    config: EnumeratorConfig,
}

impl StaticScanResolver {
    pub fn new(config: EnumeratorConfig) -> Self {
        Self { config }
    }

    fn scan(&self, handle: &ArchiveHandle, names: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let targets: BTreeSet<String> = names.iter().map(|n| descriptor_of(n)).collect();
        let mut found = BTreeSet::new();
        let mut resolved = 0usize;

        let mut enumerator = DexEntryEnumerator::open(handle, self.config.clone())?;
        'containers: while let Some(entry) = enumerator.next_entry()? {
            for class in entry.dex().classes() {
                let class = match class {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable class definition");
                        continue;
                    }
                };
                if !targets.contains(&class.descriptor) {
                    continue;
                }
                // A root class stands in for its own superclass.
                let superclass = class.superclass.as_deref().unwrap_or(&class.descriptor);
                if let Some(name) = dotted_of(superclass) {
                    found.insert(name);
                }
                resolved += 1;
                if resolved == names.len() {
                    break 'containers;
                }
            }
        }
        Ok(found)
    }
}

impl SuperclassResolver for StaticScanResolver {
    fn resolve(&self, handle: &ArchiveHandle, names: &BTreeSet<String>) -> BTreeSet<String> {
        let mut out = names.clone();
        match self.scan(handle, names) {
            Ok(found) => out.extend(found),
            Err(e) => {
                warn!(
                    archive = %handle.base_path().display(),
                    error = %e,
                    "superclass scan failed, returning names unresolved"
                );
            }
        }
        out
    }
}

/// Resolution through the host's class-loading facility.
pub struct HostLoaderResolver<L> {
    loader: L,
}

impl<L: ClassLoader> HostLoaderResolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }
}

impl<L: ClassLoader> SuperclassResolver for HostLoaderResolver<L> {
    fn resolve(&self, _handle: &ArchiveHandle, names: &BTreeSet<String>) -> BTreeSet<String> {
        let mut out = names.clone();
        for name in names {
            match self.loader.load_superclass(name) {
                Ok(Some(superclass)) => {
                    out.insert(superclass);
                }
                Ok(None) => {
                    out.insert(name.clone());
                }
                // Not-found and decode failures alike: skip this name.
                Err(e) => {
                    warn!(class = %name, error = %e, "superclass load failed");
                }
            }
        }
        out
    }
}

/// Picks the resolution strategy for the caller's environment: the host
/// loader when one is available, otherwise the static scan.
pub fn resolver_for<L: ClassLoader + 'static>(
    loader: Option<L>,
    config: EnumeratorConfig,
) -> Box<dyn SuperclassResolver> {
    match loader {
        Some(loader) => Box::new(HostLoaderResolver::new(loader)),
        None => Box::new(StaticScanResolver::new(config)),
    }
}

fn descriptor_of(class_name: &str) -> String {
    format!("L{};", class_name.replace('.', "/"))
}

fn dotted_of(descriptor: &str) -> Option<String> {
    descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .map(|s| s.replace('/', "."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::testbuild::build_dex;
    use crate::error::ScanError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_apk(dex: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        {
            let mut zw = zip::ZipWriter::new(tmp.as_file_mut());
            let opts = zip::write::SimpleFileOptions::default();
            zw.start_file("classes.dex", opts).unwrap();
            zw.write_all(dex).unwrap();
            zw.finish().unwrap();
        }
        tmp.flush().unwrap();
        tmp
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn static_scan_adds_superclasses() {
        let dex = build_dex(&[
            ("Lcom/app/MainActivity;", Some("Landroidx/appcompat/app/AppCompatActivity;")),
            ("Lcom/app/Worker;", Some("Landroidx/work/Worker;")),
            ("Lcom/app/Unrelated;", Some("Ljava/lang/Object;")),
        ]);
        let tmp = write_apk(&dex);
        let handle = crate::core::ArchiveHandle::new(tmp.path());

        let resolver = StaticScanResolver::default();
        let input = names(&["com.app.MainActivity", "com.app.Worker"]);
        let out = resolver.resolve(&handle, &input);

        assert!(out.contains("com.app.MainActivity"));
        assert!(out.contains("androidx.appcompat.app.AppCompatActivity"));
        assert!(out.contains("androidx.work.Worker"));
        assert!(!out.contains("java.lang.Object"));
    }

    #[test]
    fn static_scan_misses_are_non_fatal() {
        let dex = build_dex(&[("Lcom/app/Present;", Some("Ljava/lang/Object;"))]);
        let tmp = write_apk(&dex);
        let handle = crate::core::ArchiveHandle::new(tmp.path());

        let resolver = StaticScanResolver::default();
        let input = names(&["com.app.Missing"]);
        let out = resolver.resolve(&handle, &input);
        assert_eq!(out, input);
    }

    #[test]
    fn static_scan_root_class_maps_to_itself() {
        let dex = build_dex(&[("Lcom/app/Root;", None)]);
        let tmp = write_apk(&dex);
        let handle = crate::core::ArchiveHandle::new(tmp.path());

        let resolver = StaticScanResolver::default();
        let out = resolver.resolve(&handle, &names(&["com.app.Root"]));
        assert_eq!(out, names(&["com.app.Root"]));
    }

    #[test]
    fn static_scan_archive_error_returns_input() {
        let handle = crate::core::ArchiveHandle::new("/nonexistent/base.apk");
        let resolver = StaticScanResolver::default();
        let input = names(&["com.app.Main"]);
        assert_eq!(resolver.resolve(&handle, &input), input);
    }

    struct MapLoader(std::collections::HashMap<String, Option<String>>);

    impl ClassLoader for MapLoader {
        fn load_superclass(&self, class_name: &str) -> Result<Option<String>> {
            self.0
                .get(class_name)
                .cloned()
                .ok_or_else(|| ScanError::NotFound(class_name.to_string()))
        }
    }

    #[test]
    fn host_loader_skips_missing_classes() {
        let mut map = std::collections::HashMap::new();
        map.insert(
            "com.app.Main".to_string(),
            Some("android.app.Activity".to_string()),
        );
        map.insert("com.app.Root".to_string(), None);
        let resolver = HostLoaderResolver::new(MapLoader(map));

        let handle = crate::core::ArchiveHandle::new("/unused.apk");
        let input = names(&["com.app.Main", "com.app.Root", "com.app.Gone"]);
        let out = resolver.resolve(&handle, &input);

        assert!(out.contains("android.app.Activity"));
        assert!(out.contains("com.app.Gone"));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn strategy_selection_prefers_host_loader() {
        let mut map = std::collections::HashMap::new();
        map.insert("com.app.Main".to_string(), None);
        let resolver = resolver_for(Some(MapLoader(map)), EnumeratorConfig::default());

        // A host loader never touches the archive path.
        let handle = crate::core::ArchiveHandle::new("/nonexistent/base.apk");
        let out = resolver.resolve(&handle, &names(&["com.app.Main"]));
        assert_eq!(out, names(&["com.app.Main"]));

        let fallback = resolver_for::<MapLoader>(None, EnumeratorConfig::default());
        let out = fallback.resolve(&handle, &names(&["com.app.Main"]));
        assert_eq!(out, names(&["com.app.Main"]));
    }
}
