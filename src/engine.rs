//! Rule-based component classification with per-category load
//! orchestration.
//!
//! Each `(collection, load group)` pair admits one in-flight load;
//! concurrent requests for the same pair wait on a condition variable
//! and observe the published result instead of duplicating work. The
//! transition is one-way: once a category is `Loaded` it is never
//! loaded again.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::archive;
use crate::core::{
    ArchiveHandle, ClassifiedComponent, ComponentCategory, ComponentCollection, LoadState,
    MarkedComponent, MergingMarkedComponent, PackageComponent, Section, SectionedComponents,
};
use crate::dex::{
    extract_packages, partition_packages, DexEntryEnumerator, EnumeratorConfig, NormalizeOptions,
};
use crate::error::Result;
use crate::rules::RuleRepository;

/// Supplies installed-package records for classification.
pub trait PackageRegistry: Send + Sync {
    fn package_record(&self, package_name: &str) -> Result<crate::core::PackageRecord>;
}

/// One package under analysis.
#[derive(Debug, Clone)]
pub struct AnalysisTarget {
    pub package_name: String,
    pub handle: ArchiveHandle,
}

/// Categories that load together in a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LoadGroup {
    AppComponents,
    DexPackages,
    NativeLibraries,
}

impl LoadGroup {
    fn of(category: ComponentCategory) -> Self {
        match category {
            ComponentCategory::Activity
            | ComponentCategory::Service
            | ComponentCategory::Receiver
            | ComponentCategory::Provider => LoadGroup::AppComponents,
            ComponentCategory::DexPackage => LoadGroup::DexPackages,
            ComponentCategory::NativeLibrary => LoadGroup::NativeLibraries,
        }
    }
}

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to one package's materialized category results.
#[derive(Clone)]
pub struct CollectionHandle {
    shared: Arc<CollectionShared>,
}

struct CollectionShared {
    id: u64,
    inner: Mutex<ComponentCollection>,
}

impl CollectionHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(CollectionShared {
                id: NEXT_COLLECTION_ID.fetch_add(1, AtomicOrdering::Relaxed),
                inner: Mutex::new(ComponentCollection::new()),
            }),
        }
    }

    pub fn state(&self, category: ComponentCategory) -> LoadState {
        lock_unpoisoned(&self.shared.inner).state(category)
    }

    /// Clone of one category's sectioned result, if loaded.
    pub fn category(&self, category: ComponentCategory) -> Option<SectionedComponents> {
        lock_unpoisoned(&self.shared.inner).category(category).cloned()
    }
}

impl Default for CollectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies package facts into sectioned category results.
pub struct ClassificationEngine<R, P> {
    rules: R,
    registry: P,
    config: EnumeratorConfig,
    in_flight: Mutex<HashSet<(u64, LoadGroup)>>,
    load_done: Condvar,
    executions: AtomicUsize,
}

impl<R: RuleRepository, P: PackageRegistry> ClassificationEngine<R, P> {
    pub fn new(rules: R, registry: P) -> Self {
        Self::with_config(rules, registry, EnumeratorConfig::default())
    }

    pub fn with_config(rules: R, registry: P, config: EnumeratorConfig) -> Self {
        Self {
            rules,
            registry,
            config,
            in_flight: Mutex::new(HashSet::new()),
            load_done: Condvar::new(),
            executions: AtomicUsize::new(0),
        }
    }

    /// Number of load executions actually run, across all targets.
    pub fn load_execution_count(&self) -> usize {
        self.executions.load(AtomicOrdering::SeqCst)
    }

    /// Load one category into the collection, classifying as needed.
    ///
    /// Idempotent: a loaded category returns immediately. A fatal
    /// archive error leaves the category unloaded so a later caller can
    /// try again; recoverable failures publish an empty result.
    pub fn load(
        &self,
        target: &AnalysisTarget,
        collection: &CollectionHandle,
        category: ComponentCategory,
    ) -> Result<()> {
        let key = (collection.shared.id, LoadGroup::of(category));

        let mut in_flight = lock_unpoisoned(&self.in_flight);
        loop {
            if collection.state(category) == LoadState::Loaded {
                return Ok(());
            }
            if !in_flight.contains(&key) {
                in_flight.insert(key);
                break;
            }
            in_flight = match self.load_done.wait(in_flight) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        drop(in_flight);

        let result = self.run_load(target, collection, category);

        let mut in_flight = lock_unpoisoned(&self.in_flight);
        in_flight.remove(&key);
        self.load_done.notify_all();
        drop(in_flight);
        result
    }

    fn run_load(
        &self,
        target: &AnalysisTarget,
        collection: &CollectionHandle,
        category: ComponentCategory,
    ) -> Result<()> {
        self.executions.fetch_add(1, AtomicOrdering::SeqCst);
        debug!(package = %target.package_name, ?category, "loading component category");
        match LoadGroup::of(category) {
            LoadGroup::AppComponents => self.load_app_components(target, collection),
            LoadGroup::DexPackages => self.load_dex_packages(target, collection),
            LoadGroup::NativeLibraries => {
                self.load_native_libraries(target, collection);
                Ok(())
            }
        }
    }

    /// All four manifest categories load together from one record.
    fn load_app_components(&self, target: &AnalysisTarget, collection: &CollectionHandle) -> Result<()> {
        let record = match self.registry.package_record(&target.package_name) {
            Ok(record) => record,
            Err(e) => {
                warn!(package = %target.package_name, error = %e, "package record unavailable");
                crate::core::PackageRecord::default()
            }
        };
        let per_category = [
            (ComponentCategory::Activity, &record.activities),
            (ComponentCategory::Service, &record.services),
            (ComponentCategory::Receiver, &record.receivers),
            (ComponentCategory::Provider, &record.providers),
        ];
        let mut inner = lock_unpoisoned(&collection.shared.inner);
        for (cat, infos) in per_category {
            let facts = infos
                .iter()
                .map(|info| PackageComponent::AppComponent {
                    name: info.name.clone(),
                    enabled: info.enabled,
                })
                .collect();
            let classified = self.classify(cat, facts);
            inner.publish(cat, build_sections(classified, None, None));
        }
        Ok(())
    }

    fn load_dex_packages(&self, target: &AnalysisTarget, collection: &CollectionHandle) -> Result<()> {
        let mut enumerator = DexEntryEnumerator::open(&target.handle, self.config.clone())?;
        let packages = extract_packages(&mut enumerator)?;
        let options = NormalizeOptions {
            own_package: Some(target.package_name.clone()),
            collapse_minified: true,
            reverse_desugar: true,
        };
        let partition = partition_packages(packages, &options);

        let classify_set = |names: &std::collections::BTreeSet<String>| {
            self.classify(
                ComponentCategory::DexPackage,
                names
                    .iter()
                    .map(|n| PackageComponent::Simple(n.clone()))
                    .collect(),
            )
        };
        let normal = classify_set(&partition.normal);
        let own = classify_set(&partition.own_namespace);
        let minimized = classify_set(&partition.minified);

        let mut inner = lock_unpoisoned(&collection.shared.inner);
        inner.publish(
            ComponentCategory::DexPackage,
            build_sections(normal, Some(own), Some(minimized)),
        );
        Ok(())
    }

    /// Advisory: scan failures publish an empty loaded result.
    fn load_native_libraries(&self, target: &AnalysisTarget, collection: &CollectionHandle) {
        let mut by_name: std::collections::BTreeMap<String, Vec<crate::core::NativeLibEntry>> =
            std::collections::BTreeMap::new();
        for path in target.handle.paths() {
            let entries = match archive::native_lib_entries(path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(archive = %path.display(), error = %e, "native library scan failed");
                    continue;
                }
            };
            for entry in entries {
                let name = entry
                    .path
                    .rsplit('/')
                    .next()
                    .unwrap_or(entry.path.as_str())
                    .to_string();
                by_name.entry(name).or_default().push(entry);
            }
        }

        let facts = by_name
            .into_iter()
            .map(|(name, mut entries)| {
                entries.sort_by(|a, b| a.path.cmp(&b.path));
                PackageComponent::NativeLibrary { name, entries }
            })
            .collect();
        let classified = self.classify(ComponentCategory::NativeLibrary, facts);

        let mut inner = lock_unpoisoned(&collection.shared.inner);
        inner.publish(
            ComponentCategory::NativeLibrary,
            build_sections(classified, None, None),
        );
    }

    fn classify(
        &self,
        category: ComponentCategory,
        facts: Vec<PackageComponent>,
    ) -> Vec<ClassifiedComponent> {
        facts
            .into_iter()
            .map(|fact| match self.rules.find_mark(category, fact.value()) {
                Some(mark) => ClassifiedComponent::Marked(MarkedComponent {
                    mark,
                    component: fact,
                }),
                None => ClassifiedComponent::Plain(fact),
            })
            .collect()
    }
}

/// Case-folded comparison with a raw tiebreak, for label ordering.
fn label_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Assemble the fixed section layout from classified facts.
///
/// `Marked` carries same-label groups merged and sorted by label;
/// `Normal` carries every item sorted by value. The minimized sections
/// appear only for sources that distinguish them.
fn build_sections(
    classified: Vec<ClassifiedComponent>,
    minimized_self: Option<Vec<ClassifiedComponent>>,
    minimized: Option<Vec<ClassifiedComponent>>,
) -> SectionedComponents {
    // Group marked items by label, preserving first-seen label order.
    let mut groups: Vec<(String, Vec<MarkedComponent>)> = Vec::new();
    for item in &classified {
        if let ClassifiedComponent::Marked(marked) = item {
            match groups.iter_mut().find(|(label, _)| *label == marked.mark.label) {
                Some((_, members)) => members.push(marked.clone()),
                None => groups.push((marked.mark.label.clone(), vec![marked.clone()])),
            }
        }
    }
    let mut marked_section: Vec<ClassifiedComponent> = groups
        .into_iter()
        .map(|(_, mut members)| {
            if members.len() == 1 {
                return ClassifiedComponent::Marked(members.remove(0));
            }
            members.sort_by(|a, b| a.component.value().cmp(b.component.value()));
            let mark = members[0].mark.clone();
            ClassifiedComponent::Merged(MergingMarkedComponent {
                mark,
                components: members.into_iter().map(|m| m.component).collect(),
            })
        })
        .collect();
    marked_section.sort_by(|a, b| {
        let (la, lb) = (
            a.mark().map(|m| m.label.as_str()).unwrap_or(""),
            b.mark().map(|m| m.label.as_str()).unwrap_or(""),
        );
        label_compare(la, lb)
    });

    let mut normal_section = classified;
    normal_section.sort_by(|a, b| a.value().cmp(b.value()));

    let mut sections = SectionedComponents::new();
    sections.set(Section::Marked, marked_section);
    sections.set(Section::Normal, normal_section);
    if let Some(mut items) = minimized_self {
        items.sort_by(|a, b| a.value().cmp(b.value()));
        sections.set(Section::MinimizedSelf, items);
    }
    if let Some(mut items) = minimized {
        items.sort_by(|a, b| a.value().cmp(b.value()));
        sections.set(Section::Minimized, items);
    }
    sections
}

fn lock_unpoisoned<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
