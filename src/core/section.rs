//! Sectioned per-category results and their load states.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::component::ClassifiedComponent;

/// Component categories a caller can materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentCategory {
    Activity,
    Service,
    Receiver,
    Provider,
    DexPackage,
    NativeLibrary,
}

impl ComponentCategory {
    pub const ALL: [ComponentCategory; 6] = [
        ComponentCategory::Activity,
        ComponentCategory::Service,
        ComponentCategory::Receiver,
        ComponentCategory::Provider,
        ComponentCategory::DexPackage,
        ComponentCategory::NativeLibrary,
    ];
}

/// Named, ordered sub-list within a category result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Marked,
    Normal,
    MinimizedSelf,
    Minimized,
}

/// Per-category load state. One-way: `Unloaded` -> `Loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loaded,
}

/// Insertion-ordered section map. Sections are append-only once built;
/// a rebuilt result replaces the previous list rather than mutating it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionedComponents {
    sections: Vec<(Section, Vec<ClassifiedComponent>)>,
}

impl SectionedComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or append) one section's item list.
    pub fn set(&mut self, section: Section, items: Vec<ClassifiedComponent>) {
        if let Some(slot) = self.sections.iter_mut().find(|(s, _)| *s == section) {
            slot.1 = items;
        } else {
            self.sections.push((section, items));
        }
    }

    pub fn get(&self, section: Section) -> &[ClassifiedComponent] {
        self.sections
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, items)| items.as_slice())
            .unwrap_or(&[])
    }

    /// Total item count across all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Sections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &[ClassifiedComponent])> {
        self.sections.iter().map(|(s, items)| (*s, items.as_slice()))
    }
}

/// All materialized category results for one package, with per-category
/// load state. Created empty, each category filled exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentCollection {
    categories: HashMap<ComponentCategory, SectionedComponents>,
    states: HashMap<ComponentCategory, LoadState>,
}

impl ComponentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, category: ComponentCategory) -> LoadState {
        self.states.get(&category).copied().unwrap_or_default()
    }

    pub fn set_state(&mut self, category: ComponentCategory, state: LoadState) {
        self.states.insert(category, state);
    }

    pub fn category(&self, category: ComponentCategory) -> Option<&SectionedComponents> {
        self.categories.get(&category)
    }

    /// Publish one category's sectioned result and mark it loaded.
    pub fn publish(&mut self, category: ComponentCategory, sections: SectionedComponents) {
        self.categories.insert(category, sections);
        self.states.insert(category, LoadState::Loaded);
    }
}
