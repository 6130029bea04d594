//! Rule repository: exact-name and ordered regex rules for component
//! classification.
//!
//! Exact lookups always win over regex matches for the same name. Regex
//! rules are scoped to one component category and tried in insertion
//! order; the first match is taken.

use std::collections::HashMap;

use regex::Regex;

use crate::core::{ComponentCategory, LibMark};
use crate::error::{Result, ScanError};

/// Source of classification rules, injected into the engine.
pub trait RuleRepository: Send + Sync {
    fn lookup_exact(&self, name: &str) -> Option<LibMark>;

    /// Regex rules for one category, in priority order.
    fn regex_rules(&self, category: ComponentCategory) -> &[(Regex, LibMark)];

    /// Exact match first, then the category's regex rules in order.
    fn find_mark(&self, category: ComponentCategory, name: &str) -> Option<LibMark> {
        if let Some(mark) = self.lookup_exact(name) {
            return Some(mark);
        }
        self.regex_rules(category)
            .iter()
            .find(|(pattern, _)| pattern.is_match(name))
            .map(|(_, mark)| mark.clone())
    }
}

/// In-memory rule set.
#[derive(Debug, Default)]
pub struct RuleSet {
    exact: HashMap<String, LibMark>,
    regex: HashMap<ComponentCategory, Vec<(Regex, LibMark)>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exact(&mut self, name: impl Into<String>, mark: LibMark) {
        self.exact.insert(name.into(), mark);
    }

    /// Append a regex rule to the back of the category's list.
    pub fn add_regex(
        &mut self,
        category: ComponentCategory,
        pattern: &str,
        mark: LibMark,
    ) -> Result<()> {
        let regex = Regex::new(pattern)
            .map_err(|e| ScanError::InvalidFormat(format!("rule pattern {:?}: {}", pattern, e)))?;
        self.regex.entry(category).or_default().push((regex, mark));
        Ok(())
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }
}

impl RuleRepository for RuleSet {
    fn lookup_exact(&self, name: &str) -> Option<LibMark> {
        self.exact.get(name).cloned()
    }

    fn regex_rules(&self, category: ComponentCategory) -> &[(Regex, LibMark)] {
        self.regex
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(label: &str) -> LibMark {
        LibMark {
            label: label.to_string(),
            icon_index: None,
            monochrome: false,
        }
    }

    #[test]
    fn exact_beats_regex_for_same_name() {
        let mut rules = RuleSet::new();
        rules.add_exact("okhttp3", mark("OkHttp exact"));
        rules
            .add_regex(ComponentCategory::DexPackage, r"^okhttp3.*", mark("OkHttp regex"))
            .unwrap();

        let found = rules
            .find_mark(ComponentCategory::DexPackage, "okhttp3")
            .unwrap();
        assert_eq!(found.label, "OkHttp exact");
    }

    #[test]
    fn regex_rules_tried_in_order() {
        let mut rules = RuleSet::new();
        rules
            .add_regex(ComponentCategory::Service, r"^com\.google\..*", mark("Google"))
            .unwrap();
        rules
            .add_regex(ComponentCategory::Service, r"^com\..*", mark("Generic"))
            .unwrap();

        let found = rules
            .find_mark(ComponentCategory::Service, "com.google.firebase.FirebaseService")
            .unwrap();
        assert_eq!(found.label, "Google");
        let generic = rules
            .find_mark(ComponentCategory::Service, "com.example.WorkService")
            .unwrap();
        assert_eq!(generic.label, "Generic");
    }

    #[test]
    fn regex_rules_scoped_by_category() {
        let mut rules = RuleSet::new();
        rules
            .add_regex(ComponentCategory::Service, r"^androidx\..*", mark("Jetpack"))
            .unwrap();
        assert!(rules
            .find_mark(ComponentCategory::Activity, "androidx.activity.ComponentActivity")
            .is_none());
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let mut rules = RuleSet::new();
        let err = rules
            .add_regex(ComponentCategory::Service, r"([unclosed", mark("X"))
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidFormat(_)));
    }

    #[test]
    fn unmatched_name_has_no_mark() {
        let rules = RuleSet::new();
        assert!(rules.find_mark(ComponentCategory::DexPackage, "okio").is_none());
    }
}
