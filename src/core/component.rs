//! Raw and classified package components.

use serde::{Deserialize, Serialize};

/// One native-library archive entry with its central-directory sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLibEntry {
    pub path: String,
    pub compressed_size: u64,
    pub size: u64,
}

/// One raw fact about a package, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageComponent {
    /// A bare name, such as a code-package identifier.
    Simple(String),
    /// A manifest-declared application component.
    AppComponent { name: String, enabled: bool },
    /// A native library with its backing archive entries.
    NativeLibrary {
        name: String,
        entries: Vec<NativeLibEntry>,
    },
}

impl PackageComponent {
    /// The sortable display value of this fact.
    pub fn value(&self) -> &str {
        match self {
            PackageComponent::Simple(name) => name,
            PackageComponent::AppComponent { name, .. } => name,
            PackageComponent::NativeLibrary { name, .. } => name,
        }
    }
}

/// The label and presentation hints a rule attaches to a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibMark {
    pub label: String,
    pub icon_index: Option<i32>,
    pub monochrome: bool,
}

/// One component matched by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedComponent {
    pub mark: LibMark,
    pub component: PackageComponent,
}

/// Several same-label components merged into one group.
///
/// Members are kept sorted by value; the group's identity is its first
/// member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergingMarkedComponent {
    pub mark: LibMark,
    pub components: Vec<PackageComponent>,
}

impl MergingMarkedComponent {
    /// The member that stands for the whole group.
    pub fn identity(&self) -> Option<&PackageComponent> {
        self.components.first()
    }
}

/// A component after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifiedComponent {
    Plain(PackageComponent),
    Marked(MarkedComponent),
    Merged(MergingMarkedComponent),
}

impl ClassifiedComponent {
    /// The sortable display value; a merged group reports its identity.
    pub fn value(&self) -> &str {
        match self {
            ClassifiedComponent::Plain(c) => c.value(),
            ClassifiedComponent::Marked(m) => m.component.value(),
            ClassifiedComponent::Merged(g) => {
                g.identity().map(PackageComponent::value).unwrap_or("")
            }
        }
    }

    pub fn mark(&self) -> Option<&LibMark> {
        match self {
            ClassifiedComponent::Plain(_) => None,
            ClassifiedComponent::Marked(m) => Some(&m.mark),
            ClassifiedComponent::Merged(g) => Some(&g.mark),
        }
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
    fn component_values() {
        let simple = PackageComponent::Simple("okhttp3".to_string());
        assert_eq!(simple.value(), "okhttp3");

        let app = PackageComponent::AppComponent {
            name: "com.app.MainActivity".to_string(),
            enabled: true,
        };
        assert_eq!(app.value(), "com.app.MainActivity");
    }

    #[test]
    fn merged_identity_is_first_member() {
        let merged = MergingMarkedComponent {
            mark: mark("OkHttp"),
            components: vec![
                PackageComponent::Simple("okhttp3".to_string()),
                PackageComponent::Simple("okhttp3.internal".to_string()),
            ],
        };
        assert_eq!(merged.identity().map(PackageComponent::value), Some("okhttp3"));
        let classified = ClassifiedComponent::Merged(merged);
        assert_eq!(classified.value(), "okhttp3");
        assert_eq!(classified.mark().map(|m| m.label.as_str()), Some("OkHttp"));
    }

    #[test]
    fn empty_merge_has_no_identity() {
        let merged = MergingMarkedComponent {
            mark: mark("X"),
            components: vec![],
        };
        assert!(merged.identity().is_none());
    }
}
