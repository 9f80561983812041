//! Reference Index: converted modules and the namespace paths they export.
//!
//! One `ReferenceIndex` is owned by the caller for a whole batch and passed
//! `&mut` into every conversion. Nothing here is global.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::naming::{module_url, NAMESPACE_IMPORT};

/// The converted output for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub url: String,
    pub document_url: String,
    /// Printed module text; `None` until conversion completes.
    pub source: Option<String>,
    pub exports: IndexSet<String>,
    /// Dependency module URL -> names referenced from it (`*` for the whole module).
    pub imports: IndexMap<String, IndexSet<String>>,
}

impl ModuleRecord {
    pub fn new(document_url: &str) -> Self {
        Self {
            url: module_url(document_url),
            document_url: document_url.to_string(),
            source: None,
            exports: IndexSet::new(),
            imports: IndexMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.source.is_some()
    }

    /// Records a reference to `name` exported by `dependency_url`.
    ///
    /// Self references are dropped.
    pub fn add_import(&mut self, dependency_url: &str, name: &str) {
        if dependency_url == self.url {
            return;
        }
        self.imports
            .entry(dependency_url.to_string())
            .or_default()
            .insert(name.to_string());
    }
}

/// Where a namespace path now lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedExport {
    pub url: String,
    pub name: String,
}

impl NamespacedExport {
    pub fn is_namespace(&self) -> bool {
        self.name == NAMESPACE_IMPORT
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceIndex {
    modules: IndexMap<String, ModuleRecord>,
    namespaced_exports: IndexMap<String, NamespacedExport>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered record for a document, keyed by document URL.
    pub fn module(&self, document_url: &str) -> Option<&ModuleRecord> {
        self.modules.get(document_url)
    }

    pub fn module_mut(&mut self, document_url: &str) -> Option<&mut ModuleRecord> {
        self.modules.get_mut(document_url)
    }

    /// Registers an empty record, returning `false` if one already exists.
    pub fn register_module(&mut self, document_url: &str) -> bool {
        if self.modules.contains_key(document_url) {
            return false;
        }
        self.modules
            .insert(document_url.to_string(), ModuleRecord::new(document_url));
        true
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    pub fn namespaced_export(&self, path: &str) -> Option<&NamespacedExport> {
        self.namespaced_exports.get(path)
    }

    pub fn namespaced_exports(&self) -> impl Iterator<Item = (&String, &NamespacedExport)> {
        self.namespaced_exports.iter()
    }

    /// Registers `path -> (url, name)`. The first registration wins.
    pub fn add_namespaced_export(&mut self, path: &str, url: &str, name: &str) -> bool {
        if let Some(existing) = self.namespaced_exports.get(path) {
            if existing.url != url || existing.name != name {
                warn!(
                    path,
                    existing_url = %existing.url,
                    url,
                    "namespace path already registered; keeping first export"
                );
            }
            return false;
        }
        self.namespaced_exports.insert(
            path.to_string(),
            NamespacedExport {
                url: url.to_string(),
                name: name.to_string(),
            },
        );
        true
    }

    /// First segments of every registered namespace path.
    pub fn namespace_roots(&self) -> IndexSet<String> {
        self.namespaced_exports
            .keys()
            .filter_map(|path| path.split('.').next())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_registration_is_unique() {
        let mut index = ReferenceIndex::new();
        assert!(index.register_module("a.html"));
        assert!(!index.register_module("a.html"));
        assert_eq!(index.module("a.html").unwrap().url, "a.js");
        assert_eq!(index.modules().count(), 1);
    }

    #[test]
    fn first_namespaced_export_wins() {
        let mut index = ReferenceIndex::new();
        assert!(index.add_namespaced_export("Foo.bar", "a.js", "bar"));
        assert!(!index.add_namespaced_export("Foo.bar", "b.js", "bar"));
        assert_eq!(index.namespaced_export("Foo.bar").unwrap().url, "a.js");
        assert!(index.namespace_roots().contains("Foo"));
    }

    #[test]
    fn self_imports_are_ignored() {
        let mut record = ModuleRecord::new("a.html");
        record.add_import("a.js", "x");
        record.add_import("b.js", "y");
        assert!(!record.imports.contains_key("a.js"));
        assert!(record.imports["b.js"].contains("y"));
    }
}
