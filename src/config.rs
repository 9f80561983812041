//! Caller-supplied conversion configuration.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::ConvertError;

/// Options shared by every conversion in a batch.
///
/// Deserializes from camelCase JSON; every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionOptions {
    /// Namespace roots recognized even when no document declares them.
    pub namespaces: Vec<String>,
    /// Namespace path -> members that must be exported as `let`.
    pub mutable_exports: HashMap<String, Vec<String>>,
    /// Dotted paths replaced by `undefined` wherever they are referenced.
    pub reference_excludes: HashSet<String>,
    /// HTML-import targets that are never followed.
    pub excludes: HashSet<String>,
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ConvertError> {
        serde_json::from_str(json).map_err(|e| ConvertError::Options(e.to_string()))
    }

    pub fn with_namespace(mut self, root: &str) -> Self {
        self.namespaces.push(root.to_string());
        self
    }

    pub fn with_mutable_export(mut self, namespace: &str, member: &str) -> Self {
        self.mutable_exports
            .entry(namespace.to_string())
            .or_default()
            .push(member.to_string());
        self
    }

    pub fn with_reference_exclude(mut self, path: &str) -> Self {
        self.reference_excludes.insert(path.to_string());
        self
    }

    pub fn with_excluded_document(mut self, url: &str) -> Self {
        self.excludes.insert(url.to_string());
        self
    }

    pub fn is_mutable(&self, namespace: &str, member: &str) -> bool {
        self.mutable_exports
            .get(namespace)
            .is_some_and(|members| members.iter().any(|m| m == member))
    }

    pub fn is_excluded_document(&self, url: &str) -> bool {
        self.excludes.contains(url)
    }

    pub fn is_excluded_reference(&self, path: &str) -> bool {
        self.reference_excludes.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_json() {
        let options = ConversionOptions::from_json(
            r#"{
                "namespaces": ["Polymer"],
                "mutableExports": { "Polymer.Settings": ["useShadow"] },
                "referenceExcludes": ["Polymer.DomModule"]
            }"#,
        )
        .unwrap();

        assert_eq!(options.namespaces, vec!["Polymer".to_string()]);
        assert!(options.is_mutable("Polymer.Settings", "useShadow"));
        assert!(!options.is_mutable("Polymer.Settings", "rootPath"));
        assert!(options.is_excluded_reference("Polymer.DomModule"));
        assert!(options.excludes.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ConversionOptions::from_json("{\"namespaces\": 3}").unwrap_err();
        assert!(matches!(err, ConvertError::Options(_)));
    }
}
