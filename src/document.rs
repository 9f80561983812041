//! Document model consumed by the converter.
//!
//! A `Document` is a read-only view of one HTML-plus-script unit: its inline
//! scripts, its HTML-import edges and the namespace / element features found
//! in its script. Producing documents is the job of an [`Analyzer`];
//! [`crate::parse::HtmlAnalyzer`] is the in-memory implementation.

use oxc_span::Span;
use serde::{Deserialize, Serialize};

/// A statement recognized as defining a namespace object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFeature {
    /// Span of the defining statement within the document script.
    pub span: Span,
    /// Names this namespace is known by; the first is the canonical dotted name.
    pub identifiers: Vec<String>,
}

impl NamespaceFeature {
    pub fn canonical_name(&self) -> Option<&str> {
        self.identifiers.first().map(String::as_str)
    }

    pub fn is_known_as(&self, name: &str) -> bool {
        self.identifiers.iter().any(|id| id == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// `class X extends Base { static get is() { ... } }`
    Class,
    /// `Polymer({ is: 'x-foo', ... })`
    Factory,
}

/// A custom element definition found in the document script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFeature {
    pub tag_name: String,
    pub kind: ElementKind,
    /// Span of the class or of the factory call.
    pub span: Span,
    /// Serialized content of the element's `<dom-module>` template.
    pub template: Option<String>,
}

/// A top-level element kept in the document markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupElement {
    pub tag_name: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlImport {
    /// Resolved URL of the imported document.
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub url: String,
    pub scripts: Vec<String>,
    pub imports: Vec<HtmlImport>,
    pub namespaces: Vec<NamespaceFeature>,
    pub elements: Vec<ElementFeature>,
    pub markup: Vec<MarkupElement>,
}

impl Document {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn namespace_at(&self, span: Span) -> Option<&NamespaceFeature> {
        self.namespaces.iter().find(|ns| ns.span == span)
    }

    pub fn namespace_named(&self, name: &str) -> Option<&NamespaceFeature> {
        self.namespaces.iter().find(|ns| ns.is_known_as(name))
    }

    /// HTML-import targets not in `excluded`, in document order.
    pub fn import_urls<'d, F>(&'d self, excluded: F) -> impl Iterator<Item = &'d str> + 'd
    where
        F: Fn(&str) -> bool + 'd,
    {
        self.imports
            .iter()
            .map(|import| import.url.as_str())
            .filter(move |url| !excluded(url))
    }
}

/// Source of documents for conversion.
pub trait Analyzer {
    fn document(&self, url: &str) -> Option<&Document>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_urls_skip_excluded() {
        let mut doc = Document::new("a.html");
        doc.imports.push(HtmlImport { url: "b.html".into() });
        doc.imports.push(HtmlImport { url: "c.html".into() });
        let excluded = |url: &str| url == "b.html";
        let urls: Vec<&str> = doc.import_urls(excluded).collect();
        assert_eq!(urls, vec!["c.html"]);
    }

    #[test]
    fn namespace_lookup_by_name_and_span() {
        let mut doc = Document::new("a.html");
        doc.namespaces.push(NamespaceFeature {
            span: Span::new(0, 10),
            identifiers: vec!["Polymer.Async".into(), "Async".into()],
        });
        assert!(doc.namespace_named("Async").is_some());
        assert!(doc.namespace_at(Span::new(0, 10)).is_some());
        assert!(doc.namespace_at(Span::new(1, 10)).is_none());
        assert_eq!(
            doc.namespace_named("Async").and_then(|ns| ns.canonical_name()),
            Some("Polymer.Async")
        );
    }
}
