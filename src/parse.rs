//! HTML document analysis.
//!
//! [`HtmlAnalyzer`] parses HTML-import documents with html5ever and their
//! inline scripts with oxc, and produces the [`Document`] view the converter
//! works from:
//! - `<link rel="import" href>` edges, resolved against the document URL
//! - inline `<script>` bodies (scripts with `src` are ignored)
//! - `<dom-module id>` templates
//! - the top-level elements of `<head>` and `<body>`, serialized
//! - namespace features (`/** @namespace */` statements) and element features

use std::collections::HashMap;
use std::io;

use html5ever::parse_document;
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use regex::Regex;
use tendril::TendrilSink;
use tracing::{debug, warn};

use crate::document::{
    Analyzer, Document, ElementFeature, ElementKind, HtmlImport, MarkupElement, NamespaceFeature,
};
use crate::error::ConvertError;
use crate::naming::resolve_url;
use crate::syntax::{assignment_target_path, expression_path};

lazy_static! {
    /// `@namespace` with an optional dotted name.
    static ref NAMESPACE_TAG: Regex =
        Regex::new(r"@namespace(?:[ \t]+([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*))?").unwrap();
}

/// Source type used for legacy inline scripts. The analyzer and the
/// converter must agree on it so feature spans line up.
pub fn script_source_type() -> SourceType {
    SourceType::default().with_script(true)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZER
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory document store keyed by URL.
#[derive(Debug, Default)]
pub struct HtmlAnalyzer {
    documents: IndexMap<String, Document>,
}

impl HtmlAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzes `html` as the document at `url`, replacing any earlier one.
    pub fn add_document(&mut self, url: &str, html: &str) -> Result<&Document, ConvertError> {
        let document = analyze_document(url, html)?;
        Ok(self.insert(document))
    }

    /// Adds an already-built document.
    pub fn insert(&mut self, document: Document) -> &Document {
        let url = document.url.clone();
        self.documents.insert(url.clone(), document);
        &self.documents[&url]
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }
}

impl Analyzer for HtmlAnalyzer {
    fn document(&self, url: &str) -> Option<&Document> {
        self.documents.get(url)
    }
}

/// Builds the [`Document`] for one HTML source.
pub fn analyze_document(url: &str, html: &str) -> Result<Document, ConvertError> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| ConvertError::Html {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let mut collected = Collected::default();
    collect(url, &dom.document, &mut collected)?;

    let mut document = Document::new(url);
    document.imports = collected.imports;
    document.markup = collected.markup;
    document.scripts = collected.scripts;

    if let [script] = document.scripts.as_slice() {
        let features = analyze_script(url, script);
        document.namespaces = features.namespaces;
        document.elements = features
            .elements
            .into_iter()
            .map(|mut element| {
                element.template = collected.templates.get(&element.tag_name).cloned();
                element
            })
            .collect();
    }

    debug!(
        url,
        imports = document.imports.len(),
        scripts = document.scripts.len(),
        namespaces = document.namespaces.len(),
        elements = document.elements.len(),
        "analyzed document"
    );
    Ok(document)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Collected {
    imports: Vec<HtmlImport>,
    scripts: Vec<String>,
    templates: HashMap<String, String>,
    markup: Vec<MarkupElement>,
}

fn element_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

fn attribute(handle: &Handle, attr_name: &str) -> Option<String> {
    let NodeData::Element { attrs, .. } = &handle.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|attr| attr.name.local.as_ref() == attr_name)
        .map(|attr| attr.value.to_string())
}

fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

fn is_inline_script(handle: &Handle) -> bool {
    if attribute(handle, "src").is_some() {
        return false;
    }
    match attribute(handle, "type") {
        None => true,
        Some(kind) => matches!(
            kind.trim().to_ascii_lowercase().as_str(),
            "" | "text/javascript" | "application/javascript"
        ),
    }
}

fn collect(url: &str, handle: &Handle, out: &mut Collected) -> Result<(), ConvertError> {
    match element_name(handle).as_deref() {
        Some("link") => {
            let is_import = attribute(handle, "rel").is_some_and(|rel| {
                rel.split_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("import"))
            });
            if let (true, Some(href)) = (is_import, attribute(handle, "href")) {
                out.imports.push(HtmlImport {
                    url: resolve_url(url, &href),
                });
            }
        }
        Some("script") if is_inline_script(handle) => {
            out.scripts.push(text_content(handle));
        }
        Some("dom-module") => {
            if let (Some(id), Some(template)) = (attribute(handle, "id"), first_template(handle)) {
                let contents = match &template.data {
                    NodeData::Element { template_contents, .. } => template_contents.borrow().clone(),
                    _ => None,
                };
                if let Some(contents) = contents {
                    out.templates
                        .insert(id, to_html(url, &contents, TraversalScope::ChildrenOnly(None))?);
                }
            }
        }
        Some(tag @ ("head" | "body")) => {
            debug!(url, section = tag, "collecting top-level markup");
            for child in handle.children.borrow().iter() {
                if let Some(tag_name) = element_name(child) {
                    out.markup.push(MarkupElement {
                        tag_name,
                        html: to_html(url, child, TraversalScope::IncludeNode)?,
                    });
                }
            }
        }
        _ => {}
    }

    for child in handle.children.borrow().iter() {
        collect(url, child, out)?;
    }
    Ok(())
}

fn first_template(handle: &Handle) -> Option<Handle> {
    handle
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child).as_deref() == Some("template"))
        .cloned()
}

fn to_html(url: &str, handle: &Handle, scope: TraversalScope) -> Result<String, ConvertError> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    let html_error = |message: String| ConvertError::Html {
        url: url.to_string(),
        message,
    };
    serialize(&mut bytes, &WithTemplates(handle.clone()), opts)
        .map_err(|e| html_error(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| html_error(e.to_string()))
}

/// Serializes a node, descending into `<template>` contents, which rcdom
/// keeps outside the regular child list.
struct WithTemplates(Handle);

impl Serialize for WithTemplates {
    fn serialize<S: Serializer>(&self, serializer: &mut S, scope: TraversalScope) -> io::Result<()> {
        match scope {
            TraversalScope::IncludeNode => serialize_node(&self.0, serializer),
            TraversalScope::ChildrenOnly(_) => serialize_children(&self.0, serializer),
        }
    }
}

fn serialize_children<S: Serializer>(handle: &Handle, serializer: &mut S) -> io::Result<()> {
    let contents = match &handle.data {
        NodeData::Element { template_contents, .. } => template_contents.borrow().clone(),
        _ => None,
    };
    let parent = contents.as_ref().unwrap_or(handle);
    for child in parent.children.borrow().iter() {
        serialize_node(child, serializer)?;
    }
    Ok(())
}

fn serialize_node<S: Serializer>(handle: &Handle, serializer: &mut S) -> io::Result<()> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            {
                let attrs = attrs.borrow();
                serializer.start_elem(
                    name.clone(),
                    attrs.iter().map(|attr| (&attr.name, &*attr.value)),
                )?;
            }
            serialize_children(handle, serializer)?;
            serializer.end_elem(name.clone())
        }
        NodeData::Text { contents } => serializer.write_text(&contents.borrow()),
        NodeData::Comment { contents } => serializer.write_comment(contents),
        NodeData::Doctype { name, .. } => serializer.write_doctype(name),
        NodeData::ProcessingInstruction { target, contents } => {
            serializer.write_processing_instruction(target, contents)
        }
        NodeData::Document => serialize_children(handle, serializer),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPT FEATURES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ScriptFeatures {
    namespaces: Vec<NamespaceFeature>,
    elements: Vec<ElementFeature>,
}

fn analyze_script(url: &str, source: &str) -> ScriptFeatures {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, script_source_type()).parse();
    if !ret.errors.is_empty() {
        // Reported when the document is converted.
        warn!(url, errors = ret.errors.len(), "script does not parse; no features collected");
        return ScriptFeatures::default();
    }
    let program = ret.program;

    let mut namespaces = Vec::new();
    for comment in program.comments.iter().filter(|comment| comment.is_jsdoc()) {
        let text = comment.content_span().source_text(source);
        let Some(caps) = NAMESPACE_TAG.captures(text) else {
            continue;
        };
        let explicit = caps.get(1).map(|name| name.as_str());
        let Some(stmt) = statement_starting_at(&program.body, comment.attached_to) else {
            debug!(url, "@namespace comment is not attached to a statement");
            continue;
        };
        if let Some(identifiers) = namespace_identifiers(stmt, explicit) {
            namespaces.push(NamespaceFeature {
                span: stmt.span(),
                identifiers,
            });
        }
    }

    let mut elements = ElementFinder::default();
    elements.visit_program(&program);

    ScriptFeatures {
        namespaces,
        elements: elements.found,
    }
}

/// Finds the statement starting at `start`, looking inside IIFE wrappers.
fn statement_starting_at<'p, 'a>(
    body: &'p [Statement<'a>],
    start: u32,
) -> Option<&'p Statement<'a>> {
    for stmt in body {
        if stmt.span().start == start {
            return Some(stmt);
        }
        if let Some(found) = iife_body(stmt).and_then(|inner| statement_starting_at(inner, start)) {
            return Some(found);
        }
    }
    None
}

fn iife_body<'p, 'a>(stmt: &'p Statement<'a>) -> Option<&'p [Statement<'a>]> {
    let Statement::ExpressionStatement(expr_stmt) = stmt else {
        return None;
    };
    let Expression::CallExpression(call) = expr_stmt.expression.without_parentheses() else {
        return None;
    };
    match call.callee.without_parentheses() {
        Expression::FunctionExpression(func) => func.body.as_ref().map(|body| &body.statements[..]),
        Expression::ArrowFunctionExpression(arrow) if !arrow.expression => {
            Some(&arrow.body.statements[..])
        }
        _ => None,
    }
}

/// Names a namespace statement is known by, canonical name first.
fn namespace_identifiers(stmt: &Statement<'_>, explicit: Option<&str>) -> Option<Vec<String>> {
    let declared = match stmt {
        Statement::VariableDeclaration(decl) if decl.declarations.len() == 1 => {
            match &decl.declarations[0].id {
                BindingPattern::BindingIdentifier(id) => id.name.to_string(),
                _ => return None,
            }
        }
        Statement::ExpressionStatement(expr_stmt) => match &expr_stmt.expression {
            Expression::AssignmentExpression(assign) => assignment_target_path(&assign.left)?,
            _ => return None,
        },
        _ => return None,
    };
    let mut identifiers = vec![explicit.unwrap_or(&declared).to_string()];
    if !identifiers.contains(&declared) {
        identifiers.push(declared);
    }
    Some(identifiers)
}

#[derive(Default)]
struct ElementFinder {
    found: Vec<ElementFeature>,
}

/// `static get is() { return 'x-foo'; }`
fn class_tag_name(class: &Class<'_>) -> Option<String> {
    class.body.body.iter().find_map(|member| {
        let ClassElement::MethodDefinition(method) = member else {
            return None;
        };
        if !method.r#static
            || method.kind != MethodDefinitionKind::Get
            || method.key.static_name()? != "is"
        {
            return None;
        }
        let body = method.value.body.as_ref()?;
        body.statements.iter().find_map(|stmt| match stmt {
            Statement::ReturnStatement(ret) => match ret.argument.as_ref()? {
                Expression::StringLiteral(tag) => Some(tag.value.to_string()),
                _ => None,
            },
            _ => None,
        })
    })
}

/// `Polymer({ is: 'x-foo', ... })`
fn factory_tag_name(call: &CallExpression<'_>) -> Option<String> {
    if expression_path(&call.callee)? != "Polymer" {
        return None;
    }
    let Some(Argument::ObjectExpression(object)) = call.arguments.first() else {
        return None;
    };
    object.properties.iter().find_map(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(prop) if prop.key.static_name()? == "is" => {
            match &prop.value {
                Expression::StringLiteral(tag) => Some(tag.value.to_string()),
                _ => None,
            }
        }
        _ => None,
    })
}

impl<'a> Visit<'a> for ElementFinder {
    fn visit_class(&mut self, class: &Class<'a>) {
        if let Some(tag_name) = class_tag_name(class) {
            self.found.push(ElementFeature {
                tag_name,
                kind: ElementKind::Class,
                span: class.span,
                template: None,
            });
        }
        walk::walk_class(self, class);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(tag_name) = factory_tag_name(call) {
            self.found.push(ElementFeature {
                tag_name,
                kind: ElementKind::Factory,
                span: call.span,
                template: None,
            });
        }
        walk::walk_call_expression(self, call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELEMENT: &str = r#"<link rel="import" href="../polymer/polymer.html">
<link rel="stylesheet" href="theme.css">
<custom-style><style>:root { --x: 1; }</style></custom-style>
<dom-module id="x-foo">
  <template><div class="box">[[label]]</div><template is="dom-if"><span>inner</span></template></template>
</dom-module>
<script>
  class XFoo extends Polymer.Element {
    static get is() { return 'x-foo'; }
  }
  customElements.define(XFoo.is, XFoo);
</script>
"#;

    #[test]
    fn collects_imports_scripts_and_markup() {
        let doc = analyze_document("elements/x-foo.html", ELEMENT).unwrap();
        assert_eq!(doc.imports.len(), 1);
        assert_eq!(doc.imports[0].url, "polymer/polymer.html");
        assert_eq!(doc.scripts.len(), 1);
        assert!(doc.scripts[0].contains("class XFoo"));

        let tags: Vec<&str> = doc.markup.iter().map(|el| el.tag_name.as_str()).collect();
        assert!(tags.contains(&"custom-style"));
        assert!(tags.contains(&"dom-module"));
        assert!(tags.contains(&"script"));
    }

    #[test]
    fn attaches_dom_module_templates_to_elements() {
        let doc = analyze_document("x-foo.html", ELEMENT).unwrap();
        assert_eq!(doc.elements.len(), 1);
        let element = &doc.elements[0];
        assert_eq!(element.tag_name, "x-foo");
        assert_eq!(element.kind, ElementKind::Class);
        let template = element.template.as_deref().unwrap();
        assert!(template.contains(r#"<div class="box">[[label]]</div>"#));
        assert!(template.contains("<span>inner</span>"));
        assert!(!template.starts_with("<template>"));
    }

    #[test]
    fn finds_factory_elements() {
        let html = "<script>Polymer({ is: 'x-bar', properties: {} });</script>";
        let doc = analyze_document("x-bar.html", html).unwrap();
        assert_eq!(doc.elements.len(), 1);
        assert_eq!(doc.elements[0].kind, ElementKind::Factory);
        assert_eq!(doc.elements[0].template, None);
    }

    #[test]
    fn finds_namespaces_inside_iife() {
        let html = r#"<script>
(function() {
  'use strict';
  /**
   * @namespace
   * @memberof Polymer
   */
  Polymer.Async = { run() {} };

  /** @namespace Polymer.Debounce */
  const Debounce = {};
})();
</script>"#;
        let doc = analyze_document("async.html", html).unwrap();
        assert_eq!(doc.namespaces.len(), 2);
        assert_eq!(doc.namespaces[0].identifiers, vec!["Polymer.Async"]);
        assert_eq!(
            doc.namespaces[1].identifiers,
            vec!["Polymer.Debounce".to_string(), "Debounce".to_string()]
        );
    }

    #[test]
    fn external_and_module_scripts_are_ignored() {
        let html = r#"<script src="x.js"></script><script type="module">import x from './x.js';</script><script>a();</script>"#;
        let doc = analyze_document("page.html", html).unwrap();
        assert_eq!(doc.scripts, vec!["a();".to_string()]);
    }

    #[test]
    fn analyzer_serves_documents_by_url() {
        let mut analyzer = HtmlAnalyzer::new();
        analyzer.add_document("a.html", "<script>a();</script>").unwrap();
        assert!(analyzer.document("a.html").is_some());
        assert!(analyzer.document("b.html").is_none());
        assert_eq!(analyzer.urls().collect::<Vec<_>>(), vec!["a.html"]);
    }
}
