//! # Namespace-to-module rewriter
//!
//! Converts HTML-import documents whose scripts publish functionality on a
//! global namespace object (`Polymer.Async = {...}`) into ES modules with
//! explicit imports and exports.
//!
//! ## Conversion Invariants
//!
//! 1. **Dependencies first**: a document's HTML imports are converted before
//!    the document itself, so every namespace path it references is already
//!    registered in the [`ReferenceIndex`].
//!
//! 2. **One record per document**: converting a URL twice returns the first
//!    record untouched.
//!
//! 3. **Exports match source**: every name in [`ModuleRecord::exports`] is
//!    exported by the printed module and nothing else is.
//!
//! 4. **No self imports**: a module's import map never names the module.
//!
//! 5. **Fixed phase order**: unwrap, references, imports, markup, templates,
//!    exports, `this`, collapse, exclusions. Each phase relies on the previous
//!    one, and all statement-level phases share one [`RewriteCursor`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut analyzer = HtmlAnalyzer::new();
//! analyzer.add_document("lib/async.html", &async_html)?;
//! analyzer.add_document("app.html", &app_html)?;
//!
//! let options = ConversionOptions::new().with_namespace("Polymer");
//! let mut index = ReferenceIndex::new();
//! let report = convert_all(&analyzer, &options, &mut index, ["app.html"]);
//! ```

mod config;
mod convert;
mod cursor;
mod document;
mod error;
mod exports;
mod imports;
mod markup;
mod naming;
mod parse;
mod references;
mod registry;
mod syntax;
mod unwrap;
mod visitor;


pub use config::ConversionOptions;
pub use convert::{convert_all, ConversionReport, ModuleConverter};
pub use cursor::RewriteCursor;
pub use document::{
    Analyzer, Document, ElementFeature, ElementKind, HtmlImport, MarkupElement, NamespaceFeature,
};
pub use error::*;
pub use naming::{module_identifier, module_url, relative_specifier, resolve_url};
pub use parse::{analyze_document, script_source_type, HtmlAnalyzer};
pub use registry::{ModuleRecord, NamespacedExport, ReferenceIndex};
pub use visitor::{rewrite_program, ExpressionRewriter, Position, Rewrite};
