//! Module conversion: runs the rewrite pipeline for one document and commits
//! the result to the reference index.
//!
//! Pipeline, in order:
//! 1. convert HTML-import dependencies (depth first)
//! 2. unwrap a module-wide IIFE
//! 3. rewrite namespaced references to import aliases
//! 4. synthesize imports
//! 5. inline retained markup
//! 6. inline element templates
//! 7. rewrite namespace assignments as exports
//! 8. normalize `this`, collapse local references, null excluded references
//! 9. print

use indexmap::{IndexMap, IndexSet};
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use tracing::{debug, info, warn};

use crate::config::ConversionOptions;
use crate::cursor::RewriteCursor;
use crate::document::{Analyzer, Document};
use crate::error::{
    ConvertError, Diagnostic, DIAG_DEPENDENCY_FAILED, DIAG_DUPLICATE_EXPORT, DIAG_EXCLUDED_ASSIGNMENT,
    DIAG_IMPORT_CYCLE,
};
use crate::exports::{namespace_roots, ExportOutcome, NamespaceExports, Registration};
use crate::imports::synthesize_imports;
use crate::markup::{inline_element_templates, inline_retained_markup};
use crate::naming::{module_url, AliasTable};
use crate::parse::script_source_type;
use crate::references::{
    normalize_this, ExcludedReferences, LocalReferenceCollapser, NamespaceReferences,
};
use crate::registry::{ModuleRecord, ReferenceIndex};
use crate::syntax::{top_level_bindings, Syntax};
use crate::unwrap::unwrap_module_body;
use crate::visitor::rewrite_program;

/// Converts documents into modules, one [`ReferenceIndex`] per batch.
pub struct ModuleConverter<'c> {
    analyzer: &'c dyn Analyzer,
    options: &'c ConversionOptions,
    index: &'c mut ReferenceIndex,
    in_progress: Vec<String>,
    failures: IndexMap<String, ConvertError>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c> ModuleConverter<'c> {
    pub fn new(
        analyzer: &'c dyn Analyzer,
        options: &'c ConversionOptions,
        index: &'c mut ReferenceIndex,
    ) -> Self {
        Self {
            analyzer,
            options,
            index,
            in_progress: Vec::new(),
            failures: IndexMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Converts the document at `url`, its dependencies first.
    ///
    /// A document that already has a record is not converted again; its
    /// record is returned as is, even if its conversion failed.
    pub fn convert(&mut self, url: &str) -> Result<ModuleRecord, ConvertError> {
        if let Some(record) = self.index.module(url) {
            debug!(url, "already converted");
            return Ok(record.clone());
        }
        let analyzer = self.analyzer;
        let document = analyzer
            .document(url)
            .ok_or_else(|| ConvertError::DocumentNotFound {
                url: url.to_string(),
            })?;

        self.index.register_module(url);
        self.in_progress.push(url.to_string());
        info!(url, "converting document");
        let result = self.convert_document(document);
        self.in_progress.pop();

        if let Err(err) = result {
            warn!(url, error = %err, "conversion failed");
            self.diagnostics.push(Diagnostic::from_error(url, &err));
            self.failures.insert(url.to_string(), err.clone());
            return Err(err);
        }
        self.index
            .module(url)
            .cloned()
            .ok_or_else(|| ConvertError::DocumentNotFound {
                url: url.to_string(),
            })
    }

    /// Converts each non-excluded dependency and returns their module URLs.
    fn convert_dependencies(&mut self, document: &Document) -> Vec<String> {
        let options = self.options;
        let dependencies: Vec<String> = document
            .import_urls(move |url| options.is_excluded_document(url))
            .map(str::to_string)
            .collect();

        for dependency in &dependencies {
            if let Some(start) = self.in_progress.iter().position(|url| url == dependency) {
                let mut chain = self.in_progress[start..].to_vec();
                chain.push(dependency.clone());
                let cycle = ConvertError::ImportCycle { chain };
                warn!(url = %document.url, error = %cycle, "keeping side-effect import only");
                self.diagnostics.push(Diagnostic::warning(
                    DIAG_IMPORT_CYCLE,
                    &document.url,
                    cycle.to_string(),
                ));
                continue;
            }
            if let Err(err) = self.convert(dependency) {
                self.diagnostics.push(Diagnostic::warning(
                    DIAG_DEPENDENCY_FAILED,
                    &document.url,
                    format!("dependency {} was not converted: {}", dependency, err),
                ));
            }
        }

        dependencies.iter().map(|url| module_url(url)).collect()
    }

    fn convert_document(&mut self, document: &Document) -> Result<(), ConvertError> {
        let url = document.url.as_str();
        let dependencies = self.convert_dependencies(document);

        let script = match document.scripts.as_slice() {
            [] => "",
            [script] => script.as_str(),
            scripts => {
                return Err(ConvertError::MultipleScripts {
                    url: url.to_string(),
                    count: scripts.len(),
                })
            }
        };

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, script, script_source_type()).parse();
        if !ret.errors.is_empty() {
            let message = ret
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConvertError::ScriptParse {
                url: url.to_string(),
                message,
            });
        }
        let mut program = ret.program;
        let syntax = Syntax::new(&allocator);
        let module_url = module_url(url);
        let mut cursor = RewriteCursor::new();

        if unwrap_module_body(&allocator, &mut program) {
            debug!(url, "removed module wrapper");
        }

        let mut aliases = AliasTable::new(top_level_bindings(&program));
        let referenced = {
            let mut references = NamespaceReferences::new(
                syntax,
                &*self.index,
                self.options,
                &module_url,
                &mut aliases,
            );
            rewrite_program(&allocator, &mut program, &mut references);
            references.into_imports()
        };

        let imports = synthesize_imports(syntax, &module_url, &dependencies, &referenced, &aliases);
        cursor.insert(&mut program.body, 0, imports);

        inline_retained_markup(syntax, &mut program, &mut cursor, &document.markup);
        self.diagnostics.extend(inline_element_templates(
            syntax,
            &mut program,
            url,
            &document.elements,
        ));

        let roots = namespace_roots(document, self.options, &*self.index);
        let mut machine = NamespaceExports::new(&allocator, url, document, self.options, roots);
        machine.rewrite(&mut program.body, &mut cursor)?;
        let ExportOutcome {
            locals,
            namespaces,
            this_targets,
            exports,
            registrations,
            diagnostics,
        } = machine.finish();
        self.diagnostics.extend(diagnostics);

        normalize_this(&allocator, syntax, &mut program, &this_targets);

        let mut collapse = IndexMap::new();
        for registration in &registrations {
            if let Some(binding) = &registration.binding {
                if registration.path.contains('.') {
                    collapse.insert(registration.path.clone(), binding.clone());
                }
            }
        }
        let aliases_of_namespaces = locals
            .iter()
            .map(|local| (local.name.as_str(), local.canonical.as_str()))
            .chain(namespaces.iter().filter_map(|ns| {
                ns.local_name
                    .as_deref()
                    .map(|local| (local, ns.path.as_str()))
            }));
        for (local, canonical) in aliases_of_namespaces {
            if local == canonical {
                continue;
            }
            let prefix = format!("{}.", canonical);
            for registration in &registrations {
                let (Some(rest), Some(binding)) = (
                    registration.path.strip_prefix(&prefix),
                    registration.binding.as_ref(),
                ) else {
                    continue;
                };
                collapse.insert(format!("{}.{}", local, rest), binding.clone());
            }
        }
        if !collapse.is_empty() {
            let mut collapser = LocalReferenceCollapser::new(syntax, &collapse);
            rewrite_program(&allocator, &mut program, &mut collapser);
        }

        if !self.options.reference_excludes.is_empty() {
            let mut nuller = ExcludedReferences::new(syntax, &self.options.reference_excludes);
            rewrite_program(&allocator, &mut program, &mut nuller);
            debug!(url, replaced = nuller.replaced(), "nulled excluded references");
            for path in nuller.assigned() {
                warn!(url, path = %path, "excluded reference is assigned to; left in place");
                self.diagnostics.push(Diagnostic::warning(
                    DIAG_EXCLUDED_ASSIGNMENT,
                    url,
                    format!("`{}` is excluded but assigned to; assignment kept", path),
                ));
            }
        }

        self.commit_registrations(url, &module_url, &registrations);

        let source = Codegen::new().build(&program).code;
        if let Some(record) = self.index.module_mut(url) {
            for (dependency, names) in referenced {
                for name in names {
                    record.add_import(&dependency, &name);
                }
            }
            record.exports = exports;
            record.source = Some(source);
            info!(
                url,
                module = %record.url,
                exports = record.exports.len(),
                imports = record.imports.len(),
                "converted document"
            );
        }
        Ok(())
    }

    fn commit_registrations(&mut self, url: &str, module_url: &str, registrations: &[Registration]) {
        for registration in registrations {
            let conflict = self
                .index
                .namespaced_export(&registration.path)
                .filter(|existing| existing.url != module_url)
                .map(|existing| existing.url.clone());
            if let Some(owner) = conflict {
                self.diagnostics.push(Diagnostic::warning(
                    DIAG_DUPLICATE_EXPORT,
                    url,
                    format!(
                        "`{}` is already exported by {}; keeping that export",
                        registration.path, owner
                    ),
                ));
            }
            self.index
                .add_namespaced_export(&registration.path, module_url, &registration.name);
        }
    }

    /// Documents whose conversion failed, with the error that stopped them.
    pub fn failures(&self) -> impl Iterator<Item = (&String, &ConvertError)> {
        self.failures.iter()
    }

    pub fn into_parts(self) -> (Vec<(String, ConvertError)>, Vec<Diagnostic>) {
        (self.failures.into_iter().collect(), self.diagnostics)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Requested documents that now have module source.
    pub converted: Vec<String>,
    /// Every document in the batch that failed, dependencies included.
    pub failed: Vec<(String, ConvertError)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ConversionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.diagnostics.is_empty()
    }
}

/// Converts every document in `urls`. One failing document never stops the
/// batch.
pub fn convert_all<I, S>(
    analyzer: &dyn Analyzer,
    options: &ConversionOptions,
    index: &mut ReferenceIndex,
    urls: I,
) -> ConversionReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let requested: IndexSet<String> = urls.into_iter().map(|url| url.as_ref().to_string()).collect();
    let mut converter = ModuleConverter::new(analyzer, options, index);
    for url in &requested {
        if let Err(err) = converter.convert(url) {
            debug!(url = %url, error = %err, "document failed");
        }
    }
    let (failed, diagnostics) = converter.into_parts();

    let converted = requested
        .into_iter()
        .filter(|url| index.module(url).is_some_and(ModuleRecord::is_complete))
        .collect();
    info!(failed = failed.len(), diagnostics = diagnostics.len(), "batch finished");
    ConversionReport {
        converted,
        failed,
        diagnostics,
    }
}
