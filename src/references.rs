//! Expression-level rewrite phases.
//!
//! Each phase is an [`ExpressionRewriter`] run through the shared traversal in
//! [`crate::visitor`]:
//! - [`NamespaceReferences`] turns references to namespace paths exported by
//!   other modules into import aliases and records what was imported.
//! - [`ThisToNamespace`] rewrites `this` inside newly exported functions.
//! - [`LocalReferenceCollapser`] turns `Ns.member` into `member` once the
//!   member is a module-level binding.
//! - [`ExcludedReferences`] replaces configured paths with `undefined`.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use tracing::debug;

use crate::config::ConversionOptions;
use crate::exports::ThisTarget;
use crate::naming::AliasTable;
use crate::registry::ReferenceIndex;
use crate::syntax::{expression_path, Syntax};
use crate::visitor::{rewrite_function_body, ExpressionRewriter, Position, Rewrite};

// ═══════════════════════════════════════════════════════════════════════════════
// NAMESPACED REFERENCES
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrites references to registered namespace paths.
///
/// Paths owned by the module being converted are left alone; they are dealt
/// with by the export phase. Configured reference exclusions are left for
/// [`ExcludedReferences`].
pub struct NamespaceReferences<'r, 'a> {
    syntax: Syntax<'a>,
    index: &'r ReferenceIndex,
    options: &'r ConversionOptions,
    module_url: &'r str,
    aliases: &'r mut AliasTable,
    imports: IndexMap<String, IndexSet<String>>,
}

impl<'r, 'a> NamespaceReferences<'r, 'a> {
    pub fn new(
        syntax: Syntax<'a>,
        index: &'r ReferenceIndex,
        options: &'r ConversionOptions,
        module_url: &'r str,
        aliases: &'r mut AliasTable,
    ) -> Self {
        Self {
            syntax,
            index,
            options,
            module_url,
            aliases,
            imports: IndexMap::new(),
        }
    }

    /// Dependency module URL -> referenced names, in first-reference order.
    pub fn into_imports(self) -> IndexMap<String, IndexSet<String>> {
        self.imports
    }
}

impl<'r, 'a> ExpressionRewriter<'a> for NamespaceReferences<'r, 'a> {
    fn rewrite(&mut self, expr: &Expression<'a>, position: Position) -> Rewrite<'a> {
        let Some(path) = expression_path(expr) else {
            return Rewrite::Continue;
        };
        // `Foo` in `Foo.bar` only matches as part of the longer chain.
        if position == Position::MemberObject && matches!(expr, Expression::Identifier(_)) {
            return Rewrite::Continue;
        }
        if self.options.is_excluded_reference(&path) {
            return Rewrite::Skip;
        }
        let Some(export) = self.index.namespaced_export(&path) else {
            return Rewrite::Continue;
        };
        if export.url == self.module_url {
            return Rewrite::Skip;
        }

        let alias = self.aliases.alias_for(&export.url, &export.name);
        debug!(path = %path, alias = %alias, from = %export.url, "rewrote namespaced reference");
        self.imports
            .entry(export.url.clone())
            .or_default()
            .insert(export.name.clone());
        Rewrite::Replace(self.syntax.ident(&alias))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// THIS NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ThisToNamespace<'a> {
    syntax: Syntax<'a>,
    namespace: String,
}

impl<'a> ThisToNamespace<'a> {
    pub fn new(syntax: Syntax<'a>, namespace: &str) -> Self {
        Self {
            syntax,
            namespace: namespace.to_string(),
        }
    }
}

impl<'a> ExpressionRewriter<'a> for ThisToNamespace<'a> {
    fn rewrite(&mut self, expr: &Expression<'a>, _position: Position) -> Rewrite<'a> {
        match expr {
            Expression::ThisExpression(_) => Rewrite::Replace(self.syntax.path(&self.namespace)),
            _ => Rewrite::Continue,
        }
    }

    /// Nested functions and classes bind their own `this`.
    fn descend_into_functions(&self) -> bool {
        false
    }
}

/// Rewrites `this` in the bodies of exported functions named by `targets`.
///
/// Looks for `export function name() {}` and
/// `export const name = function() {}` at the top level.
pub fn normalize_this<'a>(
    allocator: &'a Allocator,
    syntax: Syntax<'a>,
    program: &mut Program<'a>,
    targets: &[ThisTarget],
) {
    if targets.is_empty() {
        return;
    }
    for stmt in program.body.iter_mut() {
        let Statement::ExportNamedDeclaration(export) = stmt else {
            continue;
        };
        let Some((name, body)) = exported_function_body(export.declaration.as_mut()) else {
            continue;
        };
        let Some(target) = targets.iter().find(|target| target.name == name) else {
            continue;
        };
        debug!(function = %name, namespace = %target.namespace, "normalizing this");
        let mut rewriter = ThisToNamespace::new(syntax, &target.namespace);
        rewrite_function_body(allocator, body, &mut rewriter);
    }
}

fn exported_function_body<'d, 'a>(
    declaration: Option<&'d mut Declaration<'a>>,
) -> Option<(String, &'d mut FunctionBody<'a>)> {
    match declaration? {
        Declaration::FunctionDeclaration(func) => {
            let name = func.id.as_ref()?.name.to_string();
            Some((name, func.body.as_deref_mut()?))
        }
        Declaration::VariableDeclaration(var) => {
            if var.declarations.len() != 1 {
                return None;
            }
            let declarator = var.declarations.first_mut()?;
            let BindingPattern::BindingIdentifier(id) = &declarator.id else {
                return None;
            };
            let name = id.name.to_string();
            match declarator.init.as_mut()? {
                Expression::FunctionExpression(func) => Some((name, func.body.as_deref_mut()?)),
                _ => None,
            }
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCAL COLLAPSE
// ═══════════════════════════════════════════════════════════════════════════════

/// Replaces member chains naming a module-level export with the binding.
///
/// `targets` maps dotted paths (`Foo.bar`, or `Async.run` for a namespace
/// declared locally as `Async`) to the local binding that now holds them.
/// Only members this module exported are collapsed: `Ns.other` with no
/// export behind it stays a namespace access, since no binding `other`
/// exists to collapse it to.
pub struct LocalReferenceCollapser<'r, 'a> {
    syntax: Syntax<'a>,
    targets: &'r IndexMap<String, String>,
}

impl<'r, 'a> LocalReferenceCollapser<'r, 'a> {
    pub fn new(syntax: Syntax<'a>, targets: &'r IndexMap<String, String>) -> Self {
        Self { syntax, targets }
    }
}

impl<'r, 'a> ExpressionRewriter<'a> for LocalReferenceCollapser<'r, 'a> {
    fn rewrite(&mut self, expr: &Expression<'a>, _position: Position) -> Rewrite<'a> {
        if !expr.is_member_expression() {
            return Rewrite::Continue;
        }
        match expression_path(expr).and_then(|path| self.targets.get(&path)) {
            Some(binding) => Rewrite::Replace(self.syntax.ident(binding)),
            None => Rewrite::Continue,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXCLUDED REFERENCES
// ═══════════════════════════════════════════════════════════════════════════════

/// Replaces excluded paths with `undefined`.
///
/// Assignment targets are kept: assigning to `undefined` throws in a module.
/// They are collected in [`ExcludedReferences::assigned`] instead.
pub struct ExcludedReferences<'r, 'a> {
    syntax: Syntax<'a>,
    excludes: &'r HashSet<String>,
    replaced: usize,
    assigned: IndexSet<String>,
}

impl<'r, 'a> ExcludedReferences<'r, 'a> {
    pub fn new(syntax: Syntax<'a>, excludes: &'r HashSet<String>) -> Self {
        Self {
            syntax,
            excludes,
            replaced: 0,
            assigned: IndexSet::new(),
        }
    }

    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Excluded paths that were assigned to and left in place.
    pub fn assigned(&self) -> &IndexSet<String> {
        &self.assigned
    }
}

impl<'r, 'a> ExpressionRewriter<'a> for ExcludedReferences<'r, 'a> {
    fn rewrite(&mut self, expr: &Expression<'a>, position: Position) -> Rewrite<'a> {
        let Some(path) = expression_path(expr).filter(|path| self.excludes.contains(path)) else {
            return Rewrite::Continue;
        };
        if position == Position::AssignmentTarget {
            self.assigned.insert(path);
            return Rewrite::Skip;
        }
        self.replaced += 1;
        Rewrite::Replace(self.syntax.ident("undefined"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{AliasTable, NAMESPACE_IMPORT};
    use crate::visitor::rewrite_program;
    use oxc_codegen::Codegen;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn print(program: &Program<'_>) -> String {
        Codegen::new().build(program).code
    }

    #[test]
    fn namespaced_references_become_aliases() {
        let allocator = Allocator::default();
        let src = "Other.thing(); Other.thing.deep; window.Lib.run(); Lib; Mine.x;";
        let mut program = Parser::new(&allocator, src, SourceType::default()).parse().program;

        let mut index = ReferenceIndex::new();
        index.add_namespaced_export("Other.thing", "other.js", "thing");
        index.add_namespaced_export("Lib", "lib/lib.js", NAMESPACE_IMPORT);
        index.add_namespaced_export("Mine.x", "main.js", "x");
        let options = ConversionOptions::new();
        let mut aliases = AliasTable::new(Vec::new());

        let mut rewriter = NamespaceReferences::new(
            Syntax::new(&allocator),
            &index,
            &options,
            "main.js",
            &mut aliases,
        );
        rewrite_program(&allocator, &mut program, &mut rewriter);
        let imports = rewriter.into_imports();

        let code = print(&program);
        assert!(code.contains("$thing()"));
        assert!(code.contains("$thing.deep"));
        assert!(code.contains("$lib.run()"));
        assert!(code.contains("$lib;"));
        assert!(code.contains("Mine.x"));
        assert_eq!(
            imports.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["other.js", "lib/lib.js"]
        );
        assert!(imports["lib/lib.js"].contains(NAMESPACE_IMPORT));
    }

    #[test]
    fn excluded_references_are_not_imported() {
        let allocator = Allocator::default();
        let src = "Other.thing();";
        let mut program = Parser::new(&allocator, src, SourceType::default()).parse().program;
        let mut index = ReferenceIndex::new();
        index.add_namespaced_export("Other.thing", "other.js", "thing");
        let options = ConversionOptions::new().with_reference_exclude("Other.thing");
        let mut aliases = AliasTable::new(Vec::new());

        let mut rewriter = NamespaceReferences::new(
            Syntax::new(&allocator),
            &index,
            &options,
            "main.js",
            &mut aliases,
        );
        rewrite_program(&allocator, &mut program, &mut rewriter);
        assert!(rewriter.into_imports().is_empty());
    }

    #[test]
    fn this_stops_at_nested_functions() {
        let allocator = Allocator::default();
        let src = "export function run() { this.a; const f = () => this.b; function g() { return this.c; } }";
        let mut program = Parser::new(&allocator, src, SourceType::default()).parse().program;
        let targets = vec![ThisTarget {
            name: "run".into(),
            namespace: "Polymer.Async".into(),
        }];
        normalize_this(&allocator, Syntax::new(&allocator), &mut program, &targets);

        let code = print(&program);
        assert!(code.contains("Polymer.Async.a"));
        assert!(code.contains("Polymer.Async.b"));
        assert!(code.contains("this.c"));
    }

    #[test]
    fn collapses_known_members_only() {
        let allocator = Allocator::default();
        let src = "Foo.bar(); Foo.bar = 2; Foo.other; Async.run();";
        let mut program = Parser::new(&allocator, src, SourceType::default()).parse().program;
        let mut targets = IndexMap::new();
        targets.insert("Foo.bar".to_string(), "bar".to_string());
        targets.insert("Async.run".to_string(), "run".to_string());

        let mut collapser = LocalReferenceCollapser::new(Syntax::new(&allocator), &targets);
        rewrite_program(&allocator, &mut program, &mut collapser);

        let code = print(&program);
        assert!(code.contains("bar();"));
        assert!(code.contains("bar = 2"));
        assert!(code.contains("Foo.other"));
        assert!(code.contains("run();"));
    }

    #[test]
    fn excluded_paths_become_undefined_outside_targets() {
        let allocator = Allocator::default();
        let src = "use(Polymer.Settings); Polymer.Settings.x; Polymer.Settings = 1;";
        let mut program = Parser::new(&allocator, src, SourceType::default()).parse().program;
        let excludes: HashSet<String> = ["Polymer.Settings".to_string()].into_iter().collect();

        let mut nuller = ExcludedReferences::new(Syntax::new(&allocator), &excludes);
        rewrite_program(&allocator, &mut program, &mut nuller);
        assert_eq!(nuller.replaced(), 2);
        assert_eq!(
            nuller.assigned().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Polymer.Settings"]
        );

        let code = print(&program);
        assert!(code.contains("use(undefined)"));
        assert!(code.contains("undefined.x"));
        assert!(code.contains("Polymer.Settings = 1"));
    }
}
