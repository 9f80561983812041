//! Import synthesis.

use indexmap::{IndexMap, IndexSet};
use oxc_ast::ast::Statement;

use crate::naming::{module_identifier, relative_specifier, AliasTable, NAMESPACE_IMPORT};
use crate::syntax::Syntax;

/// Builds the import declarations for a module.
///
/// `explicit` holds the module URLs of the document's HTML imports in
/// document order; they come first, followed by dependencies only reached
/// through rewritten references. A dependency nothing was referenced from
/// still gets a side-effect import when it was an explicit edge.
pub fn synthesize_imports<'a>(
    syntax: Syntax<'a>,
    module_url: &str,
    explicit: &[String],
    referenced: &IndexMap<String, IndexSet<String>>,
    aliases: &AliasTable,
) -> Vec<Statement<'a>> {
    let mut order: IndexSet<&str> = explicit.iter().map(String::as_str).collect();
    order.extend(referenced.keys().map(String::as_str));

    let mut statements = Vec::new();
    for dependency in order {
        if dependency == module_url {
            continue;
        }
        let specifier = relative_specifier(module_url, dependency);
        let Some(names) = referenced.get(dependency).filter(|names| !names.is_empty()) else {
            statements.push(syntax.import_side_effect(&specifier));
            continue;
        };

        if names.contains(NAMESPACE_IMPORT) {
            let local = aliases
                .get(dependency, NAMESPACE_IMPORT)
                .map(str::to_string)
                .unwrap_or_else(|| module_identifier(dependency));
            statements.push(syntax.import_namespace(&local, &specifier));
        }

        let named: Vec<(String, String)> = names
            .iter()
            .filter(|name| name.as_str() != NAMESPACE_IMPORT)
            .map(|name| {
                let local = aliases
                    .get(dependency, name)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("${}", name));
                (name.clone(), local)
            })
            .collect();
        if !named.is_empty() {
            statements.push(syntax.import_named(&named, &specifier));
        }
    }
    statements
}
