//! Namespace-export state machine.
//!
//! Walks top-level statements from the shared cursor and turns namespace
//! assignments into module exports:
//!
//! ```js
//! Polymer.Async = { timeOut: {...}, run(fn) { ... } };
//! // becomes
//! export const timeOut = {...};
//! export function run(fn) { ... }
//! ```
//!
//! Every exported name is collected so the printed module and its export set
//! stay in agreement; registrations are handed back to the converter, which
//! commits them to the reference index.

use std::collections::HashSet;

use indexmap::IndexSet;
use oxc_allocator::{Allocator, TakeIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_span::{GetSpan, Span};
use tracing::{debug, warn};

use crate::config::ConversionOptions;
use crate::cursor::RewriteCursor;
use crate::document::Document;
use crate::error::{ConvertError, Diagnostic, DIAG_DUPLICATE_EXPORT, DIAG_UNSUPPORTED_MEMBER};
use crate::naming::NAMESPACE_IMPORT;
use crate::registry::ReferenceIndex;
use crate::syntax::{assignment_target_path, path_root, split_path, Syntax};

/// Final path segment naming the callable bridge of a namespace.
const POLYMER_FN: &str = "_polymerFn";

/// A function whose `this` must be rewritten to `namespace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThisTarget {
    pub name: String,
    pub namespace: String,
}

/// A namespace object literal lowered into individual exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredNamespace {
    pub path: String,
    /// Binding the object was declared under, if it was declared locally.
    pub local_name: Option<String>,
    pub members: IndexSet<String>,
}

/// A namespace declared in the script under a local binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNamespace {
    pub name: String,
    pub canonical: String,
}

/// A namespace path now exported by the module being converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub path: String,
    pub name: String,
    /// Local binding holding the value; `None` for a whole-namespace entry.
    pub binding: Option<String>,
}

#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub locals: Vec<LocalNamespace>,
    pub namespaces: Vec<LoweredNamespace>,
    pub this_targets: Vec<ThisTarget>,
    pub exports: IndexSet<String>,
    /// In emission order.
    pub registrations: Vec<Registration>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Roots a path must start with to be treated as a namespace export.
pub fn namespace_roots(
    document: &Document,
    options: &ConversionOptions,
    index: &ReferenceIndex,
) -> IndexSet<String> {
    let mut roots: IndexSet<String> = options.namespaces.iter().cloned().collect();
    for feature in &document.namespaces {
        if let Some(name) = feature.canonical_name() {
            roots.insert(path_root(name).to_string());
        }
    }
    roots.extend(index.namespace_roots());
    roots
}

/// How a property value is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Binding,
    Function,
    Arrow,
    Reference,
    Unsupported,
}

fn classify_member(property: &ObjectPropertyKind<'_>) -> (MemberKind, Option<String>) {
    let ObjectPropertyKind::ObjectProperty(prop) = property else {
        return (MemberKind::Unsupported, None);
    };
    let key = prop.key.static_name().map(|name| name.to_string());
    if prop.computed || prop.kind != PropertyKind::Init {
        return (MemberKind::Unsupported, key);
    }
    let Some(key) = key.filter(|key| is_binding_name(key)) else {
        return (MemberKind::Unsupported, None);
    };
    let kind = match prop.value.without_parentheses() {
        Expression::ObjectExpression(_)
        | Expression::ArrayExpression(_)
        | Expression::StringLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::BigIntLiteral(_)
        | Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::RegExpLiteral(_)
        | Expression::TemplateLiteral(_) => MemberKind::Binding,
        Expression::FunctionExpression(_) => MemberKind::Function,
        Expression::ArrowFunctionExpression(_) => MemberKind::Arrow,
        Expression::Identifier(_) => MemberKind::Reference,
        _ => MemberKind::Unsupported,
    };
    (kind, Some(key))
}

fn is_binding_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn strip_parens(mut expr: Expression<'_>) -> Expression<'_> {
    loop {
        match expr {
            Expression::ParenthesizedExpression(paren) => expr = paren.unbox().expression,
            other => return other,
        }
    }
}

/// What to do with the statement under the cursor.
enum Step {
    Keep,
    RememberLocal(LocalNamespace),
    LowerObject { path: String },
    LowerDeclaration { path: String, local: String, at: usize },
    DropAssignment,
    ReExport { local: String, name: String, path: String },
    Declare { name: String, path: String, owner: Option<String> },
    Const { name: String, path: String, owner: Option<String> },
}

pub struct NamespaceExports<'c, 'a> {
    allocator: &'a Allocator,
    syntax: Syntax<'a>,
    url: &'c str,
    document: &'c Document,
    options: &'c ConversionOptions,
    roots: IndexSet<String>,
    local: Option<LocalNamespace>,
    lowered_locals: HashSet<String>,
    outcome: ExportOutcome,
}

impl<'c, 'a> NamespaceExports<'c, 'a> {
    pub fn new(
        allocator: &'a Allocator,
        url: &'c str,
        document: &'c Document,
        options: &'c ConversionOptions,
        roots: IndexSet<String>,
    ) -> Self {
        Self {
            allocator,
            syntax: Syntax::new(allocator),
            url,
            document,
            options,
            roots,
            local: None,
            lowered_locals: HashSet::new(),
            outcome: ExportOutcome::default(),
        }
    }

    pub fn finish(self) -> ExportOutcome {
        self.outcome
    }

    /// Rewrites `body` from the cursor to the end.
    pub fn rewrite(
        &mut self,
        body: &mut ArenaVec<'a, Statement<'a>>,
        cursor: &mut RewriteCursor,
    ) -> Result<(), ConvertError> {
        while cursor.index() < body.len() {
            let at = cursor.index();
            match self.classify(body, at)? {
                Step::Keep => cursor.advance(1),
                Step::RememberLocal(local) => {
                    debug!(local = %local.name, namespace = %local.canonical, "found local namespace");
                    self.remember_local(local);
                    cursor.advance(1);
                }
                Step::LowerObject { path } => {
                    let lowered = match assigned_value(&mut body[at], self.allocator) {
                        Some(object) => self.lower_namespace(object, &path, None),
                        None => Vec::new(),
                    };
                    let count = lowered.len();
                    cursor.replace(body, at, lowered);
                    cursor.advance(count);
                    self.remember_local(LocalNamespace {
                        name: path.clone(),
                        canonical: path,
                    });
                }
                Step::LowerDeclaration { path, local, at: declared_at } => {
                    cursor.remove(body, at);
                    let declared_at = if declared_at > at { declared_at - 1 } else { declared_at };
                    let lowered = match declared_value(&mut body[declared_at]) {
                        Some(object) => self.lower_namespace(object, &path, Some(&local)),
                        None => Vec::new(),
                    };
                    cursor.replace(body, declared_at, lowered);
                    self.lowered_locals.insert(local);
                }
                Step::DropAssignment => {
                    cursor.remove(body, at);
                }
                Step::ReExport { local, name, path } => {
                    if self.claim(&name) {
                        cursor.replace(body, at, vec![self.syntax.export_specifier(&local, &name)]);
                        self.register(&path, &name, Some(&local));
                    }
                    cursor.advance(1);
                }
                Step::Declare { name, path, owner } | Step::Const { name, path, owner } => {
                    if self.claim(&name) {
                        if let Some(value) = assigned_value(&mut body[at], self.allocator) {
                            if let (Expression::FunctionExpression(_), Some(owner)) = (&value, owner) {
                                self.outcome.this_targets.push(ThisTarget {
                                    name: name.clone(),
                                    namespace: owner,
                                });
                            }
                            let export = self.export_value(value, &name);
                            cursor.replace(body, at, vec![export]);
                            self.register(&path, &name, Some(&name));
                        }
                    }
                    cursor.advance(1);
                }
            }
        }
        Ok(())
    }

    fn remember_local(&mut self, local: LocalNamespace) {
        if !self.outcome.locals.contains(&local) {
            self.outcome.locals.push(local.clone());
        }
        self.local = Some(local);
    }

    fn classify(&self, body: &[Statement<'a>], at: usize) -> Result<Step, ConvertError> {
        let stmt = &body[at];
        if let Statement::VariableDeclaration(decl) = stmt {
            return Ok(self.classify_declaration(decl));
        }
        let Statement::ExpressionStatement(expr_stmt) = stmt else {
            return Ok(Step::Keep);
        };
        let Expression::AssignmentExpression(assign) = &expr_stmt.expression else {
            return Ok(Step::Keep);
        };
        if assign.operator != AssignmentOperator::Assign {
            return Ok(Step::Keep);
        }
        let Some(path) = assignment_target_path(&assign.left) else {
            return Ok(Step::Keep);
        };
        if path.split('.').any(|segment| segment == "prototype") {
            return Ok(Step::Keep);
        }

        if !self.roots.contains(path_root(&path)) {
            return Ok(self.classify_local_assignment(&path));
        }

        let (parent, last) = split_path(&path);
        let value = assign.right.without_parentheses();
        match value {
            Expression::ObjectExpression(_)
                if self.document.namespace_at(expr_stmt.span).is_some() =>
            {
                Ok(Step::LowerObject { path: path.clone() })
            }
            Expression::Identifier(id) => {
                let local = id.name.to_string();
                let Some(feature) = self.document.namespace_named(&local) else {
                    return Ok(Step::ReExport {
                        local,
                        name: last.to_string(),
                        path: path.clone(),
                    });
                };
                if self.lowered_locals.contains(&local) {
                    return Ok(Step::DropAssignment);
                }
                match body.iter().position(|stmt| stmt.span() == feature.span) {
                    Some(declared_at) if declares_object(&body[declared_at]) => {
                        Ok(Step::LowerDeclaration {
                            path: path.clone(),
                            local,
                            at: declared_at,
                        })
                    }
                    Some(_) => {
                        warn!(url = self.url, namespace = %local, "namespace is not an object literal; re-exporting");
                        Ok(Step::ReExport {
                            local,
                            name: last.to_string(),
                            path: path.clone(),
                        })
                    }
                    None => Err(ConvertError::MissingNamespaceDeclaration {
                        url: self.url.to_string(),
                        name: local,
                    }),
                }
            }
            Expression::ClassExpression(_) | Expression::FunctionExpression(_) => {
                let (name, path) = export_target(&path, parent, last);
                Ok(Step::Declare {
                    name,
                    path,
                    owner: parent.map(str::to_string),
                })
            }
            _ => {
                let (name, path) = export_target(&path, parent, last);
                Ok(Step::Const {
                    name,
                    path,
                    owner: parent.map(str::to_string),
                })
            }
        }
    }

    fn classify_declaration(&self, decl: &VariableDeclaration<'a>) -> Step {
        let Some(feature) = self.document.namespace_at(decl.span) else {
            return Step::Keep;
        };
        if decl.declarations.len() != 1 {
            return Step::Keep;
        }
        let BindingPattern::BindingIdentifier(id) = &decl.declarations[0].id else {
            return Step::Keep;
        };
        let name = id.name.to_string();
        let canonical = feature.canonical_name().unwrap_or(&name).to_string();
        Step::RememberLocal(LocalNamespace { name, canonical })
    }

    /// `Async.thing = ...` where `Async` is the local namespace name.
    fn classify_local_assignment(&self, path: &str) -> Step {
        let Some(local) = &self.local else {
            return Step::Keep;
        };
        let Some(rest) = path
            .strip_prefix(local.name.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
        else {
            return Step::Keep;
        };
        let path = format!("{}.{}", local.canonical, rest);
        let (owner, last) = split_path(&path);
        Step::Const {
            name: last.to_string(),
            owner: owner.map(str::to_string),
            path: path.clone(),
        }
    }

    /// Reserves `name` in the module's export set.
    fn claim(&mut self, name: &str) -> bool {
        if self.outcome.exports.insert(name.to_string()) {
            return true;
        }
        warn!(url = self.url, export = name, "duplicate export; keeping the first");
        self.outcome.diagnostics.push(Diagnostic::warning(
            DIAG_DUPLICATE_EXPORT,
            self.url,
            format!("`{}` is already exported; later definition left unchanged", name),
        ));
        false
    }

    fn register(&mut self, path: &str, name: &str, binding: Option<&str>) {
        self.outcome.registrations.push(Registration {
            path: path.to_string(),
            name: name.to_string(),
            binding: binding.map(str::to_string),
        });
    }

    /// `export class name ...`, `export function name ...` or `export const name = ...`.
    fn export_value(&self, value: Expression<'a>, name: &str) -> Statement<'a> {
        let syntax = self.syntax;
        let declaration = match value {
            Expression::ClassExpression(class)
                if class.id.as_ref().map_or(true, |id| id.name == name) =>
            {
                syntax.class_declaration(class, name)
            }
            Expression::FunctionExpression(func)
                if func.id.as_ref().map_or(true, |id| id.name == name) =>
            {
                syntax.function_declaration(func, name)
            }
            other => syntax.variable(VariableDeclarationKind::Const, name, other),
        };
        syntax.export_declaration(declaration)
    }

    /// Lowers each property of a namespace object to a module export.
    fn lower_namespace(
        &mut self,
        object: Expression<'a>,
        path: &str,
        local_name: Option<&str>,
    ) -> Vec<Statement<'a>> {
        let Expression::ObjectExpression(object) = object else {
            return Vec::new();
        };
        let syntax = self.syntax;
        let mut statements = Vec::new();
        let mut members = IndexSet::new();

        for property in object.unbox().properties {
            let (kind, key) = classify_member(&property);
            let key = match (kind, key) {
                (MemberKind::Unsupported, key) => {
                    self.unsupported(path, key.as_deref(), property.span());
                    continue;
                }
                (_, Some(key)) => key,
                (_, None) => continue,
            };
            let ObjectPropertyKind::ObjectProperty(prop) = property else {
                continue;
            };
            if !self.claim(&key) {
                continue;
            }
            let value = strip_parens(prop.unbox().value);
            let mut binding = key.clone();

            let statement = match (kind, value) {
                (MemberKind::Binding, value) => {
                    let declaration_kind = if self.options.is_mutable(path, &key) {
                        VariableDeclarationKind::Let
                    } else {
                        VariableDeclarationKind::Const
                    };
                    syntax.export_declaration(syntax.variable(declaration_kind, &key, value))
                }
                (MemberKind::Function, value) => {
                    self.outcome.this_targets.push(ThisTarget {
                        name: key.clone(),
                        namespace: path.to_string(),
                    });
                    self.export_value(value, &key)
                }
                (MemberKind::Reference, Expression::Identifier(id)) => {
                    binding = id.name.to_string();
                    syntax.export_specifier(&binding, &key)
                }
                (_, value) => syntax.export_declaration(syntax.variable(
                    VariableDeclarationKind::Const,
                    &key,
                    value,
                )),
            };
            statements.push(statement);
            self.register(&format!("{}.{}", path, key), &key, Some(&binding));
            members.insert(key);
        }

        self.register(path, NAMESPACE_IMPORT, None);
        debug!(url = self.url, namespace = path, members = members.len(), "lowered namespace");
        self.outcome.namespaces.push(LoweredNamespace {
            path: path.to_string(),
            local_name: local_name.map(str::to_string),
            members,
        });
        statements
    }

    fn unsupported(&mut self, path: &str, key: Option<&str>, span: Span) {
        let member = key.unwrap_or("<computed>");
        warn!(url = self.url, namespace = path, member, "unsupported namespace member; skipped");
        self.outcome.diagnostics.push(Diagnostic::warning(
            DIAG_UNSUPPORTED_MEMBER,
            self.url,
            format!(
                "{}.{} at {}..{}: unsupported member kind; not exported",
                path, member, span.start, span.end
            ),
        ));
    }
}

/// Exported name and registered path for an assignment to `path`.
fn export_target(path: &str, parent: Option<&str>, last: &str) -> (String, String) {
    match parent {
        Some(parent) if last == POLYMER_FN => (split_path(parent).1.to_string(), parent.to_string()),
        _ => (last.to_string(), path.to_string()),
    }
}

fn declares_object(stmt: &Statement<'_>) -> bool {
    let Statement::VariableDeclaration(decl) = stmt else {
        return false;
    };
    decl.declarations.len() == 1
        && matches!(
            decl.declarations[0].init.as_ref().map(Expression::without_parentheses),
            Some(Expression::ObjectExpression(_))
        )
}

/// Takes the right side out of `target = value;`.
fn assigned_value<'a>(stmt: &mut Statement<'a>, allocator: &'a Allocator) -> Option<Expression<'a>> {
    let Statement::ExpressionStatement(expr_stmt) = stmt else {
        return None;
    };
    let Expression::AssignmentExpression(assign) = &mut expr_stmt.expression else {
        return None;
    };
    Some(strip_parens(assign.right.take_in(allocator)))
}

/// Takes the initializer out of `const name = value;`.
fn declared_value<'a>(stmt: &mut Statement<'a>) -> Option<Expression<'a>> {
    let Statement::VariableDeclaration(decl) = stmt else {
        return None;
    };
    decl.declarations.first_mut()?.init.take().map(strip_parens)
}
