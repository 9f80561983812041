//! Helpers for reading dotted paths out of oxc trees and for building the
//! statements the rewriter emits.

use oxc_allocator::{Allocator, Box as ArenaBox};
use oxc_ast::ast::*;
use oxc_ast::{AstBuilder, NONE};
use oxc_span::SPAN;

// ═══════════════════════════════════════════════════════════════════════════════
// PATH READING
// ═══════════════════════════════════════════════════════════════════════════════

/// Dotted path of an identifier or static member chain, with a leading
/// `window.` removed. `Foo.bar['baz']` -> `Foo.bar.baz`.
pub fn expression_path(expr: &Expression<'_>) -> Option<String> {
    let mut segments = Vec::new();
    push_expression_segments(expr, &mut segments)?;
    join_segments(segments)
}

pub fn member_path(member: &MemberExpression<'_>) -> Option<String> {
    let mut segments = Vec::new();
    push_member_segments(member, &mut segments)?;
    join_segments(segments)
}

pub fn assignment_target_path(target: &AssignmentTarget<'_>) -> Option<String> {
    match target {
        AssignmentTarget::AssignmentTargetIdentifier(id) => Some(id.name.to_string()),
        _ => target.as_member_expression().and_then(member_path),
    }
}

fn push_expression_segments(expr: &Expression<'_>, out: &mut Vec<String>) -> Option<()> {
    match expr {
        Expression::Identifier(id) => {
            out.push(id.name.to_string());
            Some(())
        }
        _ => push_member_segments(expr.as_member_expression()?, out),
    }
}

fn push_member_segments(member: &MemberExpression<'_>, out: &mut Vec<String>) -> Option<()> {
    match member {
        MemberExpression::StaticMemberExpression(m) => {
            push_expression_segments(&m.object, out)?;
            out.push(m.property.name.to_string());
        }
        MemberExpression::ComputedMemberExpression(m) => {
            let Expression::StringLiteral(key) = &m.expression else {
                return None;
            };
            push_expression_segments(&m.object, out)?;
            out.push(key.value.to_string());
        }
        MemberExpression::PrivateFieldExpression(_) => return None,
    }
    Some(())
}

fn join_segments(mut segments: Vec<String>) -> Option<String> {
    if segments.len() > 1 && segments[0] == "window" {
        segments.remove(0);
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("."))
    }
}

/// `Foo.bar.baz` -> (`Some("Foo.bar")`, `"baz"`)
pub fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    }
}

pub fn path_root(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Names bound at the top level of a program.
pub fn top_level_bindings(program: &Program<'_>) -> Vec<String> {
    let mut names = Vec::new();
    for stmt in &program.body {
        let declaration = match stmt {
            Statement::ExportNamedDeclaration(export) => export.declaration.as_ref(),
            _ => stmt.as_declaration(),
        };
        match declaration {
            Some(Declaration::VariableDeclaration(var)) => {
                for declarator in &var.declarations {
                    if let BindingPattern::BindingIdentifier(id) = &declarator.id {
                        names.push(id.name.to_string());
                    }
                }
            }
            Some(Declaration::FunctionDeclaration(func)) => {
                if let Some(id) = &func.id {
                    names.push(id.name.to_string());
                }
            }
            Some(Declaration::ClassDeclaration(class)) => {
                if let Some(id) = &class.id {
                    names.push(id.name.to_string());
                }
            }
            _ => {}
        }
    }
    names
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE CONSTRUCTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy)]
pub struct Syntax<'a> {
    pub ast: AstBuilder<'a>,
}

impl<'a> Syntax<'a> {
    pub fn new(allocator: &'a Allocator) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
        }
    }

    pub fn ident(self, name: &str) -> Expression<'a> {
        self.ast.expression_identifier(SPAN, self.ast.atom(name))
    }

    /// `Foo.bar.baz` as a static member chain.
    pub fn path(self, dotted: &str) -> Expression<'a> {
        let mut segments = dotted.split('.');
        let mut expr = self.ident(segments.next().unwrap_or(dotted));
        for segment in segments {
            expr = Expression::from(self.member(expr, segment));
        }
        expr
    }

    pub fn member(self, object: Expression<'a>, property: &str) -> MemberExpression<'a> {
        self.ast.member_expression_static(
            SPAN,
            object,
            self.ast.identifier_name(SPAN, self.ast.atom(property)),
            false,
        )
    }

    pub fn string(self, value: &str) -> Expression<'a> {
        self.ast
            .expression_string_literal(SPAN, self.ast.atom(value), None)
    }

    fn string_literal(self, value: &str) -> StringLiteral<'a> {
        self.ast.string_literal(SPAN, self.ast.atom(value), None)
    }

    /// A single-quasi template literal with explicit raw and cooked text.
    pub fn template_literal(self, raw: &str, cooked: &str) -> Expression<'a> {
        let value = TemplateElementValue {
            raw: self.ast.atom(raw),
            cooked: Some(self.ast.atom(cooked)),
        };
        let quasi = self.ast.template_element(SPAN, value, true);
        self.ast
            .expression_template_literal(SPAN, self.ast.vec1(quasi), self.ast.vec())
    }

    pub fn call(self, callee: Expression<'a>, args: Vec<Expression<'a>>) -> Expression<'a> {
        let arguments = self
            .ast
            .vec_from_iter(args.into_iter().map(Argument::from));
        self.ast.expression_call(SPAN, callee, NONE, arguments, false)
    }

    pub fn statement(self, expr: Expression<'a>) -> Statement<'a> {
        self.ast.statement_expression(SPAN, expr)
    }

    /// `object.property = value;`
    pub fn assign_member(
        self,
        object: Expression<'a>,
        property: &str,
        value: Expression<'a>,
    ) -> Statement<'a> {
        let target = SimpleAssignmentTarget::from(self.member(object, property));
        self.statement(self.ast.expression_assignment(
            SPAN,
            AssignmentOperator::Assign,
            AssignmentTarget::from(target),
            value,
        ))
    }

    pub fn variable(
        self,
        kind: VariableDeclarationKind,
        name: &str,
        init: Expression<'a>,
    ) -> Declaration<'a> {
        let declarator = self.ast.variable_declarator(
            SPAN,
            kind,
            self.ast
                .binding_pattern_binding_identifier(SPAN, self.ast.atom(name)),
            NONE,
            Some(init),
            false,
        );
        self.ast
            .declaration_variable(SPAN, kind, self.ast.vec1(declarator), false)
    }

    /// Turns a function expression into a named function declaration.
    pub fn function_declaration(
        self,
        mut func: ArenaBox<'a, Function<'a>>,
        name: &str,
    ) -> Declaration<'a> {
        func.r#type = FunctionType::FunctionDeclaration;
        func.id = Some(self.ast.binding_identifier(SPAN, self.ast.atom(name)));
        func.pife = false;
        Declaration::FunctionDeclaration(func)
    }

    /// Turns a class expression into a named class declaration.
    pub fn class_declaration(self, mut class: ArenaBox<'a, Class<'a>>, name: &str) -> Declaration<'a> {
        class.r#type = ClassType::ClassDeclaration;
        class.id = Some(self.ast.binding_identifier(SPAN, self.ast.atom(name)));
        Declaration::ClassDeclaration(class)
    }

    pub fn export_declaration(self, declaration: Declaration<'a>) -> Statement<'a> {
        Statement::ExportNamedDeclaration(
            self.ast
                .plain_export_named_declaration_declaration(SPAN, declaration),
        )
    }

    /// `export { local as exported };`
    pub fn export_specifier(self, local: &str, exported: &str) -> Statement<'a> {
        let specifier = self.ast.export_specifier(
            SPAN,
            self.ast
                .module_export_name_identifier_reference(SPAN, self.ast.atom(local)),
            self.ast
                .module_export_name_identifier_name(SPAN, self.ast.atom(exported)),
            ImportOrExportKind::Value,
        );
        Statement::ExportNamedDeclaration(self.ast.plain_export_named_declaration(
            SPAN,
            self.ast.vec1(specifier),
            None,
        ))
    }

    /// `import * as local from 'source';`
    pub fn import_namespace(self, local: &str, source: &str) -> Statement<'a> {
        let specifier = self.ast.import_declaration_specifier_import_namespace_specifier(
            SPAN,
            self.ast.binding_identifier(SPAN, self.ast.atom(local)),
        );
        self.import(Some(self.ast.vec1(specifier)), source)
    }

    /// `import { imported as local, ... } from 'source';`
    pub fn import_named(self, names: &[(String, String)], source: &str) -> Statement<'a> {
        let specifiers = self.ast.vec_from_iter(names.iter().map(|(imported, local)| {
            self.ast.import_declaration_specifier_import_specifier(
                SPAN,
                self.ast
                    .module_export_name_identifier_name(SPAN, self.ast.atom(imported)),
                self.ast.binding_identifier(SPAN, self.ast.atom(local)),
                ImportOrExportKind::Value,
            )
        }));
        self.import(Some(specifiers), source)
    }

    /// `import 'source';`
    pub fn import_side_effect(self, source: &str) -> Statement<'a> {
        self.import(None, source)
    }

    fn import(
        self,
        specifiers: Option<oxc_allocator::Vec<'a, ImportDeclarationSpecifier<'a>>>,
        source: &str,
    ) -> Statement<'a> {
        Statement::from(self.ast.module_declaration_import_declaration(
            SPAN,
            specifiers,
            self.string_literal(source),
            None,
            NONE,
            ImportOrExportKind::Value,
        ))
    }

    pub fn property_key(self, name: &str) -> PropertyKey<'a> {
        PropertyKey::StaticIdentifier(
            self.ast
                .alloc(self.ast.identifier_name(SPAN, self.ast.atom(name))),
        )
    }

    /// `name: value` inside an object literal.
    pub fn property(self, name: &str, value: Expression<'a>) -> ObjectPropertyKind<'a> {
        self.ast.object_property_kind_object_property(
            SPAN,
            PropertyKind::Init,
            self.property_key(name),
            value,
            false,
            false,
            false,
        )
    }

    /// `static get name() { return value; }`
    pub fn static_getter(self, name: &str, value: Expression<'a>) -> ClassElement<'a> {
        let body = self.ast.function_body(
            SPAN,
            self.ast.vec(),
            self.ast.vec1(self.ast.statement_return(SPAN, Some(value))),
        );
        let params = self.ast.formal_parameters(
            SPAN,
            FormalParameterKind::UniqueFormalParameters,
            self.ast.vec(),
            NONE,
        );
        let func = self.ast.alloc_function(
            SPAN,
            FunctionType::FunctionExpression,
            None,
            false,
            false,
            false,
            NONE,
            NONE,
            params,
            NONE,
            Some(body),
        );
        self.ast.class_element_method_definition(
            SPAN,
            MethodDefinitionType::MethodDefinition,
            self.ast.vec(),
            self.property_key(name),
            func,
            MethodDefinitionKind::Get,
            false,
            true,
            false,
            false,
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn first_expression<'p, 'a>(program: &'p Program<'a>) -> &'p Expression<'a> {
        match &program.body[0] {
            Statement::ExpressionStatement(stmt) => &stmt.expression,
            _ => panic!("expected expression statement"),
        }
    }

    #[test]
    fn reads_dotted_paths() {
        let allocator = Allocator::default();
        let src = "window.Polymer.Async['timeOut'];";
        let ret = Parser::new(&allocator, src, SourceType::default()).parse();
        assert_eq!(
            expression_path(first_expression(&ret.program)).as_deref(),
            Some("Polymer.Async.timeOut")
        );
    }

    #[test]
    fn computed_non_literal_has_no_path() {
        let allocator = Allocator::default();
        let src = "Foo[bar].baz;";
        let ret = Parser::new(&allocator, src, SourceType::default()).parse();
        assert_eq!(expression_path(first_expression(&ret.program)), None);
    }

    #[test]
    fn splits_paths() {
        assert_eq!(split_path("Foo.bar.baz"), (Some("Foo.bar"), "baz"));
        assert_eq!(split_path("Foo"), (None, "Foo"));
        assert_eq!(path_root("Foo.bar"), "Foo");
    }

    #[test]
    fn collects_top_level_bindings() {
        let allocator = Allocator::default();
        let src = "const a = 1; function b() {} class C {} export let d = 2; a.x = 3;";
        let ret = Parser::new(&allocator, src, SourceType::default().with_module(true)).parse();
        assert_eq!(top_level_bindings(&ret.program), vec!["a", "b", "C", "d"]);
    }
}
