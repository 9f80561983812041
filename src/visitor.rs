use oxc_allocator::{Allocator, CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast_visit::walk_mut::{
    walk_class, walk_expression, walk_function, walk_object_property,
    walk_simple_assignment_target,
};
use oxc_ast_visit::VisitMut;
use oxc_syntax::scope::ScopeFlags;
use tracing::debug;

/// Outcome of offering one expression to an [`ExpressionRewriter`].
pub enum Rewrite<'a> {
    /// Replace the expression; the replacement is not visited.
    Replace(Expression<'a>),
    /// Leave the expression and visit its children.
    Continue,
    /// Leave the expression and its children untouched.
    Skip,
}

/// Where an offered expression sits in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Value,
    /// The object of a member access, e.g. `Foo` in `Foo.bar`.
    MemberObject,
    /// The left side of an assignment or the operand of `++`/`--`.
    AssignmentTarget,
}

/// The single traversal mechanism for expression-level rewrites.
///
/// Rules:
/// 1. Expressions are offered outermost first, so a match on a long member
///    chain wins over any of its sub-chains.
/// 2. Member-expression assignment targets are offered as expressions with
///    [`Position::AssignmentTarget`]; a replacement must be an identifier or a
///    member expression to be applied there.
/// 3. When [`ExpressionRewriter::descend_into_functions`] is `false`, nested
///    non-arrow functions and classes are not entered.
pub trait ExpressionRewriter<'a> {
    fn rewrite(&mut self, expr: &Expression<'a>, position: Position) -> Rewrite<'a>;

    fn descend_into_functions(&self) -> bool {
        true
    }
}

pub fn rewrite_program<'a, R: ExpressionRewriter<'a>>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    rewriter: &mut R,
) {
    rewrite_statements(allocator, &mut program.body, rewriter);
}

pub fn rewrite_statements<'a, R: ExpressionRewriter<'a>>(
    allocator: &'a Allocator,
    statements: &mut ArenaVec<'a, Statement<'a>>,
    rewriter: &mut R,
) {
    let mut driver = Rewriting::new(allocator, rewriter);
    driver.visit_statements(statements);
}

pub fn rewrite_function_body<'a, R: ExpressionRewriter<'a>>(
    allocator: &'a Allocator,
    body: &mut FunctionBody<'a>,
    rewriter: &mut R,
) {
    let mut driver = Rewriting::new(allocator, rewriter);
    driver.visit_function_body(body);
}

struct Rewriting<'r, 'a, R> {
    allocator: &'a Allocator,
    rewriter: &'r mut R,
    position: Position,
}

impl<'r, 'a, R: ExpressionRewriter<'a>> Rewriting<'r, 'a, R> {
    fn new(allocator: &'a Allocator, rewriter: &'r mut R) -> Self {
        Self {
            allocator,
            rewriter,
            position: Position::Value,
        }
    }
}

fn into_simple_target(expr: Expression<'_>) -> Option<SimpleAssignmentTarget<'_>> {
    match expr {
        Expression::Identifier(id) => Some(SimpleAssignmentTarget::AssignmentTargetIdentifier(id)),
        other if other.is_member_expression() => {
            Some(SimpleAssignmentTarget::from(other.into_member_expression()))
        }
        _ => None,
    }
}

impl<'r, 'a, R: ExpressionRewriter<'a>> VisitMut<'a> for Rewriting<'r, 'a, R> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        let position = std::mem::replace(&mut self.position, Position::Value);
        match self.rewriter.rewrite(expr, position) {
            Rewrite::Replace(replacement) => *expr = replacement,
            Rewrite::Skip => {}
            Rewrite::Continue => walk_expression(self, expr),
        }
    }

    fn visit_static_member_expression(&mut self, it: &mut StaticMemberExpression<'a>) {
        self.position = Position::MemberObject;
        self.visit_expression(&mut it.object);
    }

    fn visit_computed_member_expression(&mut self, it: &mut ComputedMemberExpression<'a>) {
        self.position = Position::MemberObject;
        self.visit_expression(&mut it.object);
        self.visit_expression(&mut it.expression);
    }

    fn visit_simple_assignment_target(&mut self, target: &mut SimpleAssignmentTarget<'a>) {
        if let Some(member) = target.as_member_expression() {
            let probe = Expression::from(member.clone_in(self.allocator));
            match self.rewriter.rewrite(&probe, Position::AssignmentTarget) {
                Rewrite::Replace(replacement) => match into_simple_target(replacement) {
                    Some(new_target) => {
                        *target = new_target;
                        return;
                    }
                    None => debug!("replacement is not assignable; keeping target"),
                },
                Rewrite::Skip => return,
                Rewrite::Continue => {}
            }
        }
        walk_simple_assignment_target(self, target);
    }

    fn visit_function(&mut self, func: &mut Function<'a>, flags: ScopeFlags) {
        if self.rewriter.descend_into_functions() {
            walk_function(self, func, flags);
        }
    }

    fn visit_class(&mut self, class: &mut Class<'a>) {
        if self.rewriter.descend_into_functions() {
            walk_class(self, class);
        }
    }

    fn visit_object_property(&mut self, prop: &mut ObjectProperty<'a>) {
        walk_object_property(self, prop);
        if prop.shorthand {
            let still_shorthand = matches!(
                (&prop.key, &prop.value),
                (PropertyKey::StaticIdentifier(key), Expression::Identifier(value))
                    if key.name == value.name
            );
            prop.shorthand = still_shorthand;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{expression_path, Syntax};
    use oxc_codegen::Codegen;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    /// Renames `Foo.bar` to `fooBar` and records what it saw.
    struct Renamer<'a> {
        syntax: Syntax<'a>,
        positions: Vec<(String, Position)>,
        descend: bool,
    }

    impl<'a> ExpressionRewriter<'a> for Renamer<'a> {
        fn rewrite(&mut self, expr: &Expression<'a>, position: Position) -> Rewrite<'a> {
            if let Some(path) = expression_path(expr) {
                self.positions.push((path.clone(), position));
                if path == "Foo.bar" {
                    return Rewrite::Replace(self.syntax.ident("fooBar"));
                }
                if path == "Baz" && position == Position::Value {
                    return Rewrite::Replace(self.syntax.ident("$Baz"));
                }
            }
            Rewrite::Continue
        }

        fn descend_into_functions(&self) -> bool {
            self.descend
        }
    }

    fn run(src: &str, descend: bool) -> (String, Vec<(String, Position)>) {
        let allocator = Allocator::default();
        let source = allocator.alloc_str(src);
        let mut program = Parser::new(&allocator, source, SourceType::default())
            .parse()
            .program;
        let mut renamer = Renamer {
            syntax: Syntax::new(&allocator),
            positions: Vec::new(),
            descend,
        };
        rewrite_program(&allocator, &mut program, &mut renamer);
        (Codegen::new().build(&program).code, renamer.positions)
    }

    #[test]
    fn replaces_values_and_targets() {
        let (code, _) = run("Foo.bar.baz(); Foo.bar = 1; Foo.bar++;", true);
        assert!(code.contains("fooBar.baz()"));
        assert!(code.contains("fooBar = 1"));
        assert!(code.contains("fooBar++"));
        assert!(!code.contains("Foo.bar"));
    }

    #[test]
    fn reports_member_object_position() {
        let (_, positions) = run("Foo.qux;", true);
        assert!(positions.contains(&("Foo.qux".to_string(), Position::Value)));
        assert!(positions.contains(&("Foo".to_string(), Position::MemberObject)));
    }

    #[test]
    fn shorthand_properties_are_expanded() {
        let (code, _) = run("use({ x: Foo.bar }); let o = { Baz };", true);
        assert!(code.contains("x: fooBar"));
        assert!(code.contains("Baz: $Baz"));
    }

    #[test]
    fn respects_function_boundary() {
        let (code, _) = run("Foo.bar; function f() { Foo.bar; } () => Foo.bar;", false);
        assert!(code.contains("Foo.bar"));
        assert_eq!(code.matches("fooBar").count(), 2);
    }
}
