//! Module-body unwrapping.
//!
//! Legacy scripts wrap everything in a self-invoking function to avoid
//! leaking globals. A module already has its own scope, so the wrapper is
//! removed and its statements become the program body.

use oxc_allocator::{Allocator, TakeIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use tracing::debug;

/// Replaces a program consisting of a single IIFE with the IIFE's body.
///
/// Accepts `(function() {...})()`, `(function() {...}())` and
/// `(() => {...})()`. Wrappers that take or receive arguments are left alone.
/// A leading `"use strict"` directive is dropped; modules are strict already.
///
/// Returns `true` when the program was unwrapped.
pub fn unwrap_module_body<'a>(allocator: &'a Allocator, program: &mut Program<'a>) -> bool {
    if program.body.len() != 1 {
        return false;
    }
    let Some(Statement::ExpressionStatement(stmt)) = program.body.first_mut() else {
        return false;
    };
    let Expression::CallExpression(call) = stmt.expression.without_parentheses_mut() else {
        return false;
    };
    if !call.arguments.is_empty() {
        return false;
    }

    let (directives, statements) = match call.callee.without_parentheses_mut() {
        Expression::FunctionExpression(func) => {
            if !func.params.items.is_empty()
                || func.params.rest.is_some()
                || func.generator
                || func.r#async
            {
                return false;
            }
            let Some(body) = func.body.as_deref_mut() else {
                return false;
            };
            (&mut body.directives, &mut body.statements)
        }
        Expression::ArrowFunctionExpression(arrow) => {
            if arrow.expression
                || arrow.r#async
                || !arrow.params.items.is_empty()
                || arrow.params.rest.is_some()
            {
                return false;
            }
            let body: &mut FunctionBody<'a> = &mut arrow.body;
            (&mut body.directives, &mut body.statements)
        }
        _ => return false,
    };

    let mut directives: ArenaVec<'a, Directive<'a>> = directives.take_in(allocator);
    let statements: ArenaVec<'a, Statement<'a>> = statements.take_in(allocator);

    if directives
        .first()
        .is_some_and(|d| d.directive.as_str() == "use strict")
    {
        directives.remove(0);
    }

    debug!(statements = statements.len(), "unwrapped module body");
    program.directives.extend(directives);
    program.body = statements;
    true
}
