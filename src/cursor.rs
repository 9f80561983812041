//! The rewrite cursor shared by the statement-level phases.
//!
//! Imports and retained markup are inserted ahead of the original
//! statements, and the export state machine removes and expands statements
//! as it goes. Every phase moves the same cursor so later phases start after
//! the statements earlier phases produced.

use oxc_ast::ast::Statement;

type Body<'a> = oxc_allocator::Vec<'a, Statement<'a>>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteCursor {
    index: usize,
}

impl RewriteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self, by: usize) {
        self.index += by;
    }

    /// Inserts `statements` at `at`. Insertions at or before the cursor move
    /// it forward so it keeps pointing at the same statement.
    pub fn insert<'a>(&mut self, body: &mut Body<'a>, at: usize, statements: Vec<Statement<'a>>) {
        let count = statements.len();
        for (offset, stmt) in statements.into_iter().enumerate() {
            body.insert(at + offset, stmt);
        }
        if at <= self.index {
            self.index += count;
        }
    }

    /// Inserts `statements` at the cursor and moves past them.
    pub fn insert_here<'a>(&mut self, body: &mut Body<'a>, statements: Vec<Statement<'a>>) {
        let at = self.index;
        self.insert(body, at, statements);
    }

    /// Removes the statement at `at`. Removals before the cursor move it back.
    pub fn remove<'a>(&mut self, body: &mut Body<'a>, at: usize) -> Statement<'a> {
        let removed = body.remove(at);
        if at < self.index {
            self.index -= 1;
        }
        removed
    }

    /// Replaces the statement at `at` with `statements`.
    ///
    /// Replacing a statement before the cursor shifts the cursor by the size
    /// difference. Replacing the statement under the cursor leaves the cursor
    /// on the first replacement.
    pub fn replace<'a>(
        &mut self,
        body: &mut Body<'a>,
        at: usize,
        statements: Vec<Statement<'a>>,
    ) -> Statement<'a> {
        let count = statements.len();
        let removed = body.remove(at);
        for (offset, stmt) in statements.into_iter().enumerate() {
            body.insert(at + offset, stmt);
        }
        if at < self.index {
            self.index = self.index + count - 1;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Syntax;
    use oxc_allocator::Allocator;
    use oxc_span::SPAN;

    fn empty<'a>(syntax: Syntax<'a>) -> Statement<'a> {
        syntax.ast.statement_empty(SPAN)
    }

    #[test]
    fn tracks_insertions_and_removals() {
        let allocator = Allocator::default();
        let syntax = Syntax::new(&allocator);
        let mut body = syntax.ast.vec();
        for _ in 0..3 {
            body.push(empty(syntax));
        }
        let mut cursor = RewriteCursor::new();

        cursor.insert(&mut body, 0, vec![empty(syntax), empty(syntax)]);
        assert_eq!(cursor.index(), 2);

        cursor.insert_here(&mut body, vec![empty(syntax)]);
        assert_eq!(cursor.index(), 3);
        assert_eq!(body.len(), 6);

        cursor.remove(&mut body, 0);
        assert_eq!(cursor.index(), 2);

        cursor.replace(&mut body, 0, vec![empty(syntax), empty(syntax), empty(syntax)]);
        assert_eq!(cursor.index(), 4);

        cursor.replace(&mut body, 4, vec![empty(syntax)]);
        assert_eq!(cursor.index(), 4);

        cursor.remove(&mut body, 6);
        assert_eq!(cursor.index(), 4);
        assert_eq!(body.len(), 6);
    }
}
