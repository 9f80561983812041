//! Markup inlining.
//!
//! HTML that used to live next to the script is carried into the module as
//! template literals: retained top-level markup is appended to
//! `document.head` at load time, and `<dom-module>` templates are attached to
//! the element definitions that use them.

use oxc_ast::ast::*;
use oxc_ast_visit::walk_mut::{walk_call_expression, walk_class};
use oxc_ast_visit::VisitMut;
use tracing::{debug, warn};

use crate::cursor::RewriteCursor;
use crate::document::{ElementFeature, ElementKind, MarkupElement};
use crate::error::{Diagnostic, DIAG_TEMPLATE_EXISTS};
use crate::syntax::Syntax;

pub const DOCUMENT_CONTAINER: &str = "$_documentContainer";

/// Top-level elements that are never carried into the module.
const DISCARDED_TAGS: [&str; 6] = ["style", "base", "link", "meta", "script", "dom-module"];

/// Escapes text for the body of a template literal.
pub fn escape_template_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

/// A template literal whose cooked value is exactly `text`.
pub fn markup_literal<'a>(syntax: Syntax<'a>, text: &str) -> Expression<'a> {
    syntax.template_literal(&escape_template_text(text), text)
}

pub fn retained_markup_html(markup: &[MarkupElement]) -> Option<String> {
    let kept: Vec<&str> = markup
        .iter()
        .filter(|element| !DISCARDED_TAGS.contains(&element.tag_name.to_ascii_lowercase().as_str()))
        .map(|element| element.html.as_str())
        .collect();
    if kept.is_empty() {
        return None;
    }
    Some(format!("\n{}\n", kept.join("\n")))
}

/// Emits the hidden container holding retained markup at the cursor.
///
/// Returns `false` when nothing is retained.
pub fn inline_retained_markup<'a>(
    syntax: Syntax<'a>,
    program: &mut Program<'a>,
    cursor: &mut RewriteCursor,
    markup: &[MarkupElement],
) -> bool {
    let Some(html) = retained_markup_html(markup) else {
        return false;
    };

    let create = syntax.call(
        syntax.path("document.createElement"),
        vec![syntax.string("div")],
    );
    let hide = syntax.call(
        syntax.path(&format!("{}.setAttribute", DOCUMENT_CONTAINER)),
        vec![syntax.string("style"), syntax.string("display: none;")],
    );
    let append = syntax.call(
        syntax.path("document.head.appendChild"),
        vec![syntax.ident(DOCUMENT_CONTAINER)],
    );

    let statements = vec![
        Statement::from(syntax.variable(
            VariableDeclarationKind::Const,
            DOCUMENT_CONTAINER,
            create,
        )),
        syntax.statement(hide),
        syntax.assign_member(
            syntax.ident(DOCUMENT_CONTAINER),
            "innerHTML",
            markup_literal(syntax, &html),
        ),
        syntax.statement(append),
    ];
    debug!(bytes = html.len(), "inlined retained markup");
    cursor.insert_here(&mut program.body, statements);
    true
}

/// Attaches each element's `<dom-module>` template to its definition.
pub fn inline_element_templates<'a>(
    syntax: Syntax<'a>,
    program: &mut Program<'a>,
    url: &str,
    elements: &[ElementFeature],
) -> Vec<Diagnostic> {
    if elements.iter().all(|element| element.template.is_none()) {
        return Vec::new();
    }
    let mut inliner = TemplateInliner {
        syntax,
        url,
        elements,
        diagnostics: Vec::new(),
    };
    inliner.visit_program(program);
    inliner.diagnostics
}

struct TemplateInliner<'e, 'a> {
    syntax: Syntax<'a>,
    url: &'e str,
    elements: &'e [ElementFeature],
    diagnostics: Vec<Diagnostic>,
}

impl<'e, 'a> TemplateInliner<'e, 'a> {
    fn element_at(&self, kind: ElementKind, span: oxc_span::Span) -> Option<&'e ElementFeature> {
        self.elements
            .iter()
            .find(|element| element.kind == kind && element.span == span && element.template.is_some())
    }

    fn already_templated(&mut self, element: &ElementFeature) {
        warn!(url = self.url, element = %element.tag_name, "element already defines a template");
        self.diagnostics.push(Diagnostic::warning(
            DIAG_TEMPLATE_EXISTS,
            self.url,
            format!("<{}> already defines a template; left unchanged", element.tag_name),
        ));
    }
}

fn class_declares_template(class: &Class<'_>) -> bool {
    class.body.body.iter().any(|member| match member {
        ClassElement::MethodDefinition(method) => {
            method.r#static && method.key.static_name().is_some_and(|name| name == "template")
        }
        ClassElement::PropertyDefinition(prop) => {
            prop.r#static && prop.key.static_name().is_some_and(|name| name == "template")
        }
        _ => false,
    })
}

fn object_declares_template(object: &ObjectExpression<'_>) -> bool {
    object.properties.iter().any(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(prop) => {
            prop.key.static_name().is_some_and(|name| name == "_template")
        }
        ObjectPropertyKind::SpreadProperty(_) => false,
    })
}

impl<'e, 'a> VisitMut<'a> for TemplateInliner<'e, 'a> {
    fn visit_class(&mut self, class: &mut Class<'a>) {
        if let Some(element) = self.element_at(ElementKind::Class, class.span) {
            if class_declares_template(class) {
                self.already_templated(element);
            } else if let Some(template) = &element.template {
                let getter = self
                    .syntax
                    .static_getter("template", markup_literal(self.syntax, template));
                class.body.body.insert(0, getter);
                debug!(element = %element.tag_name, "inlined class template");
            }
        }
        walk_class(self, class);
    }

    fn visit_call_expression(&mut self, call: &mut CallExpression<'a>) {
        if let Some(element) = self.element_at(ElementKind::Factory, call.span) {
            let syntax = self.syntax;
            match call.arguments.first_mut() {
                Some(Argument::ObjectExpression(object)) if object_declares_template(object) => {
                    self.already_templated(element);
                }
                Some(Argument::ObjectExpression(object)) => {
                    if let Some(template) = &element.template {
                        let property =
                            syntax.property("_template", markup_literal(syntax, template));
                        object.properties.insert(0, property);
                        debug!(element = %element.tag_name, "inlined factory template");
                    }
                }
                _ => {}
            }
        }
        walk_call_expression(self, call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_codegen::Codegen;
    use oxc_parser::Parser;
    use oxc_span::{GetSpan, SourceType};

    fn element(tag: &str, html: &str) -> MarkupElement {
        MarkupElement {
            tag_name: tag.to_string(),
            html: html.to_string(),
        }
    }

    #[test]
    fn escapes_backslash_before_backtick_and_interpolation() {
        assert_eq!(escape_template_text(r"a\b"), r"a\\b");
        assert_eq!(escape_template_text("`x`"), r"\`x\`");
        assert_eq!(escape_template_text("${y}"), r"\${y}");
        assert_eq!(escape_template_text(r"\`"), r"\\\`");
    }

    #[test]
    fn discards_blacklisted_elements() {
        let markup = vec![
            element("style", "<style></style>"),
            element("custom-style", "<custom-style></custom-style>"),
            element("dom-module", "<dom-module></dom-module>"),
            element("iron-iconset", "<iron-iconset></iron-iconset>"),
        ];
        assert_eq!(
            retained_markup_html(&markup).as_deref(),
            Some("\n<custom-style></custom-style>\n<iron-iconset></iron-iconset>\n")
        );
        assert_eq!(retained_markup_html(&[element("link", "<link>")]), None);
    }

    #[test]
    fn emits_container_at_cursor() {
        let allocator = Allocator::default();
        let src = "import './dep.js'; run();";
        let mut program = Parser::new(&allocator, src, SourceType::mjs()).parse().program;
        let mut cursor = RewriteCursor::new();
        cursor.advance(1);

        let markup = vec![element("custom-style", "<custom-style>`</custom-style>")];
        assert!(inline_retained_markup(
            Syntax::new(&allocator),
            &mut program,
            &mut cursor,
            &markup
        ));
        assert_eq!(cursor.index(), 5);

        let code = Codegen::new().build(&program).code;
        let import = code.find("./dep.js").unwrap();
        let container = code.find("$_documentContainer").unwrap();
        let run = code.find("run()").unwrap();
        assert!(import < container && container < run);
        assert!(code.contains("document.head.appendChild($_documentContainer)"));
        assert!(code.contains(r"<custom-style>\`</custom-style>"));
    }

    #[test]
    fn inlines_class_and_factory_templates() {
        let allocator = Allocator::default();
        let src = "class XFoo extends Base {}\nPolymer({ is: 'x-bar' });\nclass XBaz { static get template() { return 1; } }";
        let mut program = Parser::new(&allocator, src, SourceType::mjs()).parse().program;

        let class_span = match &program.body[0] {
            Statement::ClassDeclaration(class) => class.span,
            _ => panic!("expected class"),
        };
        let call_span = match &program.body[1] {
            Statement::ExpressionStatement(stmt) => stmt.expression.span(),
            _ => panic!("expected call"),
        };
        let existing_span = match &program.body[2] {
            Statement::ClassDeclaration(class) => class.span,
            _ => panic!("expected class"),
        };
        let elements = vec![
            ElementFeature {
                tag_name: "x-foo".into(),
                kind: ElementKind::Class,
                span: class_span,
                template: Some("<div>foo</div>".into()),
            },
            ElementFeature {
                tag_name: "x-bar".into(),
                kind: ElementKind::Factory,
                span: call_span,
                template: Some("<div>bar</div>".into()),
            },
            ElementFeature {
                tag_name: "x-baz".into(),
                kind: ElementKind::Class,
                span: existing_span,
                template: Some("<div>baz</div>".into()),
            },
        ];

        let diagnostics =
            inline_element_templates(Syntax::new(&allocator), &mut program, "x.html", &elements);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DIAG_TEMPLATE_EXISTS);

        let code = Codegen::new().build(&program).code;
        assert!(code.contains("static get template()"));
        assert!(code.contains("`<div>foo</div>`"));
        assert!(code.contains("_template: `<div>bar</div>`"));
        assert!(!code.contains("<div>baz</div>"));
    }
}
