//! End-to-end scenarios over the C-like fixture language.

mod common;

use common::{Expr, Stmt, lang, parse, program_value};
use parselet::document::Document;
use parselet::error::{ErrorCode, GenerateError};
use parselet::format::{FormatPolicy, Formatter, HtmlSink};
use parselet::generate::Generator;
use parselet::testing::{RecordingSink, dump_tree};
use parselet::tree::{NodeIds, ParseNode};
use parselet::text::TextSize;
use parselet::value::SemanticTree;
use rstest::rstest;

#[test]
fn compact_if_formats_back_exactly() {
    let lang = lang(true);
    let (parsed, values) = parse(&lang, "if{x;}");
    assert!(parsed.errors.is_empty());
    let policy = FormatPolicy::default();
    assert_eq!(Formatter::new(&policy, &values).format(&parsed.root), "if{x;}");
    assert_eq!(
        values.render(parsed.value.unwrap()),
        "[If { body: [ExprStmt { expr: Name { id: \"x\" } }] }]"
    );
}

#[test]
fn unterminated_if_keeps_the_skipped_text() {
    let lang = lang(true);
    let (parsed, values) = parse(&lang, "if{x");
    assert_eq!(parsed.root.text(), "if{x");
    assert_eq!(parsed.errors.len(), 1);
    assert!(parsed.root.is_error_node());

    let error = parsed.root.walk().find_map(ParseNode::as_error).unwrap();
    assert_eq!(error.error_text(), "x");
    assert!(error.resynced().is_none());

    let partial = parsed.root.walk().find(|node| node.is_partial()).unwrap();
    // Choices relabel the winning node with their own rule.
    assert_eq!(partial.rule(), Some(lang.stmt));
    assert_eq!(values.kind(partial.value().unwrap()), Some("If"));
}

#[test]
fn recovery_resynchronises_on_the_closing_brace() {
    let lang = lang(true);
    let (parsed, values) = parse(&lang, "if { a = 1; ?? }\nb;");
    assert_eq!(parsed.errors.len(), 1);
    let error = parsed.root.walk().find_map(ParseNode::as_error).unwrap();
    assert_eq!(error.error_text(), "?? ");
    assert_eq!(error.resynced().unwrap().text(), "}");
    assert_eq!(
        values.render(parsed.value.unwrap()),
        "[If { body: [Assign { name: \"a\", value: Number { digits: \"1\" } }] }, \
         ExprStmt { expr: Name { id: \"b\" } }]"
    );
}

#[test]
fn unparsable_input_reports_the_furthest_failure() {
    let lang = lang(true);
    let mut values = SemanticTree::new();
    let error = parselet::parser::Parser::new(&lang.grammar)
        .parse("a = ;", &mut values, &mut NodeIds::new())
        .unwrap_err();
    assert_ne!(error.code(), ErrorCode::TrailingInput);
    assert_eq!(error.position(), TextSize::from(4));
    let context = error.format_with_context("a = ;");
    assert!(context.contains("at 1:5"), "{context}");
    assert!(context.contains("a = [;]"), "{context}");
}

#[test]
fn chains_parse_left_to_right() {
    let lang = lang(true);
    let (parsed, values) = parse(&lang, "v = a.b.c;");
    assert_eq!(
        values.render(parsed.value.unwrap()),
        "[Assign { name: \"v\", value: Member { field: \"c\", target: Member { field: \"b\", target: Name { id: \"a\" } } } }]"
    );
}

#[test]
fn generated_programs_are_laid_out() {
    let lang = lang(true);
    let mut values = SemanticTree::new();
    let program = program_value(
        &mut values,
        &[
            Stmt::Assign("a".into(), Expr::Number("1".into())),
            Stmt::If(vec![
                Stmt::Expr(Expr::Member(Box::new(Expr::Name("a".into())), "b".into())),
                Stmt::If(vec![Stmt::Expr(Expr::Name("c".into()))]),
            ]),
        ],
    );
    let generated = Generator::new(&lang.grammar)
        .generate(&mut values, program, lang.program, &mut NodeIds::new())
        .unwrap();
    assert!(generated.root.is_generated_tree());
    let text = Formatter::new(&FormatPolicy::default(), &values).format(&generated.root);
    assert_eq!(text, "a = 1;\nif {\n    a.b;\n    if {\n        c;\n    }\n}");
}

#[test]
fn values_the_grammar_cannot_render_are_rejected() {
    let lang = lang(true);
    let mut values = SemanticTree::new();
    let stray = values.object("While");
    let program = values.list(vec![stray]);
    let error = Generator::new(&lang.grammar)
        .generate(&mut values, program, lang.program, &mut NodeIds::new())
        .unwrap_err();
    assert!(!error.is_invariant_violation());
    assert!(!matches!(error, GenerateError::NoValue { .. }), "{error}");
}

#[test]
fn document_regenerates_only_what_changed() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "a   =   1;\nif { b; }").unwrap();
    let list = doc.value().unwrap();
    let block = doc.values().elements(list).unwrap()[1];
    let body = doc.values().field(block, "body").unwrap();
    let c = common::stmt_value(doc.values_mut(), &Stmt::Expr(Expr::Name("c".into())));
    doc.values_mut().push(body, c).unwrap();

    let text = doc.regenerate(&FormatPolicy::default()).unwrap().to_owned();
    assert!(text.starts_with("a   =   1;\n"), "{text}");
    assert!(text.contains("b;"), "{text}");
    assert!(text.contains("c;"), "{text}");

    let (reparsed, values) = parse(&lang, &text);
    assert!(values.structurally_equal(reparsed.value.unwrap(), doc.values(), list));
}

#[test]
fn styled_output_nests_and_covers_all_text() {
    let lang = lang(true);
    let (parsed, values) = parse(&lang, "if { x; }");
    let policy = FormatPolicy::default();
    let formatter = Formatter::new(&policy, &values);

    let mut sink = RecordingSink::new();
    formatter.format_styled(&parsed.root, &lang.grammar, &mut sink);
    assert!(sink.is_balanced());
    assert_eq!(sink.text(), "if { x; }");

    let mut html = HtmlSink::new();
    formatter.format_styled(&parsed.root, &lang.grammar, &mut html);
    assert!(html.as_str().contains("<span"));
    assert_eq!(strip_tags(html.as_str()), "if { x; }");
}

fn strip_tags(html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

#[test]
fn tree_dump_names_rules() {
    let lang = lang(true);
    let (parsed, _) = parse(&lang, "a = 1;");
    let dump = dump_tree(&parsed.root, Some(&lang.grammar));
    assert!(dump.starts_with("Branch program 0..6"), "{dump}");
    assert!(dump.contains("Leaf ident 0..1 \"a\""), "{dump}");
    assert!(dump.contains("Leaf digits 4..5 \"1\""), "{dump}");
}

#[rstest]
#[case("a=1;", "a = 1;")]
#[case("a.b;", "a.b;")]
#[case("if{}", "if {}")]
#[case("if{a;}", "if {\n    a;\n}")]
#[case("x;y;", "x;\ny;")]
fn regenerating_every_statement_normalises_layout(#[case] source: &str, #[case] expected: &str) {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, source).unwrap();
    // Forget every owner so nothing can be reused.
    let all: Vec<_> = doc.root().walk().filter_map(ParseNode::value).collect();
    for value in all {
        doc.values_mut().set_owner(value, None);
    }
    assert_eq!(doc.regenerate(&FormatPolicy::default()).unwrap(), expected);
}
