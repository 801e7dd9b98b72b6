//! Incremental reparsing against the C-like fixture language.

mod common;

use common::{lang, parse};
use parselet::document::Document;
use parselet::grammar::{CharSet, Grammar, GrammarBuilder, Literal, Parselet, Slot};
use parselet::incremental::{DiffContext, TextEdit};
use parselet::text::{TextSize, range_of};
use parselet::tree::ParseNode;

#[test]
fn digit_edit_reparses_only_the_number() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "a = 1;\nb = 2;").unwrap();
    let list = doc.value().unwrap();
    let second = doc.values().elements(list).unwrap()[1];

    let report = doc.edit("a = 1;\nb = 23;").unwrap();
    assert!(!report.full_reparse);
    assert_eq!(report.reparsed, range_of(11, 13));
    assert!(report.reused_nodes > 0);

    // Value ids survive; their contents are updated in place.
    assert_eq!(doc.value(), Some(list));
    assert_eq!(doc.values().elements(list).unwrap()[1], second);
    assert_eq!(
        doc.values().render(second),
        "Assign { name: \"b\", value: Number { digits: \"23\" } }"
    );
    doc.root().check_offsets().unwrap();
}

#[test]
fn growing_an_expression_replaces_its_value() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "a = x;").unwrap();
    let stmt = doc.values().elements(doc.value().unwrap()).unwrap()[0];
    let expr = doc.values().field(stmt, "value").unwrap();

    let report = doc.edit("a = x.b;").unwrap();
    assert!(!report.full_reparse);
    assert_eq!(report.reparsed, range_of(4, 7));
    assert_eq!(doc.values().field(stmt, "value"), Some(expr));
    assert_eq!(
        doc.values().render(expr),
        "Member { field: \"b\", target: Name { id: \"x\" } }"
    );
}

#[test]
fn statements_reread_by_earlier_alternatives_are_reparsed_whole() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "a;").unwrap();
    let list = doc.value().unwrap();

    // `assign` looked past `a` before `exprStmt` matched it.
    let report = doc.edit("a.b;").unwrap();
    assert!(!report.full_reparse);
    assert_eq!(report.reparsed, range_of(0, 4));
    assert_eq!(
        doc.values().render(list),
        "[ExprStmt { expr: Member { field: \"b\", target: Name { id: \"a\" } } }]"
    );
}

#[test]
fn fixing_a_recovered_error_clears_it() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "if{x").unwrap();
    assert_eq!(doc.errors().len(), 1);

    doc.edit("if{x;}").unwrap();
    assert!(doc.errors().is_empty());
    assert!(!doc.root().is_error_node());
    assert_eq!(doc.root().text(), "if{x;}");
    assert_eq!(
        doc.values().render(doc.value().unwrap()),
        "[If { body: [ExprStmt { expr: Name { id: \"x\" } }] }]"
    );
}

#[test]
fn empty_document_falls_back_to_a_full_parse() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "").unwrap();
    assert!(doc.value().is_none());

    let report = doc.edit("a;").unwrap();
    assert!(report.full_reparse);
    assert_eq!(report.reparsed, range_of(0, 2));
    assert_eq!(doc.values().elements(doc.value().unwrap()).unwrap().len(), 1);
}

#[test]
fn unchanged_text_reuses_everything() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "a = 1;").unwrap();
    let report = doc.edit("a = 1;").unwrap();
    assert!(!report.full_reparse);
    assert!(report.reparsed.is_empty());
    assert_eq!(report.reused_nodes, doc.root().walk().count());
}

/// Apply each text in turn and compare with a fresh parse of it: both
/// succeed with equal values, or both fail.
fn assert_edits_match_fresh_parses(grammar: &Grammar, texts: &[&str]) {
    let mut doc = Document::parse(grammar, texts[0]).unwrap();
    for text in &texts[1..] {
        let before = doc.text().to_owned();
        let fresh = Document::parse(grammar, text);
        match (doc.edit(text), fresh) {
            (Ok(_), Ok(fresh)) => {
                assert_eq!(doc.text(), *text);
                assert_eq!(doc.root().text(), *text);
                doc.root().check_offsets().unwrap();
                assert!(
                    fresh
                        .values()
                        .structurally_equal(fresh.value().unwrap(), doc.values(), doc.value().unwrap()),
                    "{text:?}: {} vs {}",
                    fresh.values().render(fresh.value().unwrap()),
                    doc.values().render(doc.value().unwrap())
                );
                assert_eq!(doc.values().len(), fresh.values().len(), "{text:?}");
            }
            (Err(_), Err(_)) => assert_eq!(doc.text(), before),
            (edited, fresh) => panic!("{text:?}: edit gave {edited:?}, fresh parse ok: {}", fresh.is_ok()),
        }
    }
}

#[test]
fn incremental_result_matches_a_fresh_parse() {
    let lang = lang(true);
    assert_edits_match_fresh_parses(
        &lang.grammar,
        &[
            "a = 1;\nb = 2;",
            "a = 1;\nb = 2;\nc;",
            "a = 1;\nif { b = 2; }\nc;",
            "a = 10;\nif { b = 2; x.y; }\nc;",
            "a = 10;\nif { b = 2; x.y.z; }",
            "if { b = 2; }",
            "a;",
            "a.b;",
            "a = a.b;",
        ],
    );
}

/// `Name := !"if" ident ";"` plus a list of them: the lookahead reads the
/// identifier before it is matched.
fn guarded() -> Grammar {
    let mut g = GrammarBuilder::new();
    let space = g.space();
    let ident = g.rule("ident", Parselet::char_class(CharSet::identifier()).repeat());
    let not_if = g.add(Parselet::literal_with(Literal::keyword("if")).lookahead().negate());
    let semi = g.literal(";");
    let name = g.sequence(
        "Name",
        [Slot::syntax(space), Slot::syntax(not_if), Slot::property("id", ident), Slot::syntax(semi)],
    );
    let names = g.add(Parselet::reference(name).repeat().optional());
    g.entry(names);
    g.build().unwrap()
}

#[test]
fn lookahead_guarded_edits_match_a_fresh_parse() {
    assert_edits_match_fresh_parses(
        &guarded(),
        &["ix;", "if;", "iz;", "izzy; b;", "if; b;", "i; b;", "iffy; b;", "iffy; if;", "iffy; iz;"],
    );
}

#[test]
fn repeated_edits_keep_the_value_arena_bounded() {
    let lang = lang(true);
    let texts = ["a = 1;\nb = 2;", "a = 1;\nb = 23;", "a = 1;\nb = 2;", "", "a = 1;\nb = 2;"];
    let mut doc = Document::parse(&lang.grammar, texts[0]).unwrap();
    let live = doc.values().len();
    for _ in 0..20 {
        for text in &texts[1..] {
            doc.edit(text).unwrap();
            let fresh = Document::parse(&lang.grammar, text).unwrap();
            assert_eq!(doc.values().len(), fresh.values().len(), "{text:?}");
        }
        assert_eq!(doc.values().len(), live);
    }
    assert!(doc.values().ids().all(|id| id.index() < 64));
}

#[test]
fn ranged_edits_apply_to_the_current_text() {
    let lang = lang(true);
    let mut doc = Document::parse(&lang.grammar, "a = 1;").unwrap();
    doc.apply_edit(&TextEdit::new(range_of(4, 5), "42")).unwrap();
    assert_eq!(doc.text(), "a = 42;");
    doc.apply_edit(&TextEdit::insert(TextSize::from(7), "\nb;")).unwrap();
    assert_eq!(doc.text(), "a = 42;\nb;");
    doc.apply_edit(&TextEdit::delete(range_of(0, 8))).unwrap();
    assert_eq!(doc.text(), "b;");
}

#[test]
fn diff_marks_nodes_overlapping_the_edit() {
    let lang = lang(true);
    let (parsed, _) = parse(&lang, "a = 1;\nb = 2;");
    let diff = DiffContext::compute(&parsed.root, "a = 1;\nb = 7;").unwrap();
    assert_eq!(diff.old_range(), range_of(11, 12));
    assert_eq!(diff.new_range(), range_of(11, 12));
    assert_eq!(diff.delta(), 0);

    for node in parsed.root.walk().filter(|node| !node.is_placeholder()) {
        let range = node.range();
        let overlaps = range.start() < TextSize::from(12) && TextSize::from(11) < range.end();
        assert_eq!(diff.is_changed(node.id().unwrap()), overlaps, "{range:?}");
    }
    let first = diff.first_diverging().unwrap();
    let leaf = parsed.root.walk().find(|node| node.id() == Some(first)).unwrap();
    assert_eq!(leaf.as_leaf().map(|leaf| leaf.token().as_str()), Some("2"));
}

#[test]
fn generated_trees_cannot_be_diffed() {
    let lang = lang(true);
    let mut values = parselet::value::SemanticTree::new();
    let program = common::program_value(&mut values, &[common::Stmt::Expr(common::Expr::Name("a".into()))]);
    let generated = parselet::generate::Generator::new(&lang.grammar)
        .generate(&mut values, program, lang.program, &mut parselet::tree::NodeIds::new())
        .unwrap();
    assert!(generated.root.walk().any(ParseNode::is_placeholder));
    assert!(DiffContext::compute(&generated.root, "a;").is_err());
}
