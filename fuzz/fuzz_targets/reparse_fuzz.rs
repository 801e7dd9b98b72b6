#![no_main]
//! Parse an old text, edit it into a new one and check that the
//! incrementally updated document holds exactly the new text.
//!
//! Input is `old \0 new`; inputs without a separator are ignored.

use libfuzzer_sys::fuzz_target;
use parselet::document::Document;
use parselet::grammar::{CharSet, Grammar, GrammarBuilder, Parselet, Slot};
use std::sync::OnceLock;

/// `block := "{" stmts "}"`, `stmt := <space> (word ";" | block)`.
fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        let mut g = GrammarBuilder::new();
        let space = g.space();
        let word = g.rule("word", Parselet::char_class(CharSet::identifier()).repeat());
        let semi = g.literal(";");
        let open = g.literal("{");
        let close = g.literal("}");
        let stmts = g.declare("stmts");
        let simple = g.sequence("Stmt", [Slot::property("name", word), Slot::syntax(semi)]);
        let block = g.add(
            Parselet::sequence(
                "Block",
                [Slot::syntax(open), Slot::property("body", stmts), Slot::syntax(space), Slot::syntax(close)],
            )
            .skip_on_error(),
        );
        let stmt = g.choice([block, simple]);
        let line = g.add(Parselet::group([Slot::syntax(space), Slot::pass(stmt)]));
        g.define(stmts, Parselet::reference(line).repeat().optional().partial_values_only());
        g.entry(stmts);
        g.build().expect("fuzz grammar is valid")
    })
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Some((old, new)) = text.split_once('\0') else {
        return;
    };
    let Ok(mut doc) = Document::parse(grammar(), old) else {
        return;
    };
    if doc.edit(new).is_ok() {
        assert_eq!(doc.text(), new);
        assert_eq!(doc.root().text(), new);
        assert!(doc.root().check_offsets().is_ok());
    }
});
