//! Shared fixture: a small C-like statement language.
//!
//! ```text
//! program := line*
//! line    := <newline> stmt
//! stmt    := if | assign | exprStmt
//! if      := "if" <space> "{" body:program <newline> "}"      (recovers)
//! assign  := name:ident <space> "=" <space> value:expr ";"
//! exprStmt:= expr:expr ";"
//! expr    := atom ("." field:ident)*                           (chained as Member.target)
//! atom    := Number(digits) | Name(id)
//! ```

#![allow(dead_code)]

use parselet::grammar::{CharSet, Grammar, GrammarBuilder, IndexedChoice, Parselet, RuleId, Slot};
use parselet::tree::NodeIds;
use parselet::value::{SemanticTree, ValueId};

pub struct Lang {
    pub grammar: Grammar,
    pub program: RuleId,
    pub stmt: RuleId,
    pub if_stmt: RuleId,
    pub assign: RuleId,
    pub expr: RuleId,
}

/// The fixture language. With `indexed`, statements dispatch through an
/// indexed choice keyed on `if`; otherwise through a plain ordered choice
/// over the same alternatives. Both variants allocate identical rule ids.
pub fn lang(indexed: bool) -> Lang {
    let mut g = GrammarBuilder::new();
    let space = g.space();
    let nl = g.newline();
    let ident = g.rule("ident", Parselet::char_class(CharSet::identifier()).repeat());
    let digits = g.rule("digits", Parselet::char_class(CharSet::digits()).repeat());

    let name = g.sequence("Name", [Slot::property("id", ident)]);
    let number = g.sequence("Number", [Slot::property("digits", digits)]);
    let atom = g.choice([number, name]);
    let dot = g.literal(".");
    let member = g.sequence("Member", [Slot::syntax(dot), Slot::property("field", ident)]);
    let expr = g.chain(atom, member, "target");

    let eq = g.literal("=");
    let semi = g.literal(";");
    let assign = g.rule(
        "assign",
        Parselet::sequence(
            "Assign",
            [
                Slot::property("name", ident),
                Slot::syntax(space),
                Slot::syntax(eq),
                Slot::syntax(space),
                Slot::property("value", expr),
                Slot::syntax(semi),
            ],
        ),
    );
    let expr_stmt = g.sequence("ExprStmt", [Slot::property("expr", expr), Slot::syntax(semi)]);

    let program = g.declare("program");
    let kw_if = g.keyword("if");
    let open = g.literal("{");
    let close = g.literal("}");
    let if_stmt = g.rule(
        "if",
        Parselet::sequence(
            "If",
            [
                Slot::syntax(kw_if),
                Slot::syntax(space),
                Slot::syntax(open),
                Slot::property("body", program),
                Slot::syntax(nl),
                Slot::syntax(close),
            ],
        )
        .skip_on_error(),
    );

    let stmt = if indexed {
        g.indexed(
            IndexedChoice::new()
                .with("if", if_stmt)
                .with_default(assign)
                .with_default(expr_stmt),
        )
    } else {
        g.choice([if_stmt, assign, expr_stmt])
    };
    let line = g.add(Parselet::group([Slot::syntax(nl), Slot::pass(stmt)]));
    g.define(
        program,
        Parselet::reference(line).repeat().optional().partial_values_only(),
    );
    g.entry(program);

    Lang {
        grammar: g.build().expect("fixture grammar is valid"),
        program,
        stmt,
        if_stmt,
        assign,
        expr,
    }
}

/// Semantic shape of a statement, for building values in tests.
#[derive(Debug, Clone)]
pub enum Stmt {
    Assign(String, Expr),
    Expr(Expr),
    If(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(String),
    Name(String),
    Member(Box<Expr>, String),
}

pub fn program_value(values: &mut SemanticTree, stmts: &[Stmt]) -> ValueId {
    let items = stmts.iter().map(|stmt| stmt_value(values, stmt)).collect();
    values.list(items)
}

pub fn stmt_value(values: &mut SemanticTree, stmt: &Stmt) -> ValueId {
    match stmt {
        Stmt::Assign(name, value) => {
            let object = values.object("Assign");
            let name = values.text(name.clone());
            let value = expr_value(values, value);
            values.set_field(object, "name", Some(name)).unwrap();
            values.set_field(object, "value", Some(value)).unwrap();
            object
        }
        Stmt::Expr(expr) => {
            let object = values.object("ExprStmt");
            let expr = expr_value(values, expr);
            values.set_field(object, "expr", Some(expr)).unwrap();
            object
        }
        Stmt::If(body) => {
            let object = values.object("If");
            let body = program_value(values, body);
            values.set_field(object, "body", Some(body)).unwrap();
            object
        }
    }
}

pub fn expr_value(values: &mut SemanticTree, expr: &Expr) -> ValueId {
    match expr {
        Expr::Number(digits) => {
            let object = values.object("Number");
            let text = values.text(digits.clone());
            values.set_field(object, "digits", Some(text)).unwrap();
            object
        }
        Expr::Name(id) => {
            let object = values.object("Name");
            let text = values.text(id.clone());
            values.set_field(object, "id", Some(text)).unwrap();
            object
        }
        Expr::Member(target, field) => {
            let object = values.object("Member");
            let field = values.text(field.clone());
            let target = expr_value(values, target);
            values.set_field(object, "field", Some(field)).unwrap();
            values.set_field(object, "target", Some(target)).unwrap();
            object
        }
    }
}

/// Parse `source` with a fresh arena, panicking on failure.
pub fn parse(lang: &Lang, source: &str) -> (parselet::parser::Parsed, SemanticTree) {
    let mut values = SemanticTree::new();
    let mut ids = NodeIds::new();
    let parsed = parselet::parser::Parser::new(&lang.grammar)
        .parse(source, &mut values, &mut ids)
        .unwrap_or_else(|error| panic!("{source:?} failed to parse: {error}"));
    (parsed, values)
}
