//! # Parselet
//!
//! A bidirectional grammar engine: one grammar parses text into a tree and
//! a semantic model, and renders an edited model back into text.
//!
//! ## Overview
//!
//! - **Parsing**: ordered-choice recursive descent over a graph of
//!   [`Parselet`]s, with indexed dispatch, result chaining and error
//!   recovery into error nodes
//! - **Semantic values**: parses build objects, lists and text in a
//!   [`SemanticTree`]; every value knows the node that produced it
//! - **Generation**: the same grammar turns values back into a tree,
//!   reusing the original nodes of values that did not change
//! - **Formatting**: whitespace placeholders in generated trees are
//!   resolved by an ordered spacing table with indentation tracking
//! - **Incremental reparsing**: after a text edit only the smallest subtree
//!   that still fits is matched again, and values are updated in place
//!
//! ## Quick Start
//!
//! ```rust
//! use parselet::document::Document;
//! use parselet::format::FormatPolicy;
//! use parselet::grammar::{CharSet, GrammarBuilder, Parselet, Slot};
//!
//! // stmt := <space> name:ident "=" <space> value:digits ";"
//! let mut g = GrammarBuilder::new();
//! let ident = g.rule("ident", Parselet::char_class(CharSet::identifier()).repeat());
//! let digits = g.rule("digits", Parselet::char_class(CharSet::digits()).repeat());
//! let eq = g.add(Parselet::literal("=").skip_whitespace());
//! let semi = g.literal(";");
//! let space = g.space();
//! let stmt = g.sequence(
//!     "Assign",
//!     [
//!         Slot::syntax(space),
//!         Slot::property("name", ident),
//!         Slot::syntax(eq),
//!         Slot::syntax(space),
//!         Slot::property("value", digits),
//!         Slot::syntax(semi),
//!     ],
//! );
//! let program = g.add(Parselet::reference(stmt).repeat().optional());
//! g.entry(program);
//! let grammar = g.build().unwrap();
//!
//! let mut doc = Document::parse(&grammar, "x = 1;\ny=2;").unwrap();
//!
//! // Text to model.
//! let list = doc.value().unwrap();
//! let second = doc.values().elements(list).unwrap()[1];
//! assert_eq!(doc.values().render(second), "Assign { name: \"y\", value: \"2\" }");
//!
//! // Model to text: only the edited statement is regenerated.
//! let value = doc.values().field(second, "value").unwrap();
//! doc.values_mut().set_text(value, "42").unwrap();
//! assert_eq!(doc.regenerate(&FormatPolicy::default()).unwrap(), "x = 1; y = 42;");
//!
//! // Text to model again, incrementally.
//! let report = doc.edit("x = 7; y = 42;").unwrap();
//! assert!(!report.full_reparse);
//! ```
//!
//! ## Features
//!
//! - `serialize`: serde derives on configuration and data types
//! - `diagnostics`: [`miette::Diagnostic`] for [`ParseError`]
//! - `parallel`: batch parsing on the rayon thread pool

pub mod document;
pub mod error;
pub mod format;
pub mod generate;
pub mod grammar;
pub mod incremental;
pub mod intern;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod parser;
pub mod source_map;
pub mod testing;
pub mod text;
pub mod tree;
pub mod value;

pub use document::Document;
pub use error::{DiffError, GenerateError, GrammarError, ParseError, ParseMetrics};
pub use format::{FormatPolicy, Formatter};
pub use generate::Generator;
pub use grammar::{Grammar, GrammarBuilder, Parselet, RuleId};
pub use incremental::IncrementalParser;
pub use parser::{ParseConfig, Parser};
pub use text::{StringToken, TextRange, TextSize};
pub use tree::{NodeId, NodeIds, ParseNode};
pub use value::{SemanticTree, Value, ValueId};
