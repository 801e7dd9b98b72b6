//! # Batch Parsing
//!
//! Parse many independent documents at once on the rayon thread pool. The
//! grammar is shared read-only; every document gets its own value arena and
//! node ids, so nothing is synchronised during a parse.
//!
//! ```rust
//! use parselet::grammar::{CharSet, GrammarBuilder, Parselet};
//! use parselet::parallel::{ParseBatch, aggregate_results, parse_batch};
//!
//! let mut g = GrammarBuilder::new();
//! let word = g.add(Parselet::char_class(CharSet::identifier()).repeat());
//! g.entry(word);
//! let grammar = g.build().unwrap();
//!
//! let mut batch = ParseBatch::new();
//! batch.add("a", "alpha");
//! batch.add("b", "beta gamma");
//! let results = parse_batch(&grammar, &batch);
//! assert!(results[0].is_ok());
//! assert_eq!(aggregate_results(&results).failed, 1);
//! ```

use crate::document::Document;
use crate::error::ParseError;
use crate::grammar::Grammar;
use crate::parser::ParseConfig;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Outcome of parsing one file of a batch.
#[derive(Debug)]
pub struct FileParseResult<'g> {
    pub file_id: String,
    pub document: Result<Document<'g>, ParseError>,
    pub duration: Duration,
}

impl FileParseResult<'_> {
    /// Parsed without top-level failure and without recovered errors.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.document.as_ref().is_ok_and(|doc| doc.errors().is_empty())
    }

    /// Recovered errors, or the top-level failure.
    #[must_use]
    pub fn error_count(&self) -> usize {
        match &self.document {
            Ok(doc) => doc.errors().len(),
            Err(_) => 1,
        }
    }
}

/// Files to parse, as `(file_id, content)` pairs.
#[derive(Debug, Clone, Default)]
pub struct ParseBatch {
    pub files: Vec<(String, String)>,
}

impl ParseBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file_id: impl Into<String>, content: impl Into<String>) {
        self.files.push((file_id.into(), content.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<I: Into<String>, C: Into<String>> FromIterator<(I, C)> for ParseBatch {
    fn from_iter<T: IntoIterator<Item = (I, C)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().map(|(id, content)| (id.into(), content.into())).collect(),
        }
    }
}

/// Parse every file of `batch` in parallel. Results keep the batch order.
pub fn parse_batch<'g>(grammar: &'g Grammar, batch: &ParseBatch) -> Vec<FileParseResult<'g>> {
    parse_batch_with_config(grammar, batch, &ParseConfig::default())
}

pub fn parse_batch_with_config<'g>(
    grammar: &'g Grammar,
    batch: &ParseBatch,
    config: &ParseConfig,
) -> Vec<FileParseResult<'g>> {
    tracing::debug!(files = batch.len(), "parsing batch");
    batch
        .files
        .par_iter()
        .map(|(file_id, content)| {
            let started = Instant::now();
            let document = Document::parse_with_config(grammar, content, config.clone());
            if let Err(error) = &document {
                tracing::debug!(file = %file_id, %error, "file failed to parse");
            }
            FileParseResult {
                file_id: file_id.clone(),
                document,
                duration: started.elapsed(),
            }
        })
        .collect()
}

/// Totals over a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_errors: usize,
    pub total_duration: Duration,
}

impl ParseSummary {
    /// Percentage of files that parsed cleanly; 100 for an empty batch.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            100.0
        } else {
            self.successful as f64 / self.total_files as f64 * 100.0
        }
    }
}

#[must_use]
pub fn aggregate_results(results: &[FileParseResult<'_>]) -> ParseSummary {
    let successful = results.iter().filter(|result| result.is_ok()).count();
    ParseSummary {
        total_files: results.len(),
        successful,
        failed: results.len() - successful,
        total_errors: results.iter().map(FileParseResult::error_count).sum(),
        total_duration: results.iter().map(|result| result.duration).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{CharSet, GrammarBuilder, Parselet, Slot};

    fn statements() -> Grammar {
        let mut g = GrammarBuilder::new();
        let word = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let semi = g.literal(";");
        let space = g.space();
        let stmt = g.sequence(
            "Stmt",
            [Slot::syntax(space), Slot::property("name", word), Slot::syntax(semi)],
        );
        let stmts = g.add(Parselet::reference(stmt).repeat().optional());
        g.entry(stmts);
        g.build().unwrap()
    }

    #[test]
    fn results_follow_batch_order() {
        let grammar = statements();
        let batch: ParseBatch = (0..32).map(|i| (format!("f{i}"), "x; ".repeat(i) + "y;")).collect();
        let results = parse_batch(&grammar, &batch);
        assert_eq!(results.len(), 32);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.file_id, format!("f{i}"));
            let doc = result.document.as_ref().unwrap();
            assert_eq!(doc.values().elements(doc.value().unwrap()).unwrap().len(), i + 1);
        }
    }

    #[test]
    fn failures_are_counted() {
        let grammar = statements();
        let batch: ParseBatch = [("ok", "a;"), ("bad", "a"), ("empty", "")].into_iter().collect();
        let summary = aggregate_results(&parse_batch(&grammar, &batch));
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_errors, 1);
    }

    #[test]
    fn empty_batch_is_fully_successful() {
        let summary = aggregate_results(&[]);
        assert_eq!(summary.total_files, 0);
        assert!((summary.success_rate() - 100.0).abs() < f64::EPSILON);
    }
}
