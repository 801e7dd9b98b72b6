//! Error recovery and failure aggregation.
//!
//! A sequence flagged `SKIP_ON_ERROR` that fails on a slot after it has
//! consumed input does not fail as a whole. It skips forward one character
//! at a time until the failed slot matches again, wrapping the skipped text
//! in an error node, or gives up at the end of input and becomes a partial
//! node.

use super::engine::{Match, MatchContext, next_char_end};
use crate::error::ParseError;
use crate::grammar::{Grammar, RuleFlags, RuleId};
use crate::tree::ParseNode;
use crate::value::ValueId;
use smallvec::SmallVec;

/// Outcome of skipping past a failed slot.
pub(super) enum Resync {
    /// The slot matched after skipped text; `node` is the error node holding
    /// both.
    Matched {
        node: ParseNode,
        value: Option<ValueId>,
        end: usize,
    },
    /// Nothing matched before the end of input; `node` holds the rest of
    /// the text.
    Exhausted { node: ParseNode },
}

pub(super) fn resync(
    ctx: &mut MatchContext<'_>,
    slot: RuleId,
    failed_at: usize,
    want: bool,
    error: ParseError,
) -> Result<Resync, ParseError> {
    let input = ctx.input();
    let mut scan = failed_at;
    ctx.scanning += 1;
    let found: Option<Match> = loop {
        scan = next_char_end(input, scan);
        if scan >= input.len() {
            break None;
        }
        if let Ok(matched) = ctx.match_rule(slot, scan, want) {
            break Some(matched);
        }
        if ctx.aborted().is_some() {
            break None;
        }
    };
    ctx.scanning -= 1;
    ctx.examine(ctx.peek_end(scan));
    if let Some(aborted) = ctx.aborted() {
        return Err(aborted.clone());
    }

    let skipped = &input[failed_at..scan];
    tracing::debug!(
        rule = %slot,
        offset = failed_at,
        skipped = skipped.len(),
        resynced = found.is_some(),
        %error,
        "recovered from parse error"
    );
    ctx.recovered.push(error.clone());
    let text = ctx.token(failed_at, scan);
    let header = ctx.header(failed_at, None);
    Ok(match found {
        Some(matched) => Resync::Matched {
            node: ParseNode::error(header, error, text, matched.node),
            value: matched.value,
            end: matched.end,
        },
        None => Resync::Exhausted {
            node: ParseNode::error(header, error, text, None),
        },
    })
}

/// Combine the failures of every alternative of a choice.
///
/// Alternatives flagged `NO_ERROR` are left out unless nothing else
/// failed. Of the rest only the failures that got furthest are kept;
/// the first partial value among them is carried along.
pub(super) fn aggregate(
    grammar: &Grammar,
    choice: RuleId,
    failures: SmallVec<[(RuleId, ParseError); 4]>,
    fallback: ParseError,
) -> ParseError {
    let silent = |rule: RuleId| grammar.parselet(rule).has(RuleFlags::NO_ERROR);
    let reportable = failures.iter().any(|(rule, _)| !silent(*rule));
    let mut errors: Vec<ParseError> = failures
        .into_iter()
        .filter(|(rule, _)| !reportable || !silent(*rule))
        .map(|(_, error)| error)
        .collect();
    let Some(furthest) = errors.iter().map(ParseError::position).max() else {
        return fallback;
    };
    errors.retain(|error| error.position() == furthest);
    let partial = errors.iter().find_map(ParseError::partial);
    ParseError::multiple(errors, Some(choice)).with_partial(partial)
}
