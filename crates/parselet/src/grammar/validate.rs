//! Structural checks run when a grammar is built.

use super::{Grammar, Parselet, ParseletKind, Pattern, RuleFlags, RuleId, SlotRole, rule_id};
use crate::error::GrammarError;
use compact_str::format_compact;
use smallvec::SmallVec;

pub(super) fn check(grammar: &Grammar) -> Result<(), GrammarError> {
    for (id, rule) in grammar.iter() {
        check_rule(grammar, id, rule)?;
    }
    check_left_recursion(grammar)
}

fn check_rule(grammar: &Grammar, id: RuleId, rule: &Parselet) -> Result<(), GrammarError> {
    if matches!(rule.kind, ParseletKind::Undefined) {
        let name = rule
            .name
            .clone()
            .unwrap_or_else(|| format_compact!("{id}"));
        return Err(GrammarError::UndefinedRule { name });
    }
    if let Some(unknown) = rule
        .referenced()
        .into_iter()
        .find(|target| grammar.rule(*target).is_none())
    {
        return Err(GrammarError::UnknownRule { rule: unknown });
    }
    match &rule.kind {
        ParseletKind::Sequence(seq) => {
            let passes = seq
                .slots
                .iter()
                .filter(|slot| slot.role == SlotRole::Pass)
                .count();
            if passes > 1 {
                return Err(GrammarError::MultiplePassSlots { rule: id });
            }
        }
        ParseletKind::Choice(alts) if alts.is_empty() => {
            return Err(GrammarError::EmptyChoice { rule: id });
        }
        ParseletKind::Indexed(choice) if choice.alternatives().is_empty() => {
            return Err(GrammarError::EmptyChoice { rule: id });
        }
        ParseletKind::Chain(chain) if grammar.result_types(chain.trailer).is_empty() => {
            return Err(GrammarError::UntypedTrailer { rule: id });
        }
        _ => {}
    }
    Ok(())
}

/// Whether a rule can succeed without consuming input.
fn nullable(rule: &Parselet) -> bool {
    rule.has(RuleFlags::OPTIONAL)
        || rule.has(RuleFlags::LOOKAHEAD)
        || match &rule.kind {
            ParseletKind::Placeholder(_) => true,
            ParseletKind::Literal(literal) => matches!(literal.pattern(), Pattern::Eof),
            _ => false,
        }
}

/// Rules that may be entered at the same input position as `rule`.
fn leading_calls(grammar: &Grammar, rule: &Parselet) -> SmallVec<[RuleId; 4]> {
    match &rule.kind {
        ParseletKind::Sequence(seq) => {
            let mut calls = SmallVec::new();
            for slot in &seq.slots {
                calls.push(slot.rule);
                if !grammar.rule(slot.rule).is_some_and(nullable) {
                    break;
                }
            }
            calls
        }
        ParseletKind::Chain(chain) => smallvec::smallvec![chain.operand],
        _ => rule.referenced(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

fn check_left_recursion(grammar: &Grammar) -> Result<(), GrammarError> {
    let mut marks = vec![Mark::Unvisited; grammar.len()];
    for start in 0..grammar.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // Iterative DFS: (rule, next child index)
        let mut stack: Vec<(RuleId, usize)> = vec![(rule_id(start), 0)];
        marks[start] = Mark::Active;
        while let Some((current, child)) = stack.last().copied() {
            let calls = leading_calls(grammar, grammar.parselet(current));
            let Some(next) = calls.get(child).copied() else {
                marks[current.index()] = Mark::Done;
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            match marks[next.index()] {
                Mark::Active => {
                    tracing::error!(rule = %next, name = ?grammar.parselet(next).name(), "left recursion");
                    return Err(GrammarError::LeftRecursion { rule: next });
                }
                Mark::Unvisited => {
                    marks[next.index()] = Mark::Active;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::GrammarError;
    use crate::grammar::{GrammarBuilder, Parselet, Slot};

    #[test]
    fn left_recursion_through_optional_prefix_is_found() {
        let mut g = GrammarBuilder::new();
        let expr = g.declare("expr");
        let ws = g.add(Parselet::space());
        let plus = g.add(Parselet::literal("+"));
        g.define(expr, Parselet::group([Slot::syntax(ws), Slot::pass(expr), Slot::syntax(plus)]));
        g.entry(expr);
        assert_eq!(g.build().unwrap_err(), GrammarError::LeftRecursion { rule: expr });
    }

    #[test]
    fn recursion_after_consumption_is_fine() {
        let mut g = GrammarBuilder::new();
        let expr = g.declare("expr");
        let open = g.add(Parselet::literal("("));
        let close = g.add(Parselet::literal(")"));
        let x = g.add(Parselet::literal("x"));
        let group = g.add(Parselet::group([Slot::syntax(open), Slot::pass(expr), Slot::syntax(close)]));
        g.define(expr, Parselet::choice([x, group]));
        g.entry(expr);
        assert!(g.build().is_ok());
    }

    #[test]
    fn two_pass_slots() {
        let mut g = GrammarBuilder::new();
        let x = g.add(Parselet::literal("x"));
        let seq = g.add(Parselet::group([Slot::pass(x), Slot::pass(x)]));
        g.entry(seq);
        assert_eq!(g.build().unwrap_err(), GrammarError::MultiplePassSlots { rule: seq });
    }

    #[test]
    fn untyped_trailers_are_rejected() {
        let mut g = GrammarBuilder::new();
        let x = g.add(Parselet::literal("x"));
        let dot = g.add(Parselet::literal("."));
        let chain = g.add(Parselet::chain(x, dot, "target"));
        g.entry(chain);
        assert_eq!(g.build().unwrap_err(), GrammarError::UntypedTrailer { rule: chain });
    }
}
