//! Priority backtracking execution over the tagged NFA.
//!
//! This is the engine behind the NFA-exec matcher and behind capture
//! resolution for the DFA search paths. Epsilon priority order encodes
//! the ECMAScript backtracking preferences, so a depth-first walk that
//! tries edges in order yields the same match a backtracking JS engine
//! would. Failed (state, position) pairs are memoized, which keeps the
//! walk linear-ish on pathological patterns without changing which path
//! wins.

use crate::api::{Flags, Range};
use crate::codepointset::{is_line_terminator, is_word_char};
use crate::nfa::{EpsOp, LookaroundBody, Nfa, NfaGraph, StateId, GOAL_STATE};
use std::collections::HashSet;

/// Mutable state shared by an attempt and its nested lookaround runs.
struct AttemptCtx<'t> {
    text: &'t str,
    flags: Flags,

    /// Two slots per capture group: start and end byte offsets.
    caps: Vec<Option<usize>>,

    /// Undo log of capture writes, truncated on backtrack.
    undo: Vec<(usize, Option<usize>)>,
}

impl AttemptCtx<'_> {
    fn set_cap(&mut self, slot: usize, value: Option<usize>) {
        self.undo.push((slot, self.caps[slot]));
        self.caps[slot] = value;
    }

    fn restore_to(&mut self, undo_len: usize) {
        while self.undo.len() > undo_len {
            let (slot, old) = self.undo.pop().unwrap();
            self.caps[slot] = old;
        }
    }
}

fn prev_char(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

fn next_char(text: &str, pos: usize) -> Option<char> {
    text[pos..].chars().next()
}

fn at_line_start(ctx: &AttemptCtx, pos: usize) -> bool {
    match prev_char(ctx.text, pos) {
        None => true,
        Some(c) => ctx.flags.multiline && is_line_terminator(c),
    }
}

fn at_line_end(ctx: &AttemptCtx, pos: usize) -> bool {
    match next_char(ctx.text, pos) {
        None => true,
        Some(c) => ctx.flags.multiline && is_line_terminator(c),
    }
}

fn at_word_boundary(ctx: &AttemptCtx, pos: usize) -> bool {
    let before = prev_char(ctx.text, pos).is_some_and(is_word_char);
    let after = next_char(ctx.text, pos).is_some_and(is_word_char);
    before != after
}

/// One suspended choice point of the depth-first walk.
struct Frame {
    state: StateId,
    pos: usize,

    /// Index of the next edge to try: epsilon edges first, in priority
    /// order, then consuming edges.
    edge: usize,

    /// Undo-log length to restore when this frame is abandoned.
    undo_len: usize,
}

/// Attempt an anchored match of `graph` at `start`. Returns the end
/// position of the first match in backtracking priority order. When
/// `require_end` is set, only matches ending exactly there succeed
/// (used for lookbehind bodies).
fn try_match(
    graph: &NfaGraph,
    lookarounds: &[LookaroundBody],
    ctx: &mut AttemptCtx,
    start: usize,
    require_end: Option<usize>,
) -> Option<usize> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut failed: HashSet<(StateId, usize)> = HashSet::new();
    let mut on_path: HashSet<(StateId, usize)> = HashSet::new();

    stack.push(Frame {
        state: graph.entry(),
        pos: start,
        edge: 0,
        undo_len: ctx.undo.len(),
    });
    on_path.insert((graph.entry(), start));

    loop {
        // Advance the top frame to its next viable edge, if any.
        let advance = {
            let Some(top) = stack.last_mut() else {
                return None;
            };
            if top.state == GOAL_STATE && require_end.map_or(true, |e| e == top.pos) {
                return Some(top.pos);
            }
            let pos = top.pos;
            let state = graph.at(top.state);
            let num_eps = state.eps.len();
            let total = num_eps + state.transitions.len();
            let mut found = None;
            while top.edge < total {
                let edge = top.edge;
                top.edge += 1;
                let edge_undo = ctx.undo.len();

                let target;
                let next_pos;
                if edge < num_eps {
                    let (op, t) = state.eps[edge];
                    let passes = match op {
                        EpsOp::None => true,
                        EpsOp::GroupStart(g) => {
                            ctx.set_cap(g as usize * 2, Some(pos));
                            true
                        }
                        EpsOp::GroupEnd(g) => {
                            ctx.set_cap(g as usize * 2 + 1, Some(pos));
                            true
                        }
                        EpsOp::GroupReset { from, to } => {
                            for g in from..to {
                                ctx.set_cap(g as usize * 2, None);
                                ctx.set_cap(g as usize * 2 + 1, None);
                            }
                            true
                        }
                        EpsOp::LineStart => at_line_start(ctx, pos),
                        EpsOp::LineEnd => at_line_end(ctx, pos),
                        EpsOp::WordBoundary { negate } => at_word_boundary(ctx, pos) != negate,
                        EpsOp::Lookaround { index } => {
                            eval_lookaround(&lookarounds[index as usize], lookarounds, ctx, pos)
                        }
                    };
                    if !passes {
                        ctx.restore_to(edge_undo);
                        continue;
                    }
                    target = t;
                    next_pos = pos;
                } else {
                    let (set, t) = &state.transitions[edge - num_eps];
                    let Some(c) = next_char(ctx.text, pos) else {
                        continue;
                    };
                    if !set.contains(c as u32) {
                        continue;
                    }
                    target = *t;
                    next_pos = pos + c.len_utf8();
                }

                if failed.contains(&(target, next_pos)) || on_path.contains(&(target, next_pos)) {
                    ctx.restore_to(edge_undo);
                    continue;
                }
                found = Some((target, next_pos, edge_undo));
                break;
            }
            found
        };

        match advance {
            Some((target, next_pos, edge_undo)) => {
                on_path.insert((target, next_pos));
                stack.push(Frame {
                    state: target,
                    pos: next_pos,
                    edge: 0,
                    undo_len: edge_undo,
                });
            }
            None => {
                // All edges exhausted: this (state, pos) cannot succeed.
                let abandoned = stack.pop().unwrap();
                on_path.remove(&(abandoned.state, abandoned.pos));
                failed.insert((abandoned.state, abandoned.pos));
                ctx.restore_to(abandoned.undo_len);
            }
        }
    }
}

/// Evaluate a lookaround assertion at `pos`. Captures written by a
/// successful positive body persist, matching ECMAScript semantics.
fn eval_lookaround(
    body: &LookaroundBody,
    lookarounds: &[LookaroundBody],
    ctx: &mut AttemptCtx,
    pos: usize,
) -> bool {
    let matched = if body.behind {
        let width = body.width.expect("lookbehind bodies have fixed width");
        match step_back(ctx.text, pos, width) {
            Some(start) => {
                try_match(&body.graph, lookarounds, ctx, start, Some(pos)).is_some()
            }
            None => false,
        }
    } else {
        try_match(&body.graph, lookarounds, ctx, pos, None).is_some()
    };
    matched != body.negate
}

/// \return the byte position `chars` characters before `pos`, or None if
/// the text is too short.
pub(crate) fn step_back(text: &str, pos: usize, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(pos);
    }
    text[..pos]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map(|(idx, _)| idx)
}

/// The result of a successful attempt: end position plus capture spans.
pub type AttemptResult = (usize, Vec<Option<Range>>);

/// Attempt an anchored match of the whole NFA at `pos`.
pub fn match_at(nfa: &Nfa, text: &str, pos: usize, flags: Flags) -> Option<AttemptResult> {
    let num_groups = nfa.ast().num_capture_groups() as usize;
    let mut ctx = AttemptCtx {
        text,
        flags,
        caps: vec![None; num_groups * 2],
        undo: Vec::new(),
    };
    let end = try_match(nfa.graph(), nfa.lookarounds(), &mut ctx, pos, None)?;
    let captures = (0..num_groups)
        .map(|g| match (ctx.caps[g * 2], ctx.caps[g * 2 + 1]) {
            (Some(start), Some(end)) => Some(start..end),
            _ => None,
        })
        .collect();
    Some((end, captures))
}

/// Search for the leftmost match at or after `start`. Honors the sticky
/// flag by attempting only at `start`.
pub fn search(nfa: &Nfa, text: &str, start: usize, flags: Flags) -> Option<(Range, Vec<Option<Range>>)> {
    let mut pos = start;
    loop {
        if let Some((end, captures)) = match_at(nfa, text, pos, flags) {
            return Some((pos..end, captures));
        }
        if flags.sticky || pos >= text.len() {
            return None;
        }
        pos += next_char(text, pos).map_or(1, char::len_utf8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RegexOptions, RegexSource};
    use crate::buffer::CompilationBuffer;
    use crate::nfa::NfaGenerator;
    use crate::parse::Parser;
    use std::sync::Arc;

    fn nfa(pattern: &str, flags: &str) -> Nfa {
        let source = RegexSource::new(pattern, flags);
        let options = RegexOptions::default();
        let mut buffer = CompilationBuffer::new();
        let mut parser = Parser::new(&source, &options, &mut buffer).unwrap();
        let mut ast = parser.parse().unwrap();
        parser.prepare_for_dfa(&mut ast);
        buffer.reset();
        NfaGenerator::create(&Arc::new(ast), &mut buffer, &options).unwrap()
    }

    fn find(pattern: &str, flags: &str, text: &str) -> Option<(Range, Vec<Option<Range>>)> {
        let nfa = nfa(pattern, flags);
        search(&nfa, text, 0, Flags::from(flags))
    }

    #[test]
    fn literal_search() {
        let (range, caps) = find("bc", "", "abcd").unwrap();
        assert_eq!(range, 1..3);
        assert!(caps.is_empty());
        assert!(find("bc", "", "ab").is_none());
    }

    #[test]
    fn leftmost_priority_wins() {
        // The first alternative is preferred even though the second is longer.
        let (range, _) = find("a|ab", "", "xab").unwrap();
        assert_eq!(range, 1..2);
    }

    #[test]
    fn greedy_and_lazy_loops() {
        let (range, _) = find("a*", "", "aaab").unwrap();
        assert_eq!(range, 0..3);
        let (range, _) = find("a*?", "", "aaab").unwrap();
        assert_eq!(range, 0..0);
        let (range, _) = find("a{2,3}", "", "aaaa").unwrap();
        assert_eq!(range, 0..3);
    }

    #[test]
    fn captures() {
        let (range, caps) = find("(a+)(b)?", "", "aab").unwrap();
        assert_eq!(range, 0..3);
        assert_eq!(caps, vec![Some(0..2), Some(2..3)]);

        let (_, caps) = find("aa(b)?aa", "", "aaaa").unwrap();
        assert_eq!(caps, vec![None]);
    }

    #[test]
    fn loop_iterations_reset_enclosed_groups() {
        // Group 1 matched in the first iteration only; the second
        // iteration clears it (ES2018 21.2.2.5.1).
        let (range, caps) = find("(?:(a)|(b)){2}", "", "ab").unwrap();
        assert_eq!(range, 0..2);
        assert_eq!(caps, vec![None, Some(1..2)]);
    }

    #[test]
    fn anchors() {
        assert!(find("^b", "", "ab").is_none());
        let (range, _) = find("^a", "", "ab").unwrap();
        assert_eq!(range, 0..1);
        let (range, _) = find("b$", "", "ab").unwrap();
        assert_eq!(range, 1..2);
        let (range, _) = find("^def", "m", "abc\ndef").unwrap();
        assert_eq!(range, 4..7);
    }

    #[test]
    fn word_boundaries() {
        let (range, _) = find(r"\bcat\b", "", "a cat sat").unwrap();
        assert_eq!(range, 2..5);
        assert!(find(r"\bcat\b", "", "concatenate").is_none());
        let (range, _) = find(r"\Bcat", "", "concat").unwrap();
        assert_eq!(range, 3..6);
    }

    #[test]
    fn lookahead() {
        let (range, _) = find("(?=bc)b", "", "abc").unwrap();
        assert_eq!(range, 1..2);
        assert!(find("(?=x)b", "", "ab").is_none());

        // Captures inside a successful lookahead persist.
        let (_, caps) = find("(?=(b))b", "", "b").unwrap();
        assert_eq!(caps, vec![Some(0..1)]);
    }

    #[test]
    fn negative_lookahead() {
        let (range, _) = find("(?!b).", "", "ba").unwrap();
        assert_eq!(range, 1..2);
    }

    #[test]
    fn lookbehind() {
        let (range, _) = find("(?<=a)b", "", "ab cb").unwrap();
        assert_eq!(range, 1..2);
        assert!(find("(?<=c)b", "", "ab").is_none());
        let (range, _) = find("(?<!a)b", "", "ab b").unwrap();
        assert_eq!(range, 3..4);
    }

    #[test]
    fn empty_match_at_end() {
        let (range, _) = find("c?$", "", "ab").unwrap();
        assert_eq!(range, 2..2);
    }

    #[test]
    fn sticky_only_matches_at_start() {
        let nfa = nfa("b", "y");
        assert!(search(&nfa, "ab", 0, Flags::from("y")).is_none());
        let (range, _) = search(&nfa, "ab", 1, Flags::from("y")).unwrap();
        assert_eq!(range, 1..2);
    }

    #[test]
    fn icase_matching() {
        let (range, _) = find("abC", "i", "xAbc").unwrap();
        assert_eq!(range, 1..4);
    }

    #[test]
    fn unicode_text() {
        let (range, _) = find("é.", "", "xéy").unwrap();
        assert_eq!(range, 1..4);
    }

    #[test]
    fn pathological_pattern_terminates() {
        // Without memoization this is exponential.
        let result = find("(?:a?){20}b", "", &"a".repeat(20));
        assert!(result.is_none());
    }
}
