//! Pre-calculated match results.
//!
//! A factory describes the full shape of a match, its length and every
//! capture span, as character offsets relative to the match start. For
//! patterns whose matches all share one shape, applying the factory
//! replaces running a capture-tracking automaton.

use crate::api::Range;
use crate::ast::{Node, RegexAst};

/// A template that expands a known match start into the complete match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreCalcResultFactory {
    /// Total match length in characters.
    pub length: usize,

    /// Capture spans as (start, end) character offsets from the match
    /// start; None for groups that do not participate.
    pub group_spans: Vec<Option<(usize, usize)>>,
}

impl PreCalcResultFactory {
    /// Expand at `start` (a byte offset into `text`) to the match range
    /// and capture ranges in byte offsets.
    ///
    /// Walks at most `length` characters of text once to translate
    /// character offsets into byte offsets.
    pub fn apply(&self, text: &str, start: usize) -> (Range, Vec<Option<Range>>) {
        // byte_at[i] is the byte offset of character i of the match.
        let mut byte_at = Vec::with_capacity(self.length + 1);
        byte_at.push(start);
        let mut pos = start;
        for c in text[start..].chars().take(self.length) {
            pos += c.len_utf8();
            byte_at.push(pos);
        }
        debug_assert_eq!(byte_at.len(), self.length + 1, "text shorter than the match");
        let captures = self
            .group_spans
            .iter()
            .map(|span| span.map(|(s, e)| byte_at[s]..byte_at[e]))
            .collect();
        (start..pos, captures)
    }
}

/// Derive the single match shape of a pattern by walking its AST once.
/// Returns None when matches can vary in shape: alternations, variable
/// loops, or anything zero-width-conditional.
pub fn pre_calc_single_result(ast: &RegexAst) -> Option<PreCalcResultFactory> {
    let mut spans = vec![None; ast.num_capture_groups() as usize];
    let length = walk(ast.root(), 0, &mut spans)?;
    Some(PreCalcResultFactory {
        length,
        group_spans: spans,
    })
}

/// \return the position after `node` when entered at `pos`, recording
/// group spans; None when the shape is not fixed.
fn walk(node: &Node, pos: usize, spans: &mut Vec<Option<(usize, usize)>>) -> Option<usize> {
    match node {
        Node::Empty | Node::Anchor(..) => Some(pos),
        Node::Char(..) => Some(pos + 1),
        Node::Class(set) => (!set.is_empty()).then_some(pos + 1),
        Node::Cat(nodes) => {
            let mut pos = pos;
            for n in nodes {
                pos = walk(n, pos, spans)?;
            }
            Some(pos)
        }
        Node::Group { capture, node } => {
            let end = walk(node, pos, spans)?;
            if let Some(g) = capture {
                spans[*g as usize] = Some((pos, end));
            }
            Some(end)
        }
        Node::Loop { node, quant, .. } => {
            if quant.is_variable() {
                return None;
            }
            let mut pos = pos;
            for _ in 0..quant.min {
                pos = walk(node, pos, spans)?;
            }
            Some(pos)
        }
        // Anything conditional or multi-shape has no single result.
        Node::Alt(..) | Node::WordBoundary { .. } | Node::Lookaround { .. } | Node::BackRef(..) => {
            None
        }
    }
}
