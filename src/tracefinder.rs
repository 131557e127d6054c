//! TraceFinder construction: a reverse NFA over the finitely many
//! accepting paths of a loop-free pattern.
//!
//! Every accepting path of a loop-free NFA has a fixed length and fixed
//! capture offsets, so the set of possible match shapes is a finite
//! table. The generator enumerates the paths, turns each into a
//! [`PreCalcResultFactory`], and builds a reversed trie whose terminal
//! states name the result a backward run has identified. Generation is
//! best-effort: anything it cannot express raises `Unsupported`, which
//! the coordinator treats as a recoverable bailout.

use crate::api::Unsupported;
use crate::codepointset::CodePointSet;
use crate::nfa::{EpsOp, Nfa, NfaGraph, StateId, GOAL_STATE};
use crate::result::PreCalcResultFactory;

/// Bail out when a pattern admits more distinct match shapes than this.
pub const MAX_NUMBER_OF_RESULTS: usize = 8;

/// Bail out when an accepting path is longer than this many characters.
const MAX_TRACE_LENGTH: usize = 64;

/// One state of the reversed trie.
#[derive(Debug, Default)]
pub struct TfState {
    /// Consuming edges, walked backward from the match end.
    pub transitions: Vec<(CodePointSet, StateId)>,

    /// The result this state identifies once reached; reaching it means
    /// an entire path has been consumed and the match start is here.
    pub result: Option<u16>,
}

/// The reverse NFA plus its result table.
#[derive(Debug)]
pub struct TraceFinderNfa {
    states: Vec<TfState>,
    results: Vec<PreCalcResultFactory>,
}

impl TraceFinderNfa {
    /// The entry state for backward runs, positioned at the match end.
    pub fn entry(&self) -> StateId {
        0
    }

    pub fn states(&self) -> &[TfState] {
        &self.states
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }

    pub fn pre_calculated_results(&self) -> &[PreCalcResultFactory] {
        &self.results
    }
}

/// An accepting path: the consumed sets in forward order plus the
/// capture spans it implies.
struct Trace {
    sets: Vec<CodePointSet>,
    spans: Vec<Option<(usize, usize)>>,
}

/// Produces TraceFinder NFAs.
pub struct TraceFinderGenerator;

impl TraceFinderGenerator {
    /// Generate the TraceFinder for `nfa`. The caller must have checked
    /// that the pattern has no loops.
    pub fn generate(nfa: &Nfa) -> Result<TraceFinderNfa, Unsupported> {
        if !nfa.lookarounds().is_empty() {
            return Err(Unsupported::new("trace finder: pattern has assertions"));
        }
        let num_groups = nfa.ast().num_capture_groups() as usize;
        let mut traces = Vec::new();
        let mut trace = Trace {
            sets: Vec::new(),
            spans: vec![None; num_groups],
        };
        enumerate(nfa.graph(), nfa.graph().entry(), &mut trace, &mut traces)?;

        // Distinct shapes share one result entry; the trie still keeps
        // one terminal per path so priorities survive reversal.
        let mut results: Vec<PreCalcResultFactory> = Vec::new();
        let mut states = vec![TfState::default()];
        for t in traces {
            let factory = PreCalcResultFactory {
                length: t.sets.len(),
                group_spans: t.spans,
            };
            let result_id = match results.iter().position(|r| *r == factory) {
                Some(idx) => idx as u16,
                None => {
                    results.push(factory);
                    (results.len() - 1) as u16
                }
            };

            // Thread the reversed path into the trie.
            let mut node: StateId = 0;
            for set in t.sets.iter().rev() {
                let existing = states[node as usize]
                    .transitions
                    .iter()
                    .find(|(s, _)| s == set)
                    .map(|&(_, t)| t);
                node = match existing {
                    Some(t) => t,
                    None => {
                        states.push(TfState::default());
                        let fresh = (states.len() - 1) as StateId;
                        states[node as usize].transitions.push((set.clone(), fresh));
                        fresh
                    }
                };
            }
            let terminal = &mut states[node as usize].result;
            *terminal = Some(match *terminal {
                Some(prev) => prev.min(result_id),
                None => result_id,
            });
        }
        Ok(TraceFinderNfa { states, results })
    }
}

/// Depth-first enumeration of accepting paths, in epsilon priority order
/// so result indices reflect match preference.
fn enumerate(
    graph: &NfaGraph,
    state: StateId,
    trace: &mut Trace,
    out: &mut Vec<Trace>,
) -> Result<(), Unsupported> {
    if state == GOAL_STATE {
        if out.len() == MAX_NUMBER_OF_RESULTS {
            return Err(Unsupported::new("trace finder: too many traces"));
        }
        out.push(Trace {
            sets: trace.sets.clone(),
            spans: trace.spans.clone(),
        });
        return Ok(());
    }
    if trace.sets.len() > MAX_TRACE_LENGTH {
        return Err(Unsupported::new("trace finder: path too long"));
    }

    let pos = trace.sets.len();
    let s = graph.at(state);
    for &(op, target) in &s.eps {
        match op {
            EpsOp::None => enumerate(graph, target, trace, out)?,
            EpsOp::GroupStart(g) => {
                let saved = trace.spans[g as usize];
                trace.spans[g as usize] = Some((pos, saved.map_or(pos, |(_, e)| e)));
                enumerate(graph, target, trace, out)?;
                trace.spans[g as usize] = saved;
            }
            EpsOp::GroupEnd(g) => {
                let saved = trace.spans[g as usize];
                trace.spans[g as usize] = Some((saved.map_or(pos, |(s, _)| s), pos));
                enumerate(graph, target, trace, out)?;
                trace.spans[g as usize] = saved;
            }
            EpsOp::GroupReset { from, to } => {
                let saved: Vec<_> = (from..to).map(|g| trace.spans[g as usize]).collect();
                for g in from..to {
                    trace.spans[g as usize] = None;
                }
                enumerate(graph, target, trace, out)?;
                for (g, old) in (from..to).zip(saved) {
                    trace.spans[g as usize] = old;
                }
            }
            EpsOp::LineStart
            | EpsOp::LineEnd
            | EpsOp::WordBoundary { .. }
            | EpsOp::Lookaround { .. } => {
                return Err(Unsupported::new("trace finder: pattern has assertions"));
            }
        }
    }
    for (set, target) in &s.transitions {
        trace.sets.push(set.clone());
        enumerate(graph, *target, trace, out)?;
        trace.sets.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RegexOptions, RegexSource};
    use crate::buffer::CompilationBuffer;
    use crate::nfa::NfaGenerator;
    use crate::parse::Parser;
    use std::sync::Arc;

    fn nfa(pattern: &str) -> Nfa {
        let source = RegexSource::new(pattern, "");
        let options = RegexOptions::default();
        let mut buffer = CompilationBuffer::new();
        let mut parser = Parser::new(&source, &options, &mut buffer).unwrap();
        let mut ast = parser.parse().unwrap();
        parser.prepare_for_dfa(&mut ast);
        buffer.reset();
        NfaGenerator::create(&Arc::new(ast), &mut buffer, &options).unwrap()
    }

    #[test]
    fn two_alternatives_two_results() {
        let tf = TraceFinderGenerator::generate(&nfa("ab|cde")).unwrap();
        let results = tf.pre_calculated_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].length, 2);
        assert_eq!(results[1].length, 3);
    }

    #[test]
    fn capture_offsets_per_path() {
        let tf = TraceFinderGenerator::generate(&nfa("(a)x|y(bc)")).unwrap();
        let results = tf.pre_calculated_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].group_spans, vec![Some((0, 1)), None]);
        assert_eq!(results[1].group_spans, vec![None, Some((1, 3))]);
    }

    #[test]
    fn identical_shapes_deduplicate() {
        let tf = TraceFinderGenerator::generate(&nfa("ab|cd")).unwrap();
        assert_eq!(tf.pre_calculated_results().len(), 1);
    }

    #[test]
    fn trie_shares_common_suffixes() {
        let tf = TraceFinderGenerator::generate(&nfa("ac|bc")).unwrap();
        // Reversed, both paths start by consuming 'c'; the trie forks
        // only afterwards.
        assert_eq!(tf.states()[0].transitions.len(), 1);
    }

    #[test]
    fn too_many_results_bails() {
        let result = TraceFinderGenerator::generate(&nfa("a|b|c|d|e|f|g|h|i"));
        assert!(result.is_err());
    }

    #[test]
    fn assertions_bail() {
        assert!(TraceFinderGenerator::generate(&nfa("^ab")).is_err());
        assert!(TraceFinderGenerator::generate(&nfa("(?=a)b")).is_err());
        assert!(TraceFinderGenerator::generate(&nfa(r"a\b")).is_err());
    }

    #[test]
    fn fixed_repetitions_enumerate() {
        let tf = TraceFinderGenerator::generate(&nfa("(?:ab){2}")).unwrap();
        let results = tf.pre_calculated_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].length, 4);
    }

    #[test]
    fn bounded_optional_iterations() {
        let tf = TraceFinderGenerator::generate(&nfa("ab?")).unwrap();
        // Greedy preference puts the longer shape first.
        let results = tf.pre_calculated_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].length, 2);
        assert_eq!(results[1].length, 1);
    }
}
