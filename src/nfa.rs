//! Construction of tagged NFAs from the AST.
//!
//! Epsilon edges carry an op: capture-group tags, zero-width assertions,
//! or a reference into the lookaround registry. Consuming edges are
//! labeled with code point sets. The builder follows the classic
//! fragment scheme: every subgraph exposes a start state and a list of
//! loose ends that the caller stitches to the next start.

use crate::api::{RegexOptions, Unsupported};
use crate::ast::{AnchorKind, Node, Quantifier, RegexAst};
use crate::buffer::CompilationBuffer;
use crate::codepointset::CodePointSet;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

/// A handle to a state in one NFA graph.
pub type StateId = u32;

/// State 0 is an inert sink; state 1 accepts. Every graph, including
/// lookaround bodies, reserves both.
pub const DEAD_STATE: StateId = 0;
pub const GOAL_STATE: StateId = 1;

/// The op attached to an epsilon edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpsOp {
    /// Plain epsilon.
    None,

    /// Record the start of a capture group at the current position.
    GroupStart(u16),

    /// Record the end of a capture group at the current position.
    GroupEnd(u16),

    /// Clear a range of capture groups. Emitted at each loop-body entry
    /// so groups from earlier iterations do not leak (ES2018 21.2.2.5.1).
    GroupReset { from: u16, to: u16 },

    /// ^ assertion.
    LineStart,

    /// $ assertion.
    LineEnd,

    /// \b or \B assertion.
    WordBoundary { negate: bool },

    /// A lookaround assertion; index into [`Nfa::lookarounds`].
    Lookaround { index: u16 },
}

#[derive(Debug, Default)]
pub struct NfaState {
    /// Epsilon edges in priority order.
    pub eps: Vec<(EpsOp, StateId)>,

    /// Consuming edges, labeled with the code points they accept.
    pub transitions: Vec<(CodePointSet, StateId)>,
}

/// One NFA graph: a dense state vector plus its entry state.
#[derive(Debug)]
pub struct NfaGraph {
    entry: StateId,
    states: Box<[NfaState]>,
}

impl NfaGraph {
    pub fn entry(&self) -> StateId {
        self.entry
    }

    pub fn at(&self, id: StateId) -> &NfaState {
        &self.states[id as usize]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    /// Total number of edges, epsilon and consuming.
    pub fn num_transitions(&self) -> usize {
        self.states
            .iter()
            .map(|s| s.eps.len() + s.transitions.len())
            .sum()
    }
}

/// The body of a lookaround assertion, kept out of line from the graph
/// that references it.
#[derive(Debug)]
pub struct LookaroundBody {
    pub behind: bool,
    pub negate: bool,

    /// Character width of the body when fixed; lookbehinds always have
    /// one after the feature gate.
    pub width: Option<usize>,

    pub graph: NfaGraph,
}

/// The NFA of a whole pattern.
#[derive(Debug)]
pub struct Nfa {
    ast: Arc<RegexAst>,
    graph: NfaGraph,
    lookarounds: Vec<LookaroundBody>,
    dead: bool,
    has_reverse_unanchored_entry: bool,
}

impl Nfa {
    pub fn ast(&self) -> &Arc<RegexAst> {
        &self.ast
    }

    pub fn graph(&self) -> &NfaGraph {
        &self.graph
    }

    pub fn lookarounds(&self) -> &[LookaroundBody] {
        &self.lookarounds
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Whether a backward search over this NFA may begin anywhere, as
    /// opposed to only at positions where the pattern's end anchor holds.
    pub fn has_reverse_unanchored_entry(&self) -> bool {
        self.has_reverse_unanchored_entry
    }

    pub fn num_states(&self) -> usize {
        self.graph.len() + self.lookarounds.iter().map(|l| l.graph.len()).sum::<usize>()
    }

    pub fn num_transitions(&self) -> usize {
        self.graph.num_transitions()
            + self
                .lookarounds
                .iter()
                .map(|l| l.graph.num_transitions())
                .sum::<usize>()
    }
}

/// A piece of an NFA under construction: a start state and the loose ends
/// that still need epsilon edges to the next start.
struct Fragment {
    start: StateId,
    ends: SmallVec<[StateId; 2]>,
}

struct Builder {
    /// States of the graph currently being built.
    states: Vec<NfaState>,

    /// Lookaround bodies discovered so far, across all graphs.
    lookarounds: Vec<LookaroundBody>,

    /// Remaining state budget, shared across all graphs.
    budget: u32,
}

fn err<T>(text: &str) -> Result<T, Unsupported> {
    Err(Unsupported::new(text))
}

impl Builder {
    fn new(budget: u32) -> Self {
        Self {
            states: Vec::new(),
            lookarounds: Vec::new(),
            budget,
        }
    }

    /// Try adding a new state, returning its handle.
    fn make(&mut self) -> Result<StateId, Unsupported> {
        if self.budget == 0 {
            return err("too many NFA states");
        }
        self.budget -= 1;
        self.states.push(NfaState::default());
        Ok(self.states.len() as StateId - 1)
    }

    fn get(&mut self, id: StateId) -> &mut NfaState {
        &mut self.states[id as usize]
    }

    fn connect(&mut self, ends: &[StateId], target: StateId) {
        for &e in ends {
            self.get(e).eps.push((EpsOp::None, target));
        }
    }

    /// Build `node` into a fresh graph with its own dead/goal states.
    fn build_graph(&mut self, node: &Node) -> Result<NfaGraph, Unsupported> {
        let outer = std::mem::replace(
            &mut self.states,
            vec![NfaState::default(), NfaState::default()],
        );
        let built = self.build(node).map(|frag| {
            self.connect(&frag.ends, GOAL_STATE);
            frag.start
        });
        let states = std::mem::replace(&mut self.states, outer);
        Ok(NfaGraph {
            entry: built?,
            states: states.into_boxed_slice(),
        })
    }

    fn build(&mut self, node: &Node) -> Result<Fragment, Unsupported> {
        match node {
            Node::Empty => {
                let s = self.make()?;
                Ok(Fragment {
                    start: s,
                    ends: smallvec![s],
                })
            }
            Node::Char(c) => self.build_class(&CodePointSet::single(*c as u32)),
            Node::Class(set) => self.build_class(set),
            Node::Cat(nodes) => self.build_cat(nodes),
            Node::Alt(nodes) => self.build_alt(nodes),
            Node::Anchor(kind) => {
                let op = match kind {
                    AnchorKind::LineStart => EpsOp::LineStart,
                    AnchorKind::LineEnd => EpsOp::LineEnd,
                };
                self.build_assertion(op)
            }
            Node::WordBoundary { negate } => {
                self.build_assertion(EpsOp::WordBoundary { negate: *negate })
            }
            Node::Group { capture, node } => match capture {
                None => self.build(node),
                Some(group) => {
                    let s = self.make()?;
                    let body = self.build(node)?;
                    let t = self.make()?;
                    self.get(s).eps.push((EpsOp::GroupStart(*group), body.start));
                    for &e in &body.ends {
                        self.get(e).eps.push((EpsOp::GroupEnd(*group), t));
                    }
                    Ok(Fragment {
                        start: s,
                        ends: smallvec![t],
                    })
                }
            },
            Node::Loop {
                node,
                quant,
                enclosed_groups,
            } => self.build_loop(node, quant, enclosed_groups),
            Node::Lookaround { behind, negate, node } => {
                let width = node.fixed_char_width();
                if *behind && width.is_none() {
                    // The feature gate rejects these before construction.
                    return err("variable width lookbehind");
                }
                let graph = self.build_graph(node)?;
                let index = self.lookarounds.len() as u16;
                self.lookarounds.push(LookaroundBody {
                    behind: *behind,
                    negate: *negate,
                    width,
                    graph,
                });
                self.build_assertion(EpsOp::Lookaround { index })
            }
            Node::BackRef(..) => err("backreferences not supported"),
        }
    }

    fn build_class(&mut self, set: &CodePointSet) -> Result<Fragment, Unsupported> {
        let s = self.make()?;
        let t = self.make()?;
        if !set.is_empty() {
            self.get(s).transitions.push((set.clone(), t));
        }
        // An empty set leaves `s` without outgoing edges; reachability
        // analysis prunes the path.
        Ok(Fragment {
            start: s,
            ends: smallvec![t],
        })
    }

    fn build_assertion(&mut self, op: EpsOp) -> Result<Fragment, Unsupported> {
        let s = self.make()?;
        let t = self.make()?;
        self.get(s).eps.push((op, t));
        Ok(Fragment {
            start: s,
            ends: smallvec![t],
        })
    }

    fn build_cat(&mut self, nodes: &[Node]) -> Result<Fragment, Unsupported> {
        let mut start = None;
        let mut ends: SmallVec<[StateId; 2]> = smallvec![];
        for node in nodes {
            let next = self.build(node)?;
            if start.is_none() {
                start = Some(next.start);
            }
            self.connect(&ends, next.start);
            ends = next.ends;
        }
        let start = match start {
            Some(s) => s,
            None => {
                let s = self.make()?;
                ends = smallvec![s];
                s
            }
        };
        Ok(Fragment { start, ends })
    }

    fn build_alt(&mut self, nodes: &[Node]) -> Result<Fragment, Unsupported> {
        let start = self.make()?;
        let mut ends: SmallVec<[StateId; 2]> = smallvec![];
        // Arms are wired in order; epsilon priority encodes preference.
        for node in nodes {
            let arm = self.build(node)?;
            self.get(start).eps.push((EpsOp::None, arm.start));
            ends.extend(arm.ends);
        }
        Ok(Fragment { start, ends })
    }

    /// Build one loop-body iteration, prefixed with the capture reset.
    fn build_iteration(
        &mut self,
        node: &Node,
        enclosed: &core::ops::Range<u16>,
    ) -> Result<Fragment, Unsupported> {
        let body = self.build(node)?;
        if enclosed.is_empty() {
            return Ok(body);
        }
        let s = self.make()?;
        self.get(s).eps.push((
            EpsOp::GroupReset {
                from: enclosed.start,
                to: enclosed.end,
            },
            body.start,
        ));
        Ok(Fragment {
            start: s,
            ends: body.ends,
        })
    }

    fn build_loop(
        &mut self,
        node: &Node,
        quant: &Quantifier,
        enclosed: &core::ops::Range<u16>,
    ) -> Result<Fragment, Unsupported> {
        let start = self.make()?;
        let mut ends: SmallVec<[StateId; 2]> = smallvec![start];

        // Unroll the mandatory iterations; finite automata cannot count.
        for _ in 0..quant.min {
            let body = self.build_iteration(node, enclosed)?;
            self.connect(&ends, body.start);
            ends = body.ends;
        }

        match quant.max {
            None => {
                // Unbounded tail: a loop state choosing between one more
                // body iteration and the exit, priority per greediness.
                let looper = self.make()?;
                let exit = self.make()?;
                self.connect(&ends, looper);
                let body = self.build_iteration(node, enclosed)?;
                if quant.greedy {
                    self.get(looper).eps.push((EpsOp::None, body.start));
                    self.get(looper).eps.push((EpsOp::None, exit));
                } else {
                    self.get(looper).eps.push((EpsOp::None, exit));
                    self.get(looper).eps.push((EpsOp::None, body.start));
                }
                self.connect(&body.ends, looper);
                Ok(Fragment {
                    start,
                    ends: smallvec![exit],
                })
            }
            Some(max) if max > quant.min => {
                // Optional iterations, each with its own skip choice.
                let exit = self.make()?;
                for _ in quant.min..max {
                    let choice = self.make()?;
                    self.connect(&ends, choice);
                    let body = self.build_iteration(node, enclosed)?;
                    if quant.greedy {
                        self.get(choice).eps.push((EpsOp::None, body.start));
                        self.get(choice).eps.push((EpsOp::None, exit));
                    } else {
                        self.get(choice).eps.push((EpsOp::None, exit));
                        self.get(choice).eps.push((EpsOp::None, body.start));
                    }
                    ends = body.ends;
                }
                self.connect(&ends, exit);
                Ok(Fragment {
                    start,
                    ends: smallvec![exit],
                })
            }
            Some(_) => {
                // max == min: the unrolled chain is the whole loop.
                Ok(Fragment { start, ends })
            }
        }
    }
}

/// Produces the NFA of a pattern.
pub struct NfaGenerator;

impl NfaGenerator {
    /// Build the NFA for `ast`. Raises `Unsupported` when the state
    /// budget is exceeded.
    pub fn create(
        ast: &Arc<RegexAst>,
        buffer: &mut CompilationBuffer,
        options: &RegexOptions,
    ) -> Result<Nfa, Unsupported> {
        let mut builder = Builder::new(options.max_nfa_states);
        let graph = builder.build_graph(ast.root())?;
        let dead = !reaches_goal(&graph, buffer);
        Ok(Nfa {
            ast: ast.clone(),
            graph,
            lookarounds: builder.lookarounds,
            dead,
            has_reverse_unanchored_entry: !ast.is_end_anchored(),
        })
    }
}

/// \return whether the goal state is reachable from the entry. Assertion
/// edges are assumed satisfiable; empty-set transitions do not exist.
fn reaches_goal(graph: &NfaGraph, buffer: &mut CompilationBuffer) -> bool {
    let bump = buffer.bump();
    let mut visited =
        bumpalo::collections::Vec::from_iter_in((0..graph.len()).map(|_| false), bump);
    let mut work = bumpalo::collections::Vec::new_in(bump);
    visited[graph.entry() as usize] = true;
    work.push(graph.entry());
    while let Some(id) = work.pop() {
        if id == GOAL_STATE {
            return true;
        }
        let state = graph.at(id);
        let targets = state
            .eps
            .iter()
            .map(|&(_, t)| t)
            .chain(state.transitions.iter().map(|&(_, t)| t));
        for t in targets {
            if !visited[t as usize] {
                visited[t as usize] = true;
                work.push(t);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RegexOptions, RegexSource};
    use crate::parse::Parser;

    fn build(pattern: &str, flags: &str) -> Result<Nfa, Unsupported> {
        build_with(pattern, flags, &RegexOptions::default())
    }

    fn build_with(
        pattern: &str,
        flags: &str,
        options: &RegexOptions,
    ) -> Result<Nfa, Unsupported> {
        let source = RegexSource::new(pattern, flags);
        let mut buffer = CompilationBuffer::new();
        let mut parser = Parser::new(&source, options, &mut buffer)?;
        let mut ast = parser.parse()?;
        parser.prepare_for_dfa(&mut ast);
        buffer.reset();
        NfaGenerator::create(&Arc::new(ast), &mut buffer, options)
    }

    #[test]
    fn literal_chain() {
        let nfa = build("abc", "").unwrap();
        assert!(!nfa.is_dead());
        assert!(nfa.num_states() >= 8);
        assert!(nfa.num_transitions() >= 3);
        assert!(nfa.has_reverse_unanchored_entry());
    }

    #[test]
    fn dead_catenation_found_by_reachability() {
        let nfa = build("a[]b", "").unwrap();
        assert!(nfa.is_dead());
    }

    #[test]
    fn empty_pattern_is_live() {
        let nfa = build("", "").unwrap();
        assert!(!nfa.is_dead());
    }

    #[test]
    fn end_anchor_removes_reverse_unanchored_entry() {
        let nfa = build("abc$", "").unwrap();
        assert!(!nfa.has_reverse_unanchored_entry());

        let nfa = build("abc$", "m").unwrap();
        assert!(nfa.has_reverse_unanchored_entry());
    }

    #[test]
    fn lookaround_bodies_are_registered() {
        let nfa = build("(?=ab)c", "").unwrap();
        assert_eq!(nfa.lookarounds().len(), 1);
        assert!(!nfa.lookarounds()[0].behind);
        assert_eq!(nfa.lookarounds()[0].width, Some(2));
    }

    #[test]
    fn capture_tags_present() {
        let nfa = build("(a)", "").unwrap();
        let has_tag = nfa.graph().states().iter().any(|s| {
            s.eps
                .iter()
                .any(|(op, _)| matches!(op, EpsOp::GroupStart(0)))
        });
        assert!(has_tag);
    }

    #[test]
    fn budget_exceeded() {
        let options = RegexOptions {
            max_nfa_states: 8,
            ..Default::default()
        };
        let result = build_with("abcdefghij", "", &options);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().reason(), "too many NFA states");
    }

    #[test]
    fn counted_repetition_unrolls() {
        let small = build("a{2}", "").unwrap();
        let large = build("a{8}", "").unwrap();
        assert!(large.num_states() > small.num_states());
    }
}
