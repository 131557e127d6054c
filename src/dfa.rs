//! Deterministic automata: subset construction over code point ranges,
//! and the executors that run them.
//!
//! Anchors and word boundaries are evaluated exactly by classifying both
//! sides of every inter-character gap into {boundary, word char, line
//! terminator, other} and keying DFA states on the class of the last
//! consumed character. Transition ranges are split so each has a uniform
//! class. Lookaround edges are over-approximated as epsilon; the matcher
//! variant selection guarantees a capture tracker is present whenever
//! lookaround is, and the tracker re-validates exactly.

use crate::api::{RegexOptions, Unsupported};
use crate::buffer::CompilationBuffer;
use crate::codepointset::{
    CodePointSet, Interval, CODE_POINT_MAX, LINE_TERMINATORS, WORD_CHARS,
};
use crate::nfa::{EpsOp, Nfa, StateId, GOAL_STATE};
use crate::tracefinder::TraceFinderNfa;
use std::collections::HashMap;
use std::sync::Arc;

/// Static parameters of one DFA executor.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorProps {
    pub forward: bool,
    pub searching: bool,
    pub track_captures: bool,
    pub regression_test_mode: bool,
    pub num_capture_groups: u16,
    pub min_path: usize,
}

/// Classification of one side of an inter-character gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum GapClass {
    /// Input boundary (begin or end of the haystack).
    Boundary = 0,
    Word = 1,
    LineTerm = 2,
    Other = 3,
}

const ALL_CLASSES: [GapClass; 4] = [
    GapClass::Boundary,
    GapClass::Word,
    GapClass::LineTerm,
    GapClass::Other,
];

fn classify_cp(cp: u32) -> GapClass {
    if WORD_CHARS.iter().any(|iv| iv.contains(cp)) {
        GapClass::Word
    } else if LINE_TERMINATORS.iter().any(|iv| iv.contains(cp)) {
        GapClass::LineTerm
    } else {
        GapClass::Other
    }
}

fn gap_class_of(c: Option<char>) -> GapClass {
    match c {
        None => GapClass::Boundary,
        Some(c) => classify_cp(c as u32),
    }
}

fn prev_char(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

fn next_char(text: &str, pos: usize) -> Option<char> {
    text[pos..].chars().next()
}

/// One state of the automaton source the subset construction runs over:
/// a forward NFA, a reversed NFA, or a TraceFinder trie.
#[derive(Debug, Default)]
struct ViewState {
    eps: Vec<(EpsOp, StateId)>,
    chars: Vec<(CodePointSet, StateId)>,
    accept: bool,
    result: Option<u16>,
}

#[derive(Debug)]
struct AutomatonView {
    states: Vec<ViewState>,
    entry: StateId,
    multiline: bool,
}

fn forward_view(nfa: &Nfa) -> AutomatonView {
    let graph = nfa.graph();
    let mut states: Vec<ViewState> = graph
        .states()
        .iter()
        .map(|s| ViewState {
            eps: s.eps.clone(),
            chars: s.transitions.clone(),
            accept: false,
            result: None,
        })
        .collect();
    states[GOAL_STATE as usize].accept = true;
    AutomatonView {
        states,
        entry: graph.entry(),
        multiline: nfa.ast().flags().multiline,
    }
}

/// Reverse all edges. Line anchors swap sides: walked backward, a $ is
/// satisfied by what has already been consumed, exactly like a ^ walked
/// forward.
fn backward_view(nfa: &Nfa) -> AutomatonView {
    let graph = nfa.graph();
    let mut states: Vec<ViewState> = (0..graph.len()).map(|_| ViewState::default()).collect();
    for (id, state) in graph.states().iter().enumerate() {
        for &(op, target) in &state.eps {
            let op = match op {
                EpsOp::LineStart => EpsOp::LineEnd,
                EpsOp::LineEnd => EpsOp::LineStart,
                other => other,
            };
            states[target as usize].eps.push((op, id as StateId));
        }
        for (set, target) in &state.transitions {
            states[*target as usize].chars.push((set.clone(), id as StateId));
        }
    }
    states[graph.entry() as usize].accept = true;
    AutomatonView {
        states,
        entry: GOAL_STATE,
        multiline: nfa.ast().flags().multiline,
    }
}

fn trace_finder_view(tf: &TraceFinderNfa) -> AutomatonView {
    let states = tf
        .states()
        .iter()
        .map(|s| ViewState {
            eps: Vec::new(),
            chars: s.transitions.clone(),
            accept: s.result.is_some(),
            result: s.result,
        })
        .collect();
    AutomatonView {
        states,
        entry: tf.entry(),
        multiline: false,
    }
}

/// The automaton a DFA is built from.
pub enum DfaSource {
    Nfa(Arc<Nfa>),
    /// TraceFinder trie, plus the NFA it was derived from.
    TraceFinder(Arc<TraceFinderNfa>, Arc<Nfa>),
}

/// One compiled DFA state.
#[derive(Debug, Default)]
pub(crate) struct DfaState {
    /// Sorted, disjoint, merged transition ranges.
    pub(crate) transitions: Vec<(Interval, u32)>,

    /// Acceptance per class of the gap's far side, one bit per GapClass.
    pub(crate) accept_mask: u8,

    /// Identified pre-calculated result, for TraceFinder automata.
    pub(crate) result: Option<u16>,
}

impl DfaState {
    fn accepts(&self, next: GapClass) -> bool {
        self.accept_mask & (1 << next as u8) != 0
    }
}

/// Builds one DFA executor from an automaton source.
pub struct DfaGenerator<'o> {
    nfa: Arc<Nfa>,
    view: AutomatonView,
    props: ExecutorProps,
    options: &'o RegexOptions,
    states: Vec<DfaState>,
    keys: Vec<(Box<[StateId]>, GapClass)>,
    key_map: HashMap<(Box<[StateId]>, u8), u32>,
    initials: [u32; 4],
    /// Epoch marks for closure computation, one slot per view state.
    marks: Vec<u32>,
    epoch: u32,
}

impl<'o> DfaGenerator<'o> {
    pub fn new(source: DfaSource, props: ExecutorProps, options: &'o RegexOptions) -> Self {
        let (view, nfa) = match source {
            DfaSource::Nfa(nfa) => {
                let view = if props.forward {
                    forward_view(&nfa)
                } else {
                    backward_view(&nfa)
                };
                (view, nfa)
            }
            DfaSource::TraceFinder(tf, nfa) => {
                debug_assert!(!props.forward, "trace finder runs are backward");
                (trace_finder_view(&tf), nfa)
            }
        };
        let marks = vec![0; view.states.len()];
        Self {
            nfa,
            view,
            props,
            options,
            states: Vec::new(),
            keys: Vec::new(),
            key_map: HashMap::new(),
            initials: [0; 4],
            marks,
            epoch: 0,
        }
    }

    /// \return the name used for phase logs and dump files.
    pub fn debug_name(&self, suggested: Option<&str>) -> String {
        match suggested {
            Some(name) => name.to_string(),
            None => {
                if self.props.track_captures {
                    "capture_groups".to_string()
                } else if !self.props.forward {
                    "backward".to_string()
                } else {
                    "forward".to_string()
                }
            }
        }
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Run the subset construction to a fixed point.
    pub fn calc_dfa(&mut self, buffer: &mut CompilationBuffer) -> Result<(), Unsupported> {
        let entry = [self.view.entry];
        for (i, class) in ALL_CLASSES.into_iter().enumerate() {
            self.initials[i] = self.intern(&entry, class)?;
        }
        let mut next = 0;
        while next < self.states.len() {
            self.process_state(next as u32, buffer)?;
            next += 1;
        }
        buffer.reset();
        Ok(())
    }

    /// Finish into an executor.
    pub fn create_executor(self, name: &str) -> DfaExecutor {
        debug_assert!(!self.states.is_empty(), "calc_dfa must run first");
        DfaExecutor {
            name: name.to_string(),
            props: self.props,
            states: self.states,
            initials: self.initials,
            nfa: self.nfa,
        }
    }

    /// Intern a sorted, deduplicated state set under a preceding class.
    fn intern(&mut self, set: &[StateId], prev: GapClass) -> Result<u32, Unsupported> {
        let mut owned: Vec<StateId>;
        let set: &[StateId] = if self.props.searching && !set.contains(&self.view.entry) {
            // Searching automata keep a fresh scan alive in every state.
            owned = set.to_vec();
            owned.push(self.view.entry);
            owned.sort_unstable();
            &owned
        } else {
            set
        };
        let key = (Box::<[StateId]>::from(set), prev as u8);
        if let Some(&id) = self.key_map.get(&key) {
            return Ok(id);
        }
        if self.states.len() as u32 >= self.options.max_dfa_states {
            return Err(Unsupported::new("too many DFA states"));
        }
        let id = self.states.len() as u32;
        self.states.push(DfaState::default());
        self.keys.push((key.0.clone(), prev));
        self.key_map.insert(key, id);
        Ok(id)
    }

    /// Compute acceptance bits and outgoing transitions for one state.
    fn process_state(
        &mut self,
        id: u32,
        buffer: &mut CompilationBuffer,
    ) -> Result<(), Unsupported> {
        let (set, prev) = {
            let (set, prev) = &self.keys[id as usize];
            (set.clone(), *prev)
        };

        // Acceptance per next-side class, and the TraceFinder result.
        let mut accept_mask = 0u8;
        let mut result: Option<u16> = None;
        let mut closure_out: Vec<StateId> = Vec::new();
        for next in ALL_CLASSES {
            self.closure(&set, prev, next, false, &mut closure_out);
            for &s in &closure_out {
                let state = &self.view.states[s as usize];
                if state.accept {
                    accept_mask |= 1 << next as u8;
                }
                if let Some(r) = state.result {
                    result = Some(result.map_or(r, |cur: u16| cur.min(r)));
                }
            }
        }
        self.states[id as usize].accept_mask = accept_mask;
        self.states[id as usize].result = result;

        // Collect candidate range boundaries from everything reachable
        // under the most permissive assumptions, then split further at
        // the classifier boundaries so each range has a uniform class.
        let (bump, crossed, targets) = buffer.parts();
        let mut boundaries = bumpalo::collections::Vec::new_in(bump);
        self.closure_permissive(&set, crossed);
        for &s in crossed.iter() {
            for (cs, _) in &self.view.states[s as usize].chars {
                for iv in cs.intervals() {
                    boundaries.push(iv.first);
                    boundaries.push(iv.last + 1);
                }
            }
        }
        for iv in WORD_CHARS.iter().chain(LINE_TERMINATORS.iter()) {
            boundaries.push(iv.first);
            boundaries.push(iv.last + 1);
        }
        boundaries.sort_unstable();

        let mut normalized = bumpalo::collections::Vec::new_in(bump);
        for w in 0..boundaries.len().saturating_sub(1) {
            if boundaries[w] == boundaries[w + 1] {
                continue;
            }
            let range = Interval::new(boundaries[w], boundaries[w + 1] - 1);
            if range.first > CODE_POINT_MAX {
                break;
            }
            let class = classify_cp(range.first);
            self.closure(&set, prev, class, false, crossed);
            targets.clear();
            for &s in crossed.iter() {
                for (cs, t) in &self.view.states[s as usize].chars {
                    if cs.intersects_interval(range) {
                        targets.push(*t);
                    }
                }
            }
            if targets.is_empty() {
                continue;
            }
            targets.sort_unstable();
            targets.dedup();
            // Normalize through unconditional epsilon edges; assertion
            // edges wait for the next gap.
            normalized.clear();
            self.closure_free(targets, &mut normalized);
            let target_id = self.intern(&normalized, class)?;
            push_merged(&mut self.states[id as usize].transitions, range, target_id);
        }
        Ok(())
    }

    /// Epsilon closure under a specific gap assumption. When `permissive`
    /// is set every assertion passes.
    fn closure(
        &mut self,
        input: &[StateId],
        prev: GapClass,
        next: GapClass,
        permissive: bool,
        out: &mut Vec<StateId>,
    ) {
        self.epoch += 1;
        out.clear();
        for &s in input {
            if self.marks[s as usize] != self.epoch {
                self.marks[s as usize] = self.epoch;
                out.push(s);
            }
        }
        let multiline = self.view.multiline;
        let mut i = 0;
        while i < out.len() {
            let s = out[i];
            i += 1;
            for &(op, target) in &self.view.states[s as usize].eps {
                let passes = permissive
                    || match op {
                        EpsOp::None
                        | EpsOp::GroupStart(..)
                        | EpsOp::GroupEnd(..)
                        | EpsOp::GroupReset { .. } => true,
                        EpsOp::LineStart => {
                            prev == GapClass::Boundary
                                || (multiline && prev == GapClass::LineTerm)
                        }
                        EpsOp::LineEnd => {
                            next == GapClass::Boundary
                                || (multiline && next == GapClass::LineTerm)
                        }
                        EpsOp::WordBoundary { negate } => {
                            ((prev == GapClass::Word) != (next == GapClass::Word)) != negate
                        }
                        // Over-approximated; the capture tracker decides.
                        EpsOp::Lookaround { .. } => true,
                    };
                if passes && self.marks[target as usize] != self.epoch {
                    self.marks[target as usize] = self.epoch;
                    out.push(target);
                }
            }
        }
    }

    fn closure_permissive(&mut self, input: &[StateId], out: &mut Vec<StateId>) {
        self.closure(input, GapClass::Boundary, GapClass::Boundary, true, out);
    }

    /// Closure through unconditional edges only; assertion edges wait
    /// for the next gap. `out` must come in cleared.
    fn closure_free<'b>(
        &mut self,
        input: &[StateId],
        out: &mut bumpalo::collections::Vec<'b, StateId>,
    ) {
        self.epoch += 1;
        for &s in input {
            if self.marks[s as usize] != self.epoch {
                self.marks[s as usize] = self.epoch;
                out.push(s);
            }
        }
        let mut i = 0;
        while i < out.len() {
            let s = out[i];
            i += 1;
            for &(op, target) in &self.view.states[s as usize].eps {
                let free = matches!(
                    op,
                    EpsOp::None
                        | EpsOp::GroupStart(..)
                        | EpsOp::GroupEnd(..)
                        | EpsOp::GroupReset { .. }
                );
                if free && self.marks[target as usize] != self.epoch {
                    self.marks[target as usize] = self.epoch;
                    out.push(target);
                }
            }
        }
        out.sort_unstable();
    }
}

/// Append a transition, merging with the previous one when the ranges
/// are adjacent and lead to the same state.
fn push_merged(transitions: &mut Vec<(Interval, u32)>, range: Interval, target: u32) {
    if let Some((last, t)) = transitions.last_mut() {
        if *t == target && last.last + 1 == range.first {
            last.last = range.last;
            return;
        }
    }
    transitions.push((range, target));
}

/// A compiled deterministic automaton, ready to run.
#[derive(Debug)]
pub struct DfaExecutor {
    name: String,
    props: ExecutorProps,
    states: Vec<DfaState>,
    initials: [u32; 4],
    nfa: Arc<Nfa>,
}

impl DfaExecutor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn props(&self) -> &ExecutorProps {
        &self.props
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn nfa(&self) -> &Arc<Nfa> {
        &self.nfa
    }

    pub(crate) fn states(&self) -> &[DfaState] {
        &self.states
    }

    fn initial_state(&self, prev: GapClass) -> u32 {
        self.initials[prev as u8 as usize]
    }

    fn transition(&self, state: u32, c: char) -> Option<u32> {
        let transitions = &self.states[state as usize].transitions;
        let cp = c as u32;
        let i = transitions.partition_point(|(iv, _)| iv.first <= cp);
        if i == 0 {
            return None;
        }
        let (iv, target) = &transitions[i - 1];
        (cp <= iv.last).then_some(*target)
    }

    /// Forward run from `start`. Searching executors return the earliest
    /// match end; anchored executors the latest.
    pub fn find_end(&self, text: &str, start: usize) -> Option<usize> {
        debug_assert!(self.props.forward);
        let mut pos = start;
        let mut state = self.initial_state(gap_class_of(prev_char(text, start)));
        let mut last_accept = None;
        loop {
            let next = next_char(text, pos);
            if self.states[state as usize].accepts(gap_class_of(next)) {
                if self.props.searching {
                    return Some(pos);
                }
                last_accept = Some(pos);
            }
            let Some(c) = next else {
                return last_accept;
            };
            state = match self.transition(state, c) {
                Some(s) => s,
                None => {
                    if !self.props.searching {
                        return last_accept;
                    }
                    self.initial_state(classify_cp(c as u32))
                }
            };
            pos += c.len_utf8();
        }
    }

    /// Backward run from `end`, not consuming past `floor`. Returns the
    /// leftmost position a match can start at.
    pub fn find_start(&self, text: &str, end: usize, floor: usize) -> Option<usize> {
        self.run_backward(text, end, floor).map(|(pos, _)| pos)
    }

    /// Backward run over a TraceFinder automaton: leftmost start plus the
    /// identified pre-calculated result.
    pub fn find_trace_result(&self, text: &str, end: usize, floor: usize) -> Option<(usize, u16)> {
        let (pos, result) = self.run_backward(text, end, floor)?;
        Some((pos, result.expect("trace finder accepts carry results")))
    }

    /// Resolve the full match anchored at `start`, including capture
    /// spans. Only capture-tracking executors provide this; spans come
    /// from a priority walk of the backing NFA over the bounded region.
    pub fn resolve_captures(
        &self,
        text: &str,
        start: usize,
    ) -> Option<(usize, Vec<Option<crate::api::Range>>)> {
        debug_assert!(self.props.track_captures);
        crate::nfaexec::match_at(&self.nfa, text, start, self.nfa.ast().flags())
    }

    fn run_backward(
        &self,
        text: &str,
        end: usize,
        floor: usize,
    ) -> Option<(usize, Option<u16>)> {
        debug_assert!(!self.props.forward);
        let mut pos = end;
        let mut state = self.initial_state(gap_class_of(next_char(text, end)));
        let mut best = None;
        loop {
            let next = prev_char(text, pos);
            let dfa_state = &self.states[state as usize];
            if dfa_state.accepts(gap_class_of(next)) {
                best = Some((pos, dfa_state.result));
            }
            if pos <= floor {
                return best;
            }
            let Some(c) = next else {
                return best;
            };
            state = match self.transition(state, c) {
                Some(s) => s,
                None => return best,
            };
            pos -= c.len_utf8();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RegexOptions, RegexSource};
    use crate::nfa::NfaGenerator;
    use crate::parse::Parser;
    use crate::tracefinder::TraceFinderGenerator;

    fn nfa(pattern: &str, flags: &str) -> Arc<Nfa> {
        let source = RegexSource::new(pattern, flags);
        let options = RegexOptions::default();
        let mut buffer = CompilationBuffer::new();
        let mut parser = Parser::new(&source, &options, &mut buffer).unwrap();
        let mut ast = parser.parse().unwrap();
        parser.prepare_for_dfa(&mut ast);
        buffer.reset();
        Arc::new(NfaGenerator::create(&Arc::new(ast), &mut buffer, &options).unwrap())
    }

    fn executor(pattern: &str, flags: &str, forward: bool, searching: bool) -> DfaExecutor {
        executor_with(nfa(pattern, flags), forward, searching, &RegexOptions::default()).unwrap()
    }

    fn executor_with(
        nfa: Arc<Nfa>,
        forward: bool,
        searching: bool,
        options: &RegexOptions,
    ) -> Result<DfaExecutor, Unsupported> {
        let props = ExecutorProps {
            forward,
            searching,
            track_captures: false,
            regression_test_mode: false,
            num_capture_groups: nfa.ast().num_capture_groups(),
            min_path: nfa.ast().min_path(),
        };
        let mut generator = DfaGenerator::new(DfaSource::Nfa(nfa), props, options);
        let mut buffer = CompilationBuffer::new();
        generator.calc_dfa(&mut buffer)?;
        let name = generator.debug_name(None);
        Ok(generator.create_executor(&name))
    }

    #[test]
    fn forward_searching_finds_earliest_end() {
        let dfa = executor("abc", "", true, true);
        assert_eq!(dfa.find_end("xxabcy", 0), Some(5));
        assert_eq!(dfa.find_end("abc", 0), Some(3));
        assert_eq!(dfa.find_end("ab", 0), None);
        assert!(dfa.num_states() > 0);
    }

    #[test]
    fn backward_finds_leftmost_start() {
        let dfa = executor("abc", "", false, false);
        assert_eq!(dfa.find_start("xxabcy", 5, 0), Some(2));
    }

    #[test]
    fn backward_respects_floor() {
        let dfa = executor("aaa", "", false, false);
        assert_eq!(dfa.find_start("aaaa", 4, 0), Some(1));
        assert_eq!(dfa.find_start("aaaa", 4, 2), None);
    }

    #[test]
    fn empty_match_accepts_immediately() {
        let dfa = executor("a*", "", true, true);
        assert_eq!(dfa.find_end("bbb", 0), Some(0));
    }

    #[test]
    fn start_anchor_is_exact() {
        let dfa = executor("^ab", "", true, true);
        assert_eq!(dfa.find_end("ab", 0), Some(2));
        assert_eq!(dfa.find_end("xab", 0), None);

        let dfa = executor("^b", "m", true, true);
        assert_eq!(dfa.find_end("a\nb", 0), Some(3));
    }

    #[test]
    fn end_anchor_is_exact() {
        let dfa = executor("ab$", "", true, true);
        assert_eq!(dfa.find_end("xab", 0), Some(3));
        assert_eq!(dfa.find_end("abx", 0), None);
    }

    #[test]
    fn word_boundary_is_exact() {
        let dfa = executor(r"\bcat", "", true, true);
        assert_eq!(dfa.find_end("a cat", 0), Some(5));
        assert_eq!(dfa.find_end("concat", 0), None);
    }

    #[test]
    fn anchored_forward_takes_longest() {
        let dfa = executor("ab(c)?", "", true, false);
        assert_eq!(dfa.find_end("abcd", 0), Some(3));
        assert_eq!(dfa.find_end("abd", 0), Some(2));
        assert_eq!(dfa.find_end("xab", 0), None);
    }

    #[test]
    fn alternation_boundaries() {
        let dfa = executor("ab|cde", "", true, true);
        assert_eq!(dfa.find_end("zcdez", 0), Some(4));
        let back = executor("ab|cde", "", false, false);
        assert_eq!(back.find_start("zcdez", 4, 0), Some(1));
    }

    #[test]
    fn trace_finder_backward_identifies_result() {
        let n = nfa("ab|cde", "");
        let tf = Arc::new(TraceFinderGenerator::generate(&n).unwrap());
        let props = ExecutorProps {
            forward: false,
            searching: false,
            track_captures: false,
            regression_test_mode: false,
            num_capture_groups: 0,
            min_path: 2,
        };
        let options = RegexOptions::default();
        let mut generator =
            DfaGenerator::new(DfaSource::TraceFinder(tf, n), props, &options);
        let mut buffer = CompilationBuffer::new();
        generator.calc_dfa(&mut buffer).unwrap();
        let dfa = generator.create_executor("trace_finder");
        assert_eq!(dfa.find_trace_result("xcde", 4, 0), Some((1, 1)));
        assert_eq!(dfa.find_trace_result("xab", 3, 0), Some((1, 0)));
    }

    #[test]
    fn budget_exceeded() {
        let options = RegexOptions {
            max_dfa_states: 3,
            ..Default::default()
        };
        let result = executor_with(nfa("abcdef", ""), true, true, &options);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().reason(), "too many DFA states");
    }

    #[test]
    fn debug_names() {
        let n = nfa("a", "");
        let props = ExecutorProps {
            forward: true,
            searching: true,
            track_captures: false,
            regression_test_mode: false,
            num_capture_groups: 0,
            min_path: 1,
        };
        let options = RegexOptions::default();
        let generator = DfaGenerator::new(DfaSource::Nfa(n), props, &options);
        assert_eq!(generator.debug_name(None), "forward");
        assert_eq!(generator.debug_name(Some("nested")), "nested");
    }
}
