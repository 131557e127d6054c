//! The compiled matcher variants and their runtime search logic.
//!
//! Exactly one variant comes out of a successful compilation; the
//! variant determines the cost model of every subsequent search.

use crate::api::{Flags, Match, RegexSource};
use crate::dfa::DfaExecutor;
use crate::literal::LiteralMatcher;
use crate::nfa::Nfa;
use crate::nfaexec;
use crate::result::PreCalcResultFactory;
use std::sync::Arc;

fn no_names() -> Arc<[Option<String>]> {
    Vec::new().into()
}

/// Accepts nothing.
#[derive(Debug)]
pub struct DeadMatcher {
    source: RegexSource,
}

impl DeadMatcher {
    pub(crate) fn new(source: RegexSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &RegexSource {
        &self.source
    }
}

/// A DFA executor wrapped for search assembly.
#[derive(Debug)]
pub struct DfaEntry {
    executor: DfaExecutor,
}

impl DfaEntry {
    pub fn executor(&self) -> &DfaExecutor {
        &self.executor
    }
}

/// The NFA-interpreter matcher. This is the default matcher of a
/// compilation and the host root the lazy DFA search is attached to.
#[derive(Debug)]
pub struct NfaExecMatcher {
    source: RegexSource,
    flags: Flags,
    nfa: Arc<Nfa>,
    num_capture_groups: u16,
    group_names: Arc<[Option<String>]>,
    regression_test_mode: bool,
}

impl NfaExecMatcher {
    pub(crate) fn new(nfa: Arc<Nfa>, regression_test_mode: bool) -> Self {
        let ast = nfa.ast().clone();
        Self {
            source: ast.source().clone(),
            flags: ast.flags(),
            num_capture_groups: ast.num_capture_groups(),
            group_names: ast.group_names(),
            nfa,
            regression_test_mode,
        }
    }

    pub fn source(&self) -> &RegexSource {
        &self.source
    }

    pub fn nfa(&self) -> &Arc<Nfa> {
        &self.nfa
    }

    pub fn num_capture_groups(&self) -> u16 {
        self.num_capture_groups
    }

    pub fn is_regression_test_mode(&self) -> bool {
        self.regression_test_mode
    }

    /// Wrap an executor for assembly into a lazy search. The entry keeps
    /// the executor together with the host it will run under.
    pub fn create_entry_node(&self, executor: Option<DfaExecutor>) -> Option<DfaEntry> {
        executor.map(|executor| DfaEntry { executor })
    }

    pub fn find(&self, text: &str, start: usize) -> Option<Match> {
        let (range, captures) = nfaexec::search(&self.nfa, text, start, self.flags)?;
        Some(Match::new(range, captures, self.group_names.clone()))
    }
}

/// The assembled lazy search: forward boundary scanner, backward start
/// locator, and either a pre-calculated result table or a capture
/// tracker.
#[derive(Debug)]
pub struct LazyCaptureGroupSearch {
    source: RegexSource,
    flags: Flags,
    pre_calculated_results: Option<Vec<PreCalcResultFactory>>,
    forward: DfaEntry,
    backward: Option<DfaEntry>,
    capture_tracker: Option<DfaEntry>,
    nfa: Arc<Nfa>,
    group_names: Arc<[Option<String>]>,
}

impl LazyCaptureGroupSearch {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        nfa: Arc<Nfa>,
        pre_calculated_results: Option<Vec<PreCalcResultFactory>>,
        forward: DfaEntry,
        backward: Option<DfaEntry>,
        capture_tracker: Option<DfaEntry>,
    ) -> Self {
        let ast = nfa.ast().clone();
        Self {
            source: ast.source().clone(),
            flags: ast.flags(),
            pre_calculated_results,
            forward,
            backward,
            capture_tracker,
            nfa,
            group_names: ast.group_names(),
        }
    }

    pub fn source(&self) -> &RegexSource {
        &self.source
    }

    pub fn pre_calculated_results(&self) -> Option<&[PreCalcResultFactory]> {
        self.pre_calculated_results.as_deref()
    }

    pub fn forward_entry(&self) -> &DfaEntry {
        &self.forward
    }

    pub fn backward_entry(&self) -> Option<&DfaEntry> {
        self.backward.as_ref()
    }

    pub fn capture_tracker_entry(&self) -> Option<&DfaEntry> {
        self.capture_tracker.as_ref()
    }

    pub fn find(&self, text: &str, start: usize) -> Option<Match> {
        if self.flags.sticky {
            // Sticky searches are anchored; the interpreter answers
            // directly.
            let (end, captures) = nfaexec::match_at(&self.nfa, text, start, self.flags)?;
            return Some(Match::new(start..end, captures, self.group_names.clone()));
        }
        let end = self.forward.executor().find_end(text, start)?;
        match &self.pre_calculated_results {
            Some(results) if results.len() >= 2 => {
                let tf = self
                    .backward
                    .as_ref()
                    .expect("multi-result searches have a trace finder executor");
                let (found, id) = tf.executor().find_trace_result(text, end, start)?;
                let (range, captures) = results[id as usize].apply(text, found);
                Some(Match::new(range, captures, self.group_names.clone()))
            }
            Some(results) => {
                let factory = &results[0];
                let found = match &self.backward {
                    Some(b) => b.executor().find_start(text, end, start)?,
                    // Fixed shape and no backward executor: the start is
                    // implied by the match length.
                    None => nfaexec::step_back(text, end, factory.length)?,
                };
                let (range, captures) = factory.apply(text, found);
                Some(Match::new(range, captures, self.group_names.clone()))
            }
            None => {
                let backward = self
                    .backward
                    .as_ref()
                    .expect("searches without pre-calculated results have a backward executor");
                let found = backward.executor().find_start(text, end, start)?;
                let resolved = match &self.capture_tracker {
                    Some(tracker) => tracker.executor().resolve_captures(text, found),
                    None => nfaexec::match_at(&self.nfa, text, found, self.flags),
                };
                match resolved {
                    Some((end, captures)) => {
                        Some(Match::new(found..end, captures, self.group_names.clone()))
                    }
                    // The boundary automata over-approximated an
                    // assertion; the interpreter is authoritative.
                    None => {
                        let (range, captures) =
                            nfaexec::search(&self.nfa, text, start, self.flags)?;
                        Some(Match::new(range, captures, self.group_names.clone()))
                    }
                }
            }
        }
    }
}

/// The eager matcher of regression-test mode: a single forward searching
/// DFA with capture tracking.
#[derive(Debug)]
pub struct EagerDfaMatcher {
    source: RegexSource,
    flags: Flags,
    executor: DfaExecutor,
    group_names: Arc<[Option<String>]>,
}

impl EagerDfaMatcher {
    pub(crate) fn new(executor: DfaExecutor) -> Self {
        let ast = executor.nfa().ast().clone();
        Self {
            source: ast.source().clone(),
            flags: ast.flags(),
            group_names: ast.group_names(),
            executor,
        }
    }

    pub fn source(&self) -> &RegexSource {
        &self.source
    }

    pub fn executor(&self) -> &DfaExecutor {
        &self.executor
    }

    pub fn find(&self, text: &str, start: usize) -> Option<Match> {
        if !self.flags.sticky {
            // The DFA scan cannot produce false negatives; bail early on
            // haystacks without any match.
            self.executor.find_end(text, start)?;
        }
        let nfa = self.executor.nfa().clone();
        let (range, captures) = nfaexec::search(&nfa, text, start, self.flags)?;
        Some(Match::new(range, captures, self.group_names.clone()))
    }
}

/// The result of a compilation: exactly one variant per request.
#[derive(Debug)]
pub enum CompiledMatcher {
    Dead(DeadMatcher),
    Literal(LiteralMatcher),
    NfaExec(NfaExecMatcher),
    LazyDfaSearch(LazyCaptureGroupSearch),
    EagerDfa(EagerDfaMatcher),
}

impl CompiledMatcher {
    pub fn source(&self) -> &RegexSource {
        match self {
            CompiledMatcher::Dead(m) => m.source(),
            CompiledMatcher::Literal(m) => m.source(),
            CompiledMatcher::NfaExec(m) => m.source(),
            CompiledMatcher::LazyDfaSearch(m) => m.source(),
            CompiledMatcher::EagerDfa(m) => m.source(),
        }
    }

    /// Find the first match at or after byte offset `start`.
    pub fn find_from(&self, text: &str, start: usize) -> Option<Match> {
        match self {
            CompiledMatcher::Dead(..) => None,
            CompiledMatcher::Literal(m) => {
                m.find(text, start).map(|r| Match::new(r, Vec::new(), no_names()))
            }
            CompiledMatcher::NfaExec(m) => m.find(text, start),
            CompiledMatcher::LazyDfaSearch(m) => m.find(text, start),
            CompiledMatcher::EagerDfa(m) => m.find(text, start),
        }
    }

    pub fn find(&self, text: &str) -> Option<Match> {
        self.find_from(text, 0)
    }

    /// Iterate non-overlapping matches.
    pub fn find_iter<'m, 't>(&'m self, text: &'t str) -> Matches<'m, 't> {
        Matches {
            matcher: self,
            text,
            offset: Some(0),
        }
    }
}

/// An iterator over non-overlapping matches.
#[derive(Debug)]
pub struct Matches<'m, 't> {
    matcher: &'m CompiledMatcher,
    text: &'t str,
    offset: Option<usize>,
}

impl Iterator for Matches<'_, '_> {
    type Item = Match;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.offset?;
        let m = self.matcher.find_from(self.text, start)?;
        self.offset = if m.range.is_empty() {
            // Step past empty matches so iteration advances.
            self.text[m.range.end..]
                .chars()
                .next()
                .map(|c| m.range.end + c.len_utf8())
        } else {
            Some(m.range.end)
        };
        Some(m)
    }
}
