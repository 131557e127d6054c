//! The compilation coordinator.
//!
//! A [`CompilationRequest`] drives the staged pipeline for one pattern:
//! parse, feature gate, literal shortcut, NFA construction, optional
//! TraceFinder construction, DFA construction. Each request is strictly
//! single-threaded and owns its scratch buffer; any number of requests
//! may run in parallel on independent [`Compiler`] handles or one shared
//! one.

use crate::api::{RegexOptions, RegexSource, Unsupported};
use crate::ast::RegexAst;
use crate::buffer::CompilationBuffer;
use crate::dfa::{DfaExecutor, DfaGenerator, DfaSource, ExecutorProps};
use crate::dump;
use crate::flavor;
use crate::literal::LiteralEngine;
use crate::matcher::{
    CompiledMatcher, DeadMatcher, EagerDfaMatcher, LazyCaptureGroupSearch, NfaExecMatcher,
};
use crate::nfa::{Nfa, NfaGenerator};
use crate::parse::Parser;
use crate::props::RegexProperties;
use crate::result::{pre_calc_single_result, PreCalcResultFactory};
use crate::tracefinder::{TraceFinderGenerator, TraceFinderNfa};
use crate::util::{loggers, should_log_phases, PhaseTimer};
use std::sync::Arc;

/// The compiler engine: owns the options and hands out requests.
#[derive(Debug, Default)]
pub struct Compiler {
    options: RegexOptions,
}

impl Compiler {
    pub fn new(options: RegexOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RegexOptions {
        &self.options
    }

    /// Compile `source` into its default matcher. In regression-test
    /// mode the interpreter root is replaced by an eagerly compiled
    /// capture-tracking DFA, reusing the request's NFA.
    pub fn compile(&self, source: RegexSource) -> Result<CompiledMatcher, Unsupported> {
        let mut request = CompilationRequest::new(self, source);
        let matcher = request.compile()?;
        if self.options.regression_test_mode {
            if let CompiledMatcher::NfaExec(root) = &matcher {
                let mut eager = CompilationRequest::with_nfa(self, root.nfa().clone());
                let executor = eager.compile_eager_dfa_executor()?;
                return Ok(CompiledMatcher::EagerDfa(EagerDfaMatcher::new(executor)));
            }
        }
        Ok(matcher)
    }

    /// Compile `source` and, when the default matcher is the
    /// interpreter, assemble the lazy DFA search up front.
    pub fn compile_search(&self, source: RegexSource) -> Result<CompiledMatcher, Unsupported> {
        let mut request = CompilationRequest::new(self, source);
        match request.compile()? {
            CompiledMatcher::NfaExec(root) => {
                let search = request.compile_lazy_dfa_executor(&root)?;
                Ok(CompiledMatcher::LazyDfaSearch(search))
            }
            other => Ok(other),
        }
    }
}

/// Reject patterns using features outside the supported subset. The
/// checks run in a fixed order so the reported reason is stable.
pub fn check_feature_support(properties: &RegexProperties) -> Result<(), Unsupported> {
    if properties.has_back_references {
        return Err(Unsupported::new("backreferences not supported"));
    }
    if properties.has_large_counted_repetitions {
        return Err(Unsupported::new("bounds of range quantifier too high"));
    }
    if properties.has_negative_look_ahead {
        return Err(Unsupported::new("negative lookahead assertions not supported"));
    }
    if properties.has_non_literal_look_behind {
        return Err(Unsupported::new("body of lookbehind assertion too complex"));
    }
    if properties.has_negative_look_behind {
        return Err(Unsupported::new("negative lookbehind assertions not supported"));
    }
    Ok(())
}

/// The gate as a predicate.
pub fn is_supported(properties: &RegexProperties) -> bool {
    check_feature_support(properties).is_ok()
}

fn compiler_result_to_string(matcher: &CompiledMatcher) -> &'static str {
    match matcher {
        CompiledMatcher::NfaExec(..)
        | CompiledMatcher::LazyDfaSearch(..)
        | CompiledMatcher::EagerDfa(..) => "tregex",
        CompiledMatcher::Literal(..) => "literal",
        CompiledMatcher::Dead(..) => "dead",
    }
}

/// One single-shot compilation of one pattern. Stages run at most once
/// and in order; the intermediate representations stay alive until the
/// request is dropped.
pub struct CompilationRequest<'c> {
    compiler: &'c Compiler,
    source: RegexSource,
    ast: Option<Arc<RegexAst>>,
    nfa: Option<Arc<Nfa>>,
    trace_finder_nfa: Option<Arc<TraceFinderNfa>>,
    dfa_states_forward: usize,
    dfa_states_backward: usize,
    dfa_states_capture_groups: usize,
    buffer: CompilationBuffer,
    timer: Option<PhaseTimer>,
}

impl<'c> CompilationRequest<'c> {
    pub fn new(compiler: &'c Compiler, source: RegexSource) -> Self {
        Self {
            compiler,
            source,
            ast: None,
            nfa: None,
            trace_finder_nfa: None,
            dfa_states_forward: 0,
            dfa_states_backward: 0,
            dfa_states_capture_groups: 0,
            buffer: CompilationBuffer::new(),
            timer: should_log_phases().then(PhaseTimer::new),
        }
    }

    /// Start from a pre-built NFA; used to compile eager DFA executors
    /// without re-running the front half of the pipeline.
    pub fn with_nfa(compiler: &'c Compiler, nfa: Arc<Nfa>) -> Self {
        let mut request = Self::new(compiler, nfa.ast().source().clone());
        request.ast = Some(nfa.ast().clone());
        request.nfa = Some(nfa);
        request
    }

    pub fn ast(&self) -> Option<&Arc<RegexAst>> {
        self.ast.as_ref()
    }

    pub fn nfa(&self) -> Option<&Arc<Nfa>> {
        self.nfa.as_ref()
    }

    pub fn trace_finder_nfa(&self) -> Option<&Arc<TraceFinderNfa>> {
        self.trace_finder_nfa.as_ref()
    }

    /// Run the full pipeline and select the matcher variant. Emits one
    /// automaton-size record either way; an `Unsupported` is re-raised
    /// with its reason prefixed and the source attached.
    pub fn compile(&mut self) -> Result<CompiledMatcher, Unsupported> {
        match self.compile_internal() {
            Ok(matcher) => {
                self.log_automaton_sizes(compiler_result_to_string(&matcher));
                Ok(matcher)
            }
            Err(mut e) => {
                self.log_automaton_sizes("bailout");
                e.set_reason(format!("TRegex: {}", e.reason()));
                e.set_source(self.source.clone());
                Err(e)
            }
        }
    }

    fn compile_internal(&mut self) -> Result<CompiledMatcher, Unsupported> {
        log::trace!(
            target: loggers::COMPILATIONS,
            "TRegex compiling {}",
            self.source
        );
        self.create_ast()?;
        let ast = self.ast.clone().expect("AST was just built");
        check_feature_support(ast.properties())?;
        if ast.is_dead() {
            return Ok(CompiledMatcher::Dead(DeadMatcher::new(self.source.clone())));
        }
        if let Some(literal) = LiteralEngine::try_create(&ast) {
            return Ok(CompiledMatcher::Literal(literal));
        }
        self.create_nfa()?;
        let nfa = self.nfa.clone().expect("NFA was just built");
        if nfa.is_dead() {
            return Ok(CompiledMatcher::Dead(DeadMatcher::new(self.source.clone())));
        }
        Ok(CompiledMatcher::NfaExec(NfaExecMatcher::new(
            nfa,
            self.compiler.options.regression_test_mode,
        )))
    }

    /// Assemble the lazy capture-group search for `root`. The AST and
    /// NFA must already be built by a prior `compile`.
    pub fn compile_lazy_dfa_executor(
        &mut self,
        root: &NfaExecMatcher,
    ) -> Result<LazyCaptureGroupSearch, Unsupported> {
        assert!(self.ast.is_some(), "AST must be built before the lazy DFA");
        assert!(self.nfa.is_some(), "NFA must be built before the lazy DFA");
        let ast = self.ast.clone().unwrap();
        let nfa = self.nfa.clone().unwrap();
        let properties = *ast.properties();

        let mut pre_calculated_results: Option<Vec<PreCalcResultFactory>> = None;
        if !(properties.has_alternations || properties.has_look_around_assertions) {
            pre_calculated_results = pre_calc_single_result(&ast).map(|f| vec![f]);
        }
        if pre_calculated_results.is_none()
            && self.compiler.options.trace_finder
            && !properties.has_loops
        {
            self.phase_start("TraceFinder NFA");
            match TraceFinderGenerator::generate(&nfa) {
                Ok(tf) => {
                    let tf = Arc::new(tf);
                    pre_calculated_results = Some(tf.pre_calculated_results().to_vec());
                    self.trace_finder_nfa = Some(tf);
                    self.phase_end("TraceFinder NFA");
                    self.debug_trace_finder();
                }
                Err(e) => {
                    // Recoverable: fall through to the capture tracker.
                    self.phase_end("TraceFinder NFA");
                    log::debug!(
                        target: loggers::BAILOUT,
                        "TraceFinder: {}: {}",
                        e.reason(),
                        self.source
                    );
                }
            }
        }

        let create_capture_tracker = (properties.has_capture_groups
            || properties.has_look_around_assertions)
            && pre_calculated_results.is_none();

        let executor_forward = self.create_dfa_executor(&nfa, true, true, false)?;
        self.dfa_states_forward = executor_forward.num_states();

        let mut executor_capture_groups = None;
        if create_capture_tracker {
            let executor = self.create_dfa_executor(&nfa, true, false, true)?;
            self.dfa_states_capture_groups = executor.num_states();
            executor_capture_groups = Some(executor);
        }

        let mut executor_backward = None;
        if pre_calculated_results.as_ref().is_some_and(|r| r.len() > 1) {
            let tf = self
                .trace_finder_nfa
                .clone()
                .expect("multiple results imply a trace finder");
            let executor = self.create_dfa_executor_from(
                DfaSource::TraceFinder(tf, nfa.clone()),
                executor_props(&nfa, false, false, false, &self.compiler.options),
                Some("trace_finder"),
            )?;
            executor_backward = Some(executor);
        } else if pre_calculated_results.is_none() || !nfa.has_reverse_unanchored_entry() {
            executor_backward = Some(self.create_dfa_executor(&nfa, false, false, false)?);
        }
        if let Some(executor) = &executor_backward {
            self.dfa_states_backward = executor.num_states();
        }

        self.log_automaton_sizes("tregex");
        Ok(LazyCaptureGroupSearch::new(
            nfa,
            pre_calculated_results,
            root.create_entry_node(Some(executor_forward))
                .expect("forward executor is always built"),
            root.create_entry_node(executor_backward),
            root.create_entry_node(executor_capture_groups),
        ))
    }

    /// Build AST and NFA if absent, then a single forward searching DFA
    /// with capture tracking. The pattern must be supported and live;
    /// violations are programming errors.
    pub fn compile_eager_dfa_executor(&mut self) -> Result<DfaExecutor, Unsupported> {
        if self.ast.is_none() {
            self.create_ast()?;
        }
        let ast = self.ast.clone().unwrap();
        assert!(
            is_supported(ast.properties()),
            "eager DFA requires a supported pattern"
        );
        assert!(!ast.is_dead(), "eager DFA requires a live pattern");
        if self.nfa.is_none() {
            self.create_nfa()?;
        }
        let nfa = self.nfa.clone().unwrap();
        self.create_dfa_executor(&nfa, true, true, true)
    }

    fn create_ast(&mut self) -> Result<(), Unsupported> {
        let mut parser = self.create_parser()?;
        self.phase_start("Parser");
        let mut ast = parser.parse()?;
        parser.prepare_for_dfa(&mut ast);
        self.phase_end("Parser");
        self.ast = Some(Arc::new(ast));
        self.debug_ast();
        Ok(())
    }

    fn create_parser(&mut self) -> Result<Parser, Unsupported> {
        let source = self.source.clone();
        let ecmascript_source = match flavor::for_regex(&source) {
            Some(processor) => {
                self.phase_start("Flavor");
                let translated = processor.to_ecmascript()?;
                self.phase_end("Flavor");
                translated
            }
            None => source.clone(),
        };
        self.buffer.reset();
        Parser::new(
            &ecmascript_source,
            &self.compiler.options,
            &mut self.buffer,
        )
    }

    fn create_nfa(&mut self) -> Result<(), Unsupported> {
        let ast = self.ast.clone().expect("AST must be built before the NFA");
        self.phase_start("NFA");
        self.buffer.reset();
        let nfa = NfaGenerator::create(&ast, &mut self.buffer, &self.compiler.options)?;
        self.phase_end("NFA");
        self.nfa = Some(Arc::new(nfa));
        self.debug_nfa();
        Ok(())
    }

    fn create_dfa_executor(
        &mut self,
        nfa: &Arc<Nfa>,
        forward: bool,
        searching: bool,
        track_captures: bool,
    ) -> Result<DfaExecutor, Unsupported> {
        let props = executor_props(nfa, forward, searching, track_captures, &self.compiler.options);
        self.create_dfa_executor_from(DfaSource::Nfa(nfa.clone()), props, None)
    }

    /// The DFA construction re-entry point. Subordinate executors are
    /// compiled through here as well, so the request stays the only
    /// owner of the scratch buffer.
    pub fn create_dfa_executor_from(
        &mut self,
        source: DfaSource,
        props: ExecutorProps,
        debug_name: Option<&str>,
    ) -> Result<DfaExecutor, Unsupported> {
        let options = self.compiler.options();
        let mut generator = DfaGenerator::new(source, props, options);
        let name = generator.debug_name(debug_name);
        let phase = format!("{name} DFA");
        self.phase_start(&phase);
        self.buffer.reset();
        generator.calc_dfa(&mut self.buffer)?;
        let executor = generator.create_executor(&name);
        self.phase_end(&phase);
        self.debug_dfa(&executor);
        Ok(executor)
    }

    fn phase_start(&mut self, phase: &str) {
        if let Some(timer) = &mut self.timer {
            timer.start(phase);
        }
    }

    fn phase_end(&mut self, phase: &str) {
        if let Some(timer) = &mut self.timer {
            timer.end(phase);
        }
    }

    fn debug_ast(&self) {
        if self.compiler.options.dump_automata {
            if let Some(ast) = &self.ast {
                dump::dump_ast(ast, &self.compiler.options.dump_path);
            }
        }
    }

    fn debug_nfa(&self) {
        if self.compiler.options.dump_automata {
            if let Some(nfa) = &self.nfa {
                dump::dump_nfa(nfa, &self.compiler.options.dump_path);
            }
        }
    }

    fn debug_trace_finder(&self) {
        if self.compiler.options.dump_automata {
            if let Some(tf) = &self.trace_finder_nfa {
                dump::dump_trace_finder(tf, &self.compiler.options.dump_path);
            }
        }
    }

    fn debug_dfa(&self, executor: &DfaExecutor) {
        if self.compiler.options.dump_automata {
            dump::dump_dfa(executor, &self.compiler.options.dump_path);
        }
    }

    /// Emit the structured size record for this request. Exactly one is
    /// produced per `compile` call, on success and on bailout alike.
    fn log_automaton_sizes(&self, compiler_result: &str) {
        if !log::log_enabled!(target: loggers::AUTOMATON_SIZES, log::Level::Debug) {
            return;
        }
        let properties = self
            .ast
            .as_ref()
            .map(|ast| *ast.properties())
            .unwrap_or_default();
        let record = serde_json::json!({
            "pattern": self.source.pattern,
            "flags": self.source.flags.to_string(),
            "props": properties,
            "astNodes": self.ast.as_ref().map_or(0, |ast| ast.number_of_nodes()),
            "nfaStates": self.nfa.as_ref().map_or(0, |nfa| nfa.num_states()),
            "nfaTransitions": self.nfa.as_ref().map_or(0, |nfa| nfa.num_transitions()),
            "dfaStatesFwd": self.dfa_states_forward,
            "dfaStatesBck": self.dfa_states_backward,
            "dfaStatesCG": self.dfa_states_capture_groups,
            "traceFinder": self.trace_finder_nfa.is_some(),
            "compilerResult": compiler_result,
        });
        log::debug!(target: loggers::AUTOMATON_SIZES, "{record}");
    }
}

fn executor_props(
    nfa: &Arc<Nfa>,
    forward: bool,
    searching: bool,
    track_captures: bool,
    options: &RegexOptions,
) -> ExecutorProps {
    ExecutorProps {
        forward,
        searching,
        track_captures,
        regression_test_mode: options.regression_test_mode,
        num_capture_groups: nfa.ast().num_capture_groups(),
        min_path: nfa.ast().min_path(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(adjust: impl FnOnce(&mut RegexProperties)) -> RegexProperties {
        let mut p = RegexProperties::default();
        adjust(&mut p);
        p
    }

    #[test]
    fn gate_accepts_plain_patterns() {
        assert!(check_feature_support(&RegexProperties::default()).is_ok());
        assert!(is_supported(&props(|p| {
            p.has_alternations = true;
            p.has_capture_groups = true;
            p.has_loops = true;
        })));
    }

    #[test]
    fn gate_reasons_are_canonical() {
        let cases: [(&str, fn(&mut RegexProperties)); 5] = [
            ("backreferences not supported", |p| {
                p.has_back_references = true
            }),
            ("bounds of range quantifier too high", |p| {
                p.has_large_counted_repetitions = true
            }),
            ("negative lookahead assertions not supported", |p| {
                p.has_negative_look_ahead = true
            }),
            ("body of lookbehind assertion too complex", |p| {
                p.has_non_literal_look_behind = true
            }),
            ("negative lookbehind assertions not supported", |p| {
                p.has_negative_look_behind = true
            }),
        ];
        for (reason, adjust) in cases {
            let mut p = RegexProperties::default();
            adjust(&mut p);
            let err = check_feature_support(&p).unwrap_err();
            assert_eq!(err.reason(), reason);
            assert!(!is_supported(&p));
        }
    }

    #[test]
    fn gate_order_is_first_match_wins() {
        let p = props(|p| {
            p.has_negative_look_behind = true;
            p.has_negative_look_ahead = true;
            p.has_back_references = true;
        });
        let err = check_feature_support(&p).unwrap_err();
        assert_eq!(err.reason(), "backreferences not supported");

        let p = props(|p| p.has_negative_look_behind = true);
        let err = check_feature_support(&p).unwrap_err();
        assert_eq!(err.reason(), "negative lookbehind assertions not supported");
    }
}
