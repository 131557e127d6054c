/*!

# tregex - a staged regex compiler with ECMAScript semantics

This crate compiles a single regex pattern (string + flags) into an
executable matcher by driving a staged pipeline: parse, feature gate,
literal shortcut, NFA construction, and optional TraceFinder and DFA
construction. The shape of the resulting matcher depends on the features
the pattern uses.

# Example: compile and search

```rust
use tregex::{Compiler, RegexOptions, RegexSource};

let compiler = Compiler::new(RegexOptions::default());
let matcher = compiler.compile(RegexSource::new(r"(\d{4})-(\d{2})", "")).unwrap();
let m = matcher.find("due 2024-07-15").unwrap();
assert_eq!(&"due 2024-07-15"[m.range()], "2024-07");
assert_eq!(m.group(1), Some(4..8));
```

# Example: unsupported features are reported, not mis-compiled

```rust
use tregex::{Compiler, RegexOptions, RegexSource};

let compiler = Compiler::new(RegexOptions::default());
let err = compiler.compile(RegexSource::new(r"(a)\1", "")).unwrap_err();
assert_eq!(err.reason(), "TRegex: backreferences not supported");
```

# Matcher variants

A successful compilation yields exactly one of:

- **Dead**: the pattern provably matches nothing (e.g. `[]`).
- **Literal**: a constant-substring pattern, matched by plain substring
  search.
- **NfaExec**: the default. A priority backtracking interpreter over a
  tagged NFA, with exact ECMAScript semantics.
- **LazyDfaSearch**: assembled on request. A forward boundary DFA, a
  backward start locator, and either a pre-calculated result table or a
  capture tracker.
- **EagerDfa**: regression-test mode only; forces ahead-of-time DFA
  construction with capture tracking.

# Supported feature subset

The compiler targets the DFA-friendly subset of ECMAScript patterns.
Backreferences, counted repetitions with large bounds, negative
lookahead, negative lookbehind and non-literal lookbehind raise
[`Unsupported`] with a stable reason string; everything else (including
positive lookahead, literal lookbehind, word boundaries and sticky
matching) compiles.

# Observability

Four level-checked log channels (`tregex::phases`,
`tregex::compilations`, `tregex::bailout`, `tregex::automaton_sizes`)
report phase timings, per-request records, recoverable stage bailouts
and a structured JSON size record per compilation. Setting
[`RegexOptions::dump_automata`] additionally writes Graphviz/LaTeX/JSON
renditions of every automaton to [`RegexOptions::dump_path`].

*/

#![warn(clippy::all)]
#![allow(clippy::upper_case_acronyms)]

pub use crate::api::{Flags, Flavor, Match, Range, RegexOptions, RegexSource, Unsupported};
pub use crate::compile::{check_feature_support, is_supported, CompilationRequest, Compiler};
pub use crate::matcher::{CompiledMatcher, Matches};

pub mod api;
pub mod ast;
pub mod buffer;
pub mod codepointset;
pub mod compile;
pub mod dfa;
pub mod dump;
pub mod flavor;
pub mod literal;
pub mod matcher;
pub mod nfa;
pub mod nfaexec;
pub mod parse;
pub mod props;
pub mod result;
pub mod tracefinder;
mod util;
