//! Public types: sources, flags, options, matches and the error signal.

use crate::util::to_char_sat;
use core::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Flags used to control parsing and matching.
/// The default flags are case-sensitive, not-multiline, not-sticky.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Flags {
    /// If set, make the pattern case-insensitive.
    /// Equivalent to the 'i' flag in JavaScript.
    pub icase: bool,

    /// If set, ^ and $ match at line separators, not just the input boundaries.
    /// Equivalent to the 'm' flag in JavaScript.
    pub multiline: bool,

    /// If set, . matches at line separators as well as any other character.
    /// Equivalent to the 's' flag in JavaScript.
    pub dot_all: bool,

    /// If set, the pattern is interpreted as a Unicode pattern.
    /// Equivalent to the 'u' flag in JavaScript.
    pub unicode: bool,

    /// If set, a match must begin exactly at the search start.
    /// Equivalent to the 'y' flag in JavaScript.
    pub sticky: bool,
}

impl Flags {
    /// Construct a Flags from a Unicode code point iterator, using
    /// JavaScript flag letters. Unknown letters are silently skipped.
    #[inline]
    pub fn new<T: Iterator<Item = u32>>(chars: T) -> Self {
        let mut result = Self::default();
        for c in chars {
            match to_char_sat(c) {
                'i' => result.icase = true,
                'm' => result.multiline = true,
                's' => result.dot_all = true,
                'u' => result.unicode = true,
                'y' => result.sticky = true,
                _ => {}
            }
        }
        result
    }
}

impl From<&str> for Flags {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s.chars().map(u32::from))
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.icase {
            f.write_str("i")?;
        }
        if self.multiline {
            f.write_str("m")?;
        }
        if self.dot_all {
            f.write_str("s")?;
        }
        if self.unicode {
            f.write_str("u")?;
        }
        if self.sticky {
            f.write_str("y")?;
        }
        Ok(())
    }
}

/// The syntax flavor a pattern is written in. Non-ECMAScript flavors are
/// rewritten to ECMAScript before parsing.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Flavor {
    #[default]
    EcmaScript,
    Pcre,
}

/// The immutable input of a compilation: pattern, flags and flavor.
/// Two sources are the same compilation iff they compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegexSource {
    pub pattern: String,
    pub flags: Flags,
    pub flavor: Flavor,
}

impl RegexSource {
    pub fn new(pattern: impl Into<String>, flags: impl Into<Flags>) -> Self {
        Self {
            pattern: pattern.into(),
            flags: flags.into(),
            flavor: Flavor::EcmaScript,
        }
    }

    pub fn with_flavor(pattern: impl Into<String>, flags: impl Into<Flags>, flavor: Flavor) -> Self {
        Self {
            pattern: pattern.into(),
            flags: flags.into(),
            flavor,
        }
    }
}

impl fmt::Display for RegexSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

/// Static configuration of the compiler, read-only for the life of a
/// request.
#[derive(Debug, Clone)]
pub struct RegexOptions {
    /// Force eager capture-group-tracking DFA construction. Used by
    /// regression tests to cross-check the lazy machinery.
    pub regression_test_mode: bool,

    /// Write Graphviz/LaTeX/JSON renditions of every automaton built.
    pub dump_automata: bool,

    /// Directory the automaton dumps are written to.
    pub dump_path: PathBuf,

    /// Allow TraceFinder construction for loop-free patterns.
    pub trace_finder: bool,

    /// Upper bound on NFA states before construction bails out.
    pub max_nfa_states: u32,

    /// Upper bound on DFA states before construction bails out.
    pub max_dfa_states: u32,
}

impl Default for RegexOptions {
    fn default() -> Self {
        Self {
            regression_test_mode: false,
            dump_automata: false,
            dump_path: PathBuf::from("."),
            trace_finder: true,
            max_nfa_states: 2048,
            max_dfa_states: 4096,
        }
    }
}

/// Signal that a pattern falls outside the supported feature set, or that
/// a construction limit was exceeded. Carries a human-readable reason and,
/// once the coordinator has handled it, the offending source.
#[derive(Debug, Clone)]
pub struct Unsupported {
    reason: String,
    source: Option<RegexSource>,
}

impl Unsupported {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn source(&self) -> Option<&RegexSource> {
        self.source.as_ref()
    }

    pub(crate) fn set_reason(&mut self, reason: String) {
        self.reason = reason;
    }

    pub(crate) fn set_source(&mut self, source: RegexSource) {
        self.source = Some(source);
    }
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.reason, source),
            None => f.write_str(&self.reason),
        }
    }
}

impl std::error::Error for Unsupported {}

/// Range expresses the extent of a match as byte indexes into the input.
pub type Range = core::ops::Range<usize>;

/// A Match represents a portion of a string which was matched.
#[derive(Debug, Clone)]
pub struct Match {
    /// The total range of the match. This may be empty if the pattern
    /// matched the empty string.
    pub range: Range,

    /// One entry per capture group in the pattern. `None` means the group
    /// did not participate in the match.
    pub captures: Vec<Option<Range>>,

    /// Capture group names, parallel to `captures`. `None` for unnamed
    /// groups. Shared across all matches of one compilation.
    pub(crate) group_names: Arc<[Option<String>]>,
}

impl Match {
    pub(crate) fn new(
        range: Range,
        captures: Vec<Option<Range>>,
        group_names: Arc<[Option<String>]>,
    ) -> Self {
        debug_assert_eq!(captures.len(), group_names.len());
        Self {
            range,
            captures,
            group_names,
        }
    }

    /// Access a group by index. Index 0 is the total match, index 1 the
    /// first capture group.
    #[inline]
    pub fn group(&self, idx: usize) -> Option<Range> {
        if idx == 0 {
            Some(self.range.clone())
        } else {
            self.captures.get(idx - 1)?.clone()
        }
    }

    /// Access a named capture group.
    pub fn named_group(&self, name: &str) -> Option<Range> {
        let pos = self
            .group_names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.captures[pos].clone()
    }

    /// Iterate the total match followed by every capture group.
    pub fn groups(&self) -> impl Iterator<Item = Option<Range>> + '_ {
        (0..=self.captures.len()).map(|i| self.group(i))
    }

    /// Iterate the named capture groups as (name, range) pairs.
    pub fn named_groups(&self) -> impl Iterator<Item = (&str, Option<Range>)> + '_ {
        self.group_names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| Some((n.as_deref()?, self.captures[i].clone())))
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.range.clone()
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.range.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.range.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_roundtrip() {
        let flags = Flags::from("imy");
        assert!(flags.icase && flags.multiline && flags.sticky);
        assert!(!flags.dot_all && !flags.unicode);
        assert_eq!(flags.to_string(), "imy");
    }

    #[test]
    fn flags_skip_unknown() {
        let flags = Flags::from("gxi");
        assert!(flags.icase);
        assert_eq!(flags.to_string(), "i");
    }

    #[test]
    fn source_display() {
        let source = RegexSource::new("a|b", "m");
        assert_eq!(source.to_string(), "/a|b/m");
    }

    #[test]
    fn match_groups() {
        let names: Arc<[Option<String>]> = vec![None, Some("year".to_string())].into();
        let m = Match::new(0..4, vec![Some(0..2), Some(2..4)], names);
        assert_eq!(m.group(0), Some(0..4));
        assert_eq!(m.group(1), Some(0..2));
        assert_eq!(m.named_group("year"), Some(2..4));
        assert_eq!(m.named_group("month"), None);
        assert_eq!(m.groups().count(), 3);
    }
}
