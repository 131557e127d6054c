//! The literal engine: specialized scanners for constant-string patterns.
//!
//! Offered the AST right after the feature gate; when the whole pattern
//! is a plain character sequence (optionally anchored on either side)
//! matching reduces to substring search and no automaton is built.

use crate::api::{Range, RegexSource};
use crate::ast::{AnchorKind, Node, RegexAst};
use memchr::memmem;

/// How the needle is positioned by the pattern's anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// ^needle$
    Equals,
    /// ^needle
    StartsWith,
    /// needle$
    EndsWith,
    /// needle anywhere
    IndexOf,
}

/// A matcher for a constant-substring pattern.
#[derive(Debug)]
pub struct LiteralMatcher {
    source: RegexSource,
    kind: LiteralKind,
    needle: String,
    sticky: bool,
}

impl LiteralMatcher {
    pub fn source(&self) -> &RegexSource {
        &self.source
    }

    pub fn kind(&self) -> LiteralKind {
        self.kind
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// Find the first occurrence at or after `start`.
    pub fn find(&self, text: &str, start: usize) -> Option<Range> {
        let needle = self.needle.as_bytes();
        match self.kind {
            LiteralKind::Equals => {
                (start == 0 && text.as_bytes() == needle).then(|| 0..text.len())
            }
            LiteralKind::StartsWith => {
                (start == 0 && text.as_bytes().starts_with(needle)).then(|| 0..needle.len())
            }
            LiteralKind::EndsWith => {
                if !text.as_bytes().ends_with(needle) {
                    return None;
                }
                let at = text.len() - needle.len();
                if at < start || (self.sticky && at != start) {
                    return None;
                }
                Some(at..text.len())
            }
            LiteralKind::IndexOf => {
                let found = memmem::find(&text.as_bytes()[start..], needle)?;
                if self.sticky && found != 0 {
                    return None;
                }
                Some(start + found..start + found + needle.len())
            }
        }
    }
}

/// Recognizes constant-substring patterns.
pub struct LiteralEngine;

impl LiteralEngine {
    /// \return a literal matcher when the pattern is a constant string,
    /// else None.
    pub fn try_create(ast: &RegexAst) -> Option<LiteralMatcher> {
        let props = ast.properties();
        if props.has_capture_groups || props.has_look_around_assertions || props.has_loops {
            return None;
        }
        // Case-insensitive patterns reach here only if every character
        // folds trivially; anything else parsed into a Class node, which
        // `collect` rejects.
        let flags = ast.flags();
        let (lead, trail, needle) = collect(ast.root())?;
        if flags.multiline && (lead || trail) {
            // ^ and $ are line anchors here, not string positions.
            return None;
        }
        let kind = match (lead, trail) {
            (true, true) => LiteralKind::Equals,
            (true, false) => LiteralKind::StartsWith,
            (false, true) => LiteralKind::EndsWith,
            (false, false) => LiteralKind::IndexOf,
        };
        Some(LiteralMatcher {
            source: ast.source().clone(),
            kind,
            needle,
            sticky: flags.sticky,
        })
    }
}

/// Flatten the AST into (leading ^, trailing $, needle) if it is exactly
/// an optionally anchored character sequence.
fn collect(root: &Node) -> Option<(bool, bool, String)> {
    let nodes: &[Node] = match root {
        Node::Cat(nodes) => nodes,
        single => std::slice::from_ref(single),
    };
    let mut lead = false;
    let mut trail = false;
    let mut needle = String::new();
    for (i, node) in nodes.iter().enumerate() {
        match node {
            Node::Empty => {}
            Node::Anchor(AnchorKind::LineStart) if i == 0 => lead = true,
            Node::Anchor(AnchorKind::LineEnd) if i == nodes.len() - 1 => trail = true,
            Node::Char(c) => needle.push(*c),
            _ => return None,
        }
    }
    Some((lead, trail, needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RegexOptions, RegexSource};
    use crate::buffer::CompilationBuffer;
    use crate::parse::Parser;

    fn try_create(pattern: &str, flags: &str) -> Option<LiteralMatcher> {
        let source = RegexSource::new(pattern, flags);
        let options = RegexOptions::default();
        let mut buffer = CompilationBuffer::new();
        let mut parser = Parser::new(&source, &options, &mut buffer).unwrap();
        let mut ast = parser.parse().unwrap();
        parser.prepare_for_dfa(&mut ast);
        LiteralEngine::try_create(&ast)
    }

    #[test]
    fn kinds() {
        assert_eq!(try_create("abc", "").unwrap().kind(), LiteralKind::IndexOf);
        assert_eq!(try_create("^abc", "").unwrap().kind(), LiteralKind::StartsWith);
        assert_eq!(try_create("abc$", "").unwrap().kind(), LiteralKind::EndsWith);
        assert_eq!(try_create("^abc$", "").unwrap().kind(), LiteralKind::Equals);
        assert_eq!(try_create("", "").unwrap().kind(), LiteralKind::IndexOf);
    }

    #[test]
    fn non_literals_are_rejected() {
        assert!(try_create("a|b", "").is_none());
        assert!(try_create("a*", "").is_none());
        assert!(try_create("(a)", "").is_none());
        assert!(try_create("[ab]", "").is_none());
        assert!(try_create(".", "").is_none());
        assert!(try_create("(?=a)b", "").is_none());
        assert!(try_create(r"\bword", "").is_none());
    }

    #[test]
    fn multiline_anchors_are_rejected() {
        assert!(try_create("^abc", "m").is_none());
        assert!(try_create("abc", "m").is_some());
    }

    #[test]
    fn icase_letters_are_rejected_but_digits_pass() {
        assert!(try_create("abc", "i").is_none());
        assert!(try_create("123-456", "i").is_some());
    }

    #[test]
    fn escaped_literals_work() {
        let m = try_create(r"\n\x41", "").unwrap();
        assert_eq!(m.needle(), "\nA");
    }

    #[test]
    fn index_of_search() {
        let m = try_create("bc", "").unwrap();
        assert_eq!(m.find("abcabc", 0), Some(1..3));
        assert_eq!(m.find("abcabc", 2), Some(4..6));
        assert_eq!(m.find("ab", 0), None);
    }

    #[test]
    fn anchored_search() {
        let m = try_create("^ab", "").unwrap();
        assert_eq!(m.find("abx", 0), Some(0..2));
        assert_eq!(m.find("xab", 0), None);
        assert_eq!(m.find("abx", 1), None);

        let m = try_create("ab$", "").unwrap();
        assert_eq!(m.find("xab", 0), Some(1..3));
        assert_eq!(m.find("abx", 0), None);

        let m = try_create("^ab$", "").unwrap();
        assert_eq!(m.find("ab", 0), Some(0..2));
        assert_eq!(m.find("abc", 0), None);
    }

    #[test]
    fn empty_needle_matches_everywhere() {
        let m = try_create("", "").unwrap();
        assert_eq!(m.find("ab", 1), Some(1..1));
        assert_eq!(m.find("", 0), Some(0..0));
    }

    #[test]
    fn sticky_literal() {
        let m = try_create("b", "y").unwrap();
        assert_eq!(m.find("ab", 0), None);
        assert_eq!(m.find("ab", 1), Some(1..2));
    }
}
