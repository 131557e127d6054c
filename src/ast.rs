//! The abstract syntax tree produced by the pattern parser.

use crate::api::{Flags, RegexSource};
use crate::codepointset::CodePointSet;
use crate::props::RegexProperties;
use core::fmt;
use std::sync::Arc;

/// A capture group index. Group 0 is the first explicit capture group.
pub type CaptureGroupId = u16;

/// The maximum number of capture groups supported.
pub const MAX_CAPTURE_GROUPS: usize = 65535;

/// Sentinel length for paths that can never reach the accept state.
const UNREACHABLE: usize = usize::MAX >> 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnchorKind {
    LineStart, // ^
    LineEnd,   // $
}

/// A quantifier. `max` of None means unbounded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Quantifier {
    pub min: u32,
    pub max: Option<u32>,
    pub greedy: bool,
}

impl Quantifier {
    /// \return whether the quantifier admits a variable number of
    /// iterations, as opposed to an exact repetition count.
    pub fn is_variable(&self) -> bool {
        self.max != Some(self.min)
    }
}

/// The node types of the AST.
#[derive(Debug, Clone)]
pub enum Node {
    /// Matches the empty string.
    Empty,

    /// Match a literal character. Case folding has already been applied:
    /// icase characters with a nontrivial closure become a `Class`.
    Char(char),

    /// Match any of a set of code points. Bracket inversion and `.` have
    /// been resolved into the set by the parser.
    Class(CodePointSet),

    /// Match the catenation of nodes.
    Cat(Vec<Node>),

    /// Match one of several alternatives, in priority order.
    Alt(Vec<Node>),

    /// ^ or $.
    Anchor(AnchorKind),

    /// \b or \B.
    WordBoundary { negate: bool },

    /// A group. `capture` is None for (?:...) groups.
    Group {
        capture: Option<CaptureGroupId>,
        node: Box<Node>,
    },

    /// A quantified node. `enclosed_groups` is the range of capture group
    /// ids defined inside the body.
    Loop {
        node: Box<Node>,
        quant: Quantifier,
        enclosed_groups: core::ops::Range<u16>,
    },

    /// A lookaround assertion like (?=...), (?!...), (?<=...) or (?<!...).
    Lookaround {
        behind: bool,
        negate: bool,
        node: Box<Node>,
    },

    /// A backreference like \1 or \k<name>.
    BackRef(u32),
}

impl Node {
    /// Call `func` on this node and all descendants, preorder.
    pub fn walk<F>(&self, func: &mut F)
    where
        F: FnMut(&Node),
    {
        func(self);
        match self {
            Node::Empty
            | Node::Char(..)
            | Node::Class(..)
            | Node::Anchor(..)
            | Node::WordBoundary { .. }
            | Node::BackRef(..) => {}
            Node::Cat(nodes) | Node::Alt(nodes) => {
                for node in nodes {
                    node.walk(func);
                }
            }
            Node::Group { node, .. } | Node::Loop { node, .. } | Node::Lookaround { node, .. } => {
                node.walk(func)
            }
        }
    }

    /// \return the number of nodes in this subtree, including self.
    pub fn count(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }

    /// \return the minimum number of characters any match of this subtree
    /// consumes.
    pub fn min_path(&self) -> usize {
        match self {
            Node::Empty
            | Node::Anchor(..)
            | Node::WordBoundary { .. }
            | Node::Lookaround { .. }
            | Node::BackRef(..) => 0,
            Node::Char(..) => 1,
            Node::Class(set) => {
                if set.is_empty() {
                    UNREACHABLE
                } else {
                    1
                }
            }
            Node::Cat(nodes) => nodes
                .iter()
                .fold(0usize, |acc, n| acc.saturating_add(n.min_path()))
                .min(UNREACHABLE),
            Node::Alt(nodes) => nodes.iter().map(Node::min_path).min().unwrap_or(0),
            Node::Group { node, .. } => node.min_path(),
            Node::Loop { node, quant, .. } => node
                .min_path()
                .saturating_mul(quant.min as usize)
                .min(UNREACHABLE),
        }
    }

    /// \return the width of this subtree in characters if every match
    /// consumes exactly that many, else None.
    pub fn fixed_char_width(&self) -> Option<usize> {
        match self {
            Node::Empty | Node::Anchor(..) | Node::WordBoundary { .. } | Node::Lookaround { .. } => {
                Some(0)
            }
            Node::Char(..) => Some(1),
            Node::Class(set) => (!set.is_empty()).then_some(1),
            Node::Cat(nodes) => {
                let mut total = 0usize;
                for n in nodes {
                    total = total.checked_add(n.fixed_char_width()?)?;
                }
                Some(total)
            }
            Node::Alt(nodes) => {
                let mut widths = nodes.iter().map(Node::fixed_char_width);
                let first = widths.next()??;
                widths.all(|w| w == Some(first)).then_some(first)
            }
            Node::Group { node, .. } => node.fixed_char_width(),
            Node::Loop { node, quant, .. } => {
                if quant.is_variable() {
                    return None;
                }
                node.fixed_char_width()?.checked_mul(quant.min as usize)
            }
            Node::BackRef(..) => None,
        }
    }

    /// \return true if this node provably matches nothing.
    /// Catenation is deliberately not propagated; dead catenations are
    /// discovered by reachability on the NFA instead.
    pub fn match_always_fails(&self) -> bool {
        match self {
            Node::Class(set) => set.is_empty(),
            Node::Alt(nodes) => !nodes.is_empty() && nodes.iter().all(Node::match_always_fails),
            Node::Group { node, .. } => node.match_always_fails(),
            Node::Loop { node, quant, .. } => quant.min > 0 && node.match_always_fails(),
            Node::Lookaround { negate: false, node, .. } => node.match_always_fails(),
            _ => false,
        }
    }

    /// \return whether every match of this subtree ends with a $ anchor.
    pub fn is_end_anchored(&self) -> bool {
        match self {
            Node::Anchor(AnchorKind::LineEnd) => true,
            Node::Cat(nodes) => nodes.last().is_some_and(Node::is_end_anchored),
            Node::Alt(nodes) => !nodes.is_empty() && nodes.iter().all(Node::is_end_anchored),
            Node::Group { node, .. } => node.is_end_anchored(),
            _ => false,
        }
    }

    /// \return whether a lookbehind with this body is "literal": a fixed
    /// width catenation of plain character matchers.
    pub fn is_literal_lookbehind_body(&self) -> bool {
        fn literal(node: &Node) -> bool {
            match node {
                Node::Empty | Node::Char(..) => true,
                Node::Class(set) => !set.is_empty(),
                Node::Cat(nodes) => nodes.iter().all(literal),
                Node::Group { node, .. } => literal(node),
                _ => false,
            }
        }
        literal(self)
    }
}

/// A parsed pattern, with the analyses the rest of the pipeline consumes.
#[derive(Debug)]
pub struct RegexAst {
    source: RegexSource,
    root: Node,
    flags: Flags,
    props: RegexProperties,
    num_capture_groups: u16,
    group_names: Arc<[Option<String>]>,
    number_of_nodes: usize,
    min_path: usize,
    dead: bool,
}

impl RegexAst {
    pub(crate) fn new(
        source: RegexSource,
        root: Node,
        flags: Flags,
        num_capture_groups: u16,
        group_names: Arc<[Option<String>]>,
    ) -> Self {
        Self {
            source,
            root,
            flags,
            props: RegexProperties::default(),
            num_capture_groups,
            group_names,
            number_of_nodes: 0,
            min_path: 0,
            dead: false,
        }
    }

    /// Run the post-parse analyses the automaton builders rely on.
    pub(crate) fn prepare_for_dfa(&mut self) {
        self.props = RegexProperties::analyze(&self.root);
        self.number_of_nodes = self.root.count();
        self.min_path = self.root.min_path();
        self.dead = self.root.match_always_fails();
    }

    pub fn source(&self) -> &RegexSource {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn properties(&self) -> &RegexProperties {
        &self.props
    }

    pub fn num_capture_groups(&self) -> u16 {
        self.num_capture_groups
    }

    pub fn group_names(&self) -> Arc<[Option<String>]> {
        self.group_names.clone()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.number_of_nodes
    }

    pub fn min_path(&self) -> usize {
        self.min_path
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// \return whether the pattern is anchored at its end, meaning a
    /// backward search never needs an unanchored entry.
    pub fn is_end_anchored(&self) -> bool {
        !self.flags.multiline && self.root.is_end_anchored()
    }
}

fn display_node(node: &Node, depth: usize, f: &mut fmt::Formatter) -> fmt::Result {
    for _ in 0..depth {
        write!(f, "..")?;
    }
    match node {
        Node::Empty => writeln!(f, "Empty"),
        Node::Char(c) => writeln!(f, "'{c}'"),
        Node::Class(set) => writeln!(f, "Class {set}"),
        Node::Cat(nodes) => {
            writeln!(f, "Cat")?;
            nodes.iter().try_for_each(|n| display_node(n, depth + 1, f))
        }
        Node::Alt(nodes) => {
            writeln!(f, "Alt")?;
            nodes.iter().try_for_each(|n| display_node(n, depth + 1, f))
        }
        Node::Anchor(kind) => writeln!(f, "Anchor {kind:?}"),
        Node::WordBoundary { negate } => {
            writeln!(f, "WordBoundary {}", if *negate { "\\B" } else { "\\b" })
        }
        Node::Group { capture, node } => {
            match capture {
                Some(idx) => writeln!(f, "Group {idx}")?,
                None => writeln!(f, "Group")?,
            }
            display_node(node, depth + 1, f)
        }
        Node::Loop { node, quant, .. } => {
            match quant.max {
                Some(max) => writeln!(f, "Loop {{{},{}}}", quant.min, max)?,
                None => writeln!(f, "Loop {{{},}}", quant.min)?,
            }
            display_node(node, depth + 1, f)
        }
        Node::Lookaround { behind, negate, node } => {
            let sense = if *negate { "negative" } else { "positive" };
            let dir = if *behind { "lookbehind" } else { "lookahead" };
            writeln!(f, "Lookaround {sense} {dir}")?;
            display_node(node, depth + 1, f)
        }
        Node::BackRef(group) => writeln!(f, "BackRef {group}"),
    }
}

impl fmt::Display for RegexAst {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        display_node(&self.root, 0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codepointset::Interval;

    fn class(first: char, last: char) -> Node {
        let mut set = CodePointSet::new();
        set.add(Interval::new(first as u32, last as u32));
        Node::Class(set)
    }

    #[test]
    fn min_path_basics() {
        let node = Node::Cat(vec![Node::Char('a'), class('0', '9'), Node::Empty]);
        assert_eq!(node.min_path(), 2);

        let alt = Node::Alt(vec![Node::Char('a'), Node::Cat(vec![Node::Char('b'), Node::Char('c')])]);
        assert_eq!(alt.min_path(), 1);

        let looped = Node::Loop {
            node: Box::new(Node::Char('x')),
            quant: Quantifier { min: 3, max: None, greedy: true },
            enclosed_groups: 0..0,
        };
        assert_eq!(looped.min_path(), 3);
    }

    #[test]
    fn fixed_width() {
        let node = Node::Cat(vec![Node::Char('a'), class('0', '9')]);
        assert_eq!(node.fixed_char_width(), Some(2));

        let star = Node::Loop {
            node: Box::new(Node::Char('x')),
            quant: Quantifier { min: 0, max: None, greedy: true },
            enclosed_groups: 0..0,
        };
        assert_eq!(star.fixed_char_width(), None);

        let alt_same = Node::Alt(vec![Node::Char('a'), Node::Char('b')]);
        assert_eq!(alt_same.fixed_char_width(), Some(1));
    }

    #[test]
    fn dead_detection() {
        let empty_class = Node::Class(CodePointSet::new());
        assert!(empty_class.match_always_fails());

        let alt = Node::Alt(vec![Node::Class(CodePointSet::new()), Node::Char('a')]);
        assert!(!alt.match_always_fails());

        // Catenation deadness is left to NFA reachability.
        let cat = Node::Cat(vec![Node::Char('a'), Node::Class(CodePointSet::new())]);
        assert!(!cat.match_always_fails());
    }

    #[test]
    fn end_anchoring() {
        let anchored = Node::Cat(vec![Node::Char('a'), Node::Anchor(AnchorKind::LineEnd)]);
        assert!(anchored.is_end_anchored());
        assert!(!Node::Char('a').is_end_anchored());
    }
}
