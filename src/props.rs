//! The boolean property summary of a parsed pattern.
//!
//! The matcher variant selection and the feature gate are driven entirely
//! by these properties, so they are computed once, right after parsing.

use crate::ast::Node;
use serde::Serialize;

/// Counted repetitions with a bound above this are rejected by the feature
/// gate; unrolling them would blow up the NFA.
pub const MAX_COUNTED_REPETITION: u32 = 40;

/// Summary of the features a pattern uses.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexProperties {
    pub has_alternations: bool,
    pub has_capture_groups: bool,
    pub has_look_around_assertions: bool,
    pub has_back_references: bool,
    pub has_large_counted_repetitions: bool,
    pub has_negative_look_ahead: bool,
    pub has_non_literal_look_behind: bool,
    pub has_negative_look_behind: bool,
    pub has_loops: bool,
}

impl RegexProperties {
    /// Compute the properties of a pattern rooted at `root`.
    ///
    /// Word boundaries count as look-around assertions: both are
    /// zero-width assertions and route matching through the same
    /// capture-aware machinery.
    pub fn analyze(root: &Node) -> Self {
        let mut props = Self::default();
        root.walk(&mut |node| match node {
            Node::Alt(..) => props.has_alternations = true,
            Node::Group { capture: Some(_), .. } => props.has_capture_groups = true,
            Node::WordBoundary { .. } => props.has_look_around_assertions = true,
            Node::BackRef(..) => props.has_back_references = true,
            Node::Loop { quant, .. } => {
                if quant.is_variable() {
                    props.has_loops = true;
                }
                let bound = quant.max.unwrap_or(quant.min);
                if bound > MAX_COUNTED_REPETITION {
                    props.has_large_counted_repetitions = true;
                }
            }
            Node::Lookaround { behind, negate, node } => {
                props.has_look_around_assertions = true;
                match (*behind, *negate) {
                    (false, true) => props.has_negative_look_ahead = true,
                    (true, negate) => {
                        if negate {
                            props.has_negative_look_behind = true;
                        }
                        if !node.is_literal_lookbehind_body() {
                            props.has_non_literal_look_behind = true;
                        }
                    }
                    (false, false) => {}
                }
            }
            _ => {}
        });
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Quantifier;

    #[test]
    fn alternation_and_groups() {
        let node = Node::Alt(vec![
            Node::Group {
                capture: Some(0),
                node: Box::new(Node::Char('a')),
            },
            Node::Char('b'),
        ]);
        let props = RegexProperties::analyze(&node);
        assert!(props.has_alternations);
        assert!(props.has_capture_groups);
        assert!(!props.has_loops);
    }

    #[test]
    fn loops_and_counted_repetitions() {
        let fixed = Node::Loop {
            node: Box::new(Node::Char('a')),
            quant: Quantifier { min: 3, max: Some(3), greedy: true },
            enclosed_groups: 0..0,
        };
        let props = RegexProperties::analyze(&fixed);
        assert!(!props.has_loops);
        assert!(!props.has_large_counted_repetitions);

        let large = Node::Loop {
            node: Box::new(Node::Char('a')),
            quant: Quantifier { min: 0, max: Some(100_000), greedy: true },
            enclosed_groups: 0..0,
        };
        let props = RegexProperties::analyze(&large);
        assert!(props.has_loops);
        assert!(props.has_large_counted_repetitions);
    }

    #[test]
    fn lookaround_flavors() {
        let neg_ahead = Node::Lookaround {
            behind: false,
            negate: true,
            node: Box::new(Node::Char('x')),
        };
        let props = RegexProperties::analyze(&neg_ahead);
        assert!(props.has_look_around_assertions);
        assert!(props.has_negative_look_ahead);
        assert!(!props.has_negative_look_behind);

        let complex_behind = Node::Lookaround {
            behind: true,
            negate: false,
            node: Box::new(Node::Loop {
                node: Box::new(Node::Char('x')),
                quant: Quantifier { min: 0, max: None, greedy: true },
                enclosed_groups: 0..0,
            }),
        };
        let props = RegexProperties::analyze(&complex_behind);
        assert!(props.has_non_literal_look_behind);
        assert!(!props.has_negative_look_behind);

        let neg_behind = Node::Lookaround {
            behind: true,
            negate: true,
            node: Box::new(Node::Char('x')),
        };
        let props = RegexProperties::analyze(&neg_behind);
        assert!(props.has_negative_look_behind);
        assert!(!props.has_non_literal_look_behind);
    }

    #[test]
    fn word_boundary_is_lookaround() {
        let node = Node::Cat(vec![Node::WordBoundary { negate: false }, Node::Char('a')]);
        let props = RegexProperties::analyze(&node);
        assert!(props.has_look_around_assertions);
    }

    #[test]
    fn serializes_camel_case() {
        let props = RegexProperties {
            has_alternations: true,
            ..Default::default()
        };
        let json = serde_json::to_value(props).unwrap();
        assert_eq!(json["hasAlternations"], true);
        assert_eq!(json["hasLoops"], false);
    }
}
