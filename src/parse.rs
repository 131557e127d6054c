//! Recursive-descent parser from ECMAScript patterns to the AST.
//!
//! The parser runs in two passes: a light pre-scan that counts capture
//! groups and collects their names (so backreferences to later groups
//! resolve in one pass), then the main descent. Syntax failures surface
//! as [`Unsupported`] with a human-readable reason.

use crate::api::{Flags, RegexOptions, RegexSource, Unsupported};
use crate::ast::{AnchorKind, Node, Quantifier, RegexAst, MAX_CAPTURE_GROUPS};
use crate::buffer::CompilationBuffer;
use crate::codepointset::{
    CodePointSet, Interval, CODE_POINT_MAX, DIGITS, LINE_TERMINATORS, WHITESPACE, WORD_CHARS,
};
use smallvec::SmallVec;

fn error<S, T>(text: S) -> Result<T, Unsupported>
where
    S: ToString,
{
    Err(Unsupported::new(text.to_string()))
}

/// Intervals with at most this many code points get their case closure
/// expanded point by point; larger intervals are left alone, they are
/// near-total anyway.
const CASE_CLOSURE_LIMIT: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    Digits,
    Words,
    Spaces,
}

/// \return the code point set for a character class escape, positive or
/// negative. See ES2018 21.2.2.12.
fn codepoints_from_class(kind: ClassKind, positive: bool) -> CodePointSet {
    let mut set = match kind {
        ClassKind::Digits => CodePointSet::from_sorted_disjoint(DIGITS.to_vec()),
        ClassKind::Words => CodePointSet::from_sorted_disjoint(WORD_CHARS.to_vec()),
        ClassKind::Spaces => {
            let mut set = CodePointSet::from_sorted_disjoint(WHITESPACE.to_vec());
            for &iv in LINE_TERMINATORS {
                set.add(iv);
            }
            set
        }
    };
    if !positive {
        set = set.inverted();
    }
    set
}

/// \return the single-char case closure of `c`: the set of characters
/// that compare equal to it under canonicalization. Multi-char case
/// mappings are ignored.
fn case_closure(c: char) -> SmallVec<[char; 4]> {
    fn single<I: Iterator<Item = char>>(mut it: I) -> Option<char> {
        match (it.next(), it.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
    let mut result: SmallVec<[char; 4]> = smallvec::smallvec![c];
    let mut push = |c: char| {
        if !result.contains(&c) {
            result.push(c);
        }
    };
    if let Some(lower) = single(c.to_lowercase()) {
        push(lower);
        if let Some(upper) = single(lower.to_uppercase()) {
            push(upper);
        }
    }
    if let Some(upper) = single(c.to_uppercase()) {
        push(upper);
        if let Some(lower) = single(upper.to_lowercase()) {
            push(lower);
        }
    }
    result
}

/// Expand a set to its case closure, interval by interval. Intervals
/// larger than `CASE_CLOSURE_LIMIT` are kept as-is.
fn apply_case_closure(set: &CodePointSet) -> CodePointSet {
    let mut result = set.clone();
    for iv in set.intervals() {
        if iv.count() > CASE_CLOSURE_LIMIT {
            continue;
        }
        for cp in iv.first..=iv.last {
            let Some(c) = char::from_u32(cp) else { continue };
            for folded in case_closure(c) {
                result.add_one(folded as u32);
            }
        }
    }
    result
}

/// One item inside a bracket expression.
enum ClassAtom {
    CodePoint(char),
    Set(CodePointSet),
}

/// Pre-scan result: the total number of capture groups and their names in
/// left-parenthesis order.
struct GroupScan {
    count: u16,
    names: Vec<Option<String>>,
}

/// Count capture groups and collect their names without building an AST.
/// Needed so numeric and named backreferences to groups defined later in
/// the pattern resolve during the main descent.
fn scan_groups(pattern: &str, buffer: &mut CompilationBuffer) -> Result<GroupScan, Unsupported> {
    let bump = buffer.bump();
    let mut names = bumpalo::collections::Vec::new_in(bump);
    let mut in_class = false;
    let mut chars = pattern.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class => {
                let rest = &pattern[idx + 1..];
                if rest.starts_with("?<") && !rest.starts_with("?<=") && !rest.starts_with("?<!") {
                    let name_body = &rest[2..];
                    match name_body.find('>') {
                        Some(end) => names.push(Some(name_body[..end].to_string())),
                        None => return error("unterminated capture group name"),
                    }
                } else if !rest.starts_with('?') {
                    names.push(None);
                }
            }
            _ => {}
        }
    }
    if names.len() > MAX_CAPTURE_GROUPS {
        return error("too many capture groups");
    }
    for (i, name) in names.iter().enumerate() {
        let Some(name) = name else { continue };
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
            return error(format!("invalid capture group name '{name}'"));
        }
        if names[..i].iter().any(|n| n.as_ref() == Some(name)) {
            return error(format!("duplicate capture group name '{name}'"));
        }
    }
    Ok(GroupScan {
        count: names.len() as u16,
        names: names.into_iter().collect(),
    })
}

/// The state used to parse one pattern.
pub struct Parser {
    /// The (already ECMAScript) source being parsed.
    source: RegexSource,

    /// Byte offset of the next character to consume.
    pos: usize,

    flags: Flags,

    /// Total number of capture groups, from the pre-scan.
    group_count: u16,

    /// Capture group names in group order, from the pre-scan.
    group_names: Vec<Option<String>>,

    /// The id the next capture group encountered will receive.
    next_group: u16,
}

impl Parser {
    /// Construct a parser over `source`, which must already be ECMAScript
    /// syntax; flavor translation happens before the parser sees the
    /// pattern.
    pub fn new(
        source: &RegexSource,
        _options: &RegexOptions,
        buffer: &mut CompilationBuffer,
    ) -> Result<Self, Unsupported> {
        let scan = scan_groups(&source.pattern, buffer)?;
        Ok(Self {
            source: source.clone(),
            pos: 0,
            flags: source.flags,
            group_count: scan.count,
            group_names: scan.names,
            next_group: 0,
        })
    }

    /// Parse the pattern into an AST.
    pub fn parse(&mut self) -> Result<RegexAst, Unsupported> {
        let root = self.parse_disjunction()?;
        if self.peek().is_some() {
            return error("unbalanced parenthesis");
        }
        debug_assert_eq!(self.next_group, self.group_count, "pre-scan must agree");
        Ok(RegexAst::new(
            self.source.clone(),
            root,
            self.flags,
            self.group_count,
            self.group_names.clone().into(),
        ))
    }

    /// Run the analyses the automaton builders depend on.
    pub fn prepare_for_dfa(&self, ast: &mut RegexAst) {
        ast.prepare_for_dfa();
    }

    // Cursor helpers.

    fn rest(&self) -> &str {
        &self.source.pattern[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    // Grammar productions.

    fn parse_disjunction(&mut self) -> Result<Node, Unsupported> {
        let mut alternatives = vec![self.parse_alternative()?];
        while self.eat('|') {
            alternatives.push(self.parse_alternative()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.pop().unwrap()
        } else {
            Node::Alt(alternatives)
        })
    }

    fn parse_alternative(&mut self) -> Result<Node, Unsupported> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None | Some('|') | Some(')') => break,
                _ => nodes.push(self.parse_term()?),
            }
        }
        Ok(match nodes.len() {
            0 => Node::Empty,
            1 => nodes.pop().unwrap(),
            _ => Node::Cat(nodes),
        })
    }

    fn parse_term(&mut self) -> Result<Node, Unsupported> {
        // Assertions are not quantifiable.
        if self.eat('^') {
            return Ok(Node::Anchor(AnchorKind::LineStart));
        }
        if self.eat('$') {
            return Ok(Node::Anchor(AnchorKind::LineEnd));
        }
        if self.eat_str("\\b") {
            return Ok(Node::WordBoundary { negate: false });
        }
        if self.eat_str("\\B") {
            return Ok(Node::WordBoundary { negate: true });
        }
        for (prefix, behind, negate) in [
            ("(?=", false, false),
            ("(?!", false, true),
            ("(?<=", true, false),
            ("(?<!", true, true),
        ] {
            if self.eat_str(prefix) {
                let node = Box::new(self.parse_disjunction()?);
                if !self.eat(')') {
                    return error("unterminated lookaround assertion");
                }
                return Ok(Node::Lookaround { behind, negate, node });
            }
        }

        let groups_before = self.next_group;
        let atom = self.parse_atom()?;
        match self.parse_quantifier()? {
            None => Ok(atom),
            Some(quant) => Ok(Node::Loop {
                node: Box::new(atom),
                quant,
                enclosed_groups: groups_before..self.next_group,
            }),
        }
    }

    /// Parse a quantifier if one follows, including its laziness marker.
    fn parse_quantifier(&mut self) -> Result<Option<Quantifier>, Unsupported> {
        let (min, max) = if self.eat('*') {
            (0, None)
        } else if self.eat('+') {
            (1, None)
        } else if self.eat('?') {
            (0, Some(1))
        } else if self.peek() == Some('{') {
            match self.try_parse_braced_quantifier() {
                Some(bounds) => bounds,
                // Not a quantifier shape: '{' stays a literal atom and is
                // consumed by the next parse_term call.
                None => return Ok(None),
            }
        } else {
            return Ok(None);
        };
        if let Some(max) = max {
            if min > max {
                return error("numbers out of order in {} quantifier");
            }
        }
        let greedy = !self.eat('?');
        Ok(Some(Quantifier { min, max, greedy }))
    }

    /// Attempt to parse `{n}`, `{n,}` or `{n,m}`. On a malformed shape the
    /// cursor is left untouched and None is returned.
    fn try_parse_braced_quantifier(&mut self) -> Option<(u32, Option<u32>)> {
        let saved = self.pos;
        debug_assert!(self.peek() == Some('{'));
        self.next_char();
        let min = match self.parse_decimal() {
            Some(min) => min,
            None => {
                self.pos = saved;
                return None;
            }
        };
        let result = if self.eat(',') {
            if self.peek() == Some('}') {
                (min, None)
            } else {
                match self.parse_decimal() {
                    Some(max) => (min, Some(max)),
                    None => {
                        self.pos = saved;
                        return None;
                    }
                }
            }
        } else {
            (min, Some(min))
        };
        if self.eat('}') {
            Some(result)
        } else {
            self.pos = saved;
            None
        }
    }

    fn parse_decimal(&mut self) -> Option<u32> {
        let mut digits = 0;
        let mut value: u32 = 0;
        while let Some(c) = self.peek() {
            let Some(d) = c.to_digit(10) else { break };
            self.next_char();
            digits += 1;
            value = value.saturating_mul(10).saturating_add(d);
        }
        (digits > 0).then_some(value)
    }

    fn parse_atom(&mut self) -> Result<Node, Unsupported> {
        let c = match self.next_char() {
            Some(c) => c,
            None => return error("unexpected end of pattern"),
        };
        match c {
            '(' => self.parse_group(),
            '[' => self.parse_bracket(),
            '.' => Ok(Node::Class(self.dot_set())),
            '\\' => self.parse_atom_escape(),
            '*' | '+' | '?' => error("nothing to repeat"),
            ']' | '}' if self.flags.unicode => error(format!("lone '{c}' in pattern")),
            _ => Ok(self.char_node(c)),
        }
    }

    fn parse_group(&mut self) -> Result<Node, Unsupported> {
        let capture = if self.eat_str("?:") {
            None
        } else if self.eat_str("?<") {
            // Lookbehinds were consumed in parse_term; this is a name.
            let name_end = match self.rest().find('>') {
                Some(end) => end,
                None => return error("unterminated capture group name"),
            };
            self.pos += name_end + 1;
            let idx = self.next_group;
            self.next_group += 1;
            Some(idx)
        } else if self.peek() == Some('?') {
            return error("invalid group syntax");
        } else {
            let idx = self.next_group;
            self.next_group += 1;
            Some(idx)
        };
        let node = Box::new(self.parse_disjunction()?);
        if !self.eat(')') {
            return error("unterminated group");
        }
        Ok(Node::Group { capture, node })
    }

    fn parse_atom_escape(&mut self) -> Result<Node, Unsupported> {
        let c = match self.peek() {
            Some(c) => c,
            None => return error("pattern may not end with a trailing backslash"),
        };
        match c {
            '1'..='9' => {
                let group = self.parse_decimal().expect("digit is present");
                if group as usize <= self.group_count as usize {
                    Ok(Node::BackRef(group))
                } else if self.flags.unicode {
                    error(format!("invalid backreference \\{group}"))
                } else {
                    // Annex B: an out-of-range reference is an identity
                    // escape of its leading digit.
                    let mut leading = group;
                    while leading >= 10 {
                        leading /= 10;
                    }
                    Ok(self.char_node(char::from_digit(leading, 10).unwrap()))
                }
            }
            'k' => {
                self.next_char();
                self.parse_named_backref()
            }
            'd' | 'D' | 'w' | 'W' | 's' | 'S' => {
                self.next_char();
                let kind = match c.to_ascii_lowercase() {
                    'd' => ClassKind::Digits,
                    'w' => ClassKind::Words,
                    _ => ClassKind::Spaces,
                };
                Ok(Node::Class(codepoints_from_class(kind, c.is_lowercase())))
            }
            _ => {
                let c = self.parse_character_escape()?;
                Ok(self.char_node(c))
            }
        }
    }

    fn parse_named_backref(&mut self) -> Result<Node, Unsupported> {
        if !self.eat('<') {
            return if self.group_names.iter().any(Option::is_some) || self.flags.unicode {
                error("invalid named reference")
            } else {
                Ok(self.char_node('k'))
            };
        }
        let end = match self.rest().find('>') {
            Some(end) => end,
            None => return error("unterminated named reference"),
        };
        let name = self.rest()[..end].to_string();
        self.pos += end + 1;
        match self.group_names.iter().position(|n| n.as_deref() == Some(name.as_str())) {
            Some(idx) => Ok(Node::BackRef(idx as u32 + 1)),
            None => error(format!("named reference to unknown group '{name}'")),
        }
    }

    /// Parse the escapes that produce a single character.
    fn parse_character_escape(&mut self) -> Result<char, Unsupported> {
        let c = self.next_char().expect("caller checked for a character");
        match c {
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'f' => Ok('\u{000C}'),
            'v' => Ok('\u{000B}'),
            '0' => {
                if self.peek().is_some_and(|c| c.is_ascii_digit()) && self.flags.unicode {
                    error("invalid decimal escape")
                } else {
                    Ok('\0')
                }
            }
            'c' => match self.peek() {
                Some(l) if l.is_ascii_alphabetic() => {
                    self.next_char();
                    Ok(char::from(l.to_ascii_uppercase() as u8 - b'A' + 1))
                }
                _ => {
                    if self.flags.unicode {
                        error("invalid control escape")
                    } else {
                        Ok('c')
                    }
                }
            },
            'x' => match self.parse_hex(2) {
                Some(value) => Ok(char::from(value as u8)),
                None => {
                    if self.flags.unicode {
                        error("invalid hexadecimal escape")
                    } else {
                        Ok('x')
                    }
                }
            },
            'u' => self.parse_unicode_escape(),
            _ => {
                if self.flags.unicode && (c.is_alphanumeric() || c == '_') {
                    error(format!("invalid escape \\{c}"))
                } else {
                    Ok(c)
                }
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, Unsupported> {
        if self.flags.unicode && self.eat('{') {
            let start = self.pos;
            let end = match self.rest().find('}') {
                Some(end) => end,
                None => return error("unterminated unicode escape"),
            };
            let digits = &self.source.pattern[start..start + end];
            self.pos += end + 1;
            let value = u32::from_str_radix(digits, 16)
                .ok()
                .filter(|&v| v <= CODE_POINT_MAX);
            match value.and_then(char::from_u32) {
                Some(c) => Ok(c),
                None => error("invalid unicode escape"),
            }
        } else {
            let Some(first) = self.parse_hex(4) else {
                return if self.flags.unicode {
                    error("invalid unicode escape")
                } else {
                    Ok('u')
                };
            };
            // Surrogate pair joining, unicode mode only.
            if self.flags.unicode && (0xD800..0xDC00).contains(&first) {
                let saved = self.pos;
                if self.eat_str("\\u") {
                    if let Some(second) = self.parse_hex(4) {
                        if (0xDC00..0xE000).contains(&second) {
                            let cp = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
                            return Ok(char::from_u32(cp).expect("valid supplementary plane"));
                        }
                    }
                    self.pos = saved;
                }
            }
            Ok(char::from_u32(first).unwrap_or('\u{FFFD}'))
        }
    }

    fn parse_hex(&mut self, digits: usize) -> Option<u32> {
        let text = self.rest().get(..digits)?;
        let value = u32::from_str_radix(text, 16).ok()?;
        self.pos += digits;
        Some(value)
    }

    fn parse_bracket(&mut self) -> Result<Node, Unsupported> {
        let invert = self.eat('^');
        let mut set = CodePointSet::new();
        loop {
            if self.eat(']') {
                break;
            }
            let atom = match self.parse_class_atom()? {
                Some(atom) => atom,
                None => return error("unterminated character class"),
            };
            // Try a range: only when both endpoints are single code points.
            if let ClassAtom::CodePoint(first) = atom {
                if self.peek() == Some('-') && !self.rest()[1..].starts_with(']') {
                    let saved = self.pos;
                    self.next_char();
                    match self.parse_class_atom()? {
                        Some(ClassAtom::CodePoint(last)) => {
                            if (first as u32) > (last as u32) {
                                return error("invalid character class range");
                            }
                            set.add(Interval::new(first as u32, last as u32));
                            continue;
                        }
                        Some(ClassAtom::Set(_)) | None => {
                            if self.flags.unicode {
                                return error("invalid character class range");
                            }
                            // Annex B: not a range after all.
                            self.pos = saved;
                        }
                    }
                }
                set.add_one(first as u32);
            } else if let ClassAtom::Set(s) = atom {
                set.add_set(&s);
            }
        }
        if self.flags.icase {
            set = apply_case_closure(&set);
        }
        if invert {
            set = set.inverted();
        }
        Ok(Node::Class(set))
    }

    fn parse_class_atom(&mut self) -> Result<Option<ClassAtom>, Unsupported> {
        let c = match self.next_char() {
            Some(c) => c,
            None => return Ok(None),
        };
        if c != '\\' {
            return Ok(Some(ClassAtom::CodePoint(c)));
        }
        let c = match self.peek() {
            Some(c) => c,
            None => return error("pattern may not end with a trailing backslash"),
        };
        match c {
            'd' | 'D' | 'w' | 'W' | 's' | 'S' => {
                self.next_char();
                let kind = match c.to_ascii_lowercase() {
                    'd' => ClassKind::Digits,
                    'w' => ClassKind::Words,
                    _ => ClassKind::Spaces,
                };
                Ok(Some(ClassAtom::Set(codepoints_from_class(
                    kind,
                    c.is_lowercase(),
                ))))
            }
            'b' => {
                self.next_char();
                Ok(Some(ClassAtom::CodePoint('\u{0008}')))
            }
            _ => Ok(Some(ClassAtom::CodePoint(self.parse_character_escape()?))),
        }
    }

    // Node construction helpers.

    /// \return the node for a literal character, expanding its case
    /// closure when matching case-insensitively.
    fn char_node(&self, c: char) -> Node {
        if !self.flags.icase {
            return Node::Char(c);
        }
        let closure = case_closure(c);
        if closure.len() == 1 {
            Node::Char(c)
        } else {
            let mut set = CodePointSet::new();
            for c in closure {
                set.add_one(c as u32);
            }
            Node::Class(set)
        }
    }

    fn dot_set(&self) -> CodePointSet {
        if self.flags.dot_all {
            CodePointSet::from_sorted_disjoint(vec![Interval::new(0, CODE_POINT_MAX)])
        } else {
            CodePointSet::from_sorted_disjoint(LINE_TERMINATORS.to_vec()).inverted()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pattern: &str, flags: &str) -> Result<RegexAst, Unsupported> {
        let source = RegexSource::new(pattern, flags);
        let options = RegexOptions::default();
        let mut buffer = CompilationBuffer::new();
        let mut parser = Parser::new(&source, &options, &mut buffer)?;
        let mut ast = parser.parse()?;
        parser.prepare_for_dfa(&mut ast);
        Ok(ast)
    }

    fn parse_ok(pattern: &str, flags: &str) -> RegexAst {
        parse(pattern, flags).expect("pattern should parse")
    }

    #[test]
    fn literals_and_catenation() {
        let ast = parse_ok("abc", "");
        assert!(matches!(ast.root(), Node::Cat(nodes) if nodes.len() == 3));
        assert_eq!(ast.min_path(), 3);
        assert!(!ast.properties().has_alternations);
    }

    #[test]
    fn empty_pattern() {
        let ast = parse_ok("", "");
        assert!(matches!(ast.root(), Node::Empty));
        assert_eq!(ast.min_path(), 0);
    }

    #[test]
    fn alternation_properties() {
        let ast = parse_ok("ab|cd|ef", "");
        assert!(ast.properties().has_alternations);
        assert!(matches!(ast.root(), Node::Alt(nodes) if nodes.len() == 3));
    }

    #[test]
    fn groups_are_numbered_in_paren_order() {
        let ast = parse_ok("((a)(b))(?:c)", "");
        assert_eq!(ast.num_capture_groups(), 3);
        assert!(ast.properties().has_capture_groups);
    }

    #[test]
    fn named_groups() {
        let ast = parse_ok("(?<year>\\d{4})-(?<month>\\d{2})", "");
        assert_eq!(ast.num_capture_groups(), 2);
        assert_eq!(ast.group_names()[0].as_deref(), Some("year"));
        assert_eq!(ast.group_names()[1].as_deref(), Some("month"));
    }

    #[test]
    fn duplicate_group_name_rejected() {
        assert!(parse("(?<x>a)(?<x>b)", "").is_err());
    }

    #[test]
    fn forward_backreference_resolves() {
        let ast = parse_ok("\\1(a)", "");
        assert!(ast.properties().has_back_references);
    }

    #[test]
    fn named_backreference() {
        let ast = parse_ok("(?<w>\\w+)\\s\\k<w>", "");
        assert!(ast.properties().has_back_references);
    }

    #[test]
    fn quantifier_shapes() {
        let ast = parse_ok("a{2,5}?", "");
        match ast.root() {
            Node::Loop { quant, .. } => {
                assert_eq!((quant.min, quant.max, quant.greedy), (2, Some(5), false));
            }
            other => panic!("expected loop, got {other:?}"),
        }
        assert!(!ast.properties().has_large_counted_repetitions);

        let ast = parse_ok("a{0,100000}", "");
        assert!(ast.properties().has_large_counted_repetitions);
    }

    #[test]
    fn malformed_brace_is_literal() {
        let ast = parse_ok("a{,2}", "");
        assert_eq!(ast.min_path(), 5);
    }

    #[test]
    fn nothing_to_repeat() {
        assert!(parse("*a", "").is_err());
        assert!(parse("+", "").is_err());
    }

    #[test]
    fn unbalanced_parens() {
        assert!(parse("(a", "").is_err());
        assert!(parse("a)", "").is_err());
    }

    #[test]
    fn lookarounds() {
        let ast = parse_ok("(?=x)y", "");
        assert!(ast.properties().has_look_around_assertions);
        assert!(!ast.properties().has_negative_look_ahead);

        let ast = parse_ok("(?!x)y", "");
        assert!(ast.properties().has_negative_look_ahead);

        let ast = parse_ok("(?<=ab)c", "");
        assert!(!ast.properties().has_non_literal_look_behind);

        let ast = parse_ok("(?<=a*)c", "");
        assert!(ast.properties().has_non_literal_look_behind);

        let ast = parse_ok("(?<!a)c", "");
        assert!(ast.properties().has_negative_look_behind);
        assert!(!ast.properties().has_non_literal_look_behind);
    }

    #[test]
    fn word_boundary_sets_lookaround_property() {
        let ast = parse_ok("\\bfoo\\b", "");
        assert!(ast.properties().has_look_around_assertions);
    }

    #[test]
    fn empty_class_is_dead() {
        let ast = parse_ok("[]", "");
        assert!(ast.is_dead());

        let ast = parse_ok("[^]", "");
        assert!(!ast.is_dead());
    }

    #[test]
    fn bracket_ranges_and_classes() {
        let ast = parse_ok("[a-fA-F\\d]", "");
        match ast.root() {
            Node::Class(set) => {
                assert!(set.contains('b' as u32));
                assert!(set.contains('D' as u32));
                assert!(set.contains('7' as u32));
                assert!(!set.contains('g' as u32));
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn inverted_bracket() {
        let ast = parse_ok("[^a-z]", "");
        match ast.root() {
            Node::Class(set) => {
                assert!(!set.contains('m' as u32));
                assert!(set.contains('A' as u32));
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn icase_folds_chars() {
        let ast = parse_ok("k", "i");
        match ast.root() {
            Node::Class(set) => {
                assert!(set.contains('k' as u32));
                assert!(set.contains('K' as u32));
            }
            other => panic!("expected folded class, got {other:?}"),
        }
        // Characters with a trivial closure stay plain.
        let ast = parse_ok("7", "i");
        assert!(matches!(ast.root(), Node::Char('7')));
    }

    #[test]
    fn escapes() {
        assert!(matches!(parse_ok("\\n", "").root(), Node::Char('\n')));
        assert!(matches!(parse_ok("\\x41", "").root(), Node::Char('A')));
        assert!(matches!(parse_ok("\\u0041", "").root(), Node::Char('A')));
        assert!(matches!(parse_ok("\\u{1F600}", "u").root(), Node::Char('\u{1F600}')));
        assert!(matches!(parse_ok("\\cA", "").root(), Node::Char('\u{0001}')));
        assert!(parse("\\", "").is_err());
    }

    #[test]
    fn surrogate_pair_escape_joins_in_unicode_mode() {
        let ast = parse_ok("\\uD83D\\uDE00", "u");
        assert!(matches!(ast.root(), Node::Char('\u{1F600}')));
    }

    #[test]
    fn dot_respects_dot_all() {
        match parse_ok(".", "").root() {
            Node::Class(set) => assert!(!set.contains('\n' as u32)),
            other => panic!("expected class, got {other:?}"),
        }
        match parse_ok(".", "s").root() {
            Node::Class(set) => assert!(set.contains('\n' as u32)),
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn min_path_of_nested_pattern() {
        let ast = parse_ok("(ab)+c{2}", "");
        assert_eq!(ast.min_path(), 4);
    }
}
