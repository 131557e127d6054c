//! Translation of foreign pattern flavors into ECMAScript syntax.
//!
//! The downstream parser only ever sees ECMAScript patterns. A flavor
//! processor rewrites what it can and raises `Unsupported` for constructs
//! with no ECMAScript equivalent.

use crate::api::{Flavor, RegexSource, Unsupported};

/// A flavor-specific source rewriter.
pub trait FlavorProcessor {
    /// Rewrite the source into an equivalent ECMAScript pattern.
    fn to_ecmascript(&self) -> Result<RegexSource, Unsupported>;
}

/// \return the processor for the source's flavor, or None when the source
/// is already ECMAScript.
pub fn for_regex(source: &RegexSource) -> Option<Box<dyn FlavorProcessor + '_>> {
    match source.flavor {
        Flavor::EcmaScript => None,
        Flavor::Pcre => Some(Box::new(PcreProcessor { source })),
    }
}

/// Rewrites the PCRE spellings that have direct ECMAScript equivalents:
/// `(?P<name>…)` and `(?P=name)` group syntax, and the `\A`, `\z`, `\Z`
/// string anchors. Possessive quantifiers and atomic groups have no
/// equivalent and are rejected.
struct PcreProcessor<'a> {
    source: &'a RegexSource,
}

impl FlavorProcessor for PcreProcessor<'_> {
    fn to_ecmascript(&self) -> Result<RegexSource, Unsupported> {
        let pattern = &self.source.pattern;
        let mut out = String::with_capacity(pattern.len());
        let mut chars = pattern.char_indices().peekable();
        let mut in_class = false;
        let mut quantifiable = false;
        while let Some((idx, c)) = chars.next() {
            match c {
                '\\' => {
                    let escaped = chars.next().map(|(_, c)| c);
                    match escaped {
                        Some('A') if !in_class => out.push('^'),
                        Some('z' | 'Z') if !in_class => out.push('$'),
                        Some(e) => {
                            out.push('\\');
                            out.push(e);
                        }
                        None => out.push('\\'),
                    }
                    quantifiable = !in_class;
                }
                '[' if !in_class => {
                    in_class = true;
                    out.push(c);
                }
                ']' if in_class => {
                    in_class = false;
                    out.push(c);
                    quantifiable = true;
                }
                '(' if !in_class => {
                    let rest = &pattern[idx + 1..];
                    if rest.starts_with("?P<") {
                        out.push_str("(?<");
                        chars.nth(2); // skip "?P<"
                    } else if rest.starts_with("?P=") {
                        let body = &rest[3..];
                        let end = body.find(')').ok_or_else(|| {
                            Unsupported::new("unterminated named group reference")
                        })?;
                        out.push_str("\\k<");
                        out.push_str(&body[..end]);
                        out.push('>');
                        // Skip "?P=name)".
                        for _ in 0..end + 4 {
                            chars.next();
                        }
                    } else if rest.starts_with("?>") {
                        return Err(Unsupported::new("atomic groups not supported"));
                    } else {
                        out.push(c);
                    }
                    quantifiable = false;
                }
                '*' | '+' | '?' if !in_class && quantifiable => {
                    out.push(c);
                    if let Some(&(_, '+')) = chars.peek() {
                        return Err(Unsupported::new("possessive quantifiers not supported"));
                    }
                    quantifiable = false;
                }
                '}' if !in_class => {
                    out.push(c);
                    if let Some(&(_, '+')) = chars.peek() {
                        return Err(Unsupported::new("possessive quantifiers not supported"));
                    }
                    quantifiable = false;
                }
                _ => {
                    out.push(c);
                    quantifiable = !in_class && !matches!(c, '(' | '|');
                }
            }
        }
        Ok(RegexSource {
            pattern: out,
            flags: self.source.flags,
            flavor: Flavor::EcmaScript,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Flags;

    fn translate(pattern: &str) -> Result<String, Unsupported> {
        let source = RegexSource::with_flavor(pattern, Flags::default(), Flavor::Pcre);
        let processor = for_regex(&source).expect("pcre has a processor");
        Ok(processor.to_ecmascript()?.pattern)
    }

    #[test]
    fn ecmascript_needs_no_processor() {
        let source = RegexSource::new("abc", "");
        assert!(for_regex(&source).is_none());
    }

    #[test]
    fn named_groups_are_rewritten() {
        assert_eq!(translate("(?P<word>\\w+)").unwrap(), "(?<word>\\w+)");
        assert_eq!(translate("(?P<x>a)(?P=x)").unwrap(), "(?<x>a)\\k<x>");
    }

    #[test]
    fn string_anchors_are_rewritten() {
        assert_eq!(translate("\\Aabc\\z").unwrap(), "^abc$");
        assert_eq!(translate("\\Zx").unwrap(), "$x");
    }

    #[test]
    fn class_contents_are_untouched() {
        assert_eq!(translate("[\\A-z]").unwrap(), "[\\A-z]");
    }

    #[test]
    fn possessive_quantifiers_rejected() {
        assert!(translate("a*+").is_err());
        assert!(translate("a{2,3}+").is_err());
        assert!(translate("a++b").is_err());
    }

    #[test]
    fn atomic_groups_rejected() {
        assert!(translate("(?>ab)c").is_err());
    }

    #[test]
    fn plain_patterns_pass_through() {
        assert_eq!(translate("a(b|c)*d").unwrap(), "a(b|c)*d");
    }
}
