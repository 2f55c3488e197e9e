//! Core type definitions for Reroute
//!
//! A [`Rule`] is built once by the compiler and never changes afterwards.
//! Matching reads rules and produces new [`MatchResult`] values.

use std::sync::Arc;

use regex::Regex;

use crate::url::remove_protocol;

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleFlags: u8 {
        /// `!pattern` - inverts the test (regex patterns only)
        const NEGATED = 1 << 0;
        /// `$pattern` - whole URL equality instead of prefix
        const EXACT = 1 << 1;
        /// Pattern is a `/re/flags` literal
        const IS_REGEX = 1 << 2;
        /// Pattern has no path, so the port-less domain form may match too
        const IS_DOMAIN = 1 << 3;
        /// Declared in the root document rather than an appended fragment
        const ROOT = 1 << 4;
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// Compiled form of a `*.host/path`, `**.host/path`, `~/path` or `*/path` pattern.
#[derive(Debug, Clone)]
pub struct Wildcard {
    /// Anchored regex whose first group captures `scheme://host`.
    pub pre_match: Regex,
    /// Literal remainder that must follow the captured host.
    pub path: String,
    /// `path` carries a query string.
    pub has_query: bool,
    /// Remainder must equal `path` rather than start with it.
    pub is_exact: bool,
}

/// The left-hand side of a declaration. Exactly one strategy per rule.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Normalized literal URL (always carries a path segment). Prefix match
    /// unless the rule has [`RuleFlags::EXACT`].
    Literal(String),
    /// User supplied regular expression.
    Regex(Regex),
    /// Wildcard host or path pattern.
    Wildcard(Wildcard),
}

// =============================================================================
// Rule
// =============================================================================

/// A compiled `pattern matcher` declaration.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Pattern,
    /// Raw target template, may contain `${var}`, `{key}`, `(literal)`, `<path>`.
    pub matcher: String,
    pub flags: RuleFlags,
    /// Bucket this rule was filed under (`host`, `proxy`, `rule`, ...).
    pub category: String,
    /// Port split off a `host://h:port` matcher.
    pub port: Option<u16>,
    /// Source line, for diagnostics.
    pub raw: String,
    /// Pattern token as written, including any `!`/`$` marker.
    pub raw_pattern: String,
}

impl Rule {
    #[inline]
    pub fn is_negated(&self) -> bool {
        self.flags.contains(RuleFlags::NEGATED)
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.flags.contains(RuleFlags::EXACT)
    }

    #[inline]
    pub fn is_regex(&self) -> bool {
        self.flags.contains(RuleFlags::IS_REGEX)
    }

    #[inline]
    pub fn is_domain(&self) -> bool {
        self.flags.contains(RuleFlags::IS_DOMAIN)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.flags.contains(RuleFlags::ROOT)
    }
}

// =============================================================================
// Match Result
// =============================================================================

/// What a matched rule resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Rewritten target URL.
    Url(String),
    /// File-style target with ordered alternatives (`file://a|b`).
    Files { url: String, files: Vec<String> },
    /// Inline value from `{key}` or `(literal)`, prefixed with the matcher scheme.
    Value(String),
    /// Inline `<path>`, split into alternatives for file-style schemes.
    Path { path: String, files: Vec<String> },
}

/// Result of matching one URL against one category.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub target: Target,
    /// Matcher template after variable (and backreference) substitution.
    pub matcher: String,
    /// Value name referenced by a `{key}` matcher, even when the value is missing.
    pub key: Option<String>,
    /// Capture groups `$1..$9` of a regex rule.
    pub captures: Vec<String>,
    /// The rule that produced this result.
    pub rule: Arc<Rule>,
}

impl MatchResult {
    /// Category of the originating rule.
    pub fn name(&self) -> &str {
        &self.rule.category
    }

    pub fn url(&self) -> Option<&str> {
        match &self.target {
            Target::Url(url) | Target::Files { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn files(&self) -> Option<&[String]> {
        match &self.target {
            Target::Files { files, .. } => Some(files),
            Target::Path { files, .. } if !files.is_empty() => Some(files),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match &self.target {
            Target::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match &self.target {
            Target::Path { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Payload of the match with its scheme removed: the inline value or
    /// path when there is one, the matcher otherwise.
    ///
    /// `ignore://host|rule` yields `host|rule`.
    pub fn matcher_value(&self) -> &str {
        let raw = match &self.target {
            Target::Value(value) => value,
            Target::Path { path, .. } => path,
            _ => &self.matcher,
        };
        remove_protocol(raw, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal_rule(category: &str, matcher: &str) -> Arc<Rule> {
        Arc::new(Rule {
            pattern: Pattern::Literal("http://a.com/".to_string()),
            matcher: matcher.to_string(),
            flags: RuleFlags::IS_DOMAIN,
            category: category.to_string(),
            port: None,
            raw: format!("a.com {matcher}"),
            raw_pattern: "a.com".to_string(),
        })
    }

    #[test]
    fn matcher_value_strips_scheme() {
        let result = MatchResult {
            target: Target::Url("ignore://host|rule".to_string()),
            matcher: "ignore://host|rule".to_string(),
            key: None,
            captures: Vec::new(),
            rule: literal_rule("ignore", "ignore://host|rule"),
        };
        assert_eq!(result.matcher_value(), "host|rule");
        assert_eq!(result.name(), "ignore");
    }

    #[test]
    fn matcher_value_prefers_inline_value() {
        let result = MatchResult {
            target: Target::Value("filter://rule".to_string()),
            matcher: "filter://{props}".to_string(),
            key: Some("props".to_string()),
            captures: Vec::new(),
            rule: literal_rule("filter", "filter://{props}"),
        };
        assert_eq!(result.matcher_value(), "rule");
        assert_eq!(result.url(), None);
        assert_eq!(result.value(), Some("filter://rule"));
    }

    #[test]
    fn empty_path_alternatives_are_not_files() {
        let result = MatchResult {
            target: Target::Path { path: "resBody://a.txt".to_string(), files: Vec::new() },
            matcher: "resBody://<a.txt>".to_string(),
            key: None,
            captures: Vec::new(),
            rule: literal_rule("resBody", "resBody://<a.txt>"),
        };
        assert_eq!(result.files(), None);
        assert_eq!(result.path(), Some("resBody://a.txt"));
    }

    #[test]
    fn flags_accessors() {
        let rule = literal_rule("rule", "http://b.com");
        assert!(rule.is_domain());
        assert!(!rule.is_regex());
        assert!(!rule.is_negated());
        assert!(!rule.is_exact());
        assert!(!rule.is_root());
    }
}
