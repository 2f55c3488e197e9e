//! Pattern compiler
//!
//! Turns one `pattern matcher` declaration into a [`Rule`]: classifies the
//! matcher into a category, compiles the pattern into exactly one of
//! literal, regex or wildcard form and derives the rule flags.

use std::net::{IpAddr, Ipv4Addr};

use regex::{Regex, RegexBuilder};

use rr_core::protocols::{HOST, LOCAL_RULE, PLUGIN, PROXY, RULE};
use rr_core::url::{format_url, is_web_url, remove_protocol, scheme_end};
use rr_core::{EmptyValues, Pattern, Protocols, Rule, RuleFlags, ValueSource, Wildcard};

use crate::error::RuleError;
use crate::preprocess::{declarations, Declaration};

const PROXY_SCHEMES: [&str; 5] = [
    "socks",
    "http-proxy",
    "internal-proxy",
    "https2http-proxy",
    "http2https-proxy",
];

const LOCAL_HOSTS: [&str; 2] = ["local.whistlejs.com", "local.wproxy.org"];

/// Everything a parse needs besides the text itself.
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    pub protocols: &'a Protocols,
    /// Named rule fragments for `${name}` lines.
    pub fragments: &'a dyn ValueSource,
    /// Named values for `{name}` lines.
    pub values: &'a dyn ValueSource,
}

impl<'a> ParseContext<'a> {
    pub fn new(protocols: &'a Protocols) -> Self {
        Self {
            protocols,
            fragments: &EmptyValues,
            values: &EmptyValues,
        }
    }

    pub fn with_fragments(mut self, fragments: &'a dyn ValueSource) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn with_values(mut self, values: &'a dyn ValueSource) -> Self {
        self.values = values;
        self
    }
}

/// Compile every declaration in `text`. Bad declarations are logged and
/// skipped; this never fails.
pub fn parse_rules(text: &str, root: bool, ctx: &ParseContext<'_>) -> Vec<Rule> {
    let mut rules = Vec::new();

    for declaration in declarations(text, root, ctx.fragments, ctx.values) {
        match parse_rule(&declaration, root, ctx.protocols) {
            Ok(rule) => rules.push(rule),
            Err(err) => log::debug!("dropping `{}`: {}", declaration.raw, err),
        }
    }

    rules
}

// =============================================================================
// Declaration
// =============================================================================

/// Compile one declaration.
pub fn parse_rule(declaration: &Declaration, root: bool, protocols: &Protocols) -> Result<Rule, RuleError> {
    let raw_pattern = declaration.pattern.as_str();
    let matcher = declaration.matcher.as_str();
    if raw_pattern.is_empty() || matcher.is_empty() {
        return Err(RuleError::EmptyDeclaration);
    }
    if matcher.starts_with('!') {
        return Err(RuleError::NegatedMatcher(matcher.to_string()));
    }

    let mut flags = RuleFlags::empty();
    if root {
        flags |= RuleFlags::ROOT;
    }

    let pattern = match raw_pattern.strip_prefix('!') {
        Some(rest) => {
            flags |= RuleFlags::NEGATED;
            rest
        }
        None => raw_pattern,
    };

    let pattern = if let Some((source, regex_flags)) = split_regex_literal(pattern) {
        flags |= RuleFlags::IS_REGEX;
        Pattern::Regex(compile_regex(pattern, source, regex_flags)?)
    } else if flags.contains(RuleFlags::NEGATED) {
        return Err(RuleError::NegatedLiteral(raw_pattern.to_string()));
    } else if let Some(wildcard) = parse_wildcard(pattern) {
        Pattern::Wildcard(wildcard?)
    } else if let Some(exact) = pattern.strip_prefix('$') {
        flags |= RuleFlags::EXACT;
        Pattern::Literal(format_url(exact))
    } else {
        Pattern::Literal(format_url(pattern))
    };

    if !flags.intersects(RuleFlags::IS_REGEX | RuleFlags::NEGATED)
        && !remove_protocol(raw_pattern, true).contains('/')
    {
        flags |= RuleFlags::IS_DOMAIN;
    }

    let (category, matcher, port) = classify(matcher, protocols);
    Ok(Rule {
        pattern,
        matcher,
        flags,
        category,
        port,
        raw: declaration.raw.clone(),
        raw_pattern: raw_pattern.to_string(),
    })
}

// =============================================================================
// Classification
// =============================================================================

/// Category, normalized matcher and host port for a matcher token.
fn classify(matcher: &str, protocols: &Protocols) -> (String, String, Option<u16>) {
    let is_ip = matcher.parse::<IpAddr>().is_ok();
    if is_ip || is_ipv4_with_port(matcher) {
        let matcher = format!("host://{matcher}");
        if is_ip {
            return (HOST.to_string(), matcher, None);
        }
        return split_host_port(matcher);
    }

    let category = if is_plugin_matcher(matcher) {
        PLUGIN
    } else if is_proxy_matcher(matcher) {
        PROXY
    } else if let Some(alias) = matcher.split_once(':').and_then(|(scheme, _)| protocols.alias_of(scheme)) {
        alias
    } else {
        literal_scheme(matcher).unwrap_or(RULE)
    };

    if !protocols.contains(category) {
        let bucket = if is_local_matcher(matcher) { LOCAL_RULE } else { RULE };
        return (bucket.to_string(), matcher.to_string(), None);
    }

    if category == HOST {
        let matcher = if matcher == "host://" {
            "host://127.0.0.1".to_string()
        } else {
            matcher.to_string()
        };
        return split_host_port(matcher);
    }

    (category.to_string(), matcher.to_string(), None)
}

/// `host://h:port` -> (`host://h`, port). An empty port is dropped.
fn split_host_port(matcher: String) -> (String, String, Option<u16>) {
    if let Some(colon) = matcher.rfind(':') {
        let digits = &matcher[colon + 1..];
        if digits.bytes().all(|b| b.is_ascii_digit()) {
            let port = digits.parse().ok();
            return (HOST.to_string(), matcher[..colon].to_string(), port);
        }
    }
    (HOST.to_string(), matcher, None)
}

/// IP literal, or IPv4 with a `:port`.
pub(crate) fn is_host_literal(token: &str) -> bool {
    token.parse::<IpAddr>().is_ok() || is_ipv4_with_port(token)
}

fn is_ipv4_with_port(token: &str) -> bool {
    let (ip, port) = match token.split_once(':') {
        Some((ip, port)) => (ip, Some(port)),
        None => (token, None),
    };
    ip.parse::<Ipv4Addr>().is_ok()
        && port.map_or(true, |port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

/// `plugin.<name>://` or `whistle.<name>://`
fn is_plugin_matcher(matcher: &str) -> bool {
    let Some(rest) = matcher
        .strip_prefix("plugin.")
        .or_else(|| matcher.strip_prefix("whistle."))
    else {
        return false;
    };
    match rest.find("://") {
        Some(end) if end > 0 => rest[..end]
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-'),
        _ => false,
    }
}

fn is_proxy_matcher(matcher: &str) -> bool {
    PROXY_SCHEMES.iter().any(|scheme| {
        matcher
            .strip_prefix(scheme)
            .is_some_and(|rest| rest.starts_with("://"))
    })
}

/// Scheme made of word characters and `-`.
fn literal_scheme(matcher: &str) -> Option<&str> {
    let end = matcher.find("://")?;
    let scheme = &matcher[..end];
    let valid = !scheme.is_empty()
        && scheme
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    valid.then_some(scheme)
}

/// Targets the proxy's own local-override host.
fn is_local_matcher(matcher: &str) -> bool {
    let Some(rest) = matcher
        .strip_prefix("http://")
        .or_else(|| matcher.strip_prefix("https://"))
    else {
        return false;
    };
    LOCAL_HOSTS.iter().any(|host| {
        rest.strip_prefix(host)
            .is_some_and(|tail| tail.is_empty() || tail.starts_with(|c: char| c == '/' || c == '?'))
    })
}

// =============================================================================
// Regex Literals
// =============================================================================

const REGEX_FLAGS: &str = "gimsu";

fn split_regex_literal(token: &str) -> Option<(&str, &str)> {
    let body = token.strip_prefix('/')?;
    let end = body.rfind('/')?;
    let (source, flags) = (&body[..end], &body[end + 1..]);
    let valid_flags = flags.len() <= REGEX_FLAGS.len()
        && flags
            .char_indices()
            .all(|(i, c)| REGEX_FLAGS.contains(c) && !flags[..i].contains(c));
    (!source.is_empty() && valid_flags).then_some((source, flags))
}

/// `/source/flags`
pub(crate) fn is_regex_literal(token: &str) -> bool {
    split_regex_literal(token).is_some()
}

fn compile_regex(token: &str, source: &str, flags: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|source| RuleError::InvalidRegex {
            pattern: token.to_string(),
            source,
        })
}

// =============================================================================
// Wildcards
// =============================================================================

/// Compile `**.host/path`, `*.host/path`, `~/path` or `*/path` (optionally
/// behind a web scheme, `$` for exact). `None` when the pattern is not a
/// wildcard at all.
pub fn parse_wildcard(pattern: &str) -> Option<Result<Wildcard, RuleError>> {
    let (exact, unmarked) = match pattern.strip_prefix('$') {
        Some(rest) if is_web_url(rest) => (true, rest),
        _ => (false, pattern),
    };
    let scheme_len = if is_web_url(unmarked) {
        scheme_end(unmarked).unwrap_or(0)
    } else {
        0
    };
    let scheme = &unmarked[..scheme_len];
    let rest = &unmarked[scheme_len..];

    let (marker, path) = if let Some(path) = rest.strip_prefix("**") {
        ("**", path)
    } else if let Some(path) = rest.strip_prefix('*') {
        ("*", path)
    } else if let Some(path) = rest.strip_prefix('~') {
        ("~", path)
    } else {
        return None;
    };

    let path_only = marker != "**" && path.starts_with('/');
    if !path_only && !path.starts_with('.') {
        return None;
    }
    if marker == "~" && !path_only {
        return None;
    }

    if path_only {
        return Some(
            Regex::new(r"^([\w]+://[^/]+)")
                .map(|pre_match| Wildcard {
                    pre_match,
                    has_query: path.contains('?'),
                    path: path.to_string(),
                    is_exact: exact,
                })
                .map_err(|source| RuleError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                }),
        );
    }

    Some(compile_host_wildcard(pattern, scheme, marker, path, exact))
}

fn compile_host_wildcard(
    pattern: &str,
    scheme: &str,
    marker: &str,
    path: &str,
    exact: bool,
) -> Result<Wildcard, RuleError> {
    let malformed = || RuleError::MalformedWildcard(pattern.to_string());

    let (host, has_port) = hostname_prefix(path).ok_or_else(malformed)?;
    let remainder = &path[host.len()..];
    let is_domain = !has_port && remainder.is_empty();
    let path = match remainder.as_bytes().first() {
        None | Some(b'/') => remainder.to_string(),
        Some(b'?') => format!("/{remainder}"),
        Some(_) => return Err(malformed()),
    };

    let segment = if marker == "**" { "[^/]+" } else { "[^./]+" };
    let scheme = if scheme.is_empty() { r"[\w]+://" } else { scheme };
    let port = if is_domain { r"(?::\d+)?" } else { "" };
    let source = format!("^({scheme}{segment}{}{port})\\/", regex::escape(host));

    let pre_match = Regex::new(&source).map_err(|source| RuleError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })?;

    Ok(Wildcard {
        pre_match,
        has_query: path.contains('?'),
        path,
        is_exact: exact,
    })
}

/// Leading `.host[:port]` of a wildcard remainder.
fn hostname_prefix(path: &str) -> Option<(&str, bool)> {
    let bytes = path.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'.' || !is_word(bytes[1]) {
        return None;
    }
    let mut end = 2 + bytes[2..]
        .iter()
        .take_while(|&&b| is_word(b) || b == b'-' || b == b'.' || b == b'%')
        .count();

    let mut has_port = false;
    if bytes.get(end) == Some(&b':') {
        let digits = bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            end += 1 + digits;
            has_port = true;
        }
    }

    Some((&path[..end], has_port))
}

#[inline]
fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
