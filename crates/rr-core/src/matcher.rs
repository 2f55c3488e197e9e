//! Core Matching Engine
//!
//! Every proxied request goes through here once per category. A rule list is
//! scanned in order; the first applicable rule (after `skip` earlier hits)
//! wins and is turned into a [`MatchResult`].
//!
//! Matching never touches shared state: regex captures are copied into the
//! result at the moment the rule hits.

use std::sync::Arc;

use crate::snapshot::RuleSnapshot;
use crate::types::{MatchResult, Pattern, Rule, Target, Wildcard};
use crate::url::{domain_url, format_url, get_files, is_path_separator, join, set_protocol, strip_query};
use crate::values::ValueScope;

// =============================================================================
// Matcher
// =============================================================================

/// Category-aware matching of one URL over one snapshot.
///
/// The URL forms are computed once, so a query that visits every category
/// pays for them a single time.
pub struct Matcher<'a> {
    snapshot: &'a RuleSnapshot,
    forms: UrlForms,
}

impl<'a> Matcher<'a> {
    pub fn new(snapshot: &'a RuleSnapshot, url: &str) -> Self {
        Self {
            snapshot,
            forms: UrlForms::new(url),
        }
    }

    pub fn snapshot(&self) -> &'a RuleSnapshot {
        self.snapshot
    }

    /// The `skip`-th applicable rule of `category`.
    pub fn find(&self, category: &str, scope: &mut ValueScope<'_>, skip: usize) -> Option<MatchResult> {
        find_in(self.snapshot.rules(category), &self.forms, scope, skip)
    }

    /// Every applicable rule of `category`, in priority order.
    pub fn find_all(&self, category: &str, scope: &mut ValueScope<'_>) -> Vec<MatchResult> {
        find_all_in(self.snapshot.rules(category), &self.forms, scope)
    }
}

/// Find the applicable rule that comes after `skip` other applicable rules.
///
/// `skip = 0` is the best match; `skip = 1` the runner-up, and so on.
pub fn match_rule(
    url: &str,
    rules: &[Arc<Rule>],
    scope: &mut ValueScope<'_>,
    skip: usize,
) -> Option<MatchResult> {
    find_in(rules, &UrlForms::new(url), scope, skip)
}

/// Every applicable rule, in list order.
pub fn match_all(url: &str, rules: &[Arc<Rule>], scope: &mut ValueScope<'_>) -> Vec<MatchResult> {
    find_all_in(rules, &UrlForms::new(url), scope)
}

fn find_in(
    rules: &[Arc<Rule>],
    forms: &UrlForms,
    scope: &mut ValueScope<'_>,
    skip: usize,
) -> Option<MatchResult> {
    rules
        .iter()
        .filter_map(|rule| test_rule(rule, forms).map(|hit| (rule, hit)))
        .nth(skip)
        .map(|(rule, hit)| synthesize(rule, hit, forms, scope))
}

fn find_all_in(rules: &[Arc<Rule>], forms: &UrlForms, scope: &mut ValueScope<'_>) -> Vec<MatchResult> {
    let hits: Vec<_> = rules
        .iter()
        .filter_map(|rule| test_rule(rule, forms).map(|hit| (rule, hit)))
        .collect();
    hits.into_iter()
        .map(|(rule, hit)| synthesize(rule, hit, forms, scope))
        .collect()
}

// =============================================================================
// Applicability
// =============================================================================

/// Request URL in the shapes the tests need.
struct UrlForms {
    /// Normalized URL (always has a path).
    url: String,
    /// `url` with an explicit port removed from the authority.
    domain: String,
    url_path: String,
    domain_path: String,
}

impl UrlForms {
    fn new(url: &str) -> Self {
        let url = format_url(url);
        let domain = domain_url(&url).into_owned();
        let url_path = strip_query(&url).to_string();
        let domain_path = strip_query(&domain).to_string();
        Self {
            url,
            domain,
            url_path,
            domain_path,
        }
    }
}

/// How a rule applied.
enum Hit {
    /// Regex hit with `$1..$9`; empty for a negated rule.
    Regex(Vec<String>),
    /// Whole URL equality: the target is used as is.
    Exact,
    /// Prefix hit: the unmatched remainder is joined onto the target.
    Suffix(String),
}

fn test_rule(rule: &Rule, forms: &UrlForms) -> Option<Hit> {
    match &rule.pattern {
        Pattern::Regex(re) => {
            let caps = re.captures(&forms.url).or_else(|| {
                if rule.is_domain() {
                    re.captures(&forms.domain)
                } else {
                    None
                }
            });
            if caps.is_some() == rule.is_negated() {
                return None;
            }
            let captures = caps
                .map(|caps| {
                    (1..10)
                        .map(|i| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string()))
                        .collect()
                })
                .unwrap_or_default();
            Some(Hit::Regex(captures))
        }
        Pattern::Wildcard(wildcard) => test_wildcard(wildcard, &forms.url),
        Pattern::Literal(literal) if rule.is_exact() => {
            (set_protocol(literal, &forms.url) == forms.url.as_str()).then_some(Hit::Exact)
        }
        Pattern::Literal(literal) => test_prefix(literal, rule.is_domain(), forms),
    }
}

fn test_wildcard(wildcard: &Wildcard, url: &str) -> Option<Hit> {
    let host_end = wildcard.pre_match.captures(url)?.get(1)?.end();
    let file_path = &url[host_end..];

    if wildcard.is_exact {
        return (file_path == wildcard.path).then_some(Hit::Exact);
    }

    let rest = file_path.strip_prefix(wildcard.path.as_str())?;
    let bounded = wildcard.has_query
        || rest.is_empty()
        || wildcard.path.ends_with('/')
        || rest.starts_with(|c: char| c == '/' || c == '?');
    bounded.then(|| Hit::Suffix(query_suffix(rest, wildcard.has_query)))
}

fn test_prefix(literal: &str, is_domain: bool, forms: &UrlForms) -> Option<Hit> {
    let pattern = set_protocol(literal, &forms.url);
    let (full, path) = if forms.url.starts_with(&*pattern) {
        (&forms.url, &forms.url_path)
    } else if is_domain && forms.domain.starts_with(&*pattern) {
        (&forms.domain, &forms.domain_path)
    } else {
        return None;
    };

    let len = pattern.len();
    let has_query = pattern.contains('?');
    // `/foo` must not claim `/foobar`
    let bounded = has_query
        || path.as_str() == &*pattern
        || path.as_bytes().get(len).is_some_and(|&b| is_path_separator(b))
        || pattern.as_bytes().last().is_some_and(|&b| is_path_separator(b));
    bounded.then(|| Hit::Suffix(query_suffix(&full[len..], has_query)))
}

/// A pattern that already carries a query leaves a bare parameter tail.
fn query_suffix(rest: &str, has_query: bool) -> String {
    if has_query && !rest.is_empty() {
        format!("?{rest}")
    } else {
        rest.to_string()
    }
}

// =============================================================================
// Result Synthesis
// =============================================================================

fn synthesize(rule: &Arc<Rule>, hit: Hit, forms: &UrlForms, scope: &mut ValueScope<'_>) -> MatchResult {
    let resolved = scope.resolve_vars(&rule.matcher);

    let (matcher, url, files, captures) = match hit {
        Hit::Regex(captures) => {
            let files = get_files(&resolved).map(|files| {
                files
                    .iter()
                    .map(|file| substitute_captures(file, &captures))
                    .collect()
            });
            let url = set_protocol(&substitute_captures(&resolved, &captures), &forms.url).into_owned();
            (url.clone(), url, files, captures)
        }
        Hit::Exact => {
            let url = set_protocol(&resolved, &forms.url).into_owned();
            let files = get_files(&url);
            (resolved, url, files, Vec::new())
        }
        Hit::Suffix(suffix) => {
            let target = set_protocol(&resolved, &forms.url).into_owned();
            let files = get_files(&target)
                .map(|files| files.iter().map(|file| join(file, &suffix)).collect());
            let url = join(&target, &suffix);
            (resolved, url, files, Vec::new())
        }
    };

    let (target, key) = resolve_value(&matcher, url, files, scope);
    log::trace!("{} rule `{}` hit -> {:?}", rule.category, rule.raw, target);

    MatchResult {
        target,
        matcher,
        key,
        captures,
        rule: Arc::clone(rule),
    }
}

/// Replace `$1..$9` with captures; `\$n` stands for a literal `$n`.
fn substitute_captures(template: &str, captures: &[String]) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let escaped = bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'$');
        let dollar = if escaped { i + 1 } else { i };
        match bytes.get(dollar + 1) {
            Some(&d) if bytes[dollar] == b'$' && (b'1'..=b'9').contains(&d) => {
                out.push_str(&template[start..i]);
                if escaped {
                    out.push_str(&template[dollar..dollar + 2]);
                } else {
                    let n = usize::from(d - b'1');
                    out.push_str(captures.get(n).map_or("", String::as_str));
                }
                i = dollar + 2;
                start = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&template[start..]);
    out
}

/// Turn the resolved matcher into its target kind.
///
/// The part after `scheme://` may be `{key}` (named value), `(literal)` or
/// `<path>`; anything else keeps the synthesized URL.
fn resolve_value(
    matcher: &str,
    url: String,
    files: Option<Vec<String>>,
    scope: &mut ValueScope<'_>,
) -> (Target, Option<String>) {
    let split = matcher.find("://").map_or(0, |pos| pos + 3);
    let (protocol, body) = matcher.split_at(split);

    let key = body
        .strip_prefix('{')
        .and_then(|inner| inner.rfind('}').filter(|&end| end > 0).map(|end| inner[..end].to_string()));
    if let Some(value) = key.as_deref().and_then(|key| scope.get(key)) {
        return (Target::Value(format!("{protocol}{value}")), key);
    }

    if let Some(literal) = enclosed(body, '(', ')') {
        return (Target::Value(format!("{protocol}{literal}")), key);
    }

    if let Some(inline) = enclosed(body, '<', '>') {
        let path = format!("{protocol}{inline}");
        let files = get_files(&path).unwrap_or_default();
        return (Target::Path { path, files }, key);
    }

    let target = match files {
        Some(files) => Target::Files { url, files },
        None => Target::Url(url),
    };
    (target, key)
}

/// Text between a leading `open` and the last `close`. Without a closing
/// character the whole text is returned.
fn enclosed(text: &str, open: char, close: char) -> Option<&str> {
    let inner = text.strip_prefix(open)?;
    Some(inner.rfind(close).map_or(text, |end| &inner[..end]))
}
