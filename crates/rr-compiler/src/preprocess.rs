//! Document preprocessing
//!
//! Rule text is split into lines, `${fragment}` and `{value}` lines are
//! inlined from their registries, comments are stripped and each line is cut
//! into tokens. The first token that looks like a URL pattern decides which
//! side of the line is the pattern and which the matchers.

use std::borrow::Cow;
use std::collections::HashSet;

use rr_core::url::{has_protocol, is_web_url};
use rr_core::ValueSource;

use crate::parser::{is_host_literal, is_regex_literal};

/// One `pattern matcher` pair cut out of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub pattern: String,
    pub matcher: String,
    /// Source line the pair came from.
    pub raw: String,
}

// =============================================================================
// Lines
// =============================================================================

struct Expander<'a> {
    root: bool,
    fragments: &'a dyn ValueSource,
    values: &'a dyn ValueSource,
    seen_fragments: HashSet<String>,
    seen_values: HashSet<String>,
    lines: Vec<String>,
}

impl<'a> Expander<'a> {
    fn expand(&mut self, text: &str) {
        for line in text.split(|c: char| c == '\n' || c == '\r') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(key) = reference_key(line, "${") {
                if self.root && self.seen_fragments.insert(key.to_string()) {
                    let fragments = self.fragments;
                    if let Some(body) = fragments.value(key) {
                        self.expand(&body);
                    }
                }
                continue;
            }

            if let Some(key) = reference_key(line, "{") {
                if self.root && self.seen_values.insert(key.to_string()) {
                    let values = self.values;
                    if let Some(body) = values.value(key) {
                        self.expand(&body);
                    }
                }
                continue;
            }

            self.lines.push(line.to_string());
        }
    }
}

/// Name inside a line that is exactly `open` + name + `}`.
fn reference_key<'l>(line: &'l str, open: &str) -> Option<&'l str> {
    let key = line.strip_prefix(open)?.strip_suffix('}')?;
    (!key.is_empty() && !key.contains(char::is_whitespace)).then_some(key)
}

/// Trimmed, non-empty lines with fragment and value references inlined.
///
/// References are honored in root documents only and each name is inlined
/// at most once per call, so self-including fragments terminate. Elsewhere
/// reference lines are dropped.
pub fn get_lines(
    text: &str,
    root: bool,
    fragments: &dyn ValueSource,
    values: &dyn ValueSource,
) -> Vec<String> {
    let mut expander = Expander {
        root,
        fragments,
        values,
        seen_fragments: HashSet::new(),
        seen_values: HashSet::new(),
        lines: Vec::new(),
    };
    expander.expand(text.trim());
    expander.lines
}

// =============================================================================
// Tokens
// =============================================================================

/// Expand shorthand token forms to explicit URLs.
///
/// `//host/x` loses its leading slashes; inline values, paths and absolute
/// file paths become `file://` targets.
pub fn detect_shorthand(token: &str) -> Cow<'_, str> {
    let bytes = token.as_bytes();

    if bytes.len() > 2 && bytes.starts_with(b"//") && bytes[2] != b'/' {
        return Cow::Borrowed(&token[2..]);
    }

    if token == "{}"
        || is_enclosed(token, '{', '}') && !token[1..token.len() - 1].contains(char::is_whitespace)
        || is_enclosed(token, '<', '>')
        || is_enclosed(token, '(', ')')
    {
        return Cow::Owned(format!("file://{token}"));
    }

    if is_file_path(bytes) && !is_regex_literal(token) {
        return Cow::Owned(format!("file://{token}"));
    }

    if let Some(rest) = token.strip_prefix("file:///") {
        let drive = rest.as_bytes();
        if drive.len() >= 3 && drive[0].is_ascii_uppercase() && drive[1] == b':' && drive[2] == b'/' {
            return Cow::Owned(format!("file://{rest}"));
        }
    }

    Cow::Borrowed(token)
}

fn is_enclosed(token: &str, open: char, close: char) -> bool {
    token.len() >= 2 && token.starts_with(open) && token.ends_with(close)
}

/// `/abs`, `C:\x` or `C:/x` (but not `C://x`).
fn is_file_path(bytes: &[u8]) -> bool {
    match bytes {
        [b'/', ..] => true,
        [drive, b':', b'\\', ..] => drive.is_ascii_alphabetic(),
        [drive, b':', b'/', rest @ ..] => drive.is_ascii_alphabetic() && rest.first() != Some(&b'/'),
        _ => false,
    }
}

/// Position of the token that acts as the URL pattern.
///
/// Explicit markers (`$`, `!`), web URLs, regex literals and scheme-less
/// hosts win at once. A bare IP literal only anchors the line when nothing
/// better is found, so `1.2.3.4 a.com` reads as `a.com -> 1.2.3.4`.
pub fn index_of_pattern<S: AsRef<str>>(tokens: &[S]) -> Option<usize> {
    let mut ip_index = None;

    for (i, token) in tokens.iter().enumerate() {
        let token = token.as_ref();
        if token.starts_with('$') || token.starts_with('!') || is_web_url(token) || is_regex_literal(token) {
            return Some(i);
        }
        if !has_protocol(token) {
            if !is_host_literal(token) {
                return Some(i);
            }
            ip_index.get_or_insert(i);
        }
    }

    ip_index
}

/// Comment-free text of a line.
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Cut rule text into declarations.
///
/// `pattern m1 m2` yields one declaration per matcher; when the pattern
/// token is not first, `m p1 p2` yields one per pattern sharing `m`.
pub fn declarations(
    text: &str,
    root: bool,
    fragments: &dyn ValueSource,
    values: &dyn ValueSource,
) -> Vec<Declaration> {
    let mut out = Vec::new();

    for raw in get_lines(text, root, fragments, values) {
        let tokens: Vec<Cow<'_, str>> = strip_comment(&raw)
            .split_whitespace()
            .map(detect_shorthand)
            .collect();
        if tokens.len() < 2 {
            continue;
        }
        let Some(index) = index_of_pattern(&tokens) else {
            log::debug!("no pattern in `{raw}`");
            continue;
        };

        let head = &tokens[0];
        for token in &tokens[1..] {
            let (pattern, matcher) = if index > 0 { (token, head) } else { (head, token) };
            out.push(Declaration {
                pattern: pattern.to_string(),
                matcher: matcher.to_string(),
                raw: raw.clone(),
            });
        }
    }

    out
}
