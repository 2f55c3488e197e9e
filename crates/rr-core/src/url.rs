//! URL helpers for the hot path
//!
//! Rule patterns and request URLs are plain strings. These helpers normalize
//! and recombine them by scanning bytes, without a full URL parser.

use std::borrow::Cow;

/// Schemes that get a normalized path after a join.
const WEB_SCHEMES: [&str; 5] = ["http", "https", "ws", "wss", "tunnel"];

/// Schemes whose targets name local files and may list `|` alternatives.
const FILE_SCHEMES: [&str; 5] = ["rawfile://", "file://", "tpl://", "jsonp://", "dust://"];

// =============================================================================
// Scheme Handling
// =============================================================================

#[inline]
fn is_scheme_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'+' || b == b'-' || b == b'_'
}

/// Get the position after `://` when `url` starts with `scheme://`.
#[inline]
pub fn scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();
    let colon = bytes.iter().position(|&b| !is_scheme_byte(b))?;
    if colon == 0 || !bytes[colon..].starts_with(b"://") {
        return None;
    }
    Some(colon + 3)
}

#[inline]
pub fn has_protocol(url: &str) -> bool {
    scheme_end(url).is_some()
}

/// Scheme including its colon (`"http:"`), if any.
#[inline]
pub fn get_protocol(url: &str) -> Option<&str> {
    scheme_end(url).map(|end| &url[..end - 2])
}

/// Strip the scheme. With `clear` the `//` goes too (`host://a` -> `a`),
/// otherwise only `host:` is removed.
#[inline]
pub fn remove_protocol(url: &str, clear: bool) -> &str {
    match scheme_end(url) {
        Some(end) if clear => &url[end..],
        Some(end) => &url[end - 2..],
        None => url,
    }
}

/// Give `target` the scheme of `source` when it has none of its own.
pub fn set_protocol<'a>(target: &'a str, source: &str) -> Cow<'a, str> {
    if has_protocol(target) {
        return Cow::Borrowed(target);
    }
    match get_protocol(source) {
        Some(protocol) => Cow::Owned(format!("{protocol}//{target}")),
        None => Cow::Borrowed(target),
    }
}

/// Default a scheme-less URL to `http://`.
pub fn ensure_protocol(url: &str) -> Cow<'_, str> {
    if has_protocol(url) {
        Cow::Borrowed(url)
    } else {
        Cow::Owned(format!("http://{url}"))
    }
}

/// Length of a leading web scheme plus `://`.
fn web_scheme_len(url: &str, ignore_case: bool) -> Option<usize> {
    let end = scheme_end(url)?;
    let scheme = &url[..end - 3];
    let known = WEB_SCHEMES.iter().any(|web| {
        if ignore_case {
            web.eq_ignore_ascii_case(scheme)
        } else {
            *web == scheme
        }
    });
    known.then_some(end)
}

/// `http`, `https`, `ws`, `wss` or `tunnel` URL.
#[inline]
pub fn is_web_url(url: &str) -> bool {
    web_scheme_len(url, false).is_some()
}

// =============================================================================
// Normalization
// =============================================================================

/// Ensure a path segment exists: `http://a.com?x` -> `http://a.com/?x`,
/// `a.com` -> `a.com/`.
pub fn format_url(url: &str) -> String {
    let (base, query) = match url.find('?') {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    };
    let path_from = base.find("://").map_or(0, |pos| pos + 3);
    if base[path_from..].contains('/') {
        url.to_string()
    } else {
        format!("{base}/{query}")
    }
}

/// Domain form of a normalized web URL: the explicit port is stripped from
/// the authority (`http://a.com:8080/x` -> `http://a.com/x`).
pub fn domain_url(url: &str) -> Cow<'_, str> {
    let Some(host_start) = web_scheme_len(url, true) else {
        return Cow::Borrowed(url);
    };
    let Some(slash) = url[host_start..].find('/').map(|pos| host_start + pos) else {
        return Cow::Borrowed(url);
    };
    let authority = &url[host_start..slash];
    match authority.rfind(':') {
        Some(colon) if colon > 0 && authority[colon + 1..].bytes().all(|b| b.is_ascii_digit()) => {
            Cow::Owned(format!("{}{}", &url[..host_start + colon], &url[slash..]))
        }
        _ => Cow::Borrowed(url),
    }
}

/// URL without its query string and fragment.
#[inline]
pub fn strip_query(url: &str) -> &str {
    match url.find(|c: char| c == '?' || c == '#') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

/// Characters that end a path segment for boundary checks.
#[inline]
pub fn is_path_separator(c: u8) -> bool {
    c == b'/' || c == b'\\' || c == b'?'
}

// =============================================================================
// Joining
// =============================================================================

fn split_query(url: &str) -> (&str, &str) {
    match url.find('?') {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    }
}

/// Append the unmatched remainder of a request URL to a target.
///
/// Paths are joined with exactly one separator and the query strings of
/// both sides are merged (`a?x` + `b?y` -> `a/b?x&y`). Web URLs are
/// normalized afterwards so they always carry a path.
pub fn join(first: &str, second: &str) -> String {
    if first.is_empty() || second.is_empty() {
        return format!("{first}{second}");
    }

    let (first, first_query) = split_query(first);
    let (second, second_query) = split_query(second);

    let query = match (first_query.is_empty(), second_query.is_empty()) {
        (false, false) => {
            let tail = &second_query[1..];
            if tail.is_empty() || first_query.ends_with('?') || first_query.ends_with('&') {
                format!("{first_query}{tail}")
            } else {
                format!("{first_query}&{tail}")
            }
        }
        (false, true) => first_query.to_string(),
        _ => second_query.to_string(),
    };

    let mut base = first.to_string();
    if !second.is_empty() {
        let starts_with_sep = is_path_separator(second.as_bytes()[0]);
        let ends_with_sep = first.as_bytes().last().is_some_and(|&b| is_path_separator(b));
        if ends_with_sep {
            if starts_with_sep {
                base.pop();
            }
        } else if !starts_with_sep {
            base.push('/');
        }
        base.push_str(second);
    }

    let web = is_web_url(&base);
    base.push_str(&query);
    if web {
        format_url(&base)
    } else {
        base
    }
}

// =============================================================================
// File Targets
// =============================================================================

/// Ordered alternatives of a file-style target (`file://a|b` -> `[a, b]`).
/// `None` for any other scheme.
pub fn get_files(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix('x').unwrap_or(path);
    if !FILE_SCHEMES.iter().any(|scheme| rest.starts_with(scheme)) {
        return None;
    }
    Some(
        remove_protocol(path, true)
            .split('|')
            .map(str::to_string)
            .collect(),
    )
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Lowercased hostname of a URL, without userinfo, port or IPv6 brackets.
pub fn extract_hostname(url: &str) -> Option<String> {
    let start = scheme_end(url).unwrap_or(0);
    let rest = &url[start..];
    let end = rest.find(|c: char| c == '/' || c == '?' || c == '#').unwrap_or(rest.len());
    let authority = &rest[..end];
    let host_port = match authority.rfind('@') {
        Some(at) => &authority[at + 1..],
        None => authority,
    };

    let host = if let Some(bracketed) = host_port.strip_prefix('[') {
        &bracketed[..bracketed.find(']')?]
    } else {
        match host_port.find(':') {
            Some(colon) => &host_port[..colon],
            None => host_port,
        }
    };

    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_helpers() {
        assert_eq!(scheme_end("http://a.com"), Some(7));
        assert_eq!(scheme_end("a.com/x://y"), None);
        assert_eq!(get_protocol("https://a.com"), Some("https:"));
        assert_eq!(get_protocol("a.com"), None);
        assert_eq!(remove_protocol("host://1.2.3.4", true), "1.2.3.4");
        assert_eq!(remove_protocol("host://1.2.3.4", false), "//1.2.3.4");
        assert!(has_protocol("whistle.my_plugin://x"));
        assert!(!has_protocol("://x"));
    }

    #[test]
    fn test_set_protocol() {
        assert_eq!(set_protocol("a.com/", "https://b.com/"), "https://a.com/");
        assert_eq!(set_protocol("ws://a.com/", "https://b.com/"), "ws://a.com/");
        assert_eq!(set_protocol("a.com/", "b.com/"), "a.com/");
        assert_eq!(ensure_protocol("a.com"), "http://a.com");
    }

    #[test]
    fn test_format_url() {
        assert_eq!(format_url("http://a.com"), "http://a.com/");
        assert_eq!(format_url("http://a.com?x=1"), "http://a.com/?x=1");
        assert_eq!(format_url("http://a.com/x"), "http://a.com/x");
        assert_eq!(format_url("a.com"), "a.com/");
        assert_eq!(format_url("a.com/b?c=/d"), "a.com/b?c=/d");
    }

    #[test]
    fn test_domain_url() {
        assert_eq!(domain_url("http://1.2.3.4:8080/any/path"), "http://1.2.3.4/any/path");
        assert_eq!(domain_url("HTTPS://a.com:/x"), "HTTPS://a.com/x");
        assert_eq!(domain_url("http://a.com/x:80/"), "http://a.com/x:80/");
        assert_eq!(domain_url("file://a.com:80/x"), "file://a.com:80/x");
        assert_eq!(domain_url("http://[::1]/x"), "http://[::1]/x");
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("http://a.com/x?y#z"), "http://a.com/x");
        assert_eq!(strip_query("http://a.com/x#z?y"), "http://a.com/x");
        assert_eq!(strip_query("http://a.com/x"), "http://a.com/x");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join("http://b.com", "x/y"), "http://b.com/x/y");
        assert_eq!(join("http://b.com/", "/x"), "http://b.com/x");
        assert_eq!(join("http://b.com/", "x"), "http://b.com/x");
        assert_eq!(join("http://b.com", ""), "http://b.com");
        assert_eq!(join("file:///tmp", "a.txt"), "file:///tmp/a.txt");
    }

    #[test]
    fn test_join_queries() {
        assert_eq!(join("http://b.com/p?a=1", "x?b=2"), "http://b.com/p/x?a=1&b=2");
        assert_eq!(join("http://b.com", "?b=2"), "http://b.com/?b=2");
        assert_eq!(join("http://b.com?a=1", "x"), "http://b.com/x?a=1");
    }

    #[test]
    fn test_get_files() {
        assert_eq!(
            get_files("file:///a|/b"),
            Some(vec!["/a".to_string(), "/b".to_string()])
        );
        assert_eq!(get_files("xtpl://t.html"), Some(vec!["t.html".to_string()]));
        assert_eq!(get_files("xrawfile://r"), Some(vec!["r".to_string()]));
        assert_eq!(get_files("http://a.com/"), None);
        assert_eq!(get_files("xxfile://a"), None);
    }

    #[test]
    fn test_extract_hostname() {
        assert_eq!(extract_hostname("http://A.com:8080/x").as_deref(), Some("a.com"));
        assert_eq!(extract_hostname("https://u:p@a.com/x").as_deref(), Some("a.com"));
        assert_eq!(extract_hostname("http://[::1]:80/").as_deref(), Some("::1"));
        assert_eq!(extract_hostname("a.com/x").as_deref(), Some("a.com"));
        assert_eq!(extract_hostname("http:///x"), None);
    }
}
