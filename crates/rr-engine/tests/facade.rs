//! Resolution policy across categories.

use serde_json::json;

use rr_engine::{Rules, Target};

fn rules(text: &str) -> Rules {
    let mut rules = Rules::new();
    rules.set_root(text);
    rules
}

#[test]
fn negated_literals_are_dropped() {
    let rules = rules("!a.com http://b.com\n!a.com 1.1.1.1");
    assert!(rules.reader().snapshot().is_empty());
    assert!(rules.resolve_rule("http://a.com/", 0).is_none());
    assert!(rules.resolve_rules("http://c.com/").is_empty());
}

#[test]
fn negated_regex_matches_the_rest() {
    let rules = rules("!/a\\.com/ http://fallback.com");
    assert!(rules.resolve_rule("http://a.com/", 0).is_none());
    let hit = rules.resolve_rule("http://b.com/x", 0).unwrap();
    assert_eq!(hit.matcher, "http://fallback.com");
}

#[test]
fn filtered_proxy_scheme_is_suppressed() {
    let socks = rules("a.com filter://socks\na.com socks://127.0.0.1:1080\nb.com socks://127.0.0.1:1080");
    assert!(socks.resolve_proxy("http://a.com/").is_none());
    assert_eq!(socks.resolve_proxy("http://b.com/").unwrap().matcher, "socks://127.0.0.1:1080");

    let http = rules("a.com filter://socks\na.com http-proxy://127.0.0.1:8888");
    assert_eq!(http.resolve_proxy("http://a.com/").unwrap().matcher, "http-proxy://127.0.0.1:8888");
}

#[test]
fn proxy_survives_its_own_filter() {
    // `resolve_rules` keeps the proxy match even when `proxy` is filtered.
    let rules = rules("a.com filter://proxy|rule\na.com proxy://127.0.0.1:8888\na.com http://b.com\na.com 1.1.1.1");
    let resolved = rules.resolve_rules("http://a.com/x");
    assert!(resolved.contains("proxy"));
    assert!(resolved.contains("host"));
    assert!(!resolved.contains("rule"));

    assert!(rules.resolve_rule("http://a.com/x", 0).is_none());
}

#[test]
fn categories_resolve_in_order() {
    let rules = rules("a.com 1.1.1.1\na.com resBody://(hello)\na.com http://b.com\na.com reqHeaders://{headers}");
    let resolved = rules.resolve_rules("http://a.com/");
    let names: Vec<&str> = resolved.iter().map(|r| r.name()).collect();
    assert_eq!(names, ["host", "rule", "reqHeaders", "resBody"]);

    let resolved = rules.resolve_rules("http://a.com/");
    assert_eq!(resolved.get("resBody").unwrap().value(), Some("resBody://hello"));
    assert_eq!(resolved.get("reqHeaders").unwrap().key.as_deref(), Some("headers"));
}

#[test]
fn suffix_is_carried_to_target() {
    let rules = rules("a.com/api http://b.com/v1?token=1");
    let hit = rules.resolve_rule("http://a.com/api/users?id=2", 0).unwrap();
    assert_eq!(hit.url(), Some("http://b.com/v1/users?token=1&id=2"));
}

#[test]
fn file_alternatives() {
    let rules = rules("a.com/static file:///srv/one|/srv/two");
    let hit = rules.resolve_rule("http://a.com/static/app.js", 0).unwrap();
    assert_eq!(
        hit.target,
        Target::Files {
            url: "file:///srv/one|/srv/two/app.js".to_string(),
            files: vec!["/srv/one/app.js".to_string(), "/srv/two/app.js".to_string()],
        }
    );
}

#[test]
fn scoped_values_shadow_registry() {
    let registry: std::collections::HashMap<String, String> =
        [("target".to_string(), "registry.com".to_string())].into();
    let scoped = json!({ "target": "scoped.com" });
    let mut rules = Rules::builder()
        .values(registry.clone())
        .scoped_values(scoped.as_object().cloned().unwrap_or_default())
        .build();
    rules.set_root("a.com http://${target}/x");
    assert_eq!(rules.resolve_rule("http://a.com/", 0).unwrap().matcher, "http://scoped.com/x");

    let mut rules = Rules::builder().values(registry).build();
    rules.set_root("a.com http://${target}/x");
    assert_eq!(rules.resolve_rule("http://a.com/", 0).unwrap().matcher, "http://registry.com/x");
}

#[test]
fn variable_resolution_is_stable() {
    let mut rules = Rules::builder()
        .scoped_values(json!({ "foo": "bar" }).as_object().cloned().unwrap_or_default())
        .build();
    rules.set_root("a.com http://${foo}.com");
    let first = rules.resolve_rule("http://a.com/", 0).unwrap();
    assert_eq!(first.matcher, "http://bar.com");
    let second = rules.resolve_rule("http://a.com/", 0).unwrap();
    assert_eq!(second.matcher, first.matcher);
}

#[test]
fn dynamic_protocols() {
    let mut rules = Rules::builder().protocol("mock").alias("fake", "mock").build();
    rules.set_root("a.com mock://x\nb.com fake://y");
    assert_eq!(rules.resolve_rules("http://a.com/").get("mock").unwrap().matcher, "mock://x");
    assert_eq!(rules.resolve_rules("http://b.com/").get("mock").unwrap().matcher, "fake://y");
}
