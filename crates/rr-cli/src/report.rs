//! JSON output shapes.

use serde::Serialize;

use rr_engine::{MatchResult, Properties, ResolvedHost, ResolvedRules, Target};

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TargetReport {
    Url { url: String },
    Files { url: String, files: Vec<String> },
    Value { value: String },
    Path { path: String, files: Vec<String> },
}

impl From<&Target> for TargetReport {
    fn from(target: &Target) -> Self {
        match target {
            Target::Url(url) => Self::Url { url: url.clone() },
            Target::Files { url, files } => Self::Files {
                url: url.clone(),
                files: files.clone(),
            },
            Target::Value(value) => Self::Value { value: value.clone() },
            Target::Path { path, files } => Self::Path {
                path: path.clone(),
                files: files.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub category: String,
    pub pattern: String,
    pub matcher: String,
    pub target: TargetReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub line: String,
}

impl From<&MatchResult> for MatchReport {
    fn from(result: &MatchResult) -> Self {
        Self {
            category: result.name().to_string(),
            pattern: result.rule.raw_pattern.clone(),
            matcher: result.matcher.clone(),
            target: TargetReport::from(&result.target),
            key: result.key.clone(),
            captures: result.captures.clone(),
            port: result.rule.port,
            line: result.rule.raw.clone(),
        }
    }
}

fn report(result: Option<MatchResult>) -> Option<MatchReport> {
    result.as_ref().map(MatchReport::from)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReport {
    pub url: String,
    pub filter: Vec<String>,
    pub disable: Vec<String>,
    pub rules: Vec<MatchReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<MatchReport>,
    pub proxy: Option<MatchReport>,
    pub rule: Option<MatchReport>,
    pub local_rule: Option<MatchReport>,
}

impl ResolveReport {
    pub fn new(
        url: &str,
        filter: Properties,
        disable: Properties,
        resolved: &ResolvedRules,
        proxy: Option<MatchResult>,
        rule: Option<MatchResult>,
        local_rule: Option<MatchResult>,
    ) -> Self {
        Self {
            url: url.to_string(),
            filter: filter.into_iter().collect(),
            disable: disable.into_iter().collect(),
            rules: resolved.iter().map(MatchReport::from).collect(),
            plugins: resolved.plugins().iter().map(MatchReport::from).collect(),
            proxy: report(proxy),
            rule: report(rule),
            local_rule: report(local_rule),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReport {
    pub url: String,
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub rule: Option<MatchReport>,
}

impl HostReport {
    pub fn new(url: &str, resolved: Option<ResolvedHost>) -> Self {
        match resolved {
            Some(resolved) => Self {
                url: url.to_string(),
                host: Some(resolved.host),
                port: resolved.port,
                rule: report(resolved.rule),
            },
            None => Self {
                url: url.to_string(),
                host: None,
                port: None,
                rule: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_engine::Rules;
    use serde_json::json;

    #[test]
    fn resolve_report_shape() {
        let mut rules = Rules::new();
        rules.set_root("a.com/api resBody://(ok)\na.com filter://log");
        let url = "http://a.com/api";
        let report = ResolveReport::new(
            url,
            rules.resolve_filter(url),
            rules.resolve_disable(url),
            &rules.resolve_rules(url),
            rules.resolve_proxy(url),
            rules.resolve_rule(url, 0),
            rules.resolve_local_rule(url),
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["filter"], json!(["log"]));
        assert_eq!(value["rules"][0]["category"], "filter");
        assert_eq!(value["rules"][1]["category"], "resBody");
        assert_eq!(value["rules"][1]["target"], json!({ "kind": "value", "value": "resBody://ok" }));
        assert_eq!(value["rules"][1]["pattern"], "a.com/api");
        assert!(value["proxy"].is_null());
        assert!(value.get("plugins").is_none());
    }

    #[test]
    fn host_report_from_rule() {
        let mut rules = Rules::new();
        rules.set_root("a.com 10.0.0.1:8080");
        let host = rules.get_host("a.com", Default::default()).map(|rule| ResolvedHost {
            host: "10.0.0.1".to_string(),
            port: rule.rule.port,
            rule: Some(rule),
        });
        let value = serde_json::to_value(HostReport::new("a.com", host)).unwrap();
        assert_eq!(value["host"], "10.0.0.1");
        assert_eq!(value["port"], 8080);
        assert_eq!(value["rule"]["matcher"], "host://10.0.0.1");
    }
}
