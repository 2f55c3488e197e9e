//! Category names and scheme aliases
//!
//! Every declaration is filed into exactly one category bucket. Built-in
//! categories are listed in [`BUILTIN_PROTOCOLS`]; callers may register more
//! at runtime. The order of the list is the order in which categories are
//! evaluated when all rules for a URL are resolved.

use std::collections::HashMap;

pub const HOST: &str = "host";
pub const RULE: &str = "rule";
pub const PROXY: &str = "proxy";
pub const PLUGIN: &str = "plugin";
pub const FILTER: &str = "filter";
pub const IGNORE: &str = "ignore";
pub const DISABLE: &str = "disable";

/// Bucket for rules that target the tool's own local-override host. Not a
/// protocol: it is never part of a full resolution pass.
pub const LOCAL_RULE: &str = "_localRule";

pub const BUILTIN_PROTOCOLS: &[&str] = &[
    "host", "rule", "weinre", "proxy", "pac", "filter", "ignore", "enable", "disable",
    "plugin", "log", "delete", "urlParams", "dispatch", "params", "statusCode",
    "replaceStatus", "method", "cache", "attachment", "location", "referer", "auth", "ua",
    "reqDelay", "resDelay", "reqSpeed", "resSpeed", "reqType", "resType", "reqCharset",
    "resCharset", "reqCookies", "resCookies", "reqCors", "resCors", "reqHeaders",
    "resHeaders", "reqPrepend", "resPrepend", "reqBody", "resBody", "reqAppend",
    "resAppend", "urlReplace", "reqReplace", "resReplace", "reqWrite", "resWrite",
    "reqWriteRaw", "resWriteRaw", "reqScript", "resScript", "cssAppend", "htmlAppend",
    "jsAppend", "cssBody", "htmlBody", "jsBody", "cssPrepend", "htmlPrepend", "jsPrepend",
    "responseFor",
];

/// Alternate scheme names and the category they file into.
pub const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("pathReplace", "urlReplace"),
    ("download", "attachment"),
    ("debug", "weinre"),
    ("reqMerge", "params"),
];

/// Ordered category names plus scheme aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocols {
    names: Vec<String>,
    aliases: HashMap<String, String>,
}

impl Default for Protocols {
    fn default() -> Self {
        Self {
            names: BUILTIN_PROTOCOLS.iter().map(|name| name.to_string()).collect(),
            aliases: BUILTIN_ALIASES
                .iter()
                .map(|(alias, name)| (alias.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl Protocols {
    /// Register a dynamic category. Returns `false` if it already exists.
    pub fn register(&mut self, name: &str) -> bool {
        if name.is_empty() || name == LOCAL_RULE || self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Make `alias://` file into `name`.
    pub fn add_alias(&mut self, alias: &str, name: &str) {
        self.aliases.insert(alias.to_string(), name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Category for an aliased scheme.
    pub fn alias_of(&self, scheme: &str) -> Option<&str> {
        self.aliases.get(scheme).map(String::as_str)
    }

    /// Category names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let protocols = Protocols::default();
        for name in [HOST, RULE, PROXY, PLUGIN, FILTER, IGNORE, DISABLE] {
            assert!(protocols.contains(name), "{name}");
        }
        assert!(!protocols.contains(LOCAL_RULE));
        assert_eq!(protocols.names().next(), Some(HOST));
    }

    #[test]
    fn register_appends_once() {
        let mut protocols = Protocols::default();
        let before = protocols.len();
        assert!(protocols.register("mock"));
        assert!(!protocols.register("mock"));
        assert!(!protocols.register(LOCAL_RULE));
        assert_eq!(protocols.len(), before + 1);
        assert_eq!(protocols.names().last(), Some("mock"));
    }

    #[test]
    fn aliases_resolve() {
        let mut protocols = Protocols::default();
        assert_eq!(protocols.alias_of("debug"), Some("weinre"));
        assert_eq!(protocols.alias_of("http"), None);
        protocols.add_alias("mock2", "mock");
        assert_eq!(protocols.alias_of("mock2"), Some("mock"));
    }
}
