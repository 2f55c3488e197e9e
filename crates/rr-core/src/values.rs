//! Named-value registries and per-call variable scopes
//!
//! Rule text can reference two external key/value registries: named rule
//! fragments (inlined by the preprocessor) and named values (substituted into
//! matchers). Both are read-only [`ValueSource`]s injected by the caller.
//!
//! A [`ValueScope`] layers an optional per-instance map of scoped values over
//! the value registry for the duration of one match call.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Read-only key/value registry.
pub trait ValueSource: Send + Sync {
    fn value(&self, key: &str) -> Option<Cow<'_, str>>;
}

/// Registry with no entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyValues;

impl ValueSource for EmptyValues {
    fn value(&self, _key: &str) -> Option<Cow<'_, str>> {
        None
    }
}

impl ValueSource for HashMap<String, String> {
    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl ValueSource for BTreeMap<String, String> {
    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl ValueSource for Map<String, Value> {
    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.get(key)? {
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Null => None,
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

// =============================================================================
// Value Scope
// =============================================================================

/// Variable lookup for one match call: scoped values first, then the registry.
///
/// Object and array scoped values are serialized to JSON on first use and the
/// text is reused for the rest of the call.
pub struct ValueScope<'a> {
    registry: &'a dyn ValueSource,
    scoped: Option<&'a Map<String, Value>>,
    serialized: HashMap<String, String>,
}

impl<'a> ValueScope<'a> {
    pub fn new(registry: &'a dyn ValueSource) -> Self {
        Self {
            registry,
            scoped: None,
            serialized: HashMap::new(),
        }
    }

    pub fn with_scoped(mut self, scoped: &'a Map<String, Value>) -> Self {
        self.scoped = Some(scoped);
        self
    }

    /// Look a key up. A key present in the scoped values shadows the
    /// registry even when its value is `null`. Number and boolean scoped
    /// values come back as their JSON text.
    pub fn get(&mut self, key: &str) -> Option<String> {
        self.lookup(key, false)
    }

    fn lookup(&mut self, key: &str, text_only: bool) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        if let Some(scoped) = self.scoped {
            if let Some(value) = scoped.get(key) {
                return self.scoped_value(key, value, text_only);
            }
        }
        self.registry.value(key).map(Cow::into_owned)
    }

    fn scoped_value(&mut self, key: &str, value: &Value, text_only: bool) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            Value::Object(_) | Value::Array(_) => Some(
                self.serialized
                    .entry(key.to_string())
                    .or_insert_with(|| value.to_string())
                    .clone(),
            ),
            Value::Bool(_) | Value::Number(_) if text_only => None,
            other => Some(other.to_string()),
        }
    }

    /// Replace every `${name}` whose value is known text. Unknown references,
    /// and scoped numbers or booleans, are left as written.
    pub fn resolve_vars(&mut self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            match after.find(|c: char| c == '{' || c == '}') {
                Some(end) if end > 0 && after.as_bytes()[end] == b'}' => {
                    out.push_str(&rest[..start]);
                    match self.lookup(&after[..end], true) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&rest[start..start + end + 3]),
                    }
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push_str(&rest[..start + 1]);
                    rest = &rest[start + 1..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}
