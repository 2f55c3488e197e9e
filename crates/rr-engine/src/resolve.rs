//! Resolution facade
//!
//! Per-URL queries over the installed snapshot. Each query loads the
//! snapshot once, computes the URL forms once and uses one variable scope
//! for all categories it visits.

use std::collections::BTreeSet;

use rr_core::protocols::{DISABLE, FILTER, IGNORE, LOCAL_RULE, PLUGIN, PROXY, RULE};
use rr_core::{MatchResult, Matcher, ValueScope};

use crate::store::{Rules, RulesReader};

/// Property names carried by a filter-like match (`ignore://host|rule`).
pub type Properties = BTreeSet<String>;

/// Best match per category for one URL.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRules {
    results: Vec<MatchResult>,
    plugins: Vec<MatchResult>,
}

impl ResolvedRules {
    /// Match for one category.
    pub fn get(&self, name: &str) -> Option<&MatchResult> {
        self.results.iter().find(|result| result.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Matches in category evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter()
    }

    /// Every matching plugin rule, present only when `plugin` matched.
    pub fn plugins(&self) -> &[MatchResult] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

pub(crate) fn properties(matcher: &Matcher<'_>, category: &str, scope: &mut ValueScope<'_>) -> Properties {
    matcher
        .find(category, scope, 0)
        .map(|result| {
            result
                .matcher_value()
                .split('|')
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Filter and ignore hits folded together. Ignored names that are not
/// categories are recorded as `ignore|<name>`.
pub(crate) fn filter_of(matcher: &Matcher<'_>, scope: &mut ValueScope<'_>) -> Properties {
    let protocols = matcher.snapshot().protocols();

    let mut filter = properties(matcher, FILTER, scope);
    for name in properties(matcher, IGNORE, scope) {
        if protocols.contains(&name) {
            filter.insert(name);
        } else {
            filter.insert(format!("ignore|{name}"));
        }
    }
    filter.remove(FILTER);
    filter
}

fn proxy_of(matcher: &Matcher<'_>, filter: &Properties, scope: &mut ValueScope<'_>) -> Option<MatchResult> {
    let proxy = matcher.find(PROXY, scope, 0)?;

    let forced = if filter.contains("proxy") {
        Some("proxy:")
    } else if filter.contains("socks") {
        Some("socks:")
    } else {
        None
    };
    if forced.is_some_and(|scheme| proxy.matcher.starts_with(scheme)) {
        return None;
    }
    Some(proxy)
}

// One snapshot load per query: a concurrent `set_root` or `append` is seen
// whole or not at all.
impl RulesReader {
    /// Names the `filter` and `ignore` categories switch off for `url`.
    pub fn resolve_filter(&self, url: &str) -> Properties {
        let snapshot = self.snapshot.load();
        filter_of(&Matcher::new(&snapshot, url), &mut self.scope())
    }

    /// Names the `disable` category carries for `url`.
    pub fn resolve_disable(&self, url: &str) -> Properties {
        let snapshot = self.snapshot.load();
        properties(&Matcher::new(&snapshot, url), DISABLE, &mut self.scope())
    }

    /// Best match of every category that is not filtered out.
    ///
    /// `proxy` is always consulted and survives its own filter, so a proxy
    /// can still be chosen while everything else is switched off.
    pub fn resolve_rules(&self, url: &str) -> ResolvedRules {
        let snapshot = self.snapshot.load();
        let matcher = Matcher::new(&snapshot, url);
        let mut scope = self.scope();
        let filter = filter_of(&matcher, &mut scope);

        let mut resolved = ResolvedRules::default();
        for name in snapshot.protocols().names() {
            if name != PROXY && filter.contains(name) {
                continue;
            }
            if let Some(result) = matcher.find(name, &mut scope, 0) {
                resolved.results.push(result);
            }
        }

        if resolved.contains(PLUGIN) {
            resolved.plugins = matcher.find_all(PLUGIN, &mut scope);
        }
        resolved
    }

    /// Best proxy match, unless the filter forces a `proxy:`/`socks:` scheme
    /// that the match already uses.
    pub fn resolve_proxy(&self, url: &str) -> Option<MatchResult> {
        let snapshot = self.snapshot.load();
        let matcher = Matcher::new(&snapshot, url);
        let mut scope = self.scope();
        let filter = filter_of(&matcher, &mut scope);
        proxy_of(&matcher, &filter, &mut scope)
    }

    /// The `index`-th `rule` match (0 = best), or nothing when `rule` is
    /// filtered.
    pub fn resolve_rule(&self, url: &str, index: usize) -> Option<MatchResult> {
        let snapshot = self.snapshot.load();
        let matcher = Matcher::new(&snapshot, url);
        let mut scope = self.scope();
        if filter_of(&matcher, &mut scope).contains(RULE) {
            return None;
        }
        matcher.find(RULE, &mut scope, index)
    }

    /// Match against the local-override bucket. Store values do not apply.
    pub fn resolve_local_rule(&self, url: &str) -> Option<MatchResult> {
        let snapshot = self.snapshot.load();
        Matcher::new(&snapshot, url).find(LOCAL_RULE, &mut ValueScope::new(&*self.values), 0)
    }
}

impl Rules {
    pub fn resolve_filter(&self, url: &str) -> Properties {
        self.reader().resolve_filter(url)
    }

    pub fn resolve_disable(&self, url: &str) -> Properties {
        self.reader().resolve_disable(url)
    }

    pub fn resolve_rules(&self, url: &str) -> ResolvedRules {
        self.reader().resolve_rules(url)
    }

    pub fn resolve_proxy(&self, url: &str) -> Option<MatchResult> {
        self.reader().resolve_proxy(url)
    }

    pub fn resolve_rule(&self, url: &str, index: usize) -> Option<MatchResult> {
        self.reader().resolve_rule(url, index)
    }

    pub fn resolve_local_rule(&self, url: &str) -> Option<MatchResult> {
        self.reader().resolve_local_rule(url)
    }
}
