//! Per-category rule buckets
//!
//! A [`RuleSnapshot`] is built off to the side by the compiler and then
//! installed as a whole; readers only ever see complete snapshots. Rules are
//! reference counted so extending a snapshot with an appended fragment copies
//! pointers, not rules.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocols::{Protocols, LOCAL_RULE};
use crate::types::Rule;

/// Ordered rule lists keyed by category. Insertion order is priority.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    protocols: Protocols,
    buckets: HashMap<String, Vec<Arc<Rule>>>,
}

impl RuleSnapshot {
    /// Empty snapshot with one bucket per category plus the local-rule bucket.
    pub fn new(protocols: Protocols) -> Self {
        let mut buckets: HashMap<String, Vec<Arc<Rule>>> = protocols
            .names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        buckets.insert(LOCAL_RULE.to_string(), Vec::new());
        Self { protocols, buckets }
    }

    pub fn protocols(&self) -> &Protocols {
        &self.protocols
    }

    /// Rules of one category in priority order.
    pub fn rules(&self, category: &str) -> &[Arc<Rule>] {
        self.buckets.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.buckets.contains_key(category)
    }

    /// Append a rule to the end of its category.
    pub fn push(&mut self, rule: Rule) {
        self.buckets
            .entry(rule.category.clone())
            .or_default()
            .push(Arc::new(rule));
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Rule count per category, in evaluation order, local-rule bucket last.
    pub fn counts(&self) -> Vec<(&str, usize)> {
        self.protocols
            .names()
            .chain(std::iter::once(LOCAL_RULE))
            .map(|name| (name, self.rules(name).len()))
            .collect()
    }

    /// Every rule, category by category in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.protocols
            .names()
            .chain(std::iter::once(LOCAL_RULE))
            .flat_map(move |name| self.rules(name).iter())
    }
}

impl Default for RuleSnapshot {
    fn default() -> Self {
        Self::new(Protocols::default())
    }
}

impl Extend<Rule> for RuleSnapshot {
    fn extend<I: IntoIterator<Item = Rule>>(&mut self, iter: I) {
        for rule in iter {
            self.push(rule);
        }
    }
}
