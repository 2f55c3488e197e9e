//! Rule store lifecycle
//!
//! A [`Rules`] store owns the source history (one root document plus the
//! fragments appended after it) and publishes compiled snapshots through an
//! [`ArcSwap`]. Every mutation compiles a complete snapshot off to the side
//! and installs it in one store, so [`RulesReader`]s on other threads only
//! ever observe whole snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::{Map, Value};

use rr_compiler::{build_snapshot, extend_snapshot, ParseContext, Source};
use rr_core::{Protocols, RuleSnapshot, ValueScope, ValueSource};

use crate::config::RulesBuilder;

// =============================================================================
// Reader
// =============================================================================

/// Cheap, cloneable read handle on a store. All resolution queries live here.
#[derive(Clone)]
pub struct RulesReader {
    pub(crate) snapshot: Arc<ArcSwap<RuleSnapshot>>,
    pub(crate) values: Arc<dyn ValueSource>,
    pub(crate) scoped: Arc<Map<String, Value>>,
    disabled: Arc<AtomicBool>,
}

impl RulesReader {
    /// Currently installed snapshot.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshot.load_full()
    }

    /// Set when the root was last replaced with empty text. Queries do not
    /// check this; callers should.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Variable scope for one query: store values over the registry.
    pub(crate) fn scope(&self) -> ValueScope<'_> {
        ValueScope::new(&*self.values).with_scoped(&self.scoped)
    }
}

impl std::fmt::Debug for RulesReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesReader")
            .field("rules", &self.snapshot.load().len())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}

// =============================================================================
// Store
// =============================================================================

/// A rule store: root document, appended fragments, compiled snapshot.
pub struct Rules {
    reader: RulesReader,
    fragments: Arc<dyn ValueSource>,
    protocols: Protocols,
    root: Option<Source>,
    root_snapshot: Arc<RuleSnapshot>,
    appended: Vec<Source>,
}

impl Rules {
    /// Store with empty registries and the built-in categories.
    pub fn new() -> Self {
        RulesBuilder::new().build()
    }

    pub fn builder() -> RulesBuilder {
        RulesBuilder::new()
    }

    pub(crate) fn from_builder(builder: RulesBuilder) -> Self {
        let empty = Arc::new(RuleSnapshot::new(builder.protocols.clone()));
        Self {
            reader: RulesReader {
                snapshot: Arc::new(ArcSwap::new(Arc::clone(&empty))),
                values: builder.values,
                scoped: Arc::new(builder.scoped),
                disabled: Arc::new(AtomicBool::new(false)),
            },
            fragments: builder.fragments,
            protocols: builder.protocols,
            root: None,
            root_snapshot: empty,
            appended: Vec::new(),
        }
    }

    pub fn reader(&self) -> &RulesReader {
        &self.reader
    }

    pub fn protocols(&self) -> &Protocols {
        &self.protocols
    }

    pub fn is_disabled(&self) -> bool {
        self.reader.is_disabled()
    }

    /// Number of fragments appended since the last [`clear_appended`](Self::clear_appended).
    pub fn appended_len(&self) -> usize {
        self.appended.len()
    }

    /// Replace the root document, then replay every appended fragment in
    /// order. Empty text disables the store; appended fragments are kept but
    /// not compiled until a non-empty root arrives.
    pub fn set_root(&mut self, text: &str) {
        let disabled = text.trim().is_empty();
        self.reader.disabled.store(disabled, Ordering::Release);
        self.root = Some(Source::root(text));
        self.rebuild();
        log::info!(
            "root replaced: {} rules, {} appended fragments{}",
            self.reader.snapshot.load().len(),
            self.appended.len(),
            if disabled { " (disabled)" } else { "" }
        );
    }

    /// Compile `text` and add its rules after the current ones.
    pub fn append(&mut self, text: &str) {
        let source = Source::fragment(text);
        if !self.is_disabled() {
            let ctx = ParseContext::new(&self.protocols)
                .with_fragments(&*self.fragments)
                .with_values(&*self.reader.values);
            let next = extend_snapshot(&self.reader.snapshot.load(), &source, &ctx);
            self.reader.snapshot.store(Arc::new(next));
        }
        self.appended.push(source);
    }

    /// Drop every appended fragment and go back to the root rules.
    pub fn clear_appended(&mut self) {
        self.appended.clear();
        self.reader.snapshot.store(Arc::clone(&self.root_snapshot));
        log::debug!("appended fragments cleared");
    }

    /// Add a dynamic category and recompile everything so existing text can
    /// file into it. Returns `false` if the name was already known.
    pub fn register_protocol(&mut self, name: &str) -> bool {
        if !self.protocols.register(name) {
            return false;
        }
        self.rebuild();
        true
    }

    fn rebuild(&mut self) {
        let ctx = ParseContext::new(&self.protocols)
            .with_fragments(&*self.fragments)
            .with_values(&*self.reader.values);

        let root = Arc::new(build_snapshot(self.root.iter(), &ctx));
        let current = if self.is_disabled() {
            Arc::clone(&root)
        } else {
            let mut current = Arc::clone(&root);
            for source in &self.appended {
                current = Arc::new(extend_snapshot(&current, source, &ctx));
            }
            current
        };

        self.root_snapshot = root;
        self.reader.snapshot.store(current);
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Rules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rules")
            .field("reader", &self.reader)
            .field("appended", &self.appended.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::protocols::{HOST, RULE};

    #[test]
    fn empty_root_disables() {
        let mut rules = Rules::new();
        assert!(!rules.is_disabled());
        rules.set_root("  \n ");
        assert!(rules.is_disabled());
        rules.set_root("a.com 1.1.1.1");
        assert!(!rules.is_disabled());
    }

    #[test]
    fn appends_wait_while_disabled() {
        let mut rules = Rules::new();
        rules.set_root("");
        rules.append("a.com 1.1.1.1");
        assert_eq!(rules.appended_len(), 1);
        assert!(rules.reader().snapshot().is_empty());

        rules.set_root("b.com 2.2.2.2");
        assert_eq!(rules.reader().snapshot().rules(HOST).len(), 2);
    }

    #[test]
    fn append_without_root_compiles() {
        let mut rules = Rules::new();
        rules.append("a.com http://b.com");
        assert_eq!(rules.reader().snapshot().rules(RULE).len(), 1);
        rules.clear_appended();
        assert!(rules.reader().snapshot().is_empty());
    }

    #[test]
    fn register_protocol_recompiles() {
        let mut rules = Rules::new();
        rules.set_root("a.com mock://x");
        assert_eq!(rules.reader().snapshot().rules(RULE).len(), 1);
        assert!(rules.register_protocol("mock"));
        assert!(!rules.register_protocol("mock"));
        let snapshot = rules.reader().snapshot();
        assert_eq!(snapshot.rules("mock").len(), 1);
        assert!(snapshot.rules(RULE).is_empty());
    }

    #[test]
    fn readers_see_new_snapshots() {
        let mut rules = Rules::new();
        let reader = rules.reader().clone();
        rules.set_root("a.com 1.1.1.1");
        assert_eq!(reader.snapshot().len(), 1);
        let before = reader.snapshot();
        rules.append("b.com 2.2.2.2");
        assert_eq!(before.len(), 1);
        assert_eq!(reader.snapshot().len(), 2);
    }
}
