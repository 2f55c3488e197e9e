//! Store configuration

use std::sync::Arc;

use serde_json::{Map, Value};

use rr_core::{EmptyValues, Protocols, ValueSource};

use crate::store::Rules;

/// Builder for a [`Rules`] store.
pub struct RulesBuilder {
    pub(crate) values: Arc<dyn ValueSource>,
    pub(crate) fragments: Arc<dyn ValueSource>,
    pub(crate) protocols: Protocols,
    pub(crate) scoped: Map<String, Value>,
}

impl RulesBuilder {
    pub fn new() -> Self {
        Self {
            values: Arc::new(EmptyValues),
            fragments: Arc::new(EmptyValues),
            protocols: Protocols::default(),
            scoped: Map::new(),
        }
    }

    /// Named-value registry for `{name}` lines and `${name}` in matchers.
    pub fn values(mut self, values: impl ValueSource + 'static) -> Self {
        self.values = Arc::new(values);
        self
    }

    /// Share one registry between several stores.
    pub fn shared_values(mut self, values: Arc<dyn ValueSource>) -> Self {
        self.values = values;
        self
    }

    /// Named rule-fragment registry for `${name}` lines.
    pub fn fragments(mut self, fragments: impl ValueSource + 'static) -> Self {
        self.fragments = Arc::new(fragments);
        self
    }

    pub fn shared_fragments(mut self, fragments: Arc<dyn ValueSource>) -> Self {
        self.fragments = fragments;
        self
    }

    /// Register an extra category, evaluated after the built-in ones.
    pub fn protocol(mut self, name: &str) -> Self {
        self.protocols.register(name);
        self
    }

    /// File `alias://` matchers under `name`.
    pub fn alias(mut self, alias: &str, name: &str) -> Self {
        self.protocols.add_alias(alias, name);
        self
    }

    /// Per-store values that shadow the registry during matching.
    pub fn scoped_values(mut self, scoped: Map<String, Value>) -> Self {
        self.scoped = scoped;
        self
    }

    pub fn build(self) -> Rules {
        Rules::from_builder(self)
    }
}

impl Default for RulesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
