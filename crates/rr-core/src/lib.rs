//! Reroute Core Library
//!
//! This crate provides the rule model and the matching engine for the Reroute
//! interception proxy. Rule text is compiled elsewhere (`rr-compiler`); this
//! crate only knows how to hold compiled rules and answer "which rule applies
//! to this URL, and what does it rewrite to".
//!
//! # Architecture
//!
//! Compiled rules are grouped per category into an immutable
//! [`RuleSnapshot`]. Matching is a pure function over a snapshot slice: it
//! never mutates a [`Rule`] and produces fresh [`MatchResult`]s, so a
//! snapshot can be shared across threads and swapped atomically.
//!
//! # Modules
//!
//! - `types`: Rule, pattern and match result definitions
//! - `url`: Allocation-light URL helpers (normalization, joins, scheme handling)
//! - `values`: Named-value registries and per-call variable scopes
//! - `protocols`: Category names and scheme aliases
//! - `snapshot`: Per-category rule buckets
//! - `matcher`: Core URL matching engine

pub mod matcher;
pub mod protocols;
pub mod snapshot;
pub mod types;
pub mod url;
pub mod values;

// Re-export commonly used types
pub use matcher::{match_all, match_rule, Matcher};
pub use protocols::Protocols;
pub use snapshot::RuleSnapshot;
pub use types::{MatchResult, Pattern, Rule, RuleFlags, Target, Wildcard};
pub use values::{EmptyValues, ValueScope, ValueSource};
