//! Reroute Rule Compiler
//!
//! This crate turns line-oriented rule text into a [`RuleSnapshot`](rr_core::RuleSnapshot).

pub mod builder;
pub mod error;
pub mod parser;
pub mod preprocess;

pub use builder::{build_snapshot, extend_snapshot, Source};
pub use error::RuleError;
pub use parser::{parse_rule, parse_rules, ParseContext};
pub use preprocess::{declarations, Declaration};
