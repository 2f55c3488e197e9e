//! Reroute Engine
//!
//! The stateful side of Reroute: a [`Rules`] store that owns rule text,
//! recompiles it on every change and publishes the result atomically, plus
//! the per-URL resolution queries a proxy runs for each request.
//!
//! # Usage
//!
//! ```no_run
//! use rr_engine::Rules;
//!
//! let mut rules = Rules::new();
//! rules.set_root("example.com 127.0.0.1:8080\nexample.com/api http://staging.example.com");
//!
//! let resolved = rules.resolve_rules("http://example.com/api/users");
//! for result in resolved.iter() {
//!     println!("{}: {}", result.name(), result.matcher);
//! }
//! ```
//!
//! # Modules
//!
//! - `config`: Store builder (registries, extra categories, aliases)
//! - `store`: Root/append lifecycle and snapshot publication
//! - `resolve`: Filter, disable, proxy and per-category queries
//! - `host`: Host rule precedence and resolver fallback

pub mod config;
pub mod host;
pub mod resolve;
pub mod store;

pub use config::RulesBuilder;
pub use host::{disable_dns_cache, dns_cache_allowed, HostPeers, HostResolver, ResolvedHost};
pub use resolve::{Properties, ResolvedRules};
pub use store::{Rules, RulesReader};

pub use rr_core::{MatchResult, Target};
