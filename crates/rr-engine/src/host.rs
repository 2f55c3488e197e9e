//! Host resolution
//!
//! A host rule pins a request's upstream address. Several stores can take
//! part (plugin rules, the main rules, a rules file, header-injected rules);
//! when none of them has a host for the URL the lookup is handed to an
//! external resolver.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use rr_core::protocols::{DISABLE, HOST};
use rr_core::url::{ensure_protocol, extract_hostname, format_url, remove_protocol};
use rr_core::{MatchResult, Matcher, RuleSnapshot, ValueScope};

use crate::resolve::{filter_of, properties};
use crate::store::{Rules, RulesReader};

static DNS_CACHE: AtomicBool = AtomicBool::new(true);

/// Turn DNS caching off for every store in the process. There is no way
/// back on.
pub fn disable_dns_cache() {
    DNS_CACHE.store(false, Ordering::Relaxed);
}

pub fn dns_cache_allowed() -> bool {
    DNS_CACHE.load(Ordering::Relaxed)
}

/// Names under which a `disable://` rule turns off caching for a URL.
const DNS_CACHE_KEYS: [&str; 2] = ["dnsCache", "dnscache"];

/// Asynchronous hostname lookup used when no host rule applies.
#[async_trait]
pub trait HostResolver: Send + Sync {
    type Error: Send;

    /// Resolve `hostname` to an address. `allow_cache` is false when a rule
    /// or the process-wide switch disabled DNS caching.
    async fn lookup(&self, hostname: &str, allow_cache: bool) -> Result<String, Self::Error>;
}

/// Other stores consulted around this one, in priority order:
/// plugin rules first, then this store, then `file`, then `header`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPeers<'a> {
    pub plugin: Option<&'a RulesReader>,
    pub file: Option<&'a RulesReader>,
    pub header: Option<&'a RulesReader>,
}

/// Where a request should go.
#[derive(Debug, Clone)]
pub struct ResolvedHost {
    pub host: String,
    pub port: Option<u16>,
    /// Host rule that decided, `None` when the resolver answered.
    pub rule: Option<MatchResult>,
}

fn ignores_host(matcher: &Matcher<'_>, scope: &mut ValueScope<'_>) -> bool {
    let filter = filter_of(matcher, scope);
    ["host", "hosts", "ignore|host", "ignore|hosts"]
        .iter()
        .any(|name| filter.contains(*name))
}

/// Hostname to look up and whether a cached answer may be used. Nothing
/// when the URL has no hostname.
fn lookup_plan(snapshot: &RuleSnapshot, url: &str, scope: &mut ValueScope<'_>) -> Option<(String, bool)> {
    let hostname = extract_hostname(url)?;
    let disable = properties(&Matcher::new(snapshot, url), DISABLE, scope);
    let allow_cache = dns_cache_allowed() && !DNS_CACHE_KEYS.iter().any(|key| disable.contains(*key));
    Some((hostname, allow_cache))
}

async fn ask<R: HostResolver>(
    resolver: &R,
    hostname: String,
    allow_cache: bool,
) -> Result<Option<ResolvedHost>, R::Error> {
    log::debug!("looking up {hostname} (cache: {allow_cache})");
    let host = resolver.lookup(&hostname, allow_cache).await?;
    Ok(Some(ResolvedHost {
        host,
        port: None,
        rule: None,
    }))
}

impl RulesReader {
    /// Host rule for an already normalized URL, with `own` as this store's
    /// snapshot. Each peer is read from one snapshot load as well.
    fn find_host(&self, own: &RuleSnapshot, url: &str, peers: HostPeers<'_>) -> Option<MatchResult> {
        let plugin = peers.plugin.map(|reader| (reader, reader.snapshot()));
        let file = peers.file.map(|reader| (reader, reader.snapshot()));
        let header = peers.header.map(|reader| (reader, reader.snapshot()));

        // (matcher, store whose filter applies, store whose values apply)
        let mut stages: Vec<(Matcher<'_>, &RulesReader, &RulesReader)> = Vec::with_capacity(4);
        if let Some((plugin, snapshot)) = &plugin {
            stages.push((Matcher::new(snapshot, url), *plugin, *plugin));
        }
        stages.push((Matcher::new(own, url), self, self));
        for (store, snapshot) in file.iter().chain(header.iter()) {
            stages.push((Matcher::new(snapshot, url), *store, self));
        }

        if stages
            .iter()
            .any(|(matcher, store, _)| ignores_host(matcher, &mut store.scope()))
        {
            return None;
        }
        stages
            .iter()
            .find_map(|(matcher, _, values)| matcher.find(HOST, &mut values.scope(), 0))
    }

    /// First host rule for `url` across this store and its peers. Nothing
    /// when any participating store filters hosts for the URL.
    ///
    /// Plugin rules resolve variables with their own values; the rules file
    /// and header stores use this store's values.
    pub fn get_host(&self, url: &str, peers: HostPeers<'_>) -> Option<MatchResult> {
        let url = format_url(&ensure_protocol(url));
        let own = self.snapshot.load();
        self.find_host(&own, &url, peers)
    }

    /// Host for `url`: a host rule when one applies, the resolver otherwise.
    /// An empty URL or one without a hostname resolves to nothing. Resolver
    /// errors are returned as they are.
    ///
    /// The host rules and the `disable` check come from the same snapshot.
    pub async fn resolve_host<R: HostResolver>(
        &self,
        url: &str,
        peers: HostPeers<'_>,
        resolver: &R,
    ) -> Result<Option<ResolvedHost>, R::Error> {
        if url.is_empty() {
            return Ok(None);
        }
        let url = format_url(&ensure_protocol(url));

        let plan = {
            let own = self.snapshot.load();
            if let Some(rule) = self.find_host(&own, &url, peers) {
                return Ok(Some(ResolvedHost {
                    host: remove_protocol(&rule.matcher, true).to_string(),
                    port: rule.rule.port,
                    rule: Some(rule),
                }));
            }
            lookup_plan(&own, &url, &mut self.scope())
        };

        match plan {
            Some((hostname, allow_cache)) => ask(resolver, hostname, allow_cache).await,
            None => Ok(None),
        }
    }

    /// Ask the resolver, skipping host rules.
    pub async fn lookup_host<R: HostResolver>(
        &self,
        url: &str,
        resolver: &R,
    ) -> Result<Option<ResolvedHost>, R::Error> {
        let url = format_url(&ensure_protocol(url));
        let plan = lookup_plan(&self.snapshot(), &url, &mut self.scope());
        match plan {
            Some((hostname, allow_cache)) => ask(resolver, hostname, allow_cache).await,
            None => Ok(None),
        }
    }
}

impl Rules {
    pub fn get_host(&self, url: &str, peers: HostPeers<'_>) -> Option<MatchResult> {
        self.reader().get_host(url, peers)
    }

    pub async fn resolve_host<R: HostResolver>(
        &self,
        url: &str,
        peers: HostPeers<'_>,
        resolver: &R,
    ) -> Result<Option<ResolvedHost>, R::Error> {
        self.reader().resolve_host(url, peers, resolver).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(text: &str) -> Rules {
        let mut rules = Rules::new();
        rules.set_root(text);
        rules
    }

    #[test]
    fn host_rule_with_port() {
        let rules = rules("a.com 127.0.0.1:8080");
        let host = rules.get_host("a.com/x", HostPeers::default()).unwrap();
        assert_eq!(host.matcher, "host://127.0.0.1");
        assert_eq!(host.rule.port, Some(8080));
    }

    #[test]
    fn peers_follow_precedence() {
        let main = rules("a.com 1.1.1.1");
        let plugin = rules("a.com 2.2.2.2");
        let file = rules("a.com 3.3.3.3\nb.com 4.4.4.4");

        let peers = HostPeers {
            plugin: Some(plugin.reader()),
            file: Some(file.reader()),
            header: None,
        };
        assert_eq!(main.get_host("http://a.com/", peers).unwrap().matcher, "host://2.2.2.2");
        assert_eq!(main.get_host("http://b.com/", peers).unwrap().matcher, "host://4.4.4.4");
        assert_eq!(main.get_host("http://a.com/", HostPeers::default()).unwrap().matcher, "host://1.1.1.1");
    }

    #[test]
    fn any_store_can_filter_hosts() {
        let main = rules("a.com 1.1.1.1");
        let header = rules("a.com ignore://hosts");
        let peers = HostPeers {
            header: Some(header.reader()),
            ..HostPeers::default()
        };
        assert!(main.get_host("http://a.com/", peers).is_none());
        assert!(main.get_host("http://a.com/", HostPeers::default()).is_some());
    }
}
