//! System DNS resolver for the `host` command.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use rr_engine::HostResolver;

/// Resolves through the operating system and remembers answers unless the
/// caller asks it not to.
#[derive(Default)]
pub struct SystemResolver {
    cache: Mutex<HashMap<String, String>>,
}

impl SystemResolver {
    fn cached(&self, hostname: &str) -> Option<String> {
        self.cache.lock().ok()?.get(hostname).cloned()
    }

    fn remember(&self, hostname: &str, address: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(hostname.to_string(), address.to_string());
        }
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    type Error = io::Error;

    async fn lookup(&self, hostname: &str, allow_cache: bool) -> Result<String, io::Error> {
        if allow_cache {
            if let Some(address) = self.cached(hostname) {
                return Ok(address);
            }
        }

        let address = tokio::net::lookup_host((hostname, 0))
            .await?
            .next()
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no address for {hostname}")))?;

        if allow_cache {
            self.remember(hostname, &address);
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_is_used_only_when_allowed() {
        let resolver = SystemResolver::default();
        resolver.remember("cached.invalid", "192.0.2.1");

        assert_eq!(resolver.lookup("cached.invalid", true).await.unwrap(), "192.0.2.1");
        assert_eq!(resolver.lookup("127.0.0.1", false).await.unwrap(), "127.0.0.1");
        assert!(resolver.cached("127.0.0.1").is_none());
    }
}
