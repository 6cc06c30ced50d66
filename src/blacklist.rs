//! Blacklist Oracle (§4.7): cache-fronted HTTP check against an operator-configured
//! list endpoint.
//!
//! Reuses `BoundedPendingCache` unmodified for the TTL-fresh path; a separate
//! `last_known` slot holds the most recent successfully fetched list so an oracle
//! outage can serve stale data instead of failing closed once something has been
//! fetched at least once (§4.7's resolved Open Question).

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::warn;

use crate::bounded_cache::BoundedPendingCache;
use crate::bridge::{BlacklistEntry, BlacklistOracle};
use crate::bridge::error::BridgeError;

const CACHE_KEY: [u8; 32] = [0u8; 32];
const CACHE_TTL_SECS: u64 = 3_600;

pub struct HttpBlacklistOracle {
    url: Option<String>,
    cache: Mutex<BoundedPendingCache<Vec<BlacklistEntry>>>,
    last_known: Mutex<Option<Vec<BlacklistEntry>>>,
    client: reqwest::Client,
}

impl HttpBlacklistOracle {
    pub fn new(url: Option<String>) -> Self {
        HttpBlacklistOracle {
            url,
            cache: Mutex::new(BoundedPendingCache::new(1, CACHE_TTL_SECS)),
            last_known: Mutex::new(None),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self) -> eyre::Result<Vec<BlacklistEntry>> {
        let Some(url) = &self.url else {
            return Ok(Vec::new());
        };
        let response = self.client.get(url).send().await?.error_for_status()?;
        let raw: Vec<RawEntry> = response.json().await?;
        Ok(raw
            .into_iter()
            .map(|e| BlacklistEntry {
                address: e.address,
                alias: e.alias.unwrap_or_default(),
                entry_type: e.entry_type.unwrap_or_default(),
            })
            .collect())
    }

    async fn refreshed_list(&self) -> Result<Vec<BlacklistEntry>, BridgeError> {
        if let Some(fresh) = self.cache.lock().unwrap().get(&CACHE_KEY).cloned() {
            return Ok(fresh);
        }

        match self.fetch().await {
            Ok(list) => {
                self.cache.lock().unwrap().insert(CACHE_KEY, list.clone());
                *self.last_known.lock().unwrap() = Some(list.clone());
                Ok(list)
            }
            Err(e) => {
                if let Some(stale) = self.last_known.lock().unwrap().clone() {
                    warn!(error = %e, "blacklist oracle fetch failed, serving stale list");
                    Ok(stale)
                } else {
                    Err(BridgeError::ExternalFailure(e.to_string()))
                }
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct RawEntry {
    address: String,
    alias: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
}

#[async_trait]
impl BlacklistOracle for HttpBlacklistOracle {
    async fn is_blacklisted(&self, native: &str) -> Result<Option<BlacklistEntry>, BridgeError> {
        let list = self.refreshed_list().await?;
        Ok(list.into_iter().find(|e| e.address == native))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_configured_url_never_blacklists() {
        let oracle = HttpBlacklistOracle::new(None);
        let result = oracle.is_blacklisted("paw_anyone").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cold_cache_with_unreachable_url_fails_closed() {
        let oracle = HttpBlacklistOracle::new(Some("http://127.0.0.1:1/unreachable".to_string()));
        let result = oracle.is_blacklisted("paw_anyone").await;
        assert!(matches!(result, Err(BridgeError::ExternalFailure(_))));
    }

    #[tokio::test]
    async fn test_warm_cache_serves_stale_on_fetch_error() {
        let oracle = HttpBlacklistOracle::new(Some("http://127.0.0.1:1/unreachable".to_string()));
        *oracle.last_known.lock().unwrap() = Some(vec![BlacklistEntry {
            address: "paw_flagged".to_string(),
            alias: "known".to_string(),
            entry_type: "sanctions".to_string(),
        }]);
        let result = oracle.is_blacklisted("paw_flagged").await.unwrap();
        assert!(result.is_some());
        let result = oracle.is_blacklisted("paw_clean").await.unwrap();
        assert!(result.is_none());
    }
}
