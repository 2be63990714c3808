use super::cache::{CacheStore, cache_key};
use crate::Result;
use bytes::Bytes;
use core::sync::atomic::{AtomicU64, Ordering};
use ohno::{IntoAppError, app_err};
use std::sync::Arc;

const LOG_TARGET: &str = "     fetch";

/// Build the HTTP client shared by page fetching and asset downloads.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("cardcrawl/", env!("CARGO_PKG_VERSION")))
        .build()
        .into_app_err("unable to create HTTP client")
}

/// Counts how fetches were satisfied.
#[derive(Debug, Default)]
pub struct FetchCounters {
    network: AtomicU64,
    cache_hits: AtomicU64,
}

impl FetchCounters {
    /// Number of fetches that went to the network.
    #[must_use]
    pub fn network(&self) -> u64 {
        self.network.load(Ordering::Relaxed)
    }

    /// Number of fetches answered from the cache.
    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }
}

/// Fetches pages through a permanent cache.
#[derive(Clone)]
pub struct CachedFetcher {
    client: reqwest::Client,
    store: Arc<dyn CacheStore>,
    counters: Arc<FetchCounters>,
}

impl core::fmt::Debug for CachedFetcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("client", &self.client)
            .field("store", &"<dyn CacheStore>")
            .field("counters", &self.counters)
            .finish()
    }
}

impl CachedFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, store: Arc<dyn CacheStore>) -> Self {
        Self {
            client,
            store,
            counters: Arc::default(),
        }
    }

    #[must_use]
    pub fn counters(&self) -> &FetchCounters {
        &self.counters
    }

    /// Resolve a locator to its content.
    ///
    /// A cached entry is returned without network access. Otherwise the body is fetched,
    /// stored, and returned; a body is only stored when the server answered with success.
    pub async fn fetch(&self, locator: &str) -> Result<Bytes> {
        let key = cache_key(locator);

        if self.store.exists(&key) {
            let content = self.store.read(&key)?;
            let _ = self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(content);
        }

        log::info!(target: LOG_TARGET, "Fetching {locator}");
        let _ = self.counters.network.fetch_add(1, Ordering::Relaxed);

        let response = self
            .client
            .get(locator)
            .send()
            .await
            .into_app_err_with(|| format!("unable to fetch '{locator}'"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(app_err!("could not fetch '{locator}': HTTP {status}"));
        }

        let body = response
            .bytes()
            .await
            .into_app_err_with(|| format!("unable to read response body of '{locator}'"))?;

        self.store.write(&key, &body)?;
        Ok(body)
    }
}
