//! Page fetching through a permanent on-disk cache
//!
//! # Implementation Model
//!
//! [`CachedFetcher`] resolves a locator to its content. The locator is first turned into a
//! filesystem-safe [`cache_key`]; if a [`CacheStore`] entry exists under that key, its bytes are
//! returned without touching the network. Otherwise the page is downloaded, fully buffered,
//! persisted, and returned.
//!
//! Cache entries never expire: fetched pages are treated as immutable. [`DirCache`] publishes
//! each entry with an atomic rename so a reader never observes a half-written file, and a run
//! holds an exclusive [`CacheLockGuard`] on the directory for its whole duration.

mod cache;
mod cache_lock;
mod fetcher;

pub use cache::{CacheStore, DirCache, cache_key};
pub use cache_lock::{CacheLockGuard, acquire_cache_lock};
pub use fetcher::{CachedFetcher, FetchCounters, http_client};
