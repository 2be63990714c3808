use super::pool::WorkerPool;
use super::tracker::CrawlTracker;
use crate::extract::Extractor;
use crate::fetch::CachedFetcher;
use crate::model::ItemIdentifier;
use core::fmt::{Display, Formatter};
use std::collections::HashSet;
use url::Url;

const LOG_TARGET: &str = " discovery";

/// Why discovery stopped following the pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The last listing page had no next-page control.
    LastPage,

    /// The next page had already been visited in this run.
    Revisited(Url),

    /// A listing page could not be fetched.
    FetchFailed(Url),

    /// A listing page could not be parsed.
    ParseFailed(Url),

    /// The worker pool stopped accepting items.
    QueueClosed,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LastPage => write!(f, "reached the last page"),
            Self::Revisited(url) => write!(f, "next page '{url}' was already visited"),
            Self::FetchFailed(url) => write!(f, "could not fetch '{url}'"),
            Self::ParseFailed(url) => write!(f, "could not parse '{url}'"),
            Self::QueueClosed => write!(f, "the item queue closed"),
        }
    }
}

/// Summary of one discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Listing pages fetched and parsed.
    pub pages: u64,

    /// Item locators handed to the worker pool.
    pub items: u64,

    pub stop: StopReason,
}

/// Walk the listing pages from `start`, submitting every item to `pool`.
///
/// Pages are visited one at a time. Items are submitted in page order, then row order.
/// A listing page that cannot be fetched or parsed ends discovery without failing the run.
pub async fn discover(
    start: Url,
    fetcher: &CachedFetcher,
    extractor: &dyn Extractor,
    pool: &WorkerPool<ItemIdentifier>,
    tracker: &CrawlTracker,
) -> DiscoveryReport {
    let mut visited = HashSet::new();
    let mut current = start;
    let mut pages = 0;
    let mut items = 0;

    let stop = 'pages: loop {
        log::info!(target: LOG_TARGET, "Listing page {current}");
        let _ = visited.insert(current.clone());

        let content = match fetcher.fetch(current.as_str()).await {
            Ok(content) => content,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Stopping discovery, could not fetch '{current}': {e:#}");
                break StopReason::FetchFailed(current);
            }
        };

        let listing = match extractor.parse_listing(&current, &content) {
            Ok(listing) => listing,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Stopping discovery, could not parse '{current}': {e:#}");
                break StopReason::ParseFailed(current);
            }
        };

        pages += 1;
        tracker.page_visited();
        tracker.items_discovered(listing.items.len() as u64);
        log::debug!(target: LOG_TARGET, "Found {} items on '{current}'", listing.items.len());

        for item in listing.items {
            if let Err(e) = pool.submit(item).await {
                log::error!(target: LOG_TARGET, "Stopping discovery: {e:#}");
                break 'pages StopReason::QueueClosed;
            }
            items += 1;
        }

        match listing.next_page {
            None => break StopReason::LastPage,
            Some(next) if visited.contains(&next) => {
                log::warn!(target: LOG_TARGET, "Pager on '{current}' points back to visited page '{next}'");
                break StopReason::Revisited(next);
            }
            Some(next) => current = next,
        }
    };

    log::info!(target: LOG_TARGET, "Discovery visited {pages} pages and found {items} items, {stop}");
    DiscoveryReport { pages, items, stop }
}
