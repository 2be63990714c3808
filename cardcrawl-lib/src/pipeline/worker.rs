use super::tracker::CrawlTracker;
use crate::extract::Extractor;
use crate::fetch::CachedFetcher;
use crate::model::{ItemIdentifier, Record};
use std::sync::Arc;
use tokio::sync::mpsc;

const LOG_TARGET: &str = "    worker";

/// Turns item locators into records for the collector.
#[derive(Clone)]
pub struct ItemWorker {
    fetcher: CachedFetcher,
    extractor: Arc<dyn Extractor>,
    records: mpsc::Sender<Record>,
    tracker: CrawlTracker,
}

impl core::fmt::Debug for ItemWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ItemWorker")
            .field("fetcher", &self.fetcher)
            .field("extractor", &"<dyn Extractor>")
            .field("records", &self.records)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl ItemWorker {
    #[must_use]
    pub fn new(fetcher: CachedFetcher, extractor: Arc<dyn Extractor>, records: mpsc::Sender<Record>, tracker: CrawlTracker) -> Self {
        Self {
            fetcher,
            extractor,
            records,
            tracker,
        }
    }

    /// Fetch and parse one item; failures are logged and the item dropped.
    pub async fn process(&self, item: ItemIdentifier) {
        let content = match self.fetcher.fetch(item.as_str()).await {
            Ok(content) => content,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping '{item}': {e:#}");
                self.tracker.item_failed();
                return;
            }
        };

        let page = match self.extractor.parse_item(&item, &content) {
            Ok(page) => page,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping '{item}': {e:#}");
                self.tracker.item_failed();
                return;
            }
        };

        self.tracker.item_parsed();
        if self.records.send(page.into_record(&item)).await.is_err() {
            log::error!(target: LOG_TARGET, "Collector is gone, dropping '{item}'");
        }
    }
}
