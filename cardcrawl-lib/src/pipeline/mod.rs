//! The two-phase crawl pipeline
//!
//! # Implementation Model
//!
//! Phase 1 ([`Pipeline::collect`]) runs three cooperating stages:
//!
//! - A single discovery loop walks the listing pages in order and submits every item locator
//!   to a [`WorkerPool`] of fetch workers.
//! - Each worker fetches and parses one item, then sends the resulting [`Record`] over a
//!   channel. Items that fail are logged and dropped.
//! - A single [`Collector`] owns the channel's receiving end and the [`AnomalyLog`]. It
//!   normalizes, classifies, and keeps or discards every record.
//!
//! The phase ends only after discovery has finished, the pool has been joined (which releases
//! the last record sender), and the collector has drained the channel.
//!
//! Phase 2 ([`Pipeline::relocate`]) rewrites every asset reference to its public form and,
//! when downloads are enabled, feeds a second pool of downloaders while rewriting. It starts
//! strictly after phase 1, so it always sees the complete dataset.

mod collector;
mod discovery;
mod downloads;
mod pool;
mod progress;
mod relocation;
mod tracker;
mod worker;

pub use collector::{Anomaly, AnomalyLog, Collected, Collector, Verdict, classify, normalize_sub_assets};
pub use discovery::{DiscoveryReport, StopReason, discover};
pub use downloads::{DownloadCounters, DownloadOutcome, Downloader, SeenSet};
pub use pool::WorkerPool;
pub use progress::Progress;
pub use relocation::{AssetRoute, Naming, Routes, relocate};
pub use tracker::{CrawlStats, CrawlTracker};
pub use worker::ItemWorker;

use crate::Result;
use crate::extract::Extractor;
use crate::fetch::CachedFetcher;
use crate::model::{Dataset, DownloadRequest, ItemIdentifier, Record};
use ohno::IntoAppError;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

const LOG_TARGET: &str = "  pipeline";

/// Default number of fetch-and-parse workers.
pub const DEFAULT_FETCH_WORKERS: usize = 50;

/// Default number of asset downloaders.
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 20;

/// Outcome of phase 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectReport {
    pub discovery: DiscoveryReport,

    /// Items fetched and parsed successfully.
    pub parsed: u64,

    /// Items dropped because they could not be fetched or parsed.
    pub failed: u64,

    pub kept: u64,
    pub discarded: u64,
    pub anomalies: u64,
}

/// Outcome of phase 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Download requests produced by relocation.
    pub requested: u64,
    pub fetched: u64,
    pub already_claimed: u64,
    pub already_present: u64,
    pub failed: u64,
}

/// Everything one run of the pipeline needs.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: CachedFetcher,
    extractor: Arc<dyn Extractor>,
    client: reqwest::Client,
    tracker: CrawlTracker,
    fetch_workers: usize,
    download_workers: usize,
    sub_asset_prefix: String,
}

impl core::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("fetcher", &self.fetcher)
            .field("extractor", &"<dyn Extractor>")
            .field("tracker", &self.tracker)
            .field("fetch_workers", &self.fetch_workers)
            .field("download_workers", &self.download_workers)
            .field("sub_asset_prefix", &self.sub_asset_prefix)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline with the default pool sizes and no sub-asset name prefix.
    #[must_use]
    pub fn new(fetcher: CachedFetcher, extractor: Arc<dyn Extractor>, client: reqwest::Client, tracker: CrawlTracker) -> Self {
        Self {
            fetcher,
            extractor,
            client,
            tracker,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
            sub_asset_prefix: String::new(),
        }
    }

    #[must_use]
    pub const fn with_workers(mut self, fetch_workers: usize, download_workers: usize) -> Self {
        self.fetch_workers = fetch_workers;
        self.download_workers = download_workers;
        self
    }

    #[must_use]
    pub fn with_sub_asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sub_asset_prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn tracker(&self) -> &CrawlTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn fetcher(&self) -> &CachedFetcher {
        &self.fetcher
    }

    /// Phase 1: discover, fetch, parse, and collect every item reachable from `start`.
    ///
    /// Only a failure of the anomaly log or of the collector itself is an error; items that
    /// cannot be fetched or parsed are counted in the report.
    pub async fn collect<W>(&self, start: Url, anomaly_log: AnomalyLog<W>) -> Result<(Dataset, CollectReport)>
    where
        W: Write + Send + 'static,
    {
        let (records, receiver) = mpsc::channel::<Record>(self.fetch_workers.max(1).saturating_mul(2));

        let collector = Collector::new(anomaly_log, self.sub_asset_prefix.as_str(), self.tracker.clone());
        let collecting = tokio::spawn(collector.run(receiver));

        let worker = Arc::new(ItemWorker::new(
            self.fetcher.clone(),
            Arc::clone(&self.extractor),
            records,
            self.tracker.clone(),
        ));

        let pool = WorkerPool::new("fetch", self.fetch_workers, move |item: ItemIdentifier| {
            let worker = Arc::clone(&worker);
            async move { worker.process(item).await }
        });

        self.tracker.begin_crawl();
        let discovery = discover(start, &self.fetcher, self.extractor.as_ref(), &pool, &self.tracker).await;

        // Joining drops the worker, and with it the last record sender.
        pool.join().await;
        let collected = collecting.await.into_app_err("collector task failed")??;

        let stats = self.tracker.snapshot();
        let report = CollectReport {
            discovery,
            parsed: stats.parsed,
            failed: stats.failed,
            kept: collected.records.len() as u64,
            discarded: collected.discarded,
            anomalies: collected.anomalies,
        };

        log::info!(
            target: LOG_TARGET,
            "Collected {} records ({} discarded, {} failed)",
            report.kept,
            report.discarded,
            report.failed
        );

        Ok((Dataset::from_records(collected.records), report))
    }

    /// Phase 2: rewrite asset references and, if `download` is set, fetch the assets.
    pub async fn relocate(&self, dataset: Dataset, routes: &Routes, download: bool) -> (Dataset, DownloadReport) {
        let downloader = Arc::new(Downloader::new(self.client.clone()));

        let pool = download.then(|| {
            let downloader = Arc::clone(&downloader);
            let tracker = self.tracker.clone();
            WorkerPool::new("download", self.download_workers, move |request: DownloadRequest| {
                let downloader = Arc::clone(&downloader);
                let tracker = tracker.clone();
                async move {
                    let _ = downloader.download(&request).await;
                    tracker.download_done();
                }
            })
        });

        if download {
            self.tracker.begin_downloads();
        }

        let mut requested = 0;
        let mut records = Vec::with_capacity(dataset.len());
        for record in dataset.into_records() {
            let (record, requests) = relocate(record, routes, download);

            if let Some(pool) = &pool {
                for request in requests {
                    requested += 1;
                    self.tracker.download_queued();
                    if let Err(e) = pool.submit(request).await {
                        log::error!(target: LOG_TARGET, "Dropping download: {e:#}");
                        self.tracker.download_done();
                    }
                }
            }

            records.push(record);
        }

        if let Some(pool) = pool {
            pool.join().await;
        }

        let counters = downloader.counters();
        let report = DownloadReport {
            requested,
            fetched: counters.fetched(),
            already_claimed: counters.already_claimed(),
            already_present: counters.already_present(),
            failed: counters.failed(),
        };

        if download {
            log::info!(
                target: LOG_TARGET,
                "Downloaded {} assets ({} already present, {} failed)",
                report.fetched,
                report.already_present,
                report.failed
            );
        }

        (Dataset::from_records(records), report)
    }
}
