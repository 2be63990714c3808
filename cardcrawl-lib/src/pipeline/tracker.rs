//! Run-wide counters feeding the progress indicator.

use super::progress::Progress;
use core::sync::atomic::{AtomicU64, Ordering};
use owo_colors::OwoColorize;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    pages: AtomicU64,
    discovered: AtomicU64,
    parsed: AtomicU64,
    failed: AtomicU64,
    kept: AtomicU64,
    anomalies: AtomicU64,
    downloads_queued: AtomicU64,
    downloads_done: AtomicU64,
}

/// A point-in-time copy of the tracker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: u64,
    pub discovered: u64,
    pub parsed: u64,
    pub failed: u64,
    pub kept: u64,
    pub anomalies: u64,
    pub downloads_queued: u64,
    pub downloads_done: u64,
}

/// Tracks crawl activity and keeps the progress indicator up to date.
///
/// Clones share the same counters, so every worker can hold its own handle.
#[derive(Clone)]
pub struct CrawlTracker {
    counters: Arc<Counters>,
    progress: Arc<dyn Progress>,
}

impl core::fmt::Debug for CrawlTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CrawlTracker")
            .field("counters", &self.counters)
            .field("progress", &"<dyn Progress>")
            .finish()
    }
}

impl CrawlTracker {
    #[must_use]
    pub fn new(progress: &Arc<dyn Progress>) -> Self {
        Self {
            counters: Arc::default(),
            progress: Arc::clone(progress),
        }
    }

    /// Switch the indicator to the crawl phase, where the total is unknown.
    pub fn begin_crawl(&self) {
        let counters = Arc::clone(&self.counters);
        self.progress.set_phase("Crawling");
        self.progress
            .set_indeterminate(Box::new(move || Self::crawl_message(&Self::snapshot_of(&counters))));
    }

    /// Switch the indicator to the download phase.
    pub fn begin_downloads(&self) {
        let counters = Arc::clone(&self.counters);
        let use_colors = self.progress.use_colors();
        self.progress.set_phase("Downloading");
        self.progress.set_determinate(Box::new(move || {
            let stats = Self::snapshot_of(&counters);
            (stats.downloads_queued, stats.downloads_done, Self::download_message(&stats, use_colors))
        }));
    }

    pub fn finish(&self) {
        self.progress.done();
    }

    pub fn page_visited(&self) {
        let _ = self.counters.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn items_discovered(&self, count: u64) {
        let _ = self.counters.discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn item_parsed(&self) {
        let _ = self.counters.parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_failed(&self) {
        let _ = self.counters.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kept(&self) {
        let _ = self.counters.kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn anomaly_found(&self) {
        let _ = self.counters.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn download_queued(&self) {
        let _ = self.counters.downloads_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn download_done(&self) {
        let _ = self.counters.downloads_done.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CrawlStats {
        Self::snapshot_of(&self.counters)
    }

    fn snapshot_of(counters: &Counters) -> CrawlStats {
        CrawlStats {
            pages: counters.pages.load(Ordering::Relaxed),
            discovered: counters.discovered.load(Ordering::Relaxed),
            parsed: counters.parsed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            kept: counters.kept.load(Ordering::Relaxed),
            anomalies: counters.anomalies.load(Ordering::Relaxed),
            downloads_queued: counters.downloads_queued.load(Ordering::Relaxed),
            downloads_done: counters.downloads_done.load(Ordering::Relaxed),
        }
    }

    fn crawl_message(stats: &CrawlStats) -> String {
        let done = stats.parsed + stats.failed;
        if stats.failed == 0 {
            format!("{} pages, {done}/{} items parsed", stats.pages, stats.discovered)
        } else {
            format!("{} pages, {done}/{} items parsed, {} failed", stats.pages, stats.discovered, stats.failed)
        }
    }

    fn download_message(stats: &CrawlStats, use_colors: bool) -> String {
        let text = format!("{}/{} assets", stats.downloads_done, stats.downloads_queued);
        if use_colors && stats.downloads_queued > 0 && stats.downloads_done >= stats.downloads_queued {
            format!("{}", text.green())
        } else {
            text
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        determinate: Mutex<Option<Box<dyn Fn() -> (u64, u64, String) + Send + Sync>>>,
        indeterminate: Mutex<Option<Box<dyn Fn() -> String + Send + Sync>>>,
    }

    impl Progress for RecordingProgress {
        fn set_phase(&self, phase: &str) {
            self.phases.lock().unwrap().push(phase.to_string());
        }

        fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
            *self.determinate.lock().unwrap() = Some(callback);
        }

        fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {
            *self.indeterminate.lock().unwrap() = Some(callback);
        }

        fn done(&self) {}
    }

    fn tracker() -> (Arc<RecordingProgress>, CrawlTracker) {
        let progress = Arc::new(RecordingProgress::default());
        let tracker = CrawlTracker::new(&(Arc::clone(&progress) as Arc<dyn Progress>));
        (progress, tracker)
    }

    #[test]
    fn test_counters_are_shared_between_clones() {
        let (_, tracker) = tracker();
        let other = tracker.clone();

        tracker.page_visited();
        other.page_visited();
        other.items_discovered(5);
        tracker.item_parsed();
        other.item_failed();
        tracker.record_kept();
        other.anomaly_found();

        assert_eq!(
            tracker.snapshot(),
            CrawlStats {
                pages: 2,
                discovered: 5,
                parsed: 1,
                failed: 1,
                kept: 1,
                anomalies: 1,
                ..CrawlStats::default()
            }
        );
    }

    #[test]
    fn test_crawl_phase_message() {
        let (progress, tracker) = tracker();
        tracker.begin_crawl();

        tracker.page_visited();
        tracker.items_discovered(10);
        tracker.item_parsed();
        tracker.item_parsed();

        let message = progress.indeterminate.lock().unwrap().as_ref().unwrap()();
        assert_eq!(message, "1 pages, 2/10 items parsed");

        tracker.item_failed();
        let message = progress.indeterminate.lock().unwrap().as_ref().unwrap()();
        assert_eq!(message, "1 pages, 3/10 items parsed, 1 failed");

        assert_eq!(*progress.phases.lock().unwrap(), ["Crawling"]);
    }

    #[test]
    fn test_download_phase_reports_fraction() {
        let (progress, tracker) = tracker();
        tracker.begin_downloads();

        for _ in 0..4 {
            tracker.download_queued();
        }
        tracker.download_done();

        let (total, current, message) = progress.determinate.lock().unwrap().as_ref().unwrap()();
        assert_eq!((total, current), (4, 1));
        assert_eq!(message, "1/4 assets");
    }

    #[test]
    fn test_debug_impl() {
        let (_, tracker) = tracker();
        let debug_str = format!("{tracker:?}");
        assert!(debug_str.contains("CrawlTracker"));
        assert!(debug_str.contains("<dyn Progress>"));
    }
}
