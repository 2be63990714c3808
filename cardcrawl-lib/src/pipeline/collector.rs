use super::tracker::CrawlTracker;
use crate::Result;
use crate::model::Record;
use core::fmt::{Display, Formatter};
use ohno::IntoAppError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio::sync::mpsc;

const LOG_TARGET: &str = " collector";

/// A record whose asset slots look wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// Sub-assets but neither image; the record is discarded.
    SubAssetsWithoutImages { name: String, locator: String, count: usize },

    /// No assets at all; the record is discarded.
    NoImages { name: String, locator: String },

    /// A secondary image without a primary one; the record is kept.
    SecondaryWithoutPrimary { name: String, locator: String },
}

impl Display for Anomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SubAssetsWithoutImages { name, locator, count } => {
                write!(f, "{name} ({locator}) {count} sounds and no images???")
            }
            Self::NoImages { name, locator } => write!(f, "{name} ({locator}) has no imgs"),
            Self::SecondaryWithoutPrimary { name, locator } => {
                write!(f, "{name} ({locator}) has gold image, but no regular")
            }
        }
    }
}

/// The collector's decision about one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep(Record),
    KeepWithAnomaly(Record, Anomaly),
    Discard(Anomaly),
}

/// Decide whether a record belongs in the dataset.
#[must_use]
pub fn classify(record: Record) -> Verdict {
    let name = || record.name.clone();
    let locator = || record.locator_str().to_string();

    match (record.primary.is_some(), record.secondary.is_some()) {
        (false, false) if !record.sub_assets.is_empty() => Verdict::Discard(Anomaly::SubAssetsWithoutImages {
            name: name(),
            locator: locator(),
            count: record.sub_assets.len(),
        }),
        (false, false) => Verdict::Discard(Anomaly::NoImages {
            name: name(),
            locator: locator(),
        }),
        (false, true) => {
            let anomaly = Anomaly::SecondaryWithoutPrimary {
                name: name(),
                locator: locator(),
            };
            Verdict::KeepWithAnomaly(record, anomaly)
        }
        (true, _) => Verdict::Keep(record),
    }
}

/// Strip `prefix` from sub-asset names and order them by name.
pub fn normalize_sub_assets(record: &mut Record, prefix: &str) {
    for sub_asset in &mut record.sub_assets {
        if let Some(rest) = sub_asset.name.strip_prefix(prefix) {
            sub_asset.name = rest.to_string();
        }
    }

    record.sub_assets.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Line-oriented log of anomalous records.
#[derive(Debug)]
pub struct AnomalyLog<W: Write> {
    writer: W,
    entries: u64,
}

impl AnomalyLog<BufWriter<File>> {
    /// Create (or truncate) the log file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).into_app_err_with(|| format!("unable to create anomaly log '{}'", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> AnomalyLog<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer, entries: 0 }
    }

    pub fn record(&mut self, anomaly: &Anomaly) -> Result<()> {
        writeln!(self.writer, "{anomaly}").into_app_err("unable to write to anomaly log")?;
        self.entries += 1;
        Ok(())
    }

    #[must_use]
    pub const fn entries(&self) -> u64 {
        self.entries
    }

    /// Flush the log and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().into_app_err("unable to flush anomaly log")?;
        Ok(self.writer)
    }
}

/// What the collector accumulated over a run.
#[derive(Debug)]
pub struct Collected<W> {
    pub records: Vec<Record>,
    pub discarded: u64,
    pub anomalies: u64,
    pub log: W,
}

/// Single consumer of parsed records.
#[derive(Debug)]
pub struct Collector<W: Write> {
    log: AnomalyLog<W>,
    sub_asset_prefix: String,
    tracker: CrawlTracker,
    records: Vec<Record>,
    discarded: u64,
}

impl<W: Write> Collector<W> {
    #[must_use]
    pub fn new(log: AnomalyLog<W>, sub_asset_prefix: impl Into<String>, tracker: CrawlTracker) -> Self {
        Self {
            log,
            sub_asset_prefix: sub_asset_prefix.into(),
            tracker,
            records: Vec::new(),
            discarded: 0,
        }
    }

    /// Normalize, classify, and keep or discard one record.
    pub fn accept(&mut self, mut record: Record) -> Result<()> {
        normalize_sub_assets(&mut record, &self.sub_asset_prefix);

        let (kept, anomaly) = match classify(record) {
            Verdict::Keep(record) => (Some(record), None),
            Verdict::KeepWithAnomaly(record, anomaly) => (Some(record), Some(anomaly)),
            Verdict::Discard(anomaly) => (None, Some(anomaly)),
        };

        if let Some(anomaly) = anomaly {
            log::debug!(target: LOG_TARGET, "Anomaly: {anomaly}");
            self.tracker.anomaly_found();
            self.log.record(&anomaly)?;
        }

        match kept {
            Some(record) => {
                self.tracker.record_kept();
                self.records.push(record);
            }
            None => self.discarded += 1,
        }

        Ok(())
    }

    /// Drain the channel until every sender is gone, then flush the anomaly log.
    pub async fn run(mut self, mut records: mpsc::Receiver<Record>) -> Result<Collected<W>> {
        while let Some(record) = records.recv().await {
            self.accept(record)?;
        }

        self.finish()
    }

    pub fn finish(self) -> Result<Collected<W>> {
        let anomalies = self.log.entries();
        let log = self.log.finish()?;

        log::debug!(
            target: LOG_TARGET,
            "Collected {} records, discarded {}, {anomalies} anomalies",
            self.records.len(),
            self.discarded
        );

        Ok(Collected {
            records: self.records,
            discarded: self.discarded,
            anomalies,
            log,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::SubAsset;
    use crate::pipeline::Progress;
    use std::sync::Arc;

    struct NoOpProgress;

    impl Progress for NoOpProgress {
        fn set_phase(&self, _phase: &str) {}
        fn set_determinate(&self, _callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {}
        fn set_indeterminate(&self, _callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {}
        fn done(&self) {}
    }

    fn tracker() -> CrawlTracker {
        CrawlTracker::new(&(Arc::new(NoOpProgress) as Arc<dyn Progress>))
    }

    fn record(primary: Option<&str>, secondary: Option<&str>, sounds: usize) -> Record {
        Record {
            locator: Some("http://h/cards/7".to_string()),
            name: "Boar".to_string(),
            primary: primary.map(ToString::to_string),
            secondary: secondary.map(ToString::to_string),
            eligible: false,
            sub_assets: (0..sounds).map(|i| SubAsset::new(format!("sound{i}"), format!("http://h/{i}.ogg"))).collect(),
        }
    }

    #[test]
    fn test_sub_assets_without_images_are_discarded() {
        let verdict = classify(record(None, None, 2));
        assert_eq!(
            verdict.clone(),
            Verdict::Discard(Anomaly::SubAssetsWithoutImages {
                name: "Boar".to_string(),
                locator: "http://h/cards/7".to_string(),
                count: 2,
            })
        );

        let Verdict::Discard(anomaly) = verdict else { unreachable!() };
        assert_eq!(anomaly.to_string(), "Boar (http://h/cards/7) 2 sounds and no images???");
    }

    #[test]
    fn test_no_assets_are_discarded() {
        let Verdict::Discard(anomaly) = classify(record(None, None, 0)) else {
            panic!("expected a discard");
        };
        assert_eq!(anomaly.to_string(), "Boar (http://h/cards/7) has no imgs");
    }

    #[test]
    fn test_secondary_without_primary_is_kept_with_anomaly() {
        let Verdict::KeepWithAnomaly(kept, anomaly) = classify(record(None, Some("g"), 1)) else {
            panic!("expected a kept record with an anomaly");
        };
        assert_eq!(kept.secondary.as_deref(), Some("g"));
        assert_eq!(anomaly.to_string(), "Boar (http://h/cards/7) has gold image, but no regular");
    }

    #[test]
    fn test_primary_is_kept() {
        assert!(matches!(classify(record(Some("p"), None, 0)), Verdict::Keep(_)));
        assert!(matches!(classify(record(Some("p"), Some("g"), 3)), Verdict::Keep(_)));
    }

    #[test]
    fn test_normalize_strips_prefix_and_sorts() {
        let mut record = Record {
            sub_assets: vec![
                SubAsset::new("soundPlay", "p"),
                SubAsset::new("soundAttack", "a"),
                SubAsset::new("Death", "d"),
            ],
            ..Record::default()
        };

        normalize_sub_assets(&mut record, "sound");

        let names: Vec<_> = record.sub_assets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Attack", "Death", "Play"]);
    }

    #[test]
    fn test_collector_writes_one_line_per_anomaly() {
        let mut collector = Collector::new(AnomalyLog::new(Vec::new()), "sound", tracker());

        collector.accept(record(Some("p"), None, 1)).unwrap();
        collector.accept(record(None, None, 0)).unwrap();
        collector.accept(record(None, Some("g"), 0)).unwrap();
        collector.accept(record(None, None, 3)).unwrap();

        let collected = collector.finish().unwrap();
        assert_eq!(collected.records.len(), 2);
        assert_eq!(collected.discarded, 2);
        assert_eq!(collected.anomalies, 3);
        assert_eq!(
            String::from_utf8(collected.log).unwrap(),
            "Boar (http://h/cards/7) has no imgs\n\
             Boar (http://h/cards/7) has gold image, but no regular\n\
             Boar (http://h/cards/7) 3 sounds and no images???\n"
        );
    }

    #[test]
    fn test_collector_normalizes_kept_records() {
        let mut collector = Collector::new(AnomalyLog::new(Vec::new()), "sound", tracker());
        collector.accept(record(Some("p"), None, 2)).unwrap();

        let collected = collector.finish().unwrap();
        let names: Vec<_> = collected.records[0].sub_assets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["0", "1"]);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn test_run_drains_channel_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let collector = Collector::new(AnomalyLog::new(Vec::new()), "sound", tracker());
        let handle = tokio::spawn(collector.run(rx));

        for _ in 0..10 {
            tx.send(record(Some("p"), None, 0)).await.unwrap();
        }
        drop(tx);

        let collected = handle.await.unwrap().unwrap();
        assert_eq!(collected.records.len(), 10);
        assert!(collected.log.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_anomaly_log_file_is_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("oddities.txt");

        let mut log = AnomalyLog::create(&path).unwrap();
        log.record(&Anomaly::NoImages {
            name: "X".to_string(),
            locator: "u".to_string(),
        })
        .unwrap();
        drop(log.finish().unwrap());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "X (u) has no imgs\n");
    }

    #[test]
    fn test_anomaly_log_in_missing_directory_fails() {
        let result = AnomalyLog::create(Path::new("no_such_cardcrawl_dir_4242/oddities.txt"));
        let _ = result.unwrap_err();
    }
}
