use super::Host;
use super::ProgressReporter;
use super::common::{ColorMode, LogLevel, init_logging};
use super::config::{Config, resolve_start};
use crate::Result;
use crate::extract::HtmlExtractor;
use crate::fetch::{CachedFetcher, DirCache, acquire_cache_lock, http_client};
use crate::output::{minify, write_embedded, write_json};
use crate::pipeline::{AnomalyLog, CollectReport, CrawlTracker, DownloadReport, Pipeline, Progress};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use core::fmt::Display;
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError};
use owo_colors::OwoColorize;
use std::io::Write;
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "     crawl";

#[derive(Parser, Debug)]
pub struct CrawlArgs {
    /// Path to configuration file (default is `cardcrawl.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// First listing page, overriding `start_url` from the configuration
    #[arg(long, value_name = "URL")]
    pub start_url: Option<String>,

    /// Download every referenced asset to its route's destination directory
    #[arg(long)]
    pub download: bool,

    /// Directory where fetched pages are cached
    #[arg(long, value_name = "PATH", default_value = "cache")]
    pub cache_dir: Utf8PathBuf,

    /// File that receives one line per anomalous record
    #[arg(long, value_name = "PATH", default_value = "oddities.txt")]
    pub anomaly_log: Utf8PathBuf,

    /// Output for the collected dataset
    #[arg(long, value_name = "PATH", default_value = "cards.json", help_heading = "Output")]
    pub json: Utf8PathBuf,

    /// Output for the dataset after asset references are rewritten
    #[arg(long, value_name = "PATH", default_value = "rewritten.json", help_heading = "Output")]
    pub rewritten_json: Utf8PathBuf,

    /// Output for the minified dataset wrapped in the configured prelude and epilogue
    #[arg(long, value_name = "PATH", help_heading = "Output")]
    pub embed: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

/// What a finished crawl reports to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub collect: CollectReport,
    pub downloads: Option<DownloadReport>,
    pub network_fetches: u64,
    pub cache_hits: u64,
    pub outputs: Vec<Utf8PathBuf>,
}

/// Crawl the catalog, write the datasets, and print a summary.
///
/// # Errors
///
/// Returns an error if the configuration, the cache directory, the cache lock, the anomaly
/// log, or one of the output files cannot be set up or written
pub async fn crawl<H: Host>(host: &mut H, args: &CrawlArgs) -> Result<()> {
    init_logging(args.log_level);

    let config = Config::load(Utf8Path::new("."), args.config.as_ref())?;
    let site_root = config.site_root()?;
    let start = match &args.start_url {
        Some(start) => resolve_start(&site_root, start)?,
        None => config.start_url()?,
    };

    let cache = DirCache::open(args.cache_dir.as_std_path())?;
    let _lock = acquire_cache_lock(cache.dir()).await?;
    let anomaly_log = AnomalyLog::create(args.anomaly_log.as_std_path())?;

    let client = http_client()?;
    let fetcher = CachedFetcher::new(client.clone(), Arc::new(cache));
    let extractor = HtmlExtractor::new(site_root, &config.selectors)?;

    let delay = if args.log_level == LogLevel::None {
        Duration::from_millis(300)
    } else {
        Duration::from_hours(365 * 24)
    };

    let progress: Arc<dyn Progress> = Arc::new(ProgressReporter::new(delay, args.color.enabled_for(&std::io::stderr())));
    let tracker = CrawlTracker::new(&progress);

    let pipeline = Pipeline::new(fetcher, Arc::new(extractor), client, tracker.clone())
        .with_workers(config.fetch_workers, config.download_workers)
        .with_sub_asset_prefix(config.sub_asset_name_prefix.as_str());

    let result = run_pipeline(&pipeline, &config, args, start, anomaly_log).await;
    tracker.finish();
    let summary = result?;

    let use_colors = match args.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => host.output_is_terminal(),
    };

    write_summary(&mut host.output(), &summary, use_colors).into_app_err("writing crawl summary")
}

async fn run_pipeline<W>(
    pipeline: &Pipeline,
    config: &Config,
    args: &CrawlArgs,
    start: Url,
    anomaly_log: AnomalyLog<W>,
) -> Result<CrawlSummary>
where
    W: Write + Send + 'static,
{
    log::info!(target: LOG_TARGET, "Crawling from '{start}'");

    let origin = start.to_string();
    let (dataset, collect) = pipeline
        .collect(start, anomaly_log)
        .await
        .map_err(|e| e.enrich_with(|| format!("crawl from '{origin}' did not complete")))?;
    let mut outputs = Vec::new();

    write_json(&dataset, args.json.as_std_path())?;
    outputs.push(args.json.clone());

    let (rewritten, downloads) = pipeline.relocate(dataset, &config.routes, args.download).await;

    write_json(&rewritten, args.rewritten_json.as_std_path())?;
    outputs.push(args.rewritten_json.clone());

    if let Some(embed) = &args.embed {
        let minified = minify(rewritten, &config.routes);
        write_embedded(&minified, embed.as_std_path(), &config.embed.prelude, &config.embed.epilogue)?;
        outputs.push(embed.clone());
    }

    let counters = pipeline.fetcher().counters();
    Ok(CrawlSummary {
        collect,
        downloads: args.download.then_some(downloads),
        network_fetches: counters.network(),
        cache_hits: counters.cache_hits(),
        outputs,
    })
}

fn bold(text: impl Display, use_colors: bool) -> String {
    if use_colors { text.bold().to_string() } else { text.to_string() }
}

fn count(value: u64, use_colors: bool) -> String {
    if use_colors && value > 0 {
        value.red().to_string()
    } else {
        value.to_string()
    }
}

/// Write the end-of-run summary.
pub fn write_summary(writer: &mut impl Write, summary: &CrawlSummary, use_colors: bool) -> std::io::Result<()> {
    let collect = &summary.collect;
    let discovery = &collect.discovery;

    let heading = format!("Crawl finished: {}", discovery.stop);
    if use_colors {
        writeln!(writer, "{}", heading.green().bold())?;
    } else {
        writeln!(writer, "{heading}")?;
    }

    writeln!(writer, "  {} {}", bold("pages     ", use_colors), discovery.pages)?;
    writeln!(
        writer,
        "  {} {} discovered, {} parsed, {} failed",
        bold("items     ", use_colors),
        discovery.items,
        collect.parsed,
        count(collect.failed, use_colors)
    )?;
    writeln!(
        writer,
        "  {} {} kept, {} discarded, {} anomalies",
        bold("records   ", use_colors),
        collect.kept,
        collect.discarded,
        collect.anomalies
    )?;
    writeln!(
        writer,
        "  {} {} from network, {} from cache",
        bold("fetches   ", use_colors),
        summary.network_fetches,
        summary.cache_hits
    )?;

    if let Some(downloads) = &summary.downloads {
        writeln!(
            writer,
            "  {} {} requested, {} fetched, {} duplicates, {} already present, {} failed",
            bold("downloads ", use_colors),
            downloads.requested,
            downloads.fetched,
            downloads.already_claimed,
            downloads.already_present,
            count(downloads.failed, use_colors)
        )?;
    }

    for output in &summary.outputs {
        writeln!(writer, "  {} {output}", bold("wrote     ", use_colors))?;
    }

    Ok(())
}
