use crate::Result;
use crate::model::DownloadRequest;
use core::sync::atomic::{AtomicU64, Ordering};
use futures_util::TryStreamExt;
use ohno::{IntoAppError, app_err};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::io::AsyncWriteExt;

const LOG_TARGET: &str = " downloads";

/// Destinations already claimed during this run.
#[derive(Debug, Default)]
pub struct SeenSet {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl SeenSet {
    /// Returns `true` the first time a destination is claimed, `false` afterwards.
    pub fn claim(&self, destination: &Path) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(destination.to_path_buf())
    }
}

/// What happened to one download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Fetched,
    AlreadyClaimed,
    AlreadyPresent,
    Failed,
}

/// Per-outcome totals for a run.
#[derive(Debug, Default)]
pub struct DownloadCounters {
    fetched: AtomicU64,
    already_claimed: AtomicU64,
    already_present: AtomicU64,
    failed: AtomicU64,
}

impl DownloadCounters {
    fn record(&self, outcome: DownloadOutcome) {
        let counter = match outcome {
            DownloadOutcome::Fetched => &self.fetched,
            DownloadOutcome::AlreadyClaimed => &self.already_claimed,
            DownloadOutcome::AlreadyPresent => &self.already_present,
            DownloadOutcome::Failed => &self.failed,
        };
        let _ = counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn already_claimed(&self) -> u64 {
        self.already_claimed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn already_present(&self) -> u64 {
        self.already_present.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Downloads assets, at most once per destination.
#[derive(Debug)]
pub struct Downloader {
    client: reqwest::Client,
    seen: SeenSet,
    counters: DownloadCounters,
}

impl Downloader {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            seen: SeenSet::default(),
            counters: DownloadCounters::default(),
        }
    }

    #[must_use]
    pub const fn counters(&self) -> &DownloadCounters {
        &self.counters
    }

    /// Bring one asset to its destination.
    ///
    /// A destination is only ever claimed once per run, and a file that already exists is
    /// left untouched. Failures are logged and counted rather than returned.
    pub async fn download(&self, request: &DownloadRequest) -> DownloadOutcome {
        let outcome = self.try_download(request).await;
        self.counters.record(outcome);
        outcome
    }

    async fn try_download(&self, request: &DownloadRequest) -> DownloadOutcome {
        if !self.seen.claim(&request.destination) {
            log::trace!(target: LOG_TARGET, "'{}' already claimed", request.destination.display());
            return DownloadOutcome::AlreadyClaimed;
        }

        if tokio::fs::try_exists(&request.destination).await.unwrap_or(false) {
            log::debug!(target: LOG_TARGET, "'{}' already present", request.destination.display());
            return DownloadOutcome::AlreadyPresent;
        }

        match self.fetch_to_file(request).await {
            Ok(()) => DownloadOutcome::Fetched,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not download '{}': {e:#}", request.source);
                DownloadOutcome::Failed
            }
        }
    }

    async fn fetch_to_file(&self, request: &DownloadRequest) -> Result<()> {
        let DownloadRequest { source, destination } = request;
        log::info!(target: LOG_TARGET, "Downloading {source}");

        let response = self
            .client
            .get(source)
            .send()
            .await
            .into_app_err_with(|| format!("unable to fetch '{source}'"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(app_err!("could not fetch '{source}': HTTP {status}"));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
        }

        let partial = partial_path(destination);
        let result = stream_to_file(response, &partial).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result?;

        tokio::fs::rename(&partial, destination)
            .await
            .into_app_err_with(|| format!("unable to move download into place at '{}'", destination.display()))
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .into_app_err_with(|| format!("unable to create '{}'", path.display()))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.try_next().await.into_app_err("unable to read download body")? {
        file.write_all(&chunk)
            .await
            .into_app_err_with(|| format!("unable to write '{}'", path.display()))?;
    }

    file.flush()
        .await
        .into_app_err_with(|| format!("unable to flush '{}'", path.display()))
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
