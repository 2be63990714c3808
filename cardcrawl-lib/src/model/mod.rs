//! Records produced by the crawl and the dataset that aggregates them
//!
//! A [`Record`] is created by a fetch worker from one detail page, handed over the record
//! channel to the collector (single owner at every hop), and, once accepted, becomes part of
//! a [`Dataset`]. Later stages consume a dataset and produce a new one rather than mutating
//! records that another stage might still observe.

mod dataset;
mod record;

pub use dataset::Dataset;
pub use record::{DownloadRequest, ItemIdentifier, Record, SubAsset};
