//! Command-line interface and orchestration for cardcrawl
//!
//! This module implements the CLI commands and wires the fetcher, the extractor, the pipeline,
//! and the output writers together into end-to-end runs.
//!
//! # Implementation Model
//!
//! ## Commands
//!
//! - **crawl**: Walk the listing pages, collect one record per item, write the collected
//!   dataset, rewrite asset references (optionally downloading the assets), and write the
//!   rewritten and embedded forms
//! - **init**: Generate a default configuration file
//! - **validate**: Check that a configuration file parses and that its selectors compile
//!
//! ## Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes to the appropriate
//! command handler. A crawl:
//!
//! 1. Sets up logging and loads the configuration
//! 2. Opens and locks the page cache, and creates the anomaly log
//! 3. Runs phase 1 of the pipeline and writes the collected dataset
//! 4. Runs phase 2 and writes the rewritten dataset, then the embedded form if requested
//! 5. Prints a summary through the [`Host`]
//!
//! Only setup and output failures end a run with an error. Items that cannot be fetched or
//! parsed are counted and reported in the summary.

mod common;
mod config;
mod crawl;
mod host;
mod init;
mod progress_reporter;
mod run;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

pub use crawl::{CrawlArgs, crawl};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
