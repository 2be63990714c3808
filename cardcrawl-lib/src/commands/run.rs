//! Command dispatch logic for cardcrawl

use super::{CrawlArgs, InitArgs, ValidateArgs, crawl, init_config, validate_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "cardcrawl", version, author, long_about = None)]
#[command(about = "Crawl a paginated card catalog and relocate the media it references")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the catalog and write the datasets
    Crawl(Box<CrawlArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        Command::Crawl(crawl_args) => crawl(host, crawl_args).await,
        Command::Init(init_args) => init_config(host, init_args),
        Command::Validate(validate_args) => validate_config(host, validate_args),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_crawl_defaults() {
        let cli = Cli::parse_from(["cardcrawl", "crawl"]);
        let Command::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };

        assert!(!args.download);
        assert_eq!(args.cache_dir, "cache");
        assert_eq!(args.anomaly_log, "oddities.txt");
        assert_eq!(args.json, "cards.json");
        assert_eq!(args.rewritten_json, "rewritten.json");
        assert!(args.embed.is_none());
        assert!(args.start_url.is_none());
    }

    #[test]
    fn test_crawl_flags() {
        let cli = Cli::parse_from([
            "cardcrawl",
            "crawl",
            "--download",
            "--start-url",
            "/cards?page=4",
            "--embed",
            "cards.ts",
            "--color",
            "never",
            "--log-level",
            "debug",
        ]);
        let Command::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };

        assert!(args.download);
        assert_eq!(args.start_url.as_deref(), Some("/cards?page=4"));
        assert_eq!(args.embed.as_deref().map(camino::Utf8Path::as_str), Some("cards.ts"));
    }
}
