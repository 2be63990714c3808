use crate::Result;
use crate::extract::{HtmlExtractor, SelectorRules};
use crate::output::{DEFAULT_EPILOGUE, DEFAULT_PRELUDE};
use crate::pipeline::{AssetRoute, DEFAULT_DOWNLOAD_WORKERS, DEFAULT_FETCH_WORKERS, Routes};
use camino::{Utf8Path, Utf8PathBuf};
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "cardcrawl.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root that relative links are resolved against
    pub site_root: String,

    /// First listing page, absolute or relative to `site_root`
    pub start_url: String,

    /// Number of concurrent fetch-and-parse workers
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,

    /// Number of concurrent asset downloaders
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// Prefix removed from sub-asset names
    #[serde(default)]
    pub sub_asset_name_prefix: String,

    pub selectors: SelectorRules,

    pub routes: Routes,

    #[serde(default)]
    pub embed: EmbedConfig,
}

/// Text wrapped around the embedded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedConfig {
    #[serde(default = "default_prelude")]
    pub prelude: String,

    #[serde(default = "default_epilogue")]
    pub epilogue: String,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            prelude: default_prelude(),
            epilogue: default_epilogue(),
        }
    }
}

const fn default_fetch_workers() -> usize {
    DEFAULT_FETCH_WORKERS
}

const fn default_download_workers() -> usize {
    DEFAULT_DOWNLOAD_WORKERS
}

fn default_prelude() -> String {
    DEFAULT_PRELUDE.to_string()
}

fn default_epilogue() -> String {
    DEFAULT_EPILOGUE.to_string()
}

impl Config {
    /// The configuration embedded in the binary
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded configuration does not parse
    pub fn builtin() -> Result<Self> {
        toml::from_str(DEFAULT_CONFIG_TOML).into_app_err("parsing built-in default configuration")
    }

    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `cardcrawl.toml` in `base_dir` is used when present and the
    /// built-in defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading cardcrawl configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let config = Self::builtin()?;
                    config.validate()?;
                    return Ok(config);
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading cardcrawl configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// The parsed site root.
    ///
    /// # Errors
    ///
    /// Returns an error if `site_root` is not an absolute URL
    pub fn site_root(&self) -> Result<Url> {
        Url::parse(&self.site_root).into_app_err_with(|| format!("site_root '{}' is not a valid URL", self.site_root))
    }

    /// The first listing page, resolved against the site root.
    ///
    /// # Errors
    ///
    /// Returns an error if either URL is invalid
    pub fn start_url(&self) -> Result<Url> {
        resolve_start(&self.site_root()?, &self.start_url)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if pool sizes are zero, URLs do not parse, selectors do not compile,
    /// or a route has no public base
    pub fn validate(&self) -> Result<()> {
        if self.fetch_workers == 0 {
            return Err(app_err!("fetch_workers must be at least 1"));
        }

        if self.download_workers == 0 {
            return Err(app_err!("download_workers must be at least 1"));
        }

        let site_root = self.site_root()?;
        let _ = resolve_start(&site_root, &self.start_url)?;
        let _ = HtmlExtractor::new(site_root, &self.selectors)?;

        for (slot, route) in self.named_routes() {
            if route.public_base.is_empty() {
                return Err(app_err!("routes.{slot}.public_base must not be empty"));
            }
        }

        Ok(())
    }

    fn named_routes(&self) -> [(&'static str, &AssetRoute); 3] {
        [
            ("primary", &self.routes.primary),
            ("secondary", &self.routes.secondary),
            ("sub_asset", &self.routes.sub_asset),
        ]
    }
}

/// Resolve a start locator that may be absolute or relative to the site root.
pub fn resolve_start(site_root: &Url, start: &str) -> Result<Url> {
    site_root
        .join(start)
        .into_app_err_with(|| format!("start URL '{start}' is not valid relative to '{site_root}'"))
}
