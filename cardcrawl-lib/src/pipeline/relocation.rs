use crate::model::{DownloadRequest, Record};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a relocated file is named after its source locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Naming {
    /// Strip the first matching prefix, then replace every `/` with `-`.
    Flatten,

    /// Keep only the last path segment.
    Basename,
}

/// Where one kind of asset is downloaded to and how it is published.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssetRoute {
    /// Source prefixes removed before naming, tried in order.
    #[serde(default)]
    pub strip_prefixes: Vec<String>,

    pub naming: Naming,

    /// Local directory receiving downloaded files.
    pub dest_dir: PathBuf,

    /// Public location the files are served from, including its trailing `/`.
    pub public_base: String,
}

impl AssetRoute {
    /// The relocated file name for a source locator.
    #[must_use]
    pub fn file_name(&self, locator: &str) -> String {
        match self.naming {
            Naming::Flatten => {
                let rest = self
                    .strip_prefixes
                    .iter()
                    .find_map(|prefix| locator.strip_prefix(prefix.as_str()))
                    .unwrap_or(locator);
                rest.replace('/', "-")
            }
            Naming::Basename => locator
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(locator)
                .to_string(),
        }
    }

    /// The public form of a relocated file name.
    #[must_use]
    pub fn public_locator(&self, file_name: &str) -> String {
        format!("{}{file_name}", self.public_base)
    }

    /// The on-disk destination of a relocated file name.
    #[must_use]
    pub fn destination(&self, file_name: &str) -> PathBuf {
        self.dest_dir.join(file_name)
    }

    /// Remove the public base (without its trailing `/`) from a relocated reference.
    #[must_use]
    pub fn shorten(&self, reference: &str) -> String {
        let base = self.public_base.trim_end_matches('/');
        reference.strip_prefix(base).unwrap_or(reference).to_string()
    }

    fn rewrite(&self, locator: &mut String, downloads: Option<&mut Vec<DownloadRequest>>) {
        let file_name = self.file_name(locator);

        if let Some(downloads) = downloads {
            downloads.push(DownloadRequest {
                source: locator.clone(),
                destination: self.destination(&file_name),
            });
        }

        *locator = self.public_locator(&file_name);
    }
}

/// The route for each asset slot of a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Routes {
    pub primary: AssetRoute,
    pub secondary: AssetRoute,
    pub sub_asset: AssetRoute,
}

/// Rewrite every asset reference of a record to its public form.
///
/// References are always rewritten; download requests are only produced when
/// `collect_downloads` is set.
#[must_use]
pub fn relocate(mut record: Record, routes: &Routes, collect_downloads: bool) -> (Record, Vec<DownloadRequest>) {
    let mut downloads = collect_downloads.then(Vec::new);

    if let Some(primary) = record.primary.as_mut() {
        routes.primary.rewrite(primary, downloads.as_mut());
    }

    if let Some(secondary) = record.secondary.as_mut() {
        routes.secondary.rewrite(secondary, downloads.as_mut());
    }

    for sub_asset in &mut record.sub_assets {
        routes.sub_asset.rewrite(&mut sub_asset.locator, downloads.as_mut());
    }

    (record, downloads.unwrap_or_default())
}
