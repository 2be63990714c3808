use core::fmt::{Display, Formatter};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use url::Url;

/// Locator of one detail page, as discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemIdentifier(Url);

impl ItemIdentifier {
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self(url)
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.0
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ItemIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named secondary asset of a record (e.g. a sound clip).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAsset {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "URL")]
    pub locator: String,
}

impl SubAsset {
    #[must_use]
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

/// The parsed representation of one catalog item.
///
/// The serialized field names are the contract with the application that embeds the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Locator of the detail page; cleared by the minify pass.
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,

    #[serde(rename = "Name", default)]
    pub name: String,

    /// The primary image. Always serialized, as an empty string when absent.
    #[serde(
        rename = "RegImage",
        default,
        serialize_with = "serialize_empty_if_none",
        deserialize_with = "deserialize_none_if_empty"
    )]
    pub primary: Option<String>,

    /// Variant of the primary image (the animated "golden" version).
    #[serde(
        rename = "GoldImage",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_none_if_empty"
    )]
    pub secondary: Option<String>,

    /// Whether the page marks the item as eligible (collectible).
    #[serde(rename = "Collectible", default, skip_serializing_if = "core::ops::Not::not")]
    pub eligible: bool,

    #[serde(rename = "Sounds", default)]
    pub sub_assets: Vec<SubAsset>,
}

impl Record {
    /// Create an empty record for the given item; parsing fills in the rest.
    #[must_use]
    pub fn for_item(item: &ItemIdentifier) -> Self {
        Self {
            locator: Some(item.as_str().to_string()),
            ..Self::default()
        }
    }

    /// Locator used for display and ordering; empty once cleared.
    #[must_use]
    pub fn locator_str(&self) -> &str {
        self.locator.as_deref().unwrap_or_default()
    }
}

/// A pending asset download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source: String,
    pub destination: PathBuf,
}

fn serialize_empty_if_none<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}

fn deserialize_none_if_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
