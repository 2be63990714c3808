//! Extraction rules for listing and detail pages
//!
//! The crawl pipeline only knows the [`Extractor`] trait: one pure function turning a listing
//! page into item locators plus an optional next page, and one turning a detail page into an
//! [`ItemPage`]. [`HtmlExtractor`] implements both with CSS selectors taken from configuration.

mod html;

pub use html::{HtmlExtractor, SelectorRules};

use crate::Result;
use crate::model::{ItemIdentifier, Record, SubAsset};
use url::Url;

/// What a listing page yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Detail page locators in row order.
    pub items: Vec<ItemIdentifier>,

    /// The following listing page, if the pager offers one.
    pub next_page: Option<Url>,
}

/// What a detail page yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPage {
    pub name: String,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub sub_assets: Vec<SubAsset>,
    pub eligible: bool,
}

impl ItemPage {
    /// Turn the extracted fields into the record for `item`.
    #[must_use]
    pub fn into_record(self, item: &ItemIdentifier) -> Record {
        Record {
            name: self.name,
            primary: self.primary,
            secondary: self.secondary,
            eligible: self.eligible,
            sub_assets: self.sub_assets,
            ..Record::for_item(item)
        }
    }
}

/// Site-specific knowledge of page markup.
pub trait Extractor: Send + Sync {
    /// Extract item locators and the next page from a listing page.
    fn parse_listing(&self, page: &Url, content: &[u8]) -> Result<ListingPage>;

    /// Extract the fields of one item from its detail page.
    fn parse_item(&self, item: &ItemIdentifier, content: &[u8]) -> Result<ItemPage>;
}
