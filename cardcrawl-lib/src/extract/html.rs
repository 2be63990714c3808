use super::{Extractor, ItemPage, ListingPage};
use crate::Result;
use crate::model::{ItemIdentifier, SubAsset};
use ohno::{IntoAppError, app_err};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

const LOG_TARGET: &str = "   extract";

/// CSS selectors and marker labels describing the catalog markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorRules {
    /// Rows of the listing table.
    pub listing_row: String,

    /// Link to the detail page inside a listing row (`href`).
    pub item_link: String,

    /// Pager links; the last match is the candidate next-page control.
    pub next_page: String,

    /// Text the next-page control must carry to be followed.
    pub next_label: String,

    /// Element holding the display name.
    pub name: String,

    /// Image element of the primary asset (`src`).
    pub primary: String,

    /// Media element of the secondary asset (`src`).
    pub secondary: String,

    /// Elements of the sub-assets (`id` is the name, `src` the locator).
    pub sub_asset: String,

    /// Attribute list items searched for the eligibility label.
    pub eligibility: String,

    /// Text marking an item as eligible.
    pub eligibility_label: String,
}

/// [`Extractor`] driven by [`SelectorRules`].
#[derive(Debug)]
pub struct HtmlExtractor {
    site_root: Url,
    listing_row: Selector,
    item_link: Selector,
    next_page: Selector,
    next_label: String,
    name: Selector,
    primary: Selector,
    secondary: Selector,
    sub_asset: Selector,
    eligibility: Selector,
    eligibility_label: String,
}

impl HtmlExtractor {
    /// Compile the rules; relative links are resolved against `site_root`.
    pub fn new(site_root: Url, rules: &SelectorRules) -> Result<Self> {
        Ok(Self {
            site_root,
            listing_row: compile("listing_row", &rules.listing_row)?,
            item_link: compile("item_link", &rules.item_link)?,
            next_page: compile("next_page", &rules.next_page)?,
            next_label: rules.next_label.clone(),
            name: compile("name", &rules.name)?,
            primary: compile("primary", &rules.primary)?,
            secondary: compile("secondary", &rules.secondary)?,
            sub_asset: compile("sub_asset", &rules.sub_asset)?,
            eligibility: compile("eligibility", &rules.eligibility)?,
            eligibility_label: rules.eligibility_label.clone(),
        })
    }

    fn resolve(&self, href: &str) -> Option<Url> {
        match self.site_root.join(href) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Ignoring unusable link '{href}': {e}");
                None
            }
        }
    }
}

impl Extractor for HtmlExtractor {
    fn parse_listing(&self, page: &Url, content: &[u8]) -> Result<ListingPage> {
        let text = core::str::from_utf8(content).into_app_err_with(|| format!("listing page '{page}' is not valid UTF-8"))?;
        let doc = Html::parse_document(text);

        let items = doc
            .select(&self.listing_row)
            .filter_map(|row| row.select(&self.item_link).next())
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| self.resolve(href))
            .map(ItemIdentifier::new)
            .collect();

        let next_page = doc
            .select(&self.next_page)
            .last()
            .filter(|control| text_of(*control) == self.next_label)
            .and_then(|control| control.value().attr("href"))
            .and_then(|href| self.resolve(href));

        Ok(ListingPage { items, next_page })
    }

    fn parse_item(&self, item: &ItemIdentifier, content: &[u8]) -> Result<ItemPage> {
        let text = core::str::from_utf8(content).into_app_err_with(|| format!("item page '{item}' is not valid UTF-8"))?;
        let doc = Html::parse_document(text);

        let name = doc.select(&self.name).next().map(text_of).unwrap_or_default();
        let primary = first_attr(&doc, &self.primary, "src");
        let secondary = first_attr(&doc, &self.secondary, "src");

        let sub_assets = doc
            .select(&self.sub_asset)
            .filter_map(|element| {
                let element = element.value();
                let locator = element.attr("src")?;
                let name = element.attr("id")?;
                Some(SubAsset::new(name, locator))
            })
            .collect();

        let eligible = doc.select(&self.eligibility).any(|e| text_of(e) == self.eligibility_label);

        Ok(ItemPage {
            name,
            primary,
            secondary,
            sub_assets,
            eligible,
        })
    }
}

fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| app_err!("invalid `{field}` selector '{css}': {e}"))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_attr(doc: &Html, selector: &Selector, attr: &str) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|e| e.value().attr(attr))
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn rules() -> SelectorRules {
        SelectorRules {
            listing_row: ".listing tbody tr".to_string(),
            item_link: ".manual-data-link".to_string(),
            next_page: ".paging-list .b-pagination-item a".to_string(),
            next_label: "Next".to_string(),
            name: ".card-details>header>.caption".to_string(),
            primary: ".u-typography-format .hscard-static".to_string(),
            secondary: ".hscard-video source".to_string(),
            sub_asset: ".card-info p audio".to_string(),
            eligibility: ".infobox ul li".to_string(),
            eligibility_label: "Collectible".to_string(),
        }
    }

    fn extractor() -> HtmlExtractor {
        HtmlExtractor::new(Url::parse("http://www.example.com").unwrap(), &rules()).unwrap()
    }

    fn page_url() -> Url {
        Url::parse("http://www.example.com/cards?page=1").unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
        <table class="listing"><tbody>
            <tr><td><a class="manual-data-link" href="/cards/1-wisp">Wisp</a></td></tr>
            <tr><td>no link in this row</td></tr>
            <tr><td><a class="manual-data-link" href="/cards/2-boar">Boar</a><a class="manual-data-link" href="/cards/ignored">x</a></td></tr>
        </tbody></table>
        <ul class="paging-list">
            <li class="b-pagination-item"><a href="/cards?page=1">1</a></li>
            <li class="b-pagination-item"><a href="/cards?page=2"> Next </a></li>
        </ul>
        </body></html>"#;

    #[test]
    fn test_listing_items_in_row_order() {
        let page = extractor().parse_listing(&page_url(), LISTING.as_bytes()).unwrap();

        let items: Vec<_> = page.items.iter().map(ItemIdentifier::as_str).collect();
        assert_eq!(items, ["http://www.example.com/cards/1-wisp", "http://www.example.com/cards/2-boar"]);
    }

    #[test]
    fn test_listing_follows_next_control() {
        let page = extractor().parse_listing(&page_url(), LISTING.as_bytes()).unwrap();
        assert_eq!(page.next_page.unwrap().as_str(), "http://www.example.com/cards?page=2");
    }

    #[test]
    fn test_listing_without_next_label_is_last_page() {
        let html = r#"<ul class="paging-list">
            <li class="b-pagination-item"><a href="/cards?page=2">Next</a></li>
            <li class="b-pagination-item"><a href="/cards?page=3">3</a></li>
        </ul>"#;

        let page = extractor().parse_listing(&page_url(), html.as_bytes()).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_listing_without_pager_is_last_page() {
        let page = extractor().parse_listing(&page_url(), b"<html></html>").unwrap();
        assert_eq!(page, ListingPage::default());
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_error() {
        let err = extractor().parse_listing(&page_url(), &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    const ITEM: &str = r#"
        <html><body>
        <div class="card-details"><header><h2 class="caption"> Wisp </h2></header></div>
        <div class="u-typography-format"><img class="hscard-static" src="http://media.example.com/avatars/1/2/wisp.png"></div>
        <div class="hscard-video"><video><source src="http://media.example.com/goldCards/1/2/wisp.webm"></video></div>
        <div class="card-info">
            <p><audio id="soundPlay" src="http://media.example.com/sounds/wisp_play.ogg"></audio></p>
            <p><audio src="http://media.example.com/sounds/no_id.ogg"></audio></p>
            <p><audio id="soundAttack" src="http://media.example.com/sounds/wisp_attack.ogg"></audio></p>
        </div>
        <div class="infobox"><ul><li>Type: Minion</li><li>Collectible</li></ul></div>
        </body></html>"#;

    fn item() -> ItemIdentifier {
        ItemIdentifier::new(Url::parse("http://www.example.com/cards/1-wisp").unwrap())
    }

    #[test]
    fn test_item_fields() {
        let page = extractor().parse_item(&item(), ITEM.as_bytes()).unwrap();

        assert_eq!(page.name, "Wisp");
        assert_eq!(page.primary.as_deref(), Some("http://media.example.com/avatars/1/2/wisp.png"));
        assert_eq!(page.secondary.as_deref(), Some("http://media.example.com/goldCards/1/2/wisp.webm"));
        assert!(page.eligible);
        assert_eq!(
            page.sub_assets,
            [
                SubAsset::new("soundPlay", "http://media.example.com/sounds/wisp_play.ogg"),
                SubAsset::new("soundAttack", "http://media.example.com/sounds/wisp_attack.ogg"),
            ]
        );
    }

    #[test]
    fn test_labels_match_after_trimming() {
        let html = r#"
            <ul class="paging-list"><li class="b-pagination-item"><a href="/cards?page=4">
                Next
            </a></li></ul>"#;
        let page = extractor().parse_listing(&page_url(), html.as_bytes()).unwrap();
        assert_eq!(page.next_page.unwrap().as_str(), "http://www.example.com/cards?page=4");

        let html = r#"<div class="infobox"><ul><li>
            Collectible </li></ul></div>"#;
        assert!(extractor().parse_item(&item(), html.as_bytes()).unwrap().eligible);

        let html = r#"<div class="infobox"><ul><li>Collectible Set</li><li>collectible</li></ul></div>"#;
        assert!(!extractor().parse_item(&item(), html.as_bytes()).unwrap().eligible);
    }

    #[test]
    fn test_item_asset_locators_are_verbatim() {
        let html = r#"<div class="u-typography-format"><img class="hscard-static" src="http://Media-Host.example.com/a/b.png"></div>"#;
        let page = extractor().parse_item(&item(), html.as_bytes()).unwrap();
        assert_eq!(page.primary.as_deref(), Some("http://Media-Host.example.com/a/b.png"));
    }

    #[test]
    fn test_item_with_nothing_is_empty() {
        let page = extractor().parse_item(&item(), b"<html><body><p>gone</p></body></html>").unwrap();
        assert_eq!(page, ItemPage::default());
    }

    #[test]
    fn test_into_record_keeps_the_item_locator() {
        let page = extractor().parse_item(&item(), ITEM.as_bytes()).unwrap();
        let record = page.into_record(&item());

        assert_eq!(record.locator_str(), "http://www.example.com/cards/1-wisp");
        assert_eq!(record.name, "Wisp");
        assert_eq!(record.sub_assets.len(), 2);
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let bad = SelectorRules {
            name: "..nope[".to_string(),
            ..rules()
        };

        let err = HtmlExtractor::new(Url::parse("http://www.example.com").unwrap(), &bad).unwrap_err();
        assert!(err.to_string().contains("`name` selector"));
    }
}
