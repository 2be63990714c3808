//! Dataset serialization
//!
//! The dataset is written in three shapes: a pretty JSON array for inspection, the same after
//! reference rewriting, and a compact embedded form (by default a TypeScript module) produced
//! from a [`minify`]d copy. Records are always written in the dataset's locator order.

use crate::Result;
use crate::model::{Dataset, Record};
use crate::pipeline::Routes;
use ohno::IntoAppError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const LOG_TARGET: &str = "    output";

/// Default text written before the embedded JSON.
pub const DEFAULT_PRELUDE: &str = "import {CardDef} from './models'\n var Cards = ";

/// Default text written after the embedded JSON.
pub const DEFAULT_EPILOGUE: &str = " as CardDef[];\n export default Cards;";

/// Write the dataset as a pretty-printed JSON array.
pub fn write_json(dataset: &Dataset, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(dataset.records()).into_app_err("unable to serialize dataset")?;
    write_file(path, &[json.trim()])?;
    log::info!(target: LOG_TARGET, "Wrote {} records to '{}'", dataset.len(), path.display());
    Ok(())
}

/// Write the dataset as compact JSON wrapped in `prelude` and `epilogue`.
pub fn write_embedded(dataset: &Dataset, path: &Path, prelude: &str, epilogue: &str) -> Result<()> {
    let json = serde_json::to_string(dataset.records()).into_app_err("unable to serialize dataset")?;
    write_file(path, &[prelude, json.trim(), epilogue])?;
    log::info!(target: LOG_TARGET, "Embedded {} records in '{}'", dataset.len(), path.display());
    Ok(())
}

/// Shrink a rewritten dataset for embedding.
///
/// Detail page locators are cleared, and every route's public base (without its trailing
/// `/`) is removed from the references in that route's slot.
#[must_use]
pub fn minify(dataset: Dataset, routes: &Routes) -> Dataset {
    dataset.map(|record| minify_record(record, routes))
}

fn minify_record(mut record: Record, routes: &Routes) -> Record {
    record.locator = None;
    record.primary = record.primary.map(|r| routes.primary.shorten(&r));
    record.secondary = record.secondary.map(|r| routes.secondary.shorten(&r));

    for sub_asset in &mut record.sub_assets {
        sub_asset.locator = routes.sub_asset.shorten(&sub_asset.locator);
    }

    record
}

fn write_file(path: &Path, parts: &[&str]) -> Result<()> {
    let file = File::create(path).into_app_err_with(|| format!("unable to create output file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    for part in parts {
        writer
            .write_all(part.as_bytes())
            .into_app_err_with(|| format!("unable to write output file '{}'", path.display()))?;
    }

    writer
        .flush()
        .into_app_err_with(|| format!("unable to write output file '{}'", path.display()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::SubAsset;
    use crate::pipeline::{AssetRoute, Naming};
    use std::path::PathBuf;

    fn route(public_base: &str) -> AssetRoute {
        AssetRoute {
            strip_prefixes: Vec::new(),
            naming: Naming::Basename,
            dest_dir: PathBuf::from("out"),
            public_base: public_base.to_string(),
        }
    }

    fn routes() -> Routes {
        Routes {
            primary: route("https://img.example.org/img/"),
            secondary: route("https://gold.example.org/img/"),
            sub_asset: route("https://sound.example.org/s/"),
        }
    }

    fn rewritten(locator: &str, name: &str) -> Record {
        Record {
            locator: Some(locator.to_string()),
            name: name.to_string(),
            primary: Some("https://img.example.org/img/1-a.png".to_string()),
            secondary: None,
            eligible: true,
            sub_assets: vec![SubAsset::new("Play", "https://sound.example.org/s/a.ogg")],
        }
    }

    #[test]
    fn test_minify_clears_locators_and_shortens_references() {
        let dataset = Dataset::from_records(vec![rewritten("http://h/cards/1", "A")]);
        let minified = minify(dataset, &routes());

        let record = &minified.records()[0];
        assert_eq!(record.locator, None);
        assert_eq!(record.primary.as_deref(), Some("/1-a.png"));
        assert_eq!(record.secondary, None);
        assert_eq!(record.sub_assets[0].locator, "/a.ogg");
    }

    #[test]
    fn test_minify_keeps_prior_order() {
        let dataset = Dataset::from_records(vec![
            rewritten("http://h/cards/2", "B"),
            rewritten("http://h/cards/1", "A"),
            rewritten("http://h/cards/3", "C"),
        ]);

        let names: Vec<_> = minify(dataset, &routes()).into_records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_write_json_is_pretty_and_sorted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cards.json");
        let dataset = Dataset::from_records(vec![rewritten("http://h/cards/2", "B"), rewritten("http://h/cards/1", "A")]);

        write_json(&dataset, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {"));
        assert!(!text.ends_with('\n'));

        let parsed: Vec<Record> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, dataset.into_records());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_write_embedded_wraps_compact_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cards.ts");
        let dataset = minify(Dataset::from_records(vec![rewritten("http://h/cards/1", "A")]), &routes());

        write_embedded(&dataset, &path, DEFAULT_PRELUDE, DEFAULT_EPILOGUE).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "import {CardDef} from './models'\n var Cards = \
             [{\"Name\":\"A\",\"RegImage\":\"/1-a.png\",\"Collectible\":true,\"Sounds\":[{\"Name\":\"Play\",\"URL\":\"/a.ogg\"}]}] \
             as CardDef[];\n export default Cards;"
        );
    }

    #[test]
    fn test_unwritable_output_is_an_error() {
        let dataset = Dataset::default();
        let result = write_json(&dataset, Path::new("no_such_cardcrawl_dir_4242/cards.json"));
        let _ = result.unwrap_err();
    }
}
