use super::Record;

/// The accepted records of a run, always ordered by locator.
///
/// The ordering is established with a stable sort, so records whose locator has been
/// cleared keep the relative order they had before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    #[must_use]
    pub fn from_records(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| a.locator_str().cmp(b.locator_str()));
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Produce a new dataset by transforming every record, keeping the locator order.
    #[must_use]
    pub fn map(self, f: impl FnMut(Record) -> Record) -> Self {
        Self::from_records(self.records.into_iter().map(f).collect())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn record(locator: Option<&str>, name: &str) -> Record {
        Record {
            locator: locator.map(ToString::to_string),
            name: name.to_string(),
            ..Record::default()
        }
    }

    #[test]
    fn test_sorted_by_locator() {
        let dataset = Dataset::from_records(vec![
            record(Some("http://h/cards/3"), "c"),
            record(Some("http://h/cards/1"), "a"),
            record(Some("http://h/cards/2"), "b"),
        ]);

        let names: Vec<_> = dataset.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_any_arrival_order_gives_same_dataset() {
        let mut records = vec![
            record(Some("http://h/cards/20"), "x"),
            record(Some("http://h/cards/100"), "y"),
            record(Some("http://h/cards/3"), "z"),
        ];
        let first = Dataset::from_records(records.clone());
        records.reverse();
        let second = Dataset::from_records(records);

        assert_eq!(first, second);
    }

    #[test]
    fn test_cleared_locators_keep_previous_order() {
        let dataset = Dataset::from_records(vec![record(Some("http://h/b"), "b"), record(Some("http://h/a"), "a")]);

        let cleared = dataset.map(|mut r| {
            r.locator = None;
            r
        });

        let names: Vec<_> = cleared.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
