pub use crate::config::*;

use log::debug;

/// A builder for assembling a dataset row by row.
///
/// It applies the same validation as [`crate::load`]: rows without a franchisee or a
/// test name are dropped.
///
/// ```
/// use lab_aggregation::builder::DatasetBuilder;
/// # use lab_aggregation::AggregationError;
///
/// let mut builder = DatasetBuilder::new();
/// builder.add_row_simple(&["Acme", "Acme", "CBC", "LabX"]);
/// builder.add_row_simple(&["", "Acme", "CBC", "LabX"]);
///
/// let dataset = builder.build()?;
/// assert_eq!(dataset.len(), 1);
/// # Ok::<(), AggregationError>(())
/// ```
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    pub(crate) _records: Vec<Record>,
    pub(crate) _dropped: usize,
}

impl DatasetBuilder {
    pub fn new() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// Adds a row with the four fields in the usual order:
    /// franchisee, sub client, test name, lab partner.
    ///
    /// Empty strings are treated as missing values.
    pub fn add_row_simple(&mut self, fields: &[&str; 4]) -> bool {
        let [franchisee, sub_client, test_name, lab_partner] = *fields;
        self.add_row(
            Some(franchisee),
            Some(sub_client),
            Some(test_name),
            Some(lab_partner),
        )
    }

    /// Adds a row. Returns false if the row was dropped because the franchisee or
    /// the test name is missing.
    pub fn add_row(
        &mut self,
        franchisee: Option<&str>,
        sub_client: Option<&str>,
        test_name: Option<&str>,
        lab_partner: Option<&str>,
    ) -> bool {
        match (present(franchisee), present(test_name)) {
            (Some(franchisee), Some(test_name)) => {
                self._records.push(Record {
                    franchisee,
                    sub_client: present(sub_client),
                    test_name,
                    lab_partner: present(lab_partner),
                });
                true
            }
            (f, t) => {
                debug!(
                    "add_row: row {}: dropping row with franchisee {:?} and test name {:?}",
                    self._records.len() + self._dropped,
                    f,
                    t
                );
                self._dropped += 1;
                false
            }
        }
    }

    /// Number of rows that were dropped so far.
    pub fn dropped(&self) -> usize {
        self._dropped
    }

    pub fn build(self) -> Result<Dataset, AggregationError> {
        if self._records.is_empty() {
            return EmptyDatasetSnafu {}.fail();
        }
        Ok(Dataset {
            records: self._records,
        })
    }
}

// Whitespace-only cells count as empty.
fn present(s: Option<&str>) -> Option<String> {
    match s {
        Some(x) if !x.trim().is_empty() => Some(x.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_rows_without_required_fields() {
        let mut b = DatasetBuilder::new();
        assert!(b.add_row_simple(&["Acme", "", "CBC", ""]));
        assert!(!b.add_row_simple(&["   ", "Acme", "CBC", "LabX"]));
        assert!(!b.add_row_simple(&["Acme", "Acme", "\t", "LabX"]));
        assert!(!b.add_row(None, None, Some("CBC"), None));
        assert_eq!(b.dropped(), 3);
        let ds = b.build().unwrap();
        assert_eq!(ds.len(), 1);
        let r = &ds.records()[0];
        assert_eq!(r.sub_client, None);
        assert_eq!(r.lab_partner, None);
    }

    #[test]
    fn keeps_values_verbatim() {
        let mut b = DatasetBuilder::new();
        b.add_row_simple(&[" Acme", "acme ", "CBC ", "LabX"]);
        let ds = b.build().unwrap();
        let r = &ds.records()[0];
        assert_eq!(r.franchisee, " Acme");
        assert_eq!(r.sub_client.as_deref(), Some("acme "));
        assert_eq!(r.test_name, "CBC ");
    }

    #[test]
    fn empty_builder_fails() {
        let mut b = DatasetBuilder::new();
        b.add_row_simple(&["", "", "", ""]);
        assert_eq!(b.build(), Err(AggregationError::EmptyDataset {}));
    }
}
