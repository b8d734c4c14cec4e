/*!
Aggregation pipeline for lab-test volume dashboards.

The pipeline turns the rows of an uploaded spreadsheet into a fixed set of derived
tables that chart renderers can consume directly:

```
use lab_aggregation::*;

let raw = RawTable {
    header: vec!["Franchisee".into(), "Sub Client".into(), "test name".into(), "Lab Partner".into()],
    rows: vec![
        vec![Some("Acme".into()), Some("Acme".into()), Some("CBC".into()), Some("LabX".into())],
        vec![Some("Acme".into()), Some("Beta Sub".into()), Some("CMP".into()), None],
    ],
};
let dataset = load(&raw, &ColumnNames::default())?;
let selection = default_selection(&dataset, &SelectionDefaults::DASHBOARD);
let filtered = filter(&dataset, &selection)?;
let tables = aggregate(&filtered, &AggregationSettings::DEFAULT_SETTINGS);
assert_eq!(tables.volume_by_franchisee, vec![("Acme".to_string(), 2)]);
# Ok::<(), AggregationError>(())
```

See the [manual] for the details of every table.
*/
mod config;
pub mod builder;
pub mod manual;
pub mod query;
pub mod session;

use log::{debug, info};
use snafu::ensure;

use std::collections::HashMap;
use std::hash::Hash;

use crate::builder::DatasetBuilder;
pub use crate::config::*;

// **** Private structures ****

// Positions of the required columns in the header.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct ColumnIndexes {
    franchisee: usize,
    sub_client: usize,
    test_name: usize,
    lab_partner: usize,
}

// Running counters of one franchisee.
#[derive(Debug, Default)]
struct FranchiseeCounter<'a> {
    total: u64,
    differs: u64,
    // Tests in the order they first appear for this franchisee.
    tests: Vec<(&'a str, u64)>,
    test_positions: HashMap<&'a str, usize>,
}

impl<'a> FranchiseeCounter<'a> {
    fn add(&mut self, record: &'a Record) {
        self.total += 1;
        if record.differs() {
            self.differs += 1;
        }
        let name = record.test_name.as_str();
        match self.test_positions.get(name) {
            Some(pos) => self.tests[*pos].1 += 1,
            None => {
                self.test_positions.insert(name, self.tests.len());
                self.tests.push((name, 1));
            }
        }
    }

    fn top_tests(&self, limit: usize) -> Vec<RankedTest> {
        let mut tests = self.tests.clone();
        // The sort is stable: ties keep the first-seen order.
        tests.sort_by(|a, b| b.1.cmp(&a.1));
        tests
            .iter()
            .take(limit)
            .enumerate()
            .map(|(idx, (name, count))| RankedTest {
                rank: (idx + 1) as u32,
                test_name: name.to_string(),
                count: *count,
            })
            .collect()
    }
}

/// Validates the raw table and builds the dataset.
///
/// Arguments:
/// * `raw` the header and rows as read from the uploaded file
/// * `columns` the names of the four required columns. They may appear in any order.
///
/// Fails if a required column is absent from the header, or if no row has both a
/// franchisee and a test name.
pub fn load(raw: &RawTable, columns: &ColumnNames) -> Result<Dataset, AggregationError> {
    info!(
        "load: Processing {:?} rows, header: {:?}",
        raw.rows.len(),
        raw.header
    );
    let idxs = column_indexes(&raw.header, columns)?;
    debug!("load: column indexes: {:?}", idxs);

    let mut builder = DatasetBuilder::new();
    for row in raw.rows.iter() {
        let cell = |idx: usize| row.get(idx).and_then(|c| c.as_deref());
        builder.add_row(
            cell(idxs.franchisee),
            cell(idxs.sub_client),
            cell(idxs.test_name),
            cell(idxs.lab_partner),
        );
    }
    info!(
        "load: kept {:?} records, dropped {:?} rows without franchisee or test name",
        builder._records.len(),
        builder.dropped()
    );
    builder.build()
}

fn column_indexes(header: &[String], columns: &ColumnNames) -> Result<ColumnIndexes, AggregationError> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (idx, name) in header.iter().enumerate() {
        // The first column wins if a name is repeated.
        positions.entry(name.trim()).or_insert(idx);
    }
    let required = [
        &columns.franchisee,
        &columns.sub_client,
        &columns.test_name,
        &columns.lab_partner,
    ];
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !positions.contains_key(c.trim()))
        .map(|c| c.to_string())
        .collect();
    ensure!(missing.is_empty(), SchemaSnafu { missing });
    let pos = |c: &String| positions[c.trim()];
    Ok(ColumnIndexes {
        franchisee: pos(&columns.franchisee),
        sub_client: pos(&columns.sub_client),
        test_name: pos(&columns.test_name),
        lab_partner: pos(&columns.lab_partner),
    })
}

/// Keeps the records whose test is selected and whose franchisee is selected.
///
/// An empty side of the selection is rejected: it never means "everything". The
/// returned dataset may be empty, which simply means there is nothing to display.
pub fn filter(dataset: &Dataset, selection: &FilterSelection) -> Result<Dataset, AggregationError> {
    ensure!(
        !selection.test_names.is_empty(),
        EmptySelectionSnafu {
            side: SelectionSide::TestNames
        }
    );
    ensure!(
        !selection.franchisees.is_empty(),
        EmptySelectionSnafu {
            side: SelectionSide::Franchisees
        }
    );
    let records: Vec<Record> = dataset
        .records
        .iter()
        .filter(|r| {
            selection.test_names.contains(&r.test_name)
                && selection.franchisees.contains(&r.franchisee)
        })
        .cloned()
        .collect();
    info!(
        "filter: {:?} tests and {:?} franchisees selected, {:?} of {:?} records kept",
        selection.test_names.len(),
        selection.franchisees.len(),
        records.len(),
        dataset.len()
    );
    Ok(Dataset { records })
}

/// Computes all the derived tables in one pass over the dataset.
///
/// The result only depends on the content and the order of the records.
pub fn aggregate(dataset: &Dataset, settings: &AggregationSettings) -> DerivedTables {
    info!(
        "aggregate: Processing {:?} records, settings: {:?}",
        dataset.len(),
        settings
    );

    let mut franchisees: HashMap<&str, FranchiseeCounter> = HashMap::new();
    let mut tests: HashMap<&str, u64> = HashMap::new();
    let mut partners: HashMap<Option<&str>, u64> = HashMap::new();
    let mut status = SubAccountStatus::default();

    for r in dataset.records.iter() {
        franchisees.entry(r.franchisee.as_str()).or_default().add(r);
        *tests.entry(r.test_name.as_str()).or_insert(0) += 1;
        *partners.entry(r.lab_partner.as_deref()).or_insert(0) += 1;
        if r.differs() {
            status.sub_account_used += 1;
        } else {
            status.direct_account += 1;
        }
    }

    let volume_by_franchisee = rank_counts(
        franchisees
            .iter()
            .map(|(name, fc)| (name.to_string(), fc.total)),
    );

    let mut top_tests = rank_counts(tests.into_iter().map(|(name, c)| (name.to_string(), c)));
    top_tests.truncate(settings.top_tests);

    let lab_partner_usage = rank_counts(partners.into_iter().map(|(p, c)| {
        let key = match p {
            Some(name) => PartnerKey::Named(name.to_string()),
            None => PartnerKey::Missing,
        };
        (key, c)
    }));

    let mut top_tests_per_franchisee: Vec<FranchiseeTopTests> = Vec::new();
    let mut franchisee_sub_account_percent: Vec<(String, Percent)> = Vec::new();
    for (name, _) in volume_by_franchisee.iter() {
        if let Some(fc) = franchisees.get(name.as_str()) {
            top_tests_per_franchisee.push(FranchiseeTopTests {
                franchisee: name.clone(),
                tests: fc.top_tests(settings.tests_per_franchisee),
            });
            franchisee_sub_account_percent
                .push((name.clone(), Percent::from_ratio(fc.differs, fc.total)));
        }
    }

    for (name, count) in volume_by_franchisee.iter() {
        debug!("aggregate: franchisee: {:>8} {}", count, name);
    }
    info!(
        "aggregate: {:?} franchisees, {:?} tests, {:?} lab partners, sub accounts: {:?}",
        volume_by_franchisee.len(),
        top_tests.len(),
        lab_partner_usage.len(),
        status
    );

    DerivedTables {
        volume_by_franchisee,
        top_tests,
        lab_partner_usage,
        sub_account_status: status,
        top_tests_per_franchisee,
        franchisee_sub_account_percent,
    }
}

/// Sorts by decreasing count, then by increasing key.
fn rank_counts<K: Ord>(counts: impl IntoIterator<Item = (K, u64)>) -> Vec<(K, u64)> {
    let mut res: Vec<(K, u64)> = counts.into_iter().collect();
    res.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    res
}

fn count_values<'a, K: Eq + Hash + Ord + Clone>(
    values: impl Iterator<Item = &'a K>,
) -> Vec<(K, u64)>
where
    K: 'a,
{
    let mut counts: HashMap<&K, u64> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    rank_counts(counts.into_iter().map(|(k, c)| (k.clone(), c)))
}

/// The selection shown to the user before they pick anything.
pub fn default_selection(dataset: &Dataset, defaults: &SelectionDefaults) -> FilterSelection {
    let pick = |choice: DefaultChoice, all: Vec<String>, ranked: Vec<(String, u64)>| match choice {
        DefaultChoice::All => all,
        DefaultChoice::TopByFrequency(n) => ranked.into_iter().take(n).map(|p| p.0).collect(),
    };
    let tests = pick(
        defaults.tests,
        dataset.unique_tests(),
        count_values(dataset.records.iter().map(|r| &r.test_name)),
    );
    let franchisees = pick(
        defaults.franchisees,
        dataset.unique_franchisees(),
        count_values(dataset.records.iter().map(|r| &r.franchisee)),
    );
    debug!(
        "default_selection: {:?} tests, franchisees: {:?}",
        tests.len(),
        franchisees
    );
    FilterSelection::new(tests, franchisees)
}

impl DerivedTables {
    /// Applies the display parameters on top of the already aggregated tables.
    pub fn view(&self, presentation: &PresentationSettings) -> DerivedTables {
        let mut res = self.clone();
        if let Some(n) = presentation.volume_rows {
            res.volume_by_franchisee.truncate(n);
        }
        if presentation.sub_account_only {
            res.franchisee_sub_account_percent
                .retain(|(_, p)| *p > Percent::ZERO);
            let kept: Vec<&String> = res
                .franchisee_sub_account_percent
                .iter()
                .map(|(name, _)| name)
                .collect();
            res.top_tests_per_franchisee
                .retain(|ftt| kept.contains(&&ftt.franchisee));
        }
        res
    }
}
