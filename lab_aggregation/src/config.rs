// ********* Input data structures ***********

use std::collections::BTreeSet;
use std::fmt::Display;

use caseless::default_case_fold_str;
use snafu::Snafu;

/// A table as handed over by the upload collaborator: the header row and the data rows.
///
/// Cells are kept as optional strings. Readers are responsible for rendering numbers,
/// dates, etc. as text. A missing cell at the end of a short row is treated as empty.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// The names of the columns that hold the four required fields.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    pub franchisee: String,
    pub sub_client: String,
    pub test_name: String,
    pub lab_partner: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            franchisee: "Franchisee".to_string(),
            sub_client: "Sub Client".to_string(),
            test_name: "test name".to_string(),
            lab_partner: "Lab Partner".to_string(),
        }
    }
}

/// One validated row of the uploaded data.
///
/// `franchisee` and `test_name` are guaranteed to contain something else than
/// whitespace. Values are kept verbatim, normalization only happens when comparing
/// the franchisee with the sub client.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Record {
    pub franchisee: String,
    pub sub_client: Option<String>,
    pub test_name: String,
    pub lab_partner: Option<String>,
}

impl Record {
    /// True when the record was billed through an account that is not the franchisee itself.
    ///
    /// A record without a sub client is counted as using a sub account.
    pub fn differs(&self) -> bool {
        match &self.sub_client {
            Some(sc) => normalize(&self.franchisee) != normalize(sc),
            None => true,
        }
    }
}

/// Case-folds and trims a name for comparison purposes.
///
/// This is full Unicode case folding: "STRASSE" and "straße" compare equal.
pub fn normalize(s: &str) -> String {
    default_case_fold_str(s.trim())
}

/// The validated records of one upload.
///
/// There is no way to change the records once the dataset is built. Filtering
/// produces a new dataset.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Dataset {
    pub(crate) records: Vec<Record>,
}

impl Dataset {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All the distinct test names, sorted.
    pub fn unique_tests(&self) -> Vec<String> {
        let s: BTreeSet<&String> = self.records.iter().map(|r| &r.test_name).collect();
        s.into_iter().cloned().collect()
    }

    /// All the distinct franchisees, sorted.
    pub fn unique_franchisees(&self) -> Vec<String> {
        let s: BTreeSet<&String> = self.records.iter().map(|r| &r.franchisee).collect();
        s.into_iter().cloned().collect()
    }
}

/// The tests and the franchisees chosen by the user.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FilterSelection {
    pub test_names: BTreeSet<String>,
    pub franchisees: BTreeSet<String>,
}

impl FilterSelection {
    pub fn new<T, F>(test_names: T, franchisees: F) -> FilterSelection
    where
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        FilterSelection {
            test_names: test_names.into_iter().map(|s| s.into()).collect(),
            franchisees: franchisees.into_iter().map(|s| s.into()).collect(),
        }
    }
}

/// How one side of the filter selection is populated when the user has not chosen yet.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DefaultChoice {
    All,
    /// The n most frequent values, ranked like the volume tables.
    TopByFrequency(usize),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct SelectionDefaults {
    pub tests: DefaultChoice,
    pub franchisees: DefaultChoice,
}

impl SelectionDefaults {
    pub const DASHBOARD: SelectionDefaults = SelectionDefaults {
        tests: DefaultChoice::All,
        franchisees: DefaultChoice::TopByFrequency(10),
    };
}

impl Default for SelectionDefaults {
    fn default() -> Self {
        SelectionDefaults::DASHBOARD
    }
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct AggregationSettings {
    /// Number of entries kept in the most common tests table.
    pub top_tests: usize,
    /// Number of tests kept for each franchisee.
    pub tests_per_franchisee: usize,
}

impl AggregationSettings {
    pub const DEFAULT_SETTINGS: AggregationSettings = AggregationSettings {
        top_tests: 15,
        tests_per_franchisee: 5,
    };
}

impl Default for AggregationSettings {
    fn default() -> Self {
        AggregationSettings::DEFAULT_SETTINGS
    }
}

/// Display-only parameters. They slice the derived tables, they never re-aggregate.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct PresentationSettings {
    /// Maximum number of franchisees shown in the volume table. None shows all of them.
    pub volume_rows: Option<usize>,
    /// Only show the franchisees that used a sub account at least once.
    pub sub_account_only: bool,
}

// ******** Output data structures *********

/// Key of the lab partner table. Rows without a lab partner are grouped together.
///
/// The derived order puts the missing bucket after all the named partners.
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub enum PartnerKey {
    Named(String),
    Missing,
}

impl Display for PartnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartnerKey::Named(s) => write!(f, "{}", s),
            PartnerKey::Missing => write!(f, "(missing)"),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct SubAccountStatus {
    pub sub_account_used: u64,
    pub direct_account: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankedTest {
    /// Starts at 1
    pub rank: u32,
    pub test_name: String,
    pub count: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FranchiseeTopTests {
    pub franchisee: String,
    pub tests: Vec<RankedTest>,
}

/// A percentage stored as an exact number of hundredths (3333 is 33.33%).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, PartialOrd, Ord, Default)]
pub struct Percent(pub u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);

    /// Computes `100 * part / total`, rounded half-up to two decimals.
    /// An empty total gives zero.
    pub fn from_ratio(part: u64, total: u64) -> Percent {
        if total == 0 {
            return Percent::ZERO;
        }
        let scaled = (part as u128) * 10_000 * 2 + total as u128;
        Percent((scaled / (2 * total as u128)) as u32)
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.hundredths() as f64 / 100.0
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = self.hundredths();
        write!(f, "{}.{:02}", h / 100, h % 100)
    }
}

/// All the tables derived from one dataset in a single aggregation pass.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct DerivedTables {
    pub volume_by_franchisee: Vec<(String, u64)>,
    pub top_tests: Vec<(String, u64)>,
    pub lab_partner_usage: Vec<(PartnerKey, u64)>,
    pub sub_account_status: SubAccountStatus,
    pub top_tests_per_franchisee: Vec<FranchiseeTopTests>,
    pub franchisee_sub_account_percent: Vec<(String, Percent)>,
}

impl DerivedTables {
    /// Nothing to display: the dataset was empty after filtering.
    pub fn is_empty(&self) -> bool {
        self.volume_by_franchisee.is_empty()
    }
}

/// Errors that stop the pipeline before anything gets aggregated.
#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum AggregationError {
    #[snafu(display(
        "The uploaded data is missing the required column(s): {}. Upload a file that contains them.",
        missing.join(", ")
    ))]
    Schema { missing: Vec<String> },
    #[snafu(display(
        "No valid records: every row is missing a franchisee or a test name."
    ))]
    EmptyDataset {},
    #[snafu(display("No {side} selected. Select at least one to run the report."))]
    EmptySelection { side: SelectionSide },
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SelectionSide {
    TestNames,
    Franchisees,
}

impl Display for SelectionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionSide::TestNames => write!(f, "test type"),
            SelectionSide::Franchisees => write!(f, "franchisee"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for s in ["ACME ", "  acme", "Beta Sub", "", "   ", "ÉCOLE Lab\t"] {
            let n = normalize(s);
            assert_eq!(normalize(&n), n);
        }
    }

    #[test]
    fn differs_ignores_case_and_whitespace() {
        let r = Record {
            franchisee: "ACME ".to_string(),
            sub_client: Some("acme".to_string()),
            test_name: "CBC".to_string(),
            lab_partner: None,
        };
        assert!(!r.differs());
        let r2 = Record {
            sub_client: Some("Beta Sub".to_string()),
            ..r.clone()
        };
        assert!(r2.differs());
        let r3 = Record {
            sub_client: None,
            ..r
        };
        assert!(r3.differs());
    }

    #[test]
    fn differs_uses_full_case_folding() {
        let r = Record {
            franchisee: "STRASSE Labs".to_string(),
            sub_client: Some("straße labs ".to_string()),
            test_name: "CBC".to_string(),
            lab_partner: None,
        };
        assert_eq!(normalize("STRASSE Labs"), normalize("straße labs"));
        assert!(!r.differs());
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(Percent::from_ratio(1, 3), Percent(3333));
        assert_eq!(Percent::from_ratio(2, 3), Percent(6667));
        // 1/8 = 12.5% exactly, 1/16 = 6.25%, 1/32 = 3.125% -> 3.13
        assert_eq!(Percent::from_ratio(1, 32), Percent(313));
        assert_eq!(Percent::from_ratio(0, 7), Percent::ZERO);
        assert_eq!(Percent::from_ratio(7, 7), Percent(10_000));
        assert_eq!(Percent::from_ratio(0, 0), Percent::ZERO);
        assert_eq!(Percent(3333).to_string(), "33.33");
        assert_eq!(Percent(5).to_string(), "0.05");
        assert_eq!(Percent::ZERO.to_string(), "0.00");
        assert_eq!(Percent::from_ratio(1, 3).hundredths(), 3333);
        assert_eq!(Percent(3333).as_f64(), 33.33);
    }

    #[test]
    fn missing_partner_sorts_last() {
        assert!(PartnerKey::Named("Zeta".to_string()) < PartnerKey::Missing);
        assert!(PartnerKey::Named("A".to_string()) < PartnerKey::Named("B".to_string()));
    }

    #[test]
    fn schema_error_names_columns() {
        let e = AggregationError::Schema {
            missing: vec!["test name".to_string(), "Lab Partner".to_string()],
        };
        let msg = e.to_string();
        assert!(msg.contains("test name, Lab Partner"), "{}", msg);
    }
}
