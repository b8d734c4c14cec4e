use crate::dash::*;

use crate::dash::chat::ChatSettings;
use crate::dash::io_common::infer_input_type;

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "reportName")]
    pub report_name: Option<String>,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnsConfig {
    pub franchisee: Option<String>,
    #[serde(rename = "subClient")]
    pub sub_client: Option<String>,
    #[serde(rename = "testName")]
    pub test_name: Option<String>,
    #[serde(rename = "labPartner")]
    pub lab_partner: Option<String>,
}

impl ColumnsConfig {
    pub fn column_names(&self) -> ColumnNames {
        let d = ColumnNames::default();
        ColumnNames {
            franchisee: self.franchisee.clone().unwrap_or(d.franchisee),
            sub_client: self.sub_client.clone().unwrap_or(d.sub_client),
            test_name: self.test_name.clone().unwrap_or(d.test_name),
            lab_partner: self.lab_partner.clone().unwrap_or(d.lab_partner),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    pub columns: Option<ColumnsConfig>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(rename = "testNames")]
    pub test_names: Option<Vec<String>>,
    pub franchisees: Option<Vec<String>>,
    #[serde(rename = "defaultFranchiseeCount")]
    pub default_franchisee_count: Option<usize>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresentationConfig {
    #[serde(rename = "topTestsCount")]
    pub top_tests_count: Option<usize>,
    #[serde(rename = "testsPerFranchisee")]
    pub tests_per_franchisee: Option<usize>,
    #[serde(rename = "volumeRows")]
    pub volume_rows: Option<usize>,
    #[serde(rename = "subAccountOnly")]
    pub sub_account_only: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(rename = "apiUrl")]
    pub api_url: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "sampleRows")]
    pub sample_rows: Option<usize>,
    pub temperature: Option<f32>,
    #[serde(rename = "maxTokens")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "dataSource", default)]
    pub data_source: DataSource,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub presentation: PresentationConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Everything needed to run one report, after merging the command line and the configuration.
#[derive(PartialEq, Debug, Clone)]
pub struct ReportPlan {
    pub report_name: String,
    pub input_path: String,
    pub input_type: InputType,
    pub worksheet: Option<String>,
    pub columns: ColumnNames,
    /// Explicit selections. None means the default applies.
    pub tests: Option<Vec<String>>,
    pub franchisees: Option<Vec<String>>,
    pub defaults: SelectionDefaults,
    pub aggregation: AggregationSettings,
    pub presentation: PresentationSettings,
    pub out: Option<String>,
    pub reference: Option<String>,
    pub chat: ChatSettings,
}

pub fn read_config(path: &str) -> DashResult<DashConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: DashConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> DashResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

// Relative paths in the configuration file are relative to the file itself.
fn resolve_path(file_path: &str, config_dir: Option<&Path>) -> String {
    match config_dir {
        Some(dir) if Path::new(file_path).is_relative() => {
            dir.join(file_path).display().to_string()
        }
        _ => file_path.to_string(),
    }
}

fn positive(value: usize, name: &str) -> DashResult<usize> {
    if value == 0 {
        whatever!("{} must be at least 1", name)
    }
    Ok(value)
}

pub fn build_plan(args: &Args, config: &DashConfig, config_dir: Option<&Path>) -> DashResult<ReportPlan> {
    let source = &config.data_source;
    let input_path = match (&args.input, &source.file_path) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => resolve_path(p, config_dir),
        (None, None) => return MissingInputSnafu {}.fail(),
    };
    let input_type = match args.input_type.as_ref().or(source.provider.as_ref()) {
        Some(s) => match s.as_str() {
            "xlsx" | "excel" => InputType::Xlsx,
            "csv" => InputType::Csv,
            x => return UnknownInputTypeSnafu { input_type: x }.fail(),
        },
        None => infer_input_type(&input_path),
    };

    let filters = &config.filters;
    let defaults = SelectionDefaults {
        tests: DefaultChoice::All,
        franchisees: DefaultChoice::TopByFrequency(positive(
            filters.default_franchisee_count.unwrap_or(10),
            "defaultFranchiseeCount",
        )?),
    };

    let pres = &config.presentation;
    let aggregation = AggregationSettings {
        top_tests: positive(
            args.top_tests
                .or(pres.top_tests_count)
                .unwrap_or(AggregationSettings::DEFAULT_SETTINGS.top_tests),
            "topTestsCount",
        )?,
        tests_per_franchisee: positive(
            args.tests_per_franchisee
                .or(pres.tests_per_franchisee)
                .unwrap_or(AggregationSettings::DEFAULT_SETTINGS.tests_per_franchisee),
            "testsPerFranchisee",
        )?,
    };
    let presentation = PresentationSettings {
        volume_rows: args.volume_rows.or(pres.volume_rows),
        sub_account_only: args.sub_account_only || pres.sub_account_only.unwrap_or(false),
    };

    let chat = ChatSettings::from_config(&config.chat);

    Ok(ReportPlan {
        report_name: config
            .output_settings
            .report_name
            .clone()
            .unwrap_or_else(|| "Franchise Test Dashboard".to_string()),
        input_path,
        input_type,
        worksheet: args
            .excel_worksheet_name
            .clone()
            .or_else(|| source.excel_worksheet_name.clone()),
        columns: source
            .columns
            .as_ref()
            .map(|c| c.column_names())
            .unwrap_or_default(),
        tests: args.tests.clone().or_else(|| filters.test_names.clone()),
        franchisees: args
            .franchisees
            .clone()
            .or_else(|| filters.franchisees.clone()),
        defaults,
        aggregation,
        presentation,
        out: args
            .out
            .clone()
            .or_else(|| config.output_settings.output_file.clone()),
        reference: args.reference.clone(),
        chat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const FULL_CONFIG: &str = r#"{
        "outputSettings": { "reportName": "March", "outputFile": "summary.json" },
        "dataSource": {
            "provider": "csv",
            "filePath": "data/march.csv",
            "columns": { "franchisee": "Owner", "testName": "Test" }
        },
        "filters": { "testNames": ["CBC"], "defaultFranchiseeCount": 3 },
        "presentation": { "topTestsCount": 8, "subAccountOnly": true },
        "chat": { "model": "gpt-4o", "sampleRows": 50 }
    }"#;

    #[test]
    fn parses_full_config() {
        let config: DashConfig = serde_json::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.output_settings.report_name.as_deref(), Some("March"));
        assert_eq!(config.filters.test_names, Some(vec!["CBC".to_string()]));
        assert_eq!(config.chat.sample_rows, Some(50));
        let columns = config.data_source.columns.unwrap().column_names();
        assert_eq!(columns.franchisee, "Owner");
        assert_eq!(columns.sub_client, "Sub Client");
        assert_eq!(columns.test_name, "Test");
    }

    #[test]
    fn empty_config_is_valid() {
        let config: DashConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DashConfig::default());
    }

    #[test]
    fn plan_merges_config_and_arguments() {
        let config: DashConfig = serde_json::from_str(FULL_CONFIG).unwrap();
        let args = Args::parse_from(["labdash", "--top-tests", "4", "--franchisees", "Acme"]);
        let plan = build_plan(&args, &config, Some(Path::new("/reports"))).unwrap();
        assert_eq!(plan.report_name, "March");
        assert_eq!(
            plan.input_path,
            Path::new("/reports").join("data/march.csv").display().to_string()
        );
        assert_eq!(plan.input_type, InputType::Csv);
        assert_eq!(plan.aggregation.top_tests, 4);
        assert_eq!(plan.aggregation.tests_per_franchisee, 5);
        assert!(plan.presentation.sub_account_only);
        assert_eq!(plan.tests, Some(vec!["CBC".to_string()]));
        assert_eq!(plan.franchisees, Some(vec!["Acme".to_string()]));
        assert_eq!(
            plan.defaults.franchisees,
            DefaultChoice::TopByFrequency(3)
        );
        assert_eq!(plan.out.as_deref(), Some("summary.json"));
        assert_eq!(plan.chat.sample_rows, 50);
        assert_eq!(plan.chat.model, "gpt-4o");
    }

    #[test]
    fn plan_defaults() {
        let args = Args::parse_from(["labdash", "-i", "volumes.xlsx"]);
        let plan = build_plan(&args, &DashConfig::default(), None).unwrap();
        assert_eq!(plan.input_path, "volumes.xlsx");
        assert_eq!(plan.input_type, InputType::Xlsx);
        assert_eq!(plan.defaults, SelectionDefaults::DASHBOARD);
        assert_eq!(plan.aggregation, AggregationSettings::DEFAULT_SETTINGS);
        assert_eq!(plan.presentation, PresentationSettings::default());
        assert_eq!(plan.columns, ColumnNames::default());
        assert_eq!(plan.tests, None);
        assert_eq!(plan.franchisees, None);
    }

    #[test]
    fn plan_errors() {
        let args = Args::parse_from(["labdash"]);
        assert!(matches!(
            build_plan(&args, &DashConfig::default(), None),
            Err(DashError::MissingInput {})
        ));
        let args = Args::parse_from(["labdash", "-i", "x.txt", "--input-type", "pdf"]);
        assert!(matches!(
            build_plan(&args, &DashConfig::default(), None),
            Err(DashError::UnknownInputType { .. })
        ));
        let args = Args::parse_from(["labdash", "-i", "x.csv", "--top-tests", "0"]);
        assert!(matches!(
            build_plan(&args, &DashConfig::default(), None),
            Err(DashError::Whatever { .. })
        ));
    }
}
