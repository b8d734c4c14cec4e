use clap::Parser;

/// This is a reporting program for lab test volumes.
#[derive(Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the report: data source, filters and display options.
    /// Options given on the command line take precedence over the content of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The spreadsheet containing the test records. Setting this option overrides the
    /// path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (xlsx or csv) The type of the input. By default, it is guessed from the file extension.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use. The first worksheet
    /// is used otherwise.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (repeatable) The test names to include in the report. All the tests are included by default.
    #[clap(long, value_parser)]
    pub tests: Option<Vec<String>>,

    /// (repeatable) The franchisees to include in the report. The 10 franchisees with the most
    /// records are included by default.
    #[clap(long, value_parser)]
    pub franchisees: Option<Vec<String>>,

    /// (default 15) Number of entries in the most common tests table.
    #[clap(long, value_parser)]
    pub top_tests: Option<usize>,

    /// (default 5) Number of tests shown for each franchisee.
    #[clap(long, value_parser)]
    pub tests_per_franchisee: Option<usize>,

    /// Maximum number of franchisees shown in the volume table.
    #[clap(long, value_parser)]
    pub volume_rows: Option<usize>,

    /// Only show the franchisees that used a sub account in the per-franchisee breakdowns.
    #[clap(long, takes_value = false)]
    pub sub_account_only: bool,

    /// Prints the test names and the franchisees that can be selected, then exits.
    #[clap(long, takes_value = false)]
    pub list_options: bool,

    /// (file path, 'stdout' or empty) If specified, the summary of the report will be written in JSON
    /// format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the summary of a report in JSON format. If provided,
    /// labdash will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// A question about the filtered data, sent to the chat completion service along with a sample
    /// of the records.
    #[clap(short, long, value_parser)]
    pub question: Option<String>,

    /// The key for the chat completion service.
    #[clap(long, value_parser, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

// The API key stays out of the logs.
impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("config", &self.config)
            .field("input", &self.input)
            .field("input_type", &self.input_type)
            .field("excel_worksheet_name", &self.excel_worksheet_name)
            .field("tests", &self.tests)
            .field("franchisees", &self.franchisees)
            .field("top_tests", &self.top_tests)
            .field("tests_per_franchisee", &self.tests_per_franchisee)
            .field("volume_rows", &self.volume_rows)
            .field("sub_account_only", &self.sub_account_only)
            .field("out", &self.out)
            .field("reference", &self.reference)
            .field("question", &self.question)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}
