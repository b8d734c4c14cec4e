use log::{debug, info, warn};

use lab_aggregation::query::{ConversationalQuery, ExternalServiceError, QueryContext};
use lab_aggregation::session::Session;
use lab_aggregation::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::dash::chat::OpenAiChat;
use crate::dash::config_reader::*;
use crate::dash::io_common::InputType;
use crate::dash::summary::{build_summary_js, render_text};

pub mod chat;
pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod summary;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DashError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} does not contain any worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Cannot find the worksheet {worksheet} in {path}"))]
    MissingWorksheet { worksheet: String, path: String },
    #[snafu(display("The file {path} does not have a header row"))]
    MissingHeader { path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown input type {input_type}, expected xlsx or csv"))]
    UnknownInputType { input_type: String },
    #[snafu(display("No input file: use --input or set filePath in the dataSource section"))]
    MissingInput {},
    #[snafu(display("{source}"))]
    Pipeline { source: AggregationError },
    #[snafu(display("{source}"))]
    Chat { source: ExternalServiceError },
    #[snafu(display("An API key is required to ask questions (--api-key or OPENAI_API_KEY)"))]
    MissingApiKey {},
    #[snafu(display("The question is empty"))]
    EmptyQuestion {},
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type DashResult<T> = Result<T, DashError>;

fn read_table(plan: &ReportPlan) -> DashResult<RawTable> {
    info!(
        "Attempting to read {:?} file {:?}",
        plan.input_type, plan.input_path
    );
    match plan.input_type {
        InputType::Xlsx => {
            io_excel::read_excel_table(&plan.input_path, plan.worksheet.as_deref())
        }
        InputType::Csv => io_csv::read_csv_table(&plan.input_path),
    }
}

/// The selection explicitly requested by the user, completed with the defaults of the session.
fn requested_selection(plan: &ReportPlan, session: &Session) -> Option<FilterSelection> {
    if plan.tests.is_none() && plan.franchisees.is_none() {
        return None;
    }
    let to_set = |l: &Vec<String>| l.iter().cloned().collect::<BTreeSet<String>>();
    Some(FilterSelection {
        test_names: plan
            .tests
            .as_ref()
            .map(to_set)
            .unwrap_or_else(|| session.selection().test_names.clone()),
        franchisees: plan
            .franchisees
            .as_ref()
            .map(to_set)
            .unwrap_or_else(|| session.selection().franchisees.clone()),
    })
}

/// Sends the question with a sample of the filtered records and records the exchange.
pub fn ask_question(
    session: &Session,
    filtered: &Dataset,
    client: &dyn ConversationalQuery,
    question: &str,
    sample_rows: usize,
) -> DashResult<Session> {
    ensure!(!question.trim().is_empty(), EmptyQuestionSnafu {});
    let context = QueryContext::from_dataset(filtered, sample_rows);
    info!(
        "ask_question: sending {:?} of {:?} records",
        context.sample().len(),
        context.total_records()
    );
    let outcome = client.ask(&context, question);
    if let Err(e) = &outcome {
        warn!("ask_question: {}", e);
    }
    Ok(session.record_exchange(question, outcome))
}

fn write_output(out: &str, pretty_js: &str) -> DashResult<()> {
    if out.is_empty() {
        debug!("write_output: empty output location, summary not written");
        return Ok(());
    }
    if out == "stdout" {
        println!("{}", pretty_js);
        return Ok(());
    }
    info!("write_output: writing summary to {:?}", out);
    fs::write(out, pretty_js).context(WritingOutputSnafu { path: out })
}

fn check_reference(reference_path: &str, pretty_js_stats: &str) -> DashResult<()> {
    let summary_ref: JSValue = read_summary(reference_path)?;
    debug!("check_reference: summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference string");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    info!("check_reference: summary matches {:?}", reference_path);
    Ok(())
}

pub fn run_report(args: &Args) -> DashResult<()> {
    let config = match &args.config {
        Some(config_path) => read_config(config_path)?,
        None => DashConfig::default(),
    };
    let config_dir = args
        .config
        .as_deref()
        .and_then(|p| Path::new(p).parent());
    let plan = build_plan(args, &config, config_dir)?;
    info!("run_report: plan: {:?}", plan);

    let raw = read_table(&plan)?;
    let dataset = load(&raw, &plan.columns).context(PipelineSnafu {})?;

    if args.list_options {
        println!("Test types:");
        for t in dataset.unique_tests() {
            println!("  {}", t);
        }
        println!("Franchisees:");
        for f in dataset.unique_franchisees() {
            println!("  {}", f);
        }
        return Ok(());
    }

    let mut session = Session::new(dataset, &plan.defaults);
    if let Some(selection) = requested_selection(&plan, &session) {
        session = session.with_selection(selection);
    }
    info!(
        "run_report: {} test types selected, {} franchisees selected",
        session.selection().test_names.len(),
        session.selection().franchisees.len()
    );

    let report = session
        .run_report(&plan.aggregation)
        .context(PipelineSnafu {})?;
    let view = report.tables.view(&plan.presentation);
    println!("{}", render_text(&view));

    let summary_js = build_summary_js(&plan, &session, &report, &view);
    let pretty_js_stats = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    if let Some(out) = &plan.out {
        write_output(out, &pretty_js_stats)?;
    }
    // The reference summary, if provided for comparison
    if let Some(reference_path) = &plan.reference {
        check_reference(reference_path, &pretty_js_stats)?;
    }

    if let Some(question) = &args.question {
        ensure!(!question.trim().is_empty(), EmptyQuestionSnafu {});
        let api_key = args.api_key.clone().context(MissingApiKeySnafu {})?;
        let client = OpenAiChat::new(plan.chat.clone(), api_key).context(ChatSnafu {})?;
        session = ask_question(
            &session,
            &report.filtered,
            &client,
            question,
            plan.chat.sample_rows,
        )?;
        if let Some(exchange) = session.transcript().last() {
            match &exchange.outcome {
                Ok(answer) => println!("Answer:\n{}", answer),
                Err(e) => return Err(e.clone()).context(ChatSnafu {}),
            }
        }
    }

    Ok(())
}
