//! What the conversational-query collaborator receives, and how it may fail.
//!
//! The collaborator only ever sees a bounded prefix of the filtered dataset.

use log::warn;
use snafu::Snafu;

use crate::config::{Dataset, Record};

/// Number of records sent along with a question when nothing else is configured.
pub const DEFAULT_SAMPLE_ROWS: usize = 200;

/// Hard limit on the number of records sent along with a question.
pub const MAX_SAMPLE_ROWS: usize = 500;

/// Failures reported by the conversational-query collaborator.
///
/// They are shown to the user as they are and never retried.
#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
#[snafu(visibility(pub))]
pub enum ExternalServiceError {
    #[snafu(display("Authentication with the chat service failed: {message}"))]
    Authentication { message: String },
    #[snafu(display("Could not reach the chat service: {message}"))]
    Transport { message: String },
    #[snafu(display("Unexpected error from the chat service: {message}"))]
    Unexpected { message: String },
}

/// The bounded data sample given to the collaborator.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QueryContext {
    sample: Vec<Record>,
    total_records: usize,
}

impl QueryContext {
    /// Keeps the first `sample_rows` records of the (filtered) dataset.
    /// Requests above [`MAX_SAMPLE_ROWS`] are clamped.
    pub fn from_dataset(dataset: &Dataset, sample_rows: usize) -> QueryContext {
        let cap = if sample_rows > MAX_SAMPLE_ROWS {
            warn!(
                "from_dataset: {} sample rows requested, only {} are sent",
                sample_rows, MAX_SAMPLE_ROWS
            );
            MAX_SAMPLE_ROWS
        } else {
            sample_rows
        };
        QueryContext {
            sample: dataset.records().iter().take(cap).cloned().collect(),
            total_records: dataset.len(),
        }
    }

    pub fn sample(&self) -> &[Record] {
        &self.sample
    }

    /// Size of the dataset the sample was taken from.
    pub fn total_records(&self) -> usize {
        self.total_records
    }
}

/// A service answering free-text questions about a data sample.
pub trait ConversationalQuery {
    fn ask(&self, context: &QueryContext, question: &str) -> Result<String, ExternalServiceError>;
}
