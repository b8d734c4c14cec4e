//! The state of one user's dashboard, owned by the caller.
//!
//! A session never changes in place: every operation returns a new value. Two users
//! of the same application each hold their own session.

use log::info;

use crate::config::*;
use crate::query::ExternalServiceError;
use crate::{aggregate, default_selection, filter};

/// A question asked to the conversational-query collaborator and what came back.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChatExchange {
    pub question: String,
    pub outcome: Result<String, ExternalServiceError>,
}

/// The outcome of one report run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Report {
    /// The records that passed the filter. This is also what the chat sample is taken from.
    pub filtered: Dataset,
    pub tables: DerivedTables,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Session {
    dataset: Dataset,
    selection: FilterSelection,
    transcript: Vec<ChatExchange>,
}

impl Session {
    /// Starts a session on a freshly uploaded dataset, with the default selection.
    pub fn new(dataset: Dataset, defaults: &SelectionDefaults) -> Session {
        let selection = default_selection(&dataset, defaults);
        Session {
            dataset,
            selection,
            transcript: Vec::new(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn transcript(&self) -> &[ChatExchange] {
        &self.transcript
    }

    pub fn with_selection(&self, selection: FilterSelection) -> Session {
        Session {
            selection,
            ..self.clone()
        }
    }

    /// Filters the dataset with the current selection and aggregates the result.
    ///
    /// An empty side of the selection stops the run before any aggregation.
    pub fn run_report(&self, settings: &AggregationSettings) -> Result<Report, AggregationError> {
        let filtered = filter(&self.dataset, &self.selection)?;
        let tables = aggregate(&filtered, settings);
        if tables.is_empty() {
            info!("run_report: no data to display for the current selection");
        }
        Ok(Report { filtered, tables })
    }

    pub fn record_exchange(
        &self,
        question: &str,
        outcome: Result<String, ExternalServiceError>,
    ) -> Session {
        let mut transcript = self.transcript.clone();
        transcript.push(ChatExchange {
            question: question.to_string(),
            outcome,
        });
        Session {
            transcript,
            ..self.clone()
        }
    }
}
