//! Ingestion Report

use crate::pipeline::FileState;
use crate::IngestError;
use record_builder::DerivedRecord;
use serde::Serialize;
use uuid::Uuid;

/// Short view of one built record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub identity: String,
    pub signal: bool,
    pub oscillator: Option<f64>,
}

/// Outcome of one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub state: FileState,
    pub tables: usize,
    pub records: usize,
    pub alerts: usize,
}

impl FileSummary {
    pub(crate) fn new(file: String) -> Self {
        Self {
            file,
            state: FileState::Received,
            tables: 0,
            records: 0,
            alerts: 0,
        }
    }
}

/// Records and alerts accumulated across one request
#[derive(Debug, Clone)]
pub struct IngestionReport {
    /// Identifier for this batch
    pub batch_id: Uuid,
    /// Records ready to persist, in file/entry/row order
    pub records: Vec<DerivedRecord>,
    /// File-, entry- and row-level failures, in the order encountered
    pub alerts: Vec<IngestError>,
    /// Per-file outcomes
    pub files: Vec<FileSummary>,
}

impl IngestionReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            records: Vec::new(),
            alerts: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Alert strings for the response body
    pub fn alert_messages(&self) -> Vec<String> {
        self.alerts.iter().map(ToString::to_string).collect()
    }

    /// Summaries keyed on the signal column's oscillator
    pub fn summaries(&self, signal_column: &str) -> Vec<RecordSummary> {
        self.records
            .iter()
            .map(|record| RecordSummary {
                identity: record.name.clone(),
                signal: record.signal,
                oscillator: record.oscillator(signal_column),
            })
            .collect()
    }
}

impl Default for IngestionReport {
    fn default() -> Self {
        Self::new()
    }
}
