//! Batch Ingestion Pipeline
//!
//! Decodes uploaded CSV files and ZIP archives of CSV files, runs the
//! feature transform over every table, and collects built records and
//! alerts into one report per request.

mod decode;
mod pipeline;
mod report;

pub use decode::{decode_archive, parse_csv, ArchiveEntry, DecodeError, FileKind};
pub use pipeline::{FileState, IngestPipeline, UploadedFile, DEFAULT_MAX_ENTRY_BYTES};
pub use report::{FileSummary, IngestionReport, RecordSummary};

use record_builder::ValidationError;
use thiserror::Error;

/// Failures collected as alerts during ingestion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    /// Payload could not be decoded as a table
    #[error("Error processing CSV {file}: {reason}")]
    MalformedInput { file: String, reason: String },

    /// File suffix is neither a table nor an archive
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    /// Archive container could not be opened
    #[error("Corrupted ZIP file: {file} could not be opened ({reason})")]
    CorruptArchive { file: String, reason: String },

    /// Archive holds no table entries
    #[error("No CSV files found in ZIP: {0}")]
    EmptyArchive(String),

    /// One archive entry could not be read or parsed
    #[error("Corrupt CSV in ZIP {file}!{entry}: {reason}")]
    EntryFailed {
        file: String,
        entry: String,
        reason: String,
    },

    /// A row failed validation
    #[error("Row {row} in {source_name} rejected: {reason}")]
    RowRejected {
        source_name: String,
        row: usize,
        reason: ValidationError,
    },
}
