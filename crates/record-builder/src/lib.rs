//! Record Building and Validation
//!
//! Holds the decoded table model and turns table rows plus their windowed
//! features into validated, storage-ready records.

mod builder;
mod error;
mod record;
mod table;

pub use builder::{BuilderConfig, RecordBuilder, TableFeatures};
pub use error::ValidationError;
pub use record::{DerivedRecord, SwingMetrics};
pub use table::{RawTable, RowView, Scalar};
