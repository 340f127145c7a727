//! Record Presentation
//!
//! Pure functions of a stored record: a one-line insight and a short
//! projection, kept apart from the record schema so they can be swapped.

mod engine;

pub use engine::{Insight, InsightConfig, InsightEngine, Projection, SwingOutlook};

use record_builder::DerivedRecord;

/// Derives presentation fields from a record
pub trait Presenter: Send + Sync {
    /// One-line human-readable insight
    fn insight(&self, record: &DerivedRecord) -> String;

    /// Forward projection, if the record carries enough data
    fn projection(&self, record: &DerivedRecord) -> Option<Projection>;
}
