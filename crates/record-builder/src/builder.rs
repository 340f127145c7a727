//! Record Builder

use crate::error::ValidationError;
use crate::record::{DerivedRecord, SwingMetrics};
use crate::table::{RowView, Scalar};
use chrono::{DateTime, NaiveDateTime, Utc};
use feature_engine::{FeatureConfig, SignalClassifier, WindowedSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Windowed series for each tracked column present in a table
pub type TableFeatures = BTreeMap<String, WindowedSeries>;

/// Record builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Column that must be present and non-empty
    pub identity_column: String,
    /// Optional column carrying the source timestamp
    pub timestamp_column: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            identity_column: "name".to_string(),
            timestamp_column: "timestamp".to_string(),
        }
    }
}

/// Maps table rows and their features to derived records
pub struct RecordBuilder {
    config: BuilderConfig,
    classifier: SignalClassifier,
    signal_column: String,
}

impl RecordBuilder {
    /// Create a new record builder
    pub fn new(config: BuilderConfig, features: &FeatureConfig) -> Self {
        Self {
            config,
            classifier: features.classifier(),
            signal_column: features.signal_column.clone(),
        }
    }

    /// Identity column name
    pub fn identity_column(&self) -> &str {
        &self.config.identity_column
    }

    /// Build a record from one row
    pub fn build(
        &self,
        row: RowView<'_>,
        features: &TableFeatures,
        now: DateTime<Utc>,
    ) -> Result<DerivedRecord, ValidationError> {
        let name = self.identity(row)?;

        let mut metrics = SwingMetrics::default();
        for (column, value) in row.cells() {
            if !metrics.assign(column, value)? {
                debug!("Column '{}' is not part of the record schema", column);
            }
        }

        let index = row.index();
        let mut derived = BTreeMap::new();
        for (column, series) in features {
            derived.insert(DerivedRecord::delta_key(column), series.delta(index));
            derived.insert(DerivedRecord::oscillator_key(column), series.oscillator(index));
        }

        let oscillator = features
            .get(&self.signal_column)
            .and_then(|series| series.oscillator(index));
        let signal = self.classifier.classify(oscillator);

        Ok(DerivedRecord {
            name,
            metrics,
            features: derived,
            signal: signal.active,
            signal_is_derived: signal.derived,
            timestamp: self.timestamp(row).unwrap_or(now),
        })
    }

    fn identity(&self, row: RowView<'_>) -> Result<String, ValidationError> {
        let text = row
            .get(&self.config.identity_column)
            .map(Scalar::to_string)
            .unwrap_or_default();

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingIdentity(self.config.identity_column.clone()));
        }
        Ok(trimmed.to_string())
    }

    fn timestamp(&self, row: RowView<'_>) -> Option<DateTime<Utc>> {
        let Scalar::Text(raw) = row.get(&self.config.timestamp_column)? else {
            return None;
        };

        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ts| ts.and_utc()))
            .map_err(|e| debug!("Ignoring unparseable timestamp '{}': {}", raw, e))
            .ok()
    }
}
