//! Insight Engine Implementation

use crate::Presenter;
use record_builder::DerivedRecord;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Insight configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Oscillator below which the cashout insight fires (default: -2.5)
    pub critical_oscillator: f64,
    /// Blast-per-swing rate considered elite (default: 0.35)
    pub elite_blast_rate: f64,
    /// Whiff-per-swing rate considered a weakness (default: 0.4)
    pub high_whiff_rate: f64,
    /// Age of peak performance
    pub peak_age: f64,
    /// Assumed current age
    pub current_age: f64,
    /// Years after peak before decline starts
    pub decline_offset_years: f64,
    /// Lower bound on the age factor
    pub min_age_factor: f64,
    /// Fraction of contact that becomes hits
    pub contact_hit_rate: f64,
    /// Swings covered by the projection
    pub projection_swings: u32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            critical_oscillator: -2.5,
            elite_blast_rate: 0.35,
            high_whiff_rate: 0.4,
            peak_age: 27.5,
            current_age: 25.0,
            decline_offset_years: 4.5,
            min_age_factor: 0.8,
            contact_hit_rate: 0.3,
            projection_swings: 10,
        }
    }
}

/// Insight category for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Insight {
    /// Bat speed oscillator in critical decline
    CashoutSignal,
    /// Blast rate above the elite mark
    EliteBlast,
    /// Whiff rate above the weakness mark
    HighWhiff,
    /// Nothing notable
    Baseline,
}

impl Insight {
    /// Get display message
    pub fn message(&self) -> &'static str {
        match self {
            Insight::CashoutSignal => "Cashout signal STRONG: bat speed in critical decline",
            Insight::EliteBlast => "Elite blast rate detected",
            Insight::HighWhiff => "High whiff rate: vulnerable to swing-and-miss",
            Insight::Baseline => "Baseline performance",
        }
    }
}

/// Expected outcomes over the next swings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwingOutlook {
    pub hits: i64,
    pub blasts: i64,
    pub whiffs: i64,
}

/// Forward projection for a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub next_swings: SwingOutlook,
    pub peak_age: f64,
    pub decline_start: f64,
}

/// Threshold-driven presenter
pub struct InsightEngine {
    /// Configuration
    config: InsightConfig,
    /// Tracked column whose oscillator is inspected
    signal_column: String,
}

impl InsightEngine {
    /// Create a new insight engine
    pub fn new(config: InsightConfig, signal_column: impl Into<String>) -> Self {
        info!("Creating insight engine with config: {:?}", config);
        Self {
            config,
            signal_column: signal_column.into(),
        }
    }

    /// Classify a record, first matching rule wins
    pub fn classify(&self, record: &DerivedRecord) -> Insight {
        let metrics = &record.metrics;

        if record
            .oscillator(&self.signal_column)
            .is_some_and(|osc| osc < self.config.critical_oscillator)
        {
            Insight::CashoutSignal
        } else if metrics
            .blast_per_swing
            .is_some_and(|rate| rate > self.config.elite_blast_rate)
        {
            Insight::EliteBlast
        } else if metrics
            .whiff_per_swing
            .is_some_and(|rate| rate > self.config.high_whiff_rate)
        {
            Insight::HighWhiff
        } else {
            Insight::Baseline
        }
    }

    /// Age factor applied to projected hits
    pub fn age_factor(&self) -> f64 {
        let distance = (self.config.current_age - self.config.peak_age).abs();
        (1.0 - distance / 10.0).max(self.config.min_age_factor)
    }
}

impl Presenter for InsightEngine {
    fn insight(&self, record: &DerivedRecord) -> String {
        self.classify(record).message().to_string()
    }

    fn projection(&self, record: &DerivedRecord) -> Option<Projection> {
        let metrics = &record.metrics;
        metrics.avg_bat_speed.filter(|speed| *speed != 0.0)?;

        let swings = self.config.projection_swings as f64;
        let contact = metrics.contact.unwrap_or(0) as f64;

        Some(Projection {
            next_swings: SwingOutlook {
                hits: (contact * self.config.contact_hit_rate * self.age_factor()).trunc() as i64,
                blasts: (metrics.blast_per_swing.unwrap_or(0.0) * swings).trunc() as i64,
                whiffs: (metrics.whiff_per_swing.unwrap_or(0.0) * swings).trunc() as i64,
            },
            peak_age: self.config.peak_age,
            decline_start: self.config.peak_age + self.config.decline_offset_years,
        })
    }
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new(InsightConfig::default(), "avg_bat_speed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use record_builder::SwingMetrics;
    use std::collections::BTreeMap;

    fn record(metrics: SwingMetrics, oscillator: Option<f64>) -> DerivedRecord {
        let mut features = BTreeMap::new();
        features.insert(DerivedRecord::oscillator_key("avg_bat_speed"), oscillator);
        DerivedRecord {
            name: "Test".into(),
            metrics,
            features,
            signal: false,
            signal_is_derived: oscillator.is_some(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_insight_priority() {
        let engine = InsightEngine::default();
        let elite = SwingMetrics {
            blast_per_swing: Some(0.4),
            whiff_per_swing: Some(0.5),
            ..Default::default()
        };

        assert_eq!(engine.classify(&record(elite.clone(), Some(-3.0))), Insight::CashoutSignal);
        assert_eq!(engine.classify(&record(elite, Some(-1.0))), Insight::EliteBlast);

        let whiffy = SwingMetrics {
            whiff_per_swing: Some(0.45),
            ..Default::default()
        };
        assert_eq!(engine.classify(&record(whiffy, None)), Insight::HighWhiff);
        assert_eq!(
            engine.insight(&record(SwingMetrics::default(), None)),
            "Baseline performance"
        );
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let config = InsightConfig {
            critical_oscillator: -1.0,
            ..Default::default()
        };
        let engine = InsightEngine::new(config, "avg_bat_speed");
        assert_eq!(
            engine.classify(&record(SwingMetrics::default(), Some(-1.5))),
            Insight::CashoutSignal
        );
    }

    #[test]
    fn test_projection() {
        let engine = InsightEngine::default();
        let metrics = SwingMetrics {
            avg_bat_speed: Some(74.0),
            contact: Some(100),
            blast_per_swing: Some(0.27),
            whiff_per_swing: Some(0.31),
            ..Default::default()
        };

        let projection = engine.projection(&record(metrics, None)).unwrap();
        // age factor clamps to 0.8: 100 * 0.3 * 0.8 = 24
        assert_eq!(projection.next_swings.hits, 24);
        assert_eq!(projection.next_swings.blasts, 2);
        assert_eq!(projection.next_swings.whiffs, 3);
        assert_eq!(projection.peak_age, 27.5);
        assert_eq!(projection.decline_start, 32.0);
    }

    #[test]
    fn test_projection_requires_bat_speed() {
        let engine = InsightEngine::default();
        assert!(engine.projection(&record(SwingMetrics::default(), None)).is_none());

        let zero = SwingMetrics {
            avg_bat_speed: Some(0.0),
            ..Default::default()
        };
        assert!(engine.projection(&record(zero, None)).is_none());
    }

    #[test]
    fn test_projection_serializes() {
        let engine = InsightEngine::default();
        let metrics = SwingMetrics {
            avg_bat_speed: Some(70.0),
            ..Default::default()
        };
        let json = serde_json::to_value(engine.projection(&record(metrics, None))).unwrap();
        assert_eq!(json["next_swings"]["hits"], 0);
        assert_eq!(json["decline_start"], 32.0);
    }
}
