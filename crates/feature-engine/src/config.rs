//! Feature configuration

use crate::signal::SignalClassifier;
use crate::windowed::WindowConfig;
use serde::{Deserialize, Serialize};

/// Feature transform configuration, fixed per deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Rolling window size (rows)
    pub window: usize,
    /// Stabilizing constant for the oscillator denominator
    pub epsilon: f64,
    /// Minimum numeric values per window
    pub min_periods: usize,
    /// Oscillator threshold below which a row signals
    pub threshold: f64,
    /// Numeric columns that receive delta/oscillator features
    pub tracked_columns: Vec<String>,
    /// Tracked column whose oscillator drives the signal
    pub signal_column: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window: 5,
            epsilon: 1e-6,
            min_periods: 2,
            threshold: -2.0,
            tracked_columns: vec!["avg_bat_speed".to_string(), "batter_run_value".to_string()],
            signal_column: "avg_bat_speed".to_string(),
        }
    }
}

impl FeatureConfig {
    /// Window parameters for the series transform
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            window: self.window,
            epsilon: self.epsilon,
            min_periods: self.min_periods,
        }
    }

    /// Classifier for the configured threshold
    pub fn classifier(&self) -> SignalClassifier {
        SignalClassifier::new(self.threshold)
    }
}
