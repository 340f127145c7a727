//! Rolling Delta and Oscillator Series

use crate::statistics::WindowStatistics;
use crate::FeatureError;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Rolling window parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Number of trailing positions in each window, current row included
    pub window: usize,
    /// Stabilizing constant added to the standard deviation
    pub epsilon: f64,
    /// Minimum numeric values a window needs (never below 2)
    pub min_periods: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window: 5,
            epsilon: 1e-6,
            min_periods: 2,
        }
    }
}

impl WindowConfig {
    /// Check that the parameters can produce a defined statistic
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.window == 0 {
            return Err(FeatureError::InvalidWindow);
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(FeatureError::InvalidEpsilon(self.epsilon));
        }
        Ok(())
    }
}

/// Delta and oscillator series derived from one numeric column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowedSeries {
    /// First differences; `None` at index 0 and next to any null
    pub deltas: Vec<Option<f64>>,
    /// Rolling z-scores; `None` until the window is full
    pub oscillators: Vec<Option<f64>>,
}

impl WindowedSeries {
    /// Compute deltas and oscillators for a column.
    ///
    /// Nulls are excluded from each window's statistic. A position yields an
    /// oscillator only when its own value is numeric and the window holds at
    /// least `min_periods` numeric values. Non-finite inputs count as null.
    pub fn compute(series: &[Option<f64>], config: &WindowConfig) -> Result<Self, FeatureError> {
        config.validate()?;

        let values: Vec<Option<f64>> = series
            .iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        let window = config.window;
        let min_periods = config.min_periods.max(2);

        let mut deltas = Vec::with_capacity(values.len());
        let mut oscillators = Vec::with_capacity(values.len());

        for i in 0..values.len() {
            let delta = match (i.checked_sub(1).and_then(|p| values[p]), values[i]) {
                (Some(prev), Some(curr)) => Some(curr - prev),
                _ => None,
            };
            deltas.push(delta);

            if i + 1 < window {
                oscillators.push(None);
                continue;
            }

            let Some(current) = values[i] else {
                oscillators.push(None);
                continue;
            };

            let numeric: Vec<f64> = values[i + 1 - window..=i].iter().flatten().copied().collect();
            if numeric.len() < min_periods {
                oscillators.push(None);
                continue;
            }

            let stats = WindowStatistics::compute(&numeric);
            let score = (current - stats.mean) / (stats.std_dev + config.epsilon);
            oscillators.push(score.is_finite().then_some(score));
        }

        trace!(
            "Windowed {} positions: {} oscillators defined",
            values.len(),
            oscillators.iter().flatten().count()
        );
        Ok(Self { deltas, oscillators })
    }

    /// Number of positions in the series
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Whether the series is empty
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Delta at a row, if defined
    pub fn delta(&self, index: usize) -> Option<f64> {
        self.deltas.get(index).copied().flatten()
    }

    /// Oscillator at a row, if defined
    pub fn oscillator(&self, index: usize) -> Option<f64> {
        self.oscillators.get(index).copied().flatten()
    }
}
