//! Derived Record Schema

use crate::error::ValidationError;
use crate::table::Scalar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bat-tracking metrics copied from an uploaded row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwingMetrics {
    pub swings_competitive: Option<i64>,
    pub percent_swings_competitive: Option<f64>,
    pub contact: Option<i64>,
    pub avg_bat_speed: Option<f64>,
    pub hard_swing_rate: Option<f64>,
    pub squared_up_per_bat_contact: Option<f64>,
    pub squared_up_per_swing: Option<f64>,
    pub blast_per_bat_contact: Option<f64>,
    pub blast_per_swing: Option<f64>,
    pub swing_length: Option<f64>,
    pub swords: Option<i64>,
    pub batter_run_value: Option<f64>,
    pub whiffs: Option<i64>,
    pub whiff_per_swing: Option<f64>,
    pub batted_ball_events: Option<i64>,
    pub batted_ball_event_per_swing: Option<f64>,
}

impl SwingMetrics {
    /// Integer-valued schema columns
    pub const INTEGER_COLUMNS: &'static [&'static str] = &[
        "swings_competitive",
        "contact",
        "swords",
        "whiffs",
        "batted_ball_events",
    ];

    /// Float-valued schema columns
    pub const FLOAT_COLUMNS: &'static [&'static str] = &[
        "percent_swings_competitive",
        "avg_bat_speed",
        "hard_swing_rate",
        "squared_up_per_bat_contact",
        "squared_up_per_swing",
        "blast_per_bat_contact",
        "blast_per_swing",
        "swing_length",
        "batter_run_value",
        "whiff_per_swing",
        "batted_ball_event_per_swing",
    ];

    /// Store a cell into its schema column.
    ///
    /// Returns `Ok(false)` for columns outside the schema.
    pub fn assign(&mut self, column: &str, value: &Scalar) -> Result<bool, ValidationError> {
        if let Some(slot) = self.float_slot(column) {
            *slot = match value {
                Scalar::Number(v) => Some(*v),
                Scalar::Missing => None,
                Scalar::Text(_) => return Err(invalid(column, value)),
            };
            return Ok(true);
        }

        if let Some(slot) = self.integer_slot(column) {
            *slot = match value {
                Scalar::Number(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(*v as i64),
                Scalar::Missing => None,
                _ => return Err(invalid(column, value)),
            };
            return Ok(true);
        }

        Ok(false)
    }

    fn float_slot(&mut self, column: &str) -> Option<&mut Option<f64>> {
        let slot = match column {
            "percent_swings_competitive" => &mut self.percent_swings_competitive,
            "avg_bat_speed" => &mut self.avg_bat_speed,
            "hard_swing_rate" => &mut self.hard_swing_rate,
            "squared_up_per_bat_contact" => &mut self.squared_up_per_bat_contact,
            "squared_up_per_swing" => &mut self.squared_up_per_swing,
            "blast_per_bat_contact" => &mut self.blast_per_bat_contact,
            "blast_per_swing" => &mut self.blast_per_swing,
            "swing_length" => &mut self.swing_length,
            "batter_run_value" => &mut self.batter_run_value,
            "whiff_per_swing" => &mut self.whiff_per_swing,
            "batted_ball_event_per_swing" => &mut self.batted_ball_event_per_swing,
            _ => return None,
        };
        Some(slot)
    }

    fn integer_slot(&mut self, column: &str) -> Option<&mut Option<i64>> {
        let slot = match column {
            "swings_competitive" => &mut self.swings_competitive,
            "contact" => &mut self.contact,
            "swords" => &mut self.swords,
            "whiffs" => &mut self.whiffs,
            "batted_ball_events" => &mut self.batted_ball_events,
            _ => return None,
        };
        Some(slot)
    }
}

fn invalid(column: &str, value: &Scalar) -> ValidationError {
    ValidationError::InvalidValue {
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// One ingested row with its derived features
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord {
    /// Identity field
    pub name: String,
    #[serde(flatten)]
    pub metrics: SwingMetrics,
    /// `delta_<col>` / `oscillator_<col>` for each tracked column
    #[serde(flatten)]
    pub features: BTreeMap<String, Option<f64>>,
    /// Oscillator of the signal column fell below the threshold
    pub signal: bool,
    /// The signal came from a computed oscillator
    pub signal_is_derived: bool,
    /// Ingestion (or source) time
    pub timestamp: DateTime<Utc>,
}

impl DerivedRecord {
    /// Feature key holding a column's delta
    pub fn delta_key(column: &str) -> String {
        format!("delta_{column}")
    }

    /// Feature key holding a column's oscillator
    pub fn oscillator_key(column: &str) -> String {
        format!("oscillator_{column}")
    }

    /// Delta for a tracked column
    pub fn delta(&self, column: &str) -> Option<f64> {
        self.features.get(&Self::delta_key(column)).copied().flatten()
    }

    /// Oscillator for a tracked column
    pub fn oscillator(&self, column: &str) -> Option<f64> {
        self.features.get(&Self::oscillator_key(column)).copied().flatten()
    }
}
