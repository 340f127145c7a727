//! Feature Engineering Engine
//!
//! Turns a time-ordered numeric column into a first-difference series and a
//! rolling z-score ("oscillator"), and classifies oscillator values against
//! a fixed threshold.

mod config;
mod signal;
mod statistics;
mod windowed;

pub use config::FeatureConfig;
pub use signal::{Signal, SignalClassifier};
pub use statistics::WindowStatistics;
pub use windowed::{WindowConfig, WindowedSeries};

use thiserror::Error;

/// Errors raised by feature computation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Window size must be positive")]
    InvalidWindow,
    #[error("Epsilon must be finite and positive, got {0}")]
    InvalidEpsilon(f64),
}
