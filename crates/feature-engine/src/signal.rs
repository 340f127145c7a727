//! Threshold Signal Classification

use serde::{Deserialize, Serialize};

/// Outcome of classifying one oscillator value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Oscillator fell below the threshold
    pub active: bool,
    /// An oscillator value was available to classify
    pub derived: bool,
}

/// Classifies oscillator values against a fixed threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalClassifier {
    threshold: f64,
}

impl SignalClassifier {
    /// Create a classifier with the given threshold
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Get the configured threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify an oscillator value; null oscillators never signal
    pub fn classify(&self, oscillator: Option<f64>) -> Signal {
        match oscillator {
            Some(value) => Signal {
                active: value < self.threshold,
                derived: true,
            },
            None => Signal::default(),
        }
    }
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::new(-2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_null_oscillator() {
        let classifier = SignalClassifier::default();
        assert_eq!(
            classifier.classify(None),
            Signal {
                active: false,
                derived: false
            }
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        let classifier = SignalClassifier::default();
        assert!(!classifier.classify(Some(-2.0)).active);
        assert!(classifier.classify(Some(-2.01)).active);
        assert!(classifier.classify(Some(-1.265)).derived);
        assert!(!classifier.classify(Some(-1.265)).active);
    }

    proptest! {
        #[test]
        fn prop_infinite_thresholds(value in -1e9f64..1e9) {
            let never = SignalClassifier::new(f64::NEG_INFINITY).classify(Some(value));
            prop_assert!(!never.active);
            prop_assert!(never.derived);

            let always = SignalClassifier::new(f64::INFINITY).classify(Some(value));
            prop_assert!(always.active);
        }
    }
}
