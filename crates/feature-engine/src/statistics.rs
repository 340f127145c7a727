//! Window Statistics Computation

/// Summary statistics for one window of numeric values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowStatistics {
    /// Number of values in the window
    pub count: usize,
    /// Mean value
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator)
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
}

impl WindowStatistics {
    /// Compute statistics from a slice of values
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;

        // Mean
        let mean = values.iter().sum::<f64>() / n;

        // Min/Max
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);

        // Sample variance; a single value has no spread
        let std_dev = if values.len() >= 2 {
            let m2: f64 = values.iter().map(|&v| (v - mean) * (v - mean)).sum();
            (m2 / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self {
            count: values.len(),
            mean,
            std_dev,
            min,
            max,
        }
    }
}
