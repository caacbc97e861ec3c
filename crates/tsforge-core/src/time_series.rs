//! Minimal univariate time-series container.

use chrono::NaiveDateTime;

use crate::error::{ForecastError, Result};

/// An ordered, immutable `(timestamp, value)` series.
///
/// Constructed once via [`TimeSeriesBuilder`] and borrowed by every `fit`.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `true` if every value is strictly positive (required by multiplicative families).
    pub fn is_strictly_positive(&self) -> bool {
        self.values.iter().all(|v| *v > 0.0)
    }
}

/// Builder for [`TimeSeries`]; validates monotonicity and finiteness at `build()`.
#[derive(Debug, Default)]
pub struct TimeSeriesBuilder {
    timestamps: Option<Vec<NaiveDateTime>>,
    values: Vec<f64>,
}

impl TimeSeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    pub fn timestamps(mut self, timestamps: Vec<NaiveDateTime>) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    /// Builds the series. When no timestamps were supplied, a synthetic axis
    /// of one-second increments from the Unix epoch is used — the engine
    /// below only ever reasons about relative ordering, not wall-clock time.
    pub fn build(self) -> Result<TimeSeries> {
        if self.values.is_empty() {
            return Err(ForecastError::InvalidInput(
                "time series must have at least one observation".to_string(),
            ));
        }
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidInput(
                "time series contains non-finite values".to_string(),
            ));
        }

        let timestamps = match self.timestamps {
            Some(ts) => {
                if ts.len() != self.values.len() {
                    return Err(ForecastError::InvalidInput(format!(
                        "timestamps ({}) and values ({}) have different lengths",
                        ts.len(),
                        self.values.len()
                    )));
                }
                if !ts.windows(2).all(|w| w[0] < w[1]) {
                    return Err(ForecastError::InvalidInput(
                        "timestamps must be strictly increasing".to_string(),
                    ));
                }
                ts
            }
            None => synthetic_axis(self.values.len()),
        };

        Ok(TimeSeries {
            timestamps,
            values: self.values,
        })
    }
}

fn synthetic_axis(n: usize) -> Vec<NaiveDateTime> {
    let epoch = NaiveDateTime::UNIX_EPOCH;
    (0..n)
        .map(|i| epoch + chrono::Duration::seconds(i as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_with_synthetic_axis() {
        let ts = TimeSeriesBuilder::new()
            .values(vec![1.0, 2.0, 3.0])
            .build()
            .unwrap();
        assert_eq!(ts.len(), 3);
        assert!(ts.timestamps().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rejects_empty() {
        assert!(TimeSeriesBuilder::new().values(vec![]).build().is_err());
    }

    #[test]
    fn rejects_non_finite() {
        assert!(TimeSeriesBuilder::new()
            .values(vec![1.0, f64::NAN])
            .build()
            .is_err());
    }

    #[test]
    fn rejects_non_monotone_timestamps() {
        let epoch = NaiveDateTime::UNIX_EPOCH;
        let ts = vec![epoch, epoch];
        assert!(TimeSeriesBuilder::new()
            .values(vec![1.0, 2.0])
            .timestamps(ts)
            .build()
            .is_err());
    }
}
