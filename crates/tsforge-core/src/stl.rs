//! Single-period STL (Seasonal-Trend decomposition using Loess), simplified
//! to weighted moving averages rather than full Loess regression.

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone)]
pub struct StlResult {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct StlDecomposition {
    period: usize,
    trend_window: usize,
    seasonal_window: usize,
    iterations: usize,
    robust: bool,
}

pub struct StlBuilder {
    period: usize,
    trend_window: Option<usize>,
    seasonal_window: usize,
    iterations: usize,
    robust: bool,
}

impl StlDecomposition {
    pub fn builder(period: usize) -> StlBuilder {
        StlBuilder {
            period,
            trend_window: None,
            seasonal_window: 7,
            iterations: 2,
            robust: false,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn fit(&self, values: &[f64]) -> Result<StlResult> {
        let n = values.len();
        if n < 2 * self.period {
            return Err(ForecastError::InsufficientData {
                needed: 2 * self.period,
                got: n,
            });
        }

        let mut remainder = values.to_vec();
        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights = vec![1.0; n];

        for _pass in 0..self.iterations.max(1) {
            let detrended: Vec<f64> = values
                .iter()
                .zip(&trend)
                .map(|(v, t)| v - t)
                .collect();
            let raw_seasonal =
                seasonal_phase_average(&detrended, self.period, self.seasonal_window, &weights);
            seasonal = center_seasonal(&raw_seasonal);

            let deseasonalized: Vec<f64> = values
                .iter()
                .zip(&seasonal)
                .map(|(v, s)| v - s)
                .collect();
            trend = weighted_moving_average(&deseasonalized, self.trend_window, &weights);

            remainder = values
                .iter()
                .zip(&trend)
                .zip(&seasonal)
                .map(|((v, t), s)| v - t - s)
                .collect();

            if self.robust {
                weights = biweight_weights(&remainder);
            }
        }

        Ok(StlResult {
            trend,
            seasonal,
            remainder,
        })
    }
}

impl StlBuilder {
    pub fn trend_window(mut self, window: usize) -> Self {
        self.trend_window = Some(ensure_odd(window));
        self
    }

    pub fn seasonal_window(mut self, window: usize) -> Self {
        self.seasonal_window = ensure_odd(window.max(3));
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    pub fn build(self) -> Result<StlDecomposition> {
        if self.period < 2 {
            return Err(ForecastError::InvalidInput(
                "STL period must be at least 2".to_string(),
            ));
        }
        let trend_window = self
            .trend_window
            .unwrap_or_else(|| ensure_odd((self.period * 3).max(7)));
        Ok(StlDecomposition {
            period: self.period,
            trend_window,
            seasonal_window: self.seasonal_window,
            iterations: self.iterations,
            robust: self.robust,
        })
    }
}

pub(crate) fn ensure_odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Centered moving average over `window`, shrinking the window near the
/// edges rather than producing `NaN`.
pub(crate) fn weighted_moving_average(values: &[f64], window: usize, weights: &[f64]) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            let mut num = 0.0;
            let mut den = 0.0;
            for j in start..end {
                num += values[j] * weights[j];
                den += weights[j];
            }
            if den > 1e-12 {
                num / den
            } else {
                values[i]
            }
        })
        .collect()
}

fn seasonal_phase_average(
    detrended: &[f64],
    period: usize,
    window: usize,
    weights: &[f64],
) -> Vec<f64> {
    let n = detrended.len();
    let n_cycles = n.div_ceil(period);
    let mut phase_series = vec![Vec::new(); period];
    let mut phase_weights = vec![Vec::new(); period];
    for i in 0..n {
        phase_series[i % period].push(detrended[i]);
        phase_weights[i % period].push(weights[i]);
    }

    let half = window / 2;
    let mut smoothed_phase = vec![vec![0.0; n_cycles]; period];
    for p in 0..period {
        let series = &phase_series[p];
        let w = &phase_weights[p];
        let len = series.len();
        for c in 0..len {
            let start = c.saturating_sub(half);
            let end = (c + half + 1).min(len);
            let mut num = 0.0;
            let mut den = 0.0;
            for k in start..end {
                num += series[k] * w[k];
                den += w[k];
            }
            smoothed_phase[p][c] = if den > 1e-12 { num / den } else { series[c] };
        }
    }

    let mut out = vec![0.0; n];
    let mut cycle_counters = vec![0usize; period];
    for i in 0..n {
        let p = i % period;
        out[i] = smoothed_phase[p][cycle_counters[p]];
        cycle_counters[p] += 1;
    }
    out
}

fn center_seasonal(seasonal: &[f64]) -> Vec<f64> {
    let mean = seasonal.iter().sum::<f64>() / seasonal.len() as f64;
    seasonal.iter().map(|s| s - mean).collect()
}

pub(crate) fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Tukey biweight robustness weights scaled by `6 * median(|remainder|)`.
pub(crate) fn biweight_weights(remainder: &[f64]) -> Vec<f64> {
    let abs_resid: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    let h = 6.0 * median(&abs_resid);
    if h < 1e-12 {
        return vec![1.0; remainder.len()];
    }
    remainder
        .iter()
        .map(|r| {
            let u = (r / h).clamp(-1.0, 1.0);
            let w = 1.0 - u * u;
            (w * w).max(0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposition_reconstructs_observed_series() {
        let n = 48;
        let values: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64;
                10.0 + 0.1 * t + 5.0 * ((t / 12.0) * std::f64::consts::TAU).sin()
            })
            .collect();
        let stl = StlDecomposition::builder(12).iterations(2).build().unwrap();
        let result = stl.fit(&values).unwrap();
        for i in 0..n {
            let sum = result.trend[i] + result.seasonal[i] + result.remainder[i];
            assert!((sum - values[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_short_series() {
        let stl = StlDecomposition::builder(12).build().unwrap();
        assert!(stl.fit(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn rejects_period_below_two() {
        assert!(StlDecomposition::builder(1).build().is_err());
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }
}
