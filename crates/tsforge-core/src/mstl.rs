//! MSTL: iterative multi-period decomposition built on repeated single-period
//! STL passes, with Tukey-biweight robust reweighting between outer rounds.

use crate::error::{ForecastError, Result};
use crate::stl::{biweight_weights, ensure_odd, weighted_moving_average, StlDecomposition};

#[derive(Debug, Clone)]
pub struct MstlResult {
    pub periods: Vec<usize>,
    pub trend: Vec<f64>,
    /// One seasonal component per period, in the same order as `periods`.
    pub seasonal: Vec<Vec<f64>>,
    pub remainder: Vec<f64>,
}

impl MstlResult {
    /// `trend[i] + sum(seasonal[_][i]) + remainder[i] == observed[i]`.
    pub fn reconstruct(&self, index: usize) -> f64 {
        self.trend[index]
            + self.seasonal.iter().map(|s| s[index]).sum::<f64>()
            + self.remainder[index]
    }
}

#[derive(Debug, Clone)]
pub struct MstlDecomposition {
    periods: Vec<usize>,
    iterations: usize,
    robust: bool,
}

pub struct MstlBuilder {
    periods: Vec<usize>,
    iterations: usize,
    robust: bool,
}

impl MstlDecomposition {
    pub fn builder(periods: Vec<usize>) -> MstlBuilder {
        MstlBuilder {
            periods,
            iterations: 2,
            robust: false,
        }
    }

    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    pub fn fit(&self, values: &[f64]) -> Result<MstlResult> {
        let n = values.len();
        let max_period = *self.periods.iter().max().unwrap();
        if n < 2 * max_period {
            return Err(ForecastError::InsufficientData {
                needed: 2 * max_period,
                got: n,
            });
        }

        let mut seasonal_components = vec![vec![0.0; n]; self.periods.len()];
        let mut trend = vec![0.0; n];
        let mut weights = vec![1.0; n];

        for _outer in 0..self.iterations.max(1) {
            for (idx, &period) in self.periods.iter().enumerate() {
                let deseasonalized: Vec<f64> = (0..n)
                    .map(|i| {
                        values[i]
                            - seasonal_components
                                .iter()
                                .enumerate()
                                .filter(|(j, _)| *j != idx)
                                .map(|(_, s)| s[i])
                                .sum::<f64>()
                    })
                    .collect();

                let trend_window = ensure_odd((period * 3).max(7));
                let stl = StlDecomposition::builder(period)
                    .trend_window(trend_window)
                    .robust(self.robust)
                    .build()?;
                let pass = stl.fit(&deseasonalized)?;
                seasonal_components[idx] = pass.seasonal;
            }

            let trend_window = ensure_odd(max_period * 2);
            let deseasonalized_total: Vec<f64> = (0..n)
                .map(|i| values[i] - seasonal_components.iter().map(|s| s[i]).sum::<f64>())
                .collect();
            trend = weighted_moving_average(&deseasonalized_total, trend_window, &weights);

            let remainder: Vec<f64> = (0..n)
                .map(|i| {
                    values[i] - trend[i] - seasonal_components.iter().map(|s| s[i]).sum::<f64>()
                })
                .collect();

            if self.robust {
                weights = biweight_weights(&remainder);
            }
        }

        let remainder: Vec<f64> = (0..n)
            .map(|i| values[i] - trend[i] - seasonal_components.iter().map(|s| s[i]).sum::<f64>())
            .collect();

        Ok(MstlResult {
            periods: self.periods.clone(),
            trend,
            seasonal: seasonal_components,
            remainder,
        })
    }
}

impl MstlBuilder {
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    /// Unlike the reference implementation (which silently drops periods < 2
    /// via `remove_if`), a period below 2 is rejected immediately here.
    pub fn build(self) -> Result<MstlDecomposition> {
        if self.periods.is_empty() {
            return Err(ForecastError::InvalidInput(
                "MSTL requires at least one seasonal period".to_string(),
            ));
        }
        if let Some(&bad) = self.periods.iter().find(|&&p| p < 2) {
            return Err(ForecastError::InvalidInput(format!(
                "MSTL period must be >= 2, got {bad}"
            )));
        }
        Ok(MstlDecomposition {
            periods: self.periods,
            iterations: self.iterations,
            robust: self.robust,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi_seasonal_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                20.0 + 0.05 * t
                    + 4.0 * ((t / 7.0) * std::f64::consts::TAU).sin()
                    + 2.0 * ((t / 365.0) * std::f64::consts::TAU).sin()
            })
            .collect()
    }

    #[test]
    fn reconstruction_matches_observed() {
        let values = multi_seasonal_series(800);
        let mstl = MstlDecomposition::builder(vec![7, 365])
            .iterations(2)
            .build()
            .unwrap();
        let result = mstl.fit(&values).unwrap();
        for i in 0..values.len() {
            assert!((result.reconstruct(i) - values[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_period_below_two() {
        assert!(MstlDecomposition::builder(vec![1, 12]).build().is_err());
    }

    #[test]
    fn rejects_empty_periods() {
        assert!(MstlDecomposition::builder(vec![]).build().is_err());
    }

    #[test]
    fn rejects_too_short_series() {
        let mstl = MstlDecomposition::builder(vec![12]).build().unwrap();
        assert!(mstl.fit(&[1.0, 2.0, 3.0]).is_err());
    }
}
