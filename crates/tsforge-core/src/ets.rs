//! ETS (Error, Trend, Season) state-space exponential smoothing.
//!
//! Ported from the statsforecast-derived recursion: growth/deseasonalisation/
//! update/forecast follow the same four-step shape, with `s[0]` always the
//! most recently updated seasonal slot and `s[m-1]` the active one.

use anofox_regression::prelude::*;
use tracing::debug;

use crate::error::{ForecastError, Result};
use crate::time_series::TimeSeries;

const ETS_TOL: f64 = 1e-10;
const ETS_HUGE_N: f64 = 1e10;
const LEVEL_FLOOR: f64 = 1e-6;
const TREND_MULT_MIN: f64 = 0.01;
const TREND_MULT_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Additive,
    Multiplicative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendType {
    None,
    Additive,
    Multiplicative,
    DampedAdditive,
    DampedMultiplicative,
}

impl TrendType {
    pub fn is_none(self) -> bool {
        matches!(self, TrendType::None)
    }

    pub fn is_additive(self) -> bool {
        matches!(self, TrendType::Additive | TrendType::DampedAdditive)
    }

    pub fn is_damped(self) -> bool {
        matches!(
            self,
            TrendType::DampedAdditive | TrendType::DampedMultiplicative
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonType {
    None,
    Additive,
    Multiplicative,
}

impl SeasonType {
    pub fn is_none(self) -> bool {
        matches!(self, SeasonType::None)
    }

    pub fn is_additive(self) -> bool {
        matches!(self, SeasonType::Additive)
    }
}

/// A rotating seasonal buffer: `active()` is the currently-in-effect slot
/// (`s[m-1]`); `rotate_with` inserts the newly fitted slot at `s[0]` and
/// shifts everything else up by one.
#[derive(Debug, Clone)]
pub struct SeasonalBuffer {
    slots: Vec<f64>,
}

impl SeasonalBuffer {
    pub fn new(slots: Vec<f64>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active(&self) -> f64 {
        self.slots[self.slots.len() - 1]
    }

    pub fn at(&self, phase: usize) -> f64 {
        self.slots[phase]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.slots
    }

    pub fn rotate_with(&mut self, new_value: f64) {
        let m = self.slots.len();
        for i in (1..m).rev() {
            self.slots[i] = self.slots[i - 1];
        }
        self.slots[0] = new_value;
    }
}

/// Model family + smoothing parameters.
#[derive(Debug, Clone)]
pub struct EtsConfig {
    pub error: ErrorType,
    pub trend: TrendType,
    pub season: SeasonType,
    pub season_length: usize,
    pub alpha: f64,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub phi: Option<f64>,
}

impl EtsConfig {
    pub fn has_trend(&self) -> bool {
        !self.trend.is_none()
    }

    pub fn has_season(&self) -> bool {
        !self.season.is_none()
    }

    pub fn is_damped(&self) -> bool {
        self.trend.is_damped()
    }

    pub fn phi(&self) -> f64 {
        self.phi.unwrap_or(1.0)
    }

    /// Number of free state dimensions: level + [trend] + [season]*m.
    pub fn state_dimension(&self) -> usize {
        1 + usize::from(self.has_trend()) + usize::from(self.has_season()) * self.season_length
    }

    /// Number of free smoothing parameters: alpha + [beta] + [phi if damped+trend] + [gamma].
    pub fn smoothing_dimension(&self) -> usize {
        1 + usize::from(self.has_trend())
            + usize::from(self.is_damped() && self.has_trend())
            + usize::from(self.has_season())
    }

    pub fn parameter_count(&self) -> usize {
        self.state_dimension() + self.smoothing_dimension()
    }

    /// Validates the structural invariants of the configuration.
    ///
    /// Rejects multiplicative error paired with additive seasonality: the
    /// combination is numerically admissible but produces negative variance
    /// contributions that destabilize the likelihood.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) || self.alpha == 0.0 {
            return Err(ForecastError::InvalidInput(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if self.has_trend() {
            let beta = self.beta.ok_or_else(|| {
                ForecastError::InvalidInput("beta is required when trend is set".to_string())
            })?;
            if !(0.0..=1.0).contains(&beta) || beta == 0.0 {
                return Err(ForecastError::InvalidInput(format!(
                    "beta must be in (0, 1], got {beta}"
                )));
            }
        }
        if self.has_season() {
            if self.season_length < 2 {
                return Err(ForecastError::InvalidInput(
                    "season_length must be >= 2 when season is set".to_string(),
                ));
            }
            let gamma = self.gamma.ok_or_else(|| {
                ForecastError::InvalidInput("gamma is required when season is set".to_string())
            })?;
            if !(0.0..=1.0).contains(&gamma) || gamma == 0.0 {
                return Err(ForecastError::InvalidInput(format!(
                    "gamma must be in (0, 1], got {gamma}"
                )));
            }
        }
        if self.is_damped() {
            let phi = self.phi.ok_or_else(|| {
                ForecastError::InvalidInput("phi is required for a damped trend".to_string())
            })?;
            if !(0.80..=0.98).contains(&phi) {
                return Err(ForecastError::InvalidInput(format!(
                    "phi must be in [0.80, 0.98] when damped, got {phi}"
                )));
            }
            if self.has_season() {
                let gamma = self.gamma.unwrap();
                let lower = (1.0 - 1.0 / phi - self.alpha).max(0.0);
                let upper = 1.0 + 1.0 / phi - self.alpha;
                if gamma < lower || gamma > upper {
                    return Err(ForecastError::InvalidInput(format!(
                        "gamma={gamma} violates admissibility [{lower}, {upper}] for alpha={}, phi={phi}",
                        self.alpha
                    )));
                }
            }
        }
        if self.error == ErrorType::Multiplicative && self.season.is_additive() {
            return Err(ForecastError::InvalidInput(
                "multiplicative error with additive season is not an admissible ETS family"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// One step of the recursion, starting from the pre-update state.
struct StepOutput {
    new_level: f64,
    new_trend: f64,
    new_seasonal: f64,
    fitted: f64,
}

fn one_step(config: &EtsConfig, level: f64, trend: f64, seasonal_active: f64, y: f64) -> StepOutput {
    let alpha = config.alpha;
    let beta = config.beta.unwrap_or(0.0);
    let gamma = config.gamma.unwrap_or(0.0);
    let phi = config.phi();

    let (phi_b, growth_l) = if !config.has_trend() {
        (0.0, level)
    } else if config.trend.is_additive() {
        let phi_b = phi * trend;
        (phi_b, level + phi_b)
    } else if (phi - 1.0).abs() < ETS_TOL {
        (trend, level * trend)
    } else {
        let phi_b = trend.powf(phi);
        (phi_b, level * phi_b)
    };
    let q = growth_l;

    let p = if !config.has_season() {
        y
    } else if config.season == SeasonType::Additive {
        y - seasonal_active
    } else if seasonal_active.abs() < ETS_TOL {
        ETS_HUGE_N
    } else {
        y / seasonal_active
    };

    let mut new_level = q + alpha * (p - q);
    if config.error == ErrorType::Multiplicative || config.trend == TrendType::Multiplicative {
        new_level = new_level.max(LEVEL_FLOOR);
    }

    let new_trend = if !config.has_trend() {
        trend
    } else {
        let r = if config.trend.is_additive() {
            new_level - level
        } else if level.abs() < ETS_TOL {
            ETS_HUGE_N
        } else {
            new_level / level
        };
        let mut nb = phi_b + (beta / alpha) * (r - phi_b);
        if !config.trend.is_additive() {
            nb = nb.clamp(TREND_MULT_MIN, TREND_MULT_MAX);
        }
        nb
    };

    let new_seasonal = if config.has_season() {
        let t = if config.season == SeasonType::Additive {
            y - q
        } else if q.abs() < ETS_TOL {
            ETS_HUGE_N
        } else {
            y / q
        };
        seasonal_active + gamma * (t - seasonal_active)
    } else {
        seasonal_active
    };

    let fitted = if !config.has_season() {
        q
    } else if config.season == SeasonType::Additive {
        q + seasonal_active
    } else {
        q * seasonal_active
    };

    StepOutput {
        new_level,
        new_trend,
        new_seasonal,
        fitted,
    }
}

/// Diagnostics produced by a completed fit.
#[derive(Debug, Clone)]
pub struct FitDiagnostics {
    pub log_likelihood: f64,
    pub sse: f64,
    pub innovation_sse: f64,
    pub mse: f64,
    pub sum_log_fitted: f64,
}

/// Unfitted ETS model: configuration only.
#[derive(Debug, Clone)]
pub struct Ets {
    config: EtsConfig,
}

impl Ets {
    pub fn new(config: EtsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EtsConfig {
        &self.config
    }

    pub fn fit(&self, series: &TimeSeries) -> Result<FittedEts> {
        let min_n = if self.config.has_season() { 4 } else { 2 };
        if series.len() < min_n {
            return Err(ForecastError::InsufficientData {
                needed: min_n,
                got: series.len(),
            });
        }
        if requires_positivity(&self.config) && !series.is_strictly_positive() {
            return Err(ForecastError::InvalidInput(
                "multiplicative ETS components require strictly positive observations"
                    .to_string(),
            ));
        }
        let (level0, trend0, seasonal0) = initstate(&self.config, series.values())?;
        self.fit_with_initial_state(series, level0, trend0, seasonal0)
    }

    /// Single seed-controlling entry point: AutoETS injects a recovered
    /// initial state here instead of overloading `fit`.
    pub fn fit_with_initial_state(
        &self,
        series: &TimeSeries,
        level0: f64,
        trend0: f64,
        seasonal0: Vec<f64>,
    ) -> Result<FittedEts> {
        let values = series.values();
        let n = values.len();
        let m = self.config.season_length.max(1);

        let mut level = level0;
        let mut trend = trend0;
        let mut seasonal = if self.config.has_season() {
            SeasonalBuffer::new(seasonal0)
        } else {
            SeasonalBuffer::new(vec![0.0; m.max(1)])
        };

        let mut fitted = Vec::with_capacity(n);
        let mut residuals = Vec::with_capacity(n);
        let mut sse = 0.0;
        let mut innovation_sse = 0.0;
        let mut sum_log_fitted = 0.0;

        for &y in values {
            let active = if self.config.has_season() {
                seasonal.active()
            } else {
                0.0
            };
            let step = one_step(&self.config, level, trend, active, y);

            let residual = y - step.fitted;
            let innovation = if self.config.error == ErrorType::Multiplicative {
                if step.fitted.abs() < ETS_TOL {
                    ETS_HUGE_N
                } else {
                    y / step.fitted - 1.0
                }
            } else {
                residual
            };

            fitted.push(step.fitted);
            residuals.push(residual);
            sse += residual * residual;
            innovation_sse += innovation * innovation;
            if self.config.error == ErrorType::Multiplicative {
                sum_log_fitted += step.fitted.abs().max(ETS_TOL).ln();
            }

            level = step.new_level;
            trend = step.new_trend;
            if self.config.has_season() {
                seasonal.rotate_with(step.new_seasonal);
            }
        }

        let mse = sse / n as f64;
        let log_likelihood = if self.config.error == ErrorType::Multiplicative {
            -0.5 * (n as f64 * innovation_sse.max(f64::MIN_POSITIVE).ln() + 2.0 * sum_log_fitted)
        } else {
            -0.5 * n as f64 * innovation_sse.max(f64::MIN_POSITIVE).ln()
        };

        debug!(n, mse, log_likelihood, "ETS fit complete");

        Ok(FittedEts {
            config: self.config.clone(),
            level,
            trend,
            seasonal,
            fitted,
            residuals,
            n,
            diagnostics: FitDiagnostics {
                log_likelihood,
                sse,
                innovation_sse,
                mse,
                sum_log_fitted,
            },
        })
    }
}

fn requires_positivity(config: &EtsConfig) -> bool {
    config.error == ErrorType::Multiplicative
        || matches!(
            config.trend,
            TrendType::Multiplicative | TrendType::DampedMultiplicative
        )
        || config.season == SeasonType::Multiplicative
}

/// Mean of the first `min(10, n)` observations.
fn simple_level(values: &[f64]) -> f64 {
    let k = values.len().min(10);
    values[..k].iter().sum::<f64>() / k as f64
}

/// OLS intercept/slope of `values` against a plain time index, via
/// `anofox_regression::OlsRegressor`.
fn ols_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    let x_mat = faer::Mat::from_fn(n, 1, |i, _| i as f64);
    let y_col = faer::Col::from_fn(n, |i| values[i]);

    let fitted = match OlsRegressor::builder()
        .with_intercept(true)
        .build()
        .fit(&x_mat, &y_col)
    {
        Ok(f) => f,
        Err(_) => return (values.iter().sum::<f64>() / n as f64, 0.0),
    };

    let intercept = fitted.intercept().unwrap_or(0.0);
    let slope = fitted.coefficients()[0];
    (intercept, slope)
}

fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    let mut out = vec![f64::NAN; n];
    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(n);
        if end - start == window || (window % 2 == 1 && i >= half && i + half < n) {
            out[i] = values[start..end].iter().sum::<f64>() / (end - start) as f64;
        }
    }
    out
}

/// Seeds the initial level, trend, and seasonal components from a
/// decomposition of the first few cycles of `values`.
fn initstate(config: &EtsConfig, values: &[f64]) -> Result<(f64, f64, Vec<f64>)> {
    let n = values.len();
    let m = config.season_length;

    if !config.has_season() {
        if !config.has_trend() {
            return Ok((simple_level(values), 0.0, vec![]));
        }
        let k = n.min(10.max(2 * m));
        let (intercept, slope) = ols_fit(&values[..k]);
        let trend0 = if config.trend.is_additive() {
            slope
        } else {
            let ratio = 1.0 + slope / intercept.abs().max(ETS_TOL);
            ratio.clamp(TREND_MULT_MIN, TREND_MULT_MAX)
        };
        return Ok((intercept, trend0, vec![]));
    }

    if n < 3 * m {
        // Simple per-phase averages.
        let mut sums = vec![0.0; m];
        let mut counts = vec![0usize; m];
        for (i, &y) in values.iter().enumerate() {
            sums[i % m] += y;
            counts[i % m] += 1;
        }
        let means: Vec<f64> = sums
            .iter()
            .zip(counts.iter())
            .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
            .collect();
        let overall = values.iter().sum::<f64>() / n as f64;
        let seasonal = normalise_seasonal(config, &means, overall);
        let level0 = overall;
        let trend0 = if config.has_trend() { 0.0 } else { 0.0 };
        return Ok((level0, trend0, to_active_last(seasonal)));
    }

    // n >= 3m: centered moving average extracts a trend proxy.
    let window = if m % 2 == 0 { m + 1 } else { m };
    let trend_proxy = centered_moving_average(values, window);
    let mut phase_sums = vec![0.0; m];
    let mut phase_counts = vec![0usize; m];
    for (i, &y) in values.iter().enumerate() {
        let detrended = if trend_proxy[i].is_finite() {
            if config.season == SeasonType::Additive {
                y - trend_proxy[i]
            } else {
                y / trend_proxy[i].max(ETS_TOL)
            }
        } else {
            continue;
        };
        phase_sums[i % m] += detrended;
        phase_counts[i % m] += 1;
    }
    let phase_means: Vec<f64> = phase_sums
        .iter()
        .zip(phase_counts.iter())
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect();
    let overall = values.iter().sum::<f64>() / n as f64;
    let seasonal = normalise_seasonal(config, &phase_means, overall);

    let k = n.min(10.max(2 * m));
    let seasonally_adjusted: Vec<f64> = values[..k]
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            let s = seasonal[i % m];
            if config.season == SeasonType::Additive {
                y - s
            } else {
                y / s.max(ETS_TOL)
            }
        })
        .collect();
    let (intercept, slope) = ols_fit(&seasonally_adjusted);
    let trend0 = if !config.has_trend() {
        0.0
    } else if config.trend.is_additive() {
        slope
    } else {
        let ratio = 1.0 + slope / intercept.abs().max(ETS_TOL);
        ratio.clamp(TREND_MULT_MIN, TREND_MULT_MAX)
    };

    Ok((intercept, trend0, to_active_last(seasonal)))
}

fn normalise_seasonal(config: &EtsConfig, phase_means: &[f64], overall: f64) -> Vec<f64> {
    if config.season == SeasonType::Additive {
        let mean = phase_means.iter().sum::<f64>() / phase_means.len() as f64;
        phase_means.iter().map(|v| v - mean).collect()
    } else {
        let base = if overall.abs() > ETS_TOL { overall } else { 1.0 };
        let ratios: Vec<f64> = phase_means.iter().map(|v| (v / base).max(0.01)).collect();
        let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
        ratios
            .iter()
            .map(|v| (v / mean.max(ETS_TOL)).max(0.01))
            .collect()
    }
}

/// `initstate` yields phase-indexed seasonal means (phase 0 = first
/// observation); the recursion expects `s_old[m-1]` to be the slot that is
/// about to be used, so the buffer is built with the last phase at index
/// `m-1` going backwards: slot `j` holds phase `(m-1-j) mod m`.
fn to_active_last(phase_means: Vec<f64>) -> Vec<f64> {
    let m = phase_means.len();
    (0..m).map(|j| phase_means[(m - 1 - j) % m]).collect()
}

/// Fitted ETS model: state is read-only, only `predict`/accessors are available.
#[derive(Debug, Clone)]
pub struct FittedEts {
    config: EtsConfig,
    level: f64,
    trend: f64,
    seasonal: SeasonalBuffer,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    n: usize,
    diagnostics: FitDiagnostics,
}

impl FittedEts {
    pub fn config(&self) -> &EtsConfig {
        &self.config
    }

    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn diagnostics(&self) -> &FitDiagnostics {
        &self.diagnostics
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn seasonal(&self) -> &SeasonalBuffer {
        &self.seasonal
    }

    pub fn aic(&self) -> f64 {
        -2.0 * self.diagnostics.log_likelihood + 2.0 * self.config.parameter_count() as f64
    }

    pub fn aicc(&self) -> f64 {
        let k = self.config.parameter_count() as f64;
        let n = self.n as f64;
        let aic = self.aic();
        if n - k - 1.0 > 0.0 {
            aic + (2.0 * k * (k + 1.0)) / (n - k - 1.0)
        } else {
            f64::INFINITY
        }
    }

    pub fn bic(&self) -> f64 {
        -2.0 * self.diagnostics.log_likelihood
            + self.config.parameter_count() as f64 * (self.n as f64).ln()
    }

    pub fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        if horizon == 0 {
            return Ok(vec![]);
        }
        let m = self.config.season_length.max(1);
        let phi = self.config.phi();
        let mut phistar = phi;
        let mut out = Vec::with_capacity(horizon);

        for i in 0..horizon {
            let mut value = if !self.config.has_trend() {
                self.level
            } else if self.config.trend.is_additive() {
                self.level + phistar * self.trend
            } else if self.trend < 0.0 {
                f64::NAN
            } else {
                self.level * self.trend.powf(phistar)
            };

            if self.config.has_season() {
                let mut j = m as isize - 1 - i as isize;
                while j < 0 {
                    j += m as isize;
                }
                let s = self.seasonal.at(j as usize % m);
                value = if self.config.season == SeasonType::Additive {
                    value + s
                } else {
                    value * s
                };
            }
            out.push(value);

            if i + 1 < horizon && self.config.has_trend() {
                if (phi - 1.0).abs() < ETS_TOL {
                    phistar += 1.0;
                } else {
                    phistar += phi.powi(i as i32 + 1);
                }
            }
        }
        Ok(out)
    }

    pub fn predict_with_confidence(
        &self,
        horizon: usize,
        level: f64,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        let point = self.predict(horizon)?;
        if self.residuals.len() < 2 {
            return Ok((point.clone(), point.clone(), point));
        }
        let mean = self.residuals.iter().sum::<f64>() / self.residuals.len() as f64;
        let variance = self
            .residuals
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (self.residuals.len() - 1) as f64;
        let sigma = variance.sqrt();
        let z = gaussian_quantile(level);

        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, &p) in point.iter().enumerate() {
            let spread = z * sigma * ((h + 1) as f64).sqrt();
            lower.push(p - spread);
            upper.push(p + spread);
        }
        Ok((point, lower, upper))
    }
}

/// Gaussian two-sided quantile for common confidence levels, falling back to
/// a normal-distribution inverse CDF from `statrs` for anything else.
pub(crate) fn gaussian_quantile(level: f64) -> f64 {
    use statrs::distribution::{ContinuousCDF, Normal};
    let alpha = (1.0 - level) / 2.0;
    let normal = Normal::new(0.0, 1.0).expect("standard normal is always valid");
    normal.inverse_cdf(1.0 - alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_series::TimeSeriesBuilder;
    use approx::assert_relative_eq;

    fn air_passengers_36() -> Vec<f64> {
        vec![
            112.0, 118.0, 132.0, 129.0, 121.0, 135.0, 148.0, 148.0, 136.0, 119.0, 104.0, 118.0,
            115.0, 126.0, 141.0, 135.0, 125.0, 149.0, 170.0, 170.0, 158.0, 133.0, 114.0, 140.0,
            145.0, 150.0, 178.0, 163.0, 172.0, 178.0, 199.0, 199.0, 184.0, 162.0, 146.0, 166.0,
        ]
    }

    #[test]
    fn additive_seasonal_ets_fits_and_forecasts() {
        let values = air_passengers_36();
        let series = TimeSeriesBuilder::new().values(values).build().unwrap();
        let config = EtsConfig {
            error: ErrorType::Additive,
            trend: TrendType::None,
            season: SeasonType::Additive,
            season_length: 12,
            alpha: 0.2,
            beta: None,
            gamma: Some(0.1),
            phi: None,
        };
        let model = Ets::new(config).unwrap();
        let fit = model.fit(&series).unwrap();
        assert_eq!(fit.fitted_values().len(), series.len());
        assert_eq!(fit.residuals().len(), series.len());
        assert!(fit.diagnostics().log_likelihood.is_finite());

        let forecast = fit.predict(12).unwrap();
        assert_eq!(forecast.len(), 12);
        let mean_forecast = forecast.iter().sum::<f64>() / 12.0;
        let next_12 = [
            171.0, 180.0, 193.0, 181.0, 183.0, 218.0, 230.0, 242.0, 209.0, 191.0, 172.0, 194.0,
        ];
        let mean_actual = next_12.iter().sum::<f64>() / 12.0;
        assert!((mean_forecast - mean_actual).abs() / mean_actual < 0.10);
    }

    #[test]
    fn predict_zero_horizon_is_empty() {
        let series = TimeSeriesBuilder::new()
            .values(vec![1.0, 2.0, 3.0, 4.0])
            .build()
            .unwrap();
        let config = EtsConfig {
            error: ErrorType::Additive,
            trend: TrendType::None,
            season: SeasonType::None,
            season_length: 1,
            alpha: 0.5,
            beta: None,
            gamma: None,
            phi: None,
        };
        let fit = Ets::new(config).unwrap().fit(&series).unwrap();
        assert!(fit.predict(0).unwrap().is_empty());
        assert_eq!(fit.predict(3).unwrap().len(), 3);
    }

    #[test]
    fn rejects_invalid_alpha() {
        let config = EtsConfig {
            error: ErrorType::Additive,
            trend: TrendType::None,
            season: SeasonType::None,
            season_length: 1,
            alpha: 1.5,
            beta: None,
            gamma: None,
            phi: None,
        };
        assert!(Ets::new(config).is_err());
    }

    #[test]
    fn constant_series_gives_zero_residuals() {
        let series = TimeSeriesBuilder::new()
            .values(vec![5.0; 20])
            .build()
            .unwrap();
        let config = EtsConfig {
            error: ErrorType::Additive,
            trend: TrendType::None,
            season: SeasonType::None,
            season_length: 1,
            alpha: 0.3,
            beta: None,
            gamma: None,
            phi: None,
        };
        let fit = Ets::new(config).unwrap().fit(&series).unwrap();
        for r in fit.residuals().iter().skip(1) {
            assert_relative_eq!(*r, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn admissibility_rejects_out_of_range_gamma() {
        let config = EtsConfig {
            error: ErrorType::Additive,
            trend: TrendType::DampedAdditive,
            season: SeasonType::Additive,
            season_length: 4,
            alpha: 0.5,
            beta: Some(0.1),
            gamma: Some(0.99),
            phi: Some(0.9),
        };
        assert!(Ets::new(config).is_err());
    }
}
