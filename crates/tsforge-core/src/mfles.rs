//! MFLES: gradient-boosted decomposition alternating a trend fit, per-period
//! Fourier seasonality, and an SES-smoothed level across rounds.

use anofox_regression::prelude::*;
use tracing::debug;

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMethod {
    Ols,
    SiegelRobust,
    Piecewise,
}

#[derive(Debug, Clone)]
pub struct MflesParams {
    pub seasonal_periods: Vec<usize>,
    pub max_rounds: usize,
    pub convergence_threshold: f64,
    pub lr_trend: f64,
    pub lr_season: f64,
    pub lr_rs: f64,
    /// Reserved: exogenous regressors are out of scope, field kept for
    /// config-surface parity with presets that set it.
    pub lr_exogenous: f64,
    pub multiplicative: Option<bool>,
    pub cov_threshold: f64,
    pub trend_method: TrendMethod,
    pub trend_penalty: bool,
    pub n_changepoints_pct: f64,
    pub fourier_order: Option<usize>,
    pub seasonality_weights: bool,
    /// `false` (default) fits the residual level via an ES ensemble scanning
    /// `[min_alpha, max_alpha]`; `true` uses a fixed moving average instead.
    pub smoother: bool,
    pub ma_window: usize,
    pub min_alpha: f64,
    pub max_alpha: f64,
    pub es_ensemble_steps: usize,
    pub cap_outliers: bool,
    pub outlier_sigma: f64,
    pub outlier_cap_start_round: usize,
    pub round_penalty: f64,
    /// Reserved: moving-median smoothing is not implemented, kept for
    /// config-surface parity.
    pub moving_medians: bool,
}

impl Default for MflesParams {
    fn default() -> Self {
        Self {
            seasonal_periods: vec![12],
            max_rounds: 50,
            convergence_threshold: 0.01,
            lr_trend: 0.9,
            lr_season: 0.9,
            lr_rs: 1.0,
            lr_exogenous: 1.0,
            multiplicative: None,
            cov_threshold: 0.7,
            trend_method: TrendMethod::Ols,
            trend_penalty: true,
            n_changepoints_pct: 0.25,
            fourier_order: None,
            seasonality_weights: false,
            smoother: false,
            ma_window: 5,
            min_alpha: 0.05,
            max_alpha: 1.0,
            es_ensemble_steps: 20,
            cap_outliers: true,
            outlier_sigma: 3.0,
            outlier_cap_start_round: 5,
            round_penalty: 0.0001,
            moving_medians: false,
        }
    }
}

impl MflesParams {
    pub fn fast_preset() -> Self {
        Self {
            max_rounds: 10,
            trend_method: TrendMethod::Ols,
            trend_penalty: false,
            es_ensemble_steps: 10,
            cap_outliers: false,
            ..Self::default()
        }
    }

    pub fn balanced_preset() -> Self {
        Self::default()
    }

    pub fn accurate_preset() -> Self {
        Self {
            max_rounds: 100,
            convergence_threshold: 0.001,
            trend_method: TrendMethod::Piecewise,
            trend_penalty: true,
            seasonality_weights: true,
            es_ensemble_steps: 30,
            cap_outliers: true,
            ..Self::default()
        }
    }

    pub fn robust_preset() -> Self {
        Self {
            trend_method: TrendMethod::SiegelRobust,
            seasonality_weights: true,
            cap_outliers: true,
            outlier_sigma: 2.5,
            outlier_cap_start_round: 2,
            ..Self::default()
        }
    }

    fn validate(&self, n: usize) -> Result<()> {
        if self.seasonal_periods.iter().any(|&p| p < 2) {
            return Err(ForecastError::InvalidInput(
                "MFLES seasonal periods must be >= 2".to_string(),
            ));
        }
        if n < 2 * self.seasonal_periods.iter().copied().max().unwrap_or(1) {
            return Err(ForecastError::InsufficientData {
                needed: 2 * self.seasonal_periods.iter().copied().max().unwrap_or(1),
                got: n,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MflesDecomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<Vec<f64>>,
    pub level: Vec<f64>,
    pub fitted: Vec<f64>,
    pub rounds_run: usize,
}

#[derive(Debug, Clone)]
pub struct FittedMfles {
    params: MflesParams,
    decomposition: MflesDecomposition,
    log_transformed: bool,
    last_trend_slope: f64,
    last_trend_value: f64,
    trend_penalty_factor: f64,
}

pub struct Mfles {
    params: MflesParams,
}

impl Mfles {
    pub fn new(params: MflesParams) -> Self {
        Self { params }
    }

    pub fn fit(&self, values: &[f64]) -> Result<FittedMfles> {
        self.params.validate(values.len())?;

        let log_transformed = self
            .params
            .multiplicative
            .unwrap_or_else(|| detect_multiplicative(values, self.params.cov_threshold));
        if log_transformed && values.iter().any(|&v| v <= 0.0) {
            return Err(ForecastError::InvalidInput(
                "multiplicative MFLES requires strictly positive observations".to_string(),
            ));
        }

        let working: Vec<f64> = if log_transformed {
            values.iter().map(|v| v.ln()).collect()
        } else {
            values.to_vec()
        };

        let n = working.len();
        let mut level = vec![0.0; n];
        let mut trend = vec![0.0; n];
        let mut seasonal = vec![vec![0.0; n]; self.params.seasonal_periods.len()];
        let mut residual = working.clone();

        let mut prev_sse = f64::INFINITY;
        let mut rounds_run = 0;
        let mut last_slope = 0.0;
        let mut last_trend_value = 0.0;
        let mut last_trend_r2 = 1.0;

        for round in 0..self.params.max_rounds {
            rounds_run = round + 1;

            if self.params.cap_outliers && round >= self.params.outlier_cap_start_round {
                residual = cap_outliers(&residual, self.params.outlier_sigma);
            }

            let (trend_component, slope) = fit_trend(
                &residual,
                self.params.trend_method,
                self.params.n_changepoints_pct,
            );
            if self.params.trend_penalty {
                last_trend_r2 = r_squared(&residual, &trend_component);
            }
            for i in 0..n {
                trend[i] += self.params.lr_trend * trend_component[i];
                residual[i] -= self.params.lr_trend * trend_component[i];
            }
            last_slope = slope;
            last_trend_value = trend[n - 1];

            for (idx, &period) in self.params.seasonal_periods.iter().enumerate() {
                let order = self
                    .params
                    .fourier_order
                    .unwrap_or_else(|| adaptive_fourier_order(period));
                let weights = if self.params.seasonality_weights {
                    Some(seasonality_weights(n))
                } else {
                    None
                };
                let season_component =
                    fit_fourier_season(&residual, period, order, weights.as_deref());
                for i in 0..n {
                    seasonal[idx][i] += self.params.lr_season * season_component[i];
                    residual[i] -= self.params.lr_season * season_component[i];
                }
            }

            let level_component = if self.params.smoother {
                moving_average_level(&residual, self.params.ma_window)
            } else {
                es_ensemble_level(
                    &residual,
                    self.params.min_alpha,
                    self.params.max_alpha,
                    self.params.es_ensemble_steps,
                )
            };
            for i in 0..n {
                level[i] += self.params.lr_rs * level_component[i];
                residual[i] -= self.params.lr_rs * level_component[i];
            }

            let sse: f64 = residual.iter().map(|r| r * r).sum();
            let penalty = self.params.round_penalty * round as f64;
            let improvement = (prev_sse - sse).abs() / prev_sse.max(1e-12);
            debug!(round, sse, improvement, "MFLES boosting round");
            if improvement < self.params.convergence_threshold + penalty && round > 0 {
                break;
            }
            prev_sse = sse;
        }

        let fitted: Vec<f64> = (0..n)
            .map(|i| trend[i] + seasonal.iter().map(|s| s[i]).sum::<f64>() + level[i])
            .collect();

        Ok(FittedMfles {
            params: self.params.clone(),
            decomposition: MflesDecomposition {
                trend,
                seasonal,
                level,
                fitted,
                rounds_run,
            },
            log_transformed,
            last_trend_slope: last_slope,
            last_trend_value,
            trend_penalty_factor: if self.params.trend_penalty {
                last_trend_r2
            } else {
                1.0
            },
        })
    }
}

impl FittedMfles {
    pub fn decomposition(&self) -> &MflesDecomposition {
        &self.decomposition
    }

    pub fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        let n = self.decomposition.trend.len();
        let mut out = Vec::with_capacity(horizon);
        let last_level = *self.decomposition.level.last().unwrap();

        for h in 1..=horizon {
            let trend_h = self.last_trend_value
                + self.last_trend_slope * self.trend_penalty_factor * h as f64;
            let seasonal_h: f64 = self
                .params
                .seasonal_periods
                .iter()
                .zip(&self.decomposition.seasonal)
                .map(|(&period, component)| {
                    let phase = (n + h - 1) % period;
                    let last_cycle_start = n - period;
                    component[last_cycle_start + phase]
                })
                .sum();
            let value = trend_h + seasonal_h + last_level;
            out.push(if self.log_transformed { value.exp() } else { value });
        }
        Ok(out)
    }
}

fn detect_multiplicative(values: &[f64], cov_threshold: f64) -> bool {
    if values.iter().any(|&v| v <= 0.0) {
        return false;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let cov = variance.sqrt() / mean.abs().max(1e-12);
    cov > cov_threshold
}

fn cap_outliers(values: &[f64], sigma: f64) -> Vec<f64> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt();
    let bound = sigma * std;
    values
        .iter()
        .map(|v| (v - mean).clamp(-bound, bound) + mean)
        .collect()
}

/// Returns `(trend component, slope at the final observation)`.
fn fit_trend(residual: &[f64], method: TrendMethod, n_changepoints_pct: f64) -> (Vec<f64>, f64) {
    match method {
        TrendMethod::Ols => ols_trend(residual),
        TrendMethod::SiegelRobust => siegel_trend(residual),
        // A single best-split piecewise-linear fit stands in for the
        // LASSO-selected multi-changepoint trend: tractable in closed form
        // while still letting the trend bend once.
        TrendMethod::Piecewise => piecewise_trend(residual, n_changepoints_pct),
    }
}

/// Coefficient of determination of `fitted` against `actual`, clamped to
/// `[0, 1]` so it can be used directly as an extrapolation damping factor.
fn r_squared(actual: &[f64], fitted: &[f64]) -> f64 {
    let n = actual.len();
    if n == 0 {
        return 1.0;
    }
    let mean = actual.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot < 1e-12 {
        return 1.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(fitted)
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

/// Linear ramp from 0.5 to 1.5 across the series, giving later observations
/// more weight when fitting the seasonal component.
fn seasonality_weights(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|t| 0.5 + t as f64 / (n - 1) as f64)
        .collect()
}

fn ols_trend(values: &[f64]) -> (Vec<f64>, f64) {
    let n = values.len();
    let x_mat = faer::Mat::from_fn(n, 1, |i, _| i as f64);
    let y_col = faer::Col::from_fn(n, |i| values[i]);

    let fitted = match OlsRegressor::builder()
        .with_intercept(true)
        .build()
        .fit(&x_mat, &y_col)
    {
        Ok(f) => f,
        Err(_) => {
            let mean = values.iter().sum::<f64>() / n as f64;
            return (vec![mean; n], 0.0);
        }
    };
    let intercept = fitted.intercept().unwrap_or(0.0);
    let slope = fitted.coefficients()[0];
    let trend = (0..n).map(|i| intercept + slope * i as f64).collect();
    (trend, slope)
}

/// Siegel repeated-median slope: median over all pairwise slopes through
/// each point, robust to outliers without a full regression solve.
fn siegel_trend(values: &[f64]) -> (Vec<f64>, f64) {
    let n = values.len();
    if n < 2 {
        return (values.to_vec(), 0.0);
    }
    let mut point_medians = Vec::with_capacity(n);
    for i in 0..n {
        let mut slopes = Vec::with_capacity(n - 1);
        for j in 0..n {
            if i != j {
                slopes.push((values[j] - values[i]) / (j as f64 - i as f64));
            }
        }
        slopes.sort_by(|a, b| a.partial_cmp(b).unwrap());
        point_medians.push(slopes[slopes.len() / 2]);
    }
    point_medians.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let slope = point_medians[point_medians.len() / 2];
    let intercepts: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, &y)| y - slope * i as f64)
        .collect();
    let mut sorted_intercepts = intercepts.clone();
    sorted_intercepts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let intercept = sorted_intercepts[sorted_intercepts.len() / 2];
    let trend = (0..n).map(|i| intercept + slope * i as f64).collect();
    (trend, slope)
}

fn piecewise_trend(values: &[f64], n_changepoints_pct: f64) -> (Vec<f64>, f64) {
    let n = values.len();
    if n < 6 {
        return ols_trend(values);
    }
    // Candidate changepoints are restricted to the central `n_changepoints_pct`
    // span of the series; a wider fraction searches more split points.
    let margin = (((1.0 - n_changepoints_pct).max(0.0) / 2.0) * n as f64) as usize;
    let min_segment = margin.max(2);
    if n <= 2 * min_segment {
        return ols_trend(values);
    }
    let mut best_sse = f64::INFINITY;
    let mut best: Option<(Vec<f64>, f64)> = None;

    for split in min_segment..(n - min_segment) {
        let (left, _) = ols_trend(&values[..split]);
        let (right_raw, right_slope) = ols_trend(&values[split..]);
        let offset = left[split - 1] - right_raw[0];
        let right: Vec<f64> = right_raw.iter().map(|v| v + offset).collect();
        let mut combined = left;
        combined.extend(right);
        let sse: f64 = combined
            .iter()
            .zip(values)
            .map(|(f, v)| (f - v).powi(2))
            .sum();
        if sse < best_sse {
            best_sse = sse;
            best = Some((combined, right_slope));
        }
    }
    best.unwrap_or_else(|| ols_trend(values))
}

fn adaptive_fourier_order(period: usize) -> usize {
    (period / 4).clamp(1, 10)
}

fn fit_fourier_season(
    residual: &[f64],
    period: usize,
    order: usize,
    weights: Option<&[f64]>,
) -> Vec<f64> {
    let n = residual.len();
    let k = (2 * order).min(n.saturating_sub(1)).max(1);
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(k);
    for h in 1..=order {
        let freq = std::f64::consts::TAU * h as f64 / period as f64;
        basis.push((0..n).map(|t| (freq * t as f64).sin()).collect());
        basis.push((0..n).map(|t| (freq * t as f64).cos()).collect());
    }
    basis.truncate(k);

    // (Weighted) least squares via normal equations on the small Fourier basis.
    let w = |t: usize| weights.map(|w| w[t]).unwrap_or(1.0);
    let p = basis.len();
    let mut ata = vec![vec![0.0; p]; p];
    let mut atb = vec![0.0; p];
    for a in 0..p {
        for b in 0..p {
            ata[a][b] = (0..n).map(|t| w(t) * basis[a][t] * basis[b][t]).sum();
        }
        atb[a] = (0..n).map(|t| w(t) * basis[a][t] * residual[t]).sum();
    }
    let coeffs = solve_linear_system(&ata, &atb);

    (0..n)
        .map(|t| (0..p).map(|a| coeffs[a] * basis[a][t]).sum())
        .collect()
}

/// Gaussian elimination with partial pivoting; the basis dimension is small
/// (at most `2 * outlier_cap` harmonics) so this stays well within budget.
fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut m: Vec<Vec<f64>> = a.iter().cloned().collect();
    let mut rhs = b.to_vec();

    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        if m[col][col].abs() < 1e-12 {
            continue;
        }
        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            for c in col..n {
                m[row][c] -= factor * m[col][c];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = rhs[row];
        for c in (row + 1)..n {
            sum -= m[row][c] * x[c];
        }
        x[row] = if m[row][row].abs() > 1e-12 {
            sum / m[row][row]
        } else {
            0.0
        };
    }
    x
}

fn moving_average_level(residual: &[f64], ma_window: usize) -> Vec<f64> {
    let n = residual.len();
    let half = ma_window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            residual[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}

/// Scans `steps` smoothing parameters evenly spaced over `[min_alpha,
/// max_alpha]`, runs single-exponential smoothing with each, and averages
/// the resulting level paths.
fn es_ensemble_level(residual: &[f64], min_alpha: f64, max_alpha: f64, steps: usize) -> Vec<f64> {
    let n = residual.len();
    if n == 0 {
        return Vec::new();
    }
    let steps = steps.max(1);
    let mut sum = vec![0.0; n];
    for i in 0..steps {
        let alpha = if steps == 1 {
            min_alpha
        } else {
            min_alpha + (max_alpha - min_alpha) * i as f64 / (steps - 1) as f64
        };
        let init_window = 5.min(n);
        let mut level = residual[..init_window].iter().sum::<f64>() / init_window as f64;
        for t in 0..n {
            sum[t] += level;
            level = alpha * residual[t] + (1.0 - alpha) * level;
        }
    }
    sum.iter().map(|v| v / steps as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                50.0 + 0.2 * t + 6.0 * ((t / 12.0) * std::f64::consts::TAU).sin()
            })
            .collect()
    }

    #[test]
    fn fits_and_forecasts_additive_series() {
        let values = series(60);
        let model = Mfles::new(MflesParams::balanced_preset());
        let fit = model.fit(&values).unwrap();
        assert_eq!(fit.decomposition().fitted.len(), values.len());
        let forecast = fit.predict(12).unwrap();
        assert_eq!(forecast.len(), 12);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_period_below_two() {
        let params = MflesParams {
            seasonal_periods: vec![1],
            ..MflesParams::default()
        };
        let model = Mfles::new(params);
        assert!(model.fit(&series(30)).is_err());
    }

    #[test]
    fn multiplicative_detection_rejects_non_positive_data() {
        let mut values = series(40);
        values[5] = -1.0;
        let params = MflesParams {
            multiplicative: Some(true),
            ..MflesParams::default()
        };
        let model = Mfles::new(params);
        assert!(model.fit(&values).is_err());
    }

    #[test]
    fn presets_construct_without_panicking() {
        let _ = MflesParams::fast_preset();
        let _ = MflesParams::balanced_preset();
        let _ = MflesParams::accurate_preset();
        let _ = MflesParams::robust_preset();
    }

    #[test]
    fn moving_average_smoother_is_an_alternative_to_es_ensemble() {
        let values = series(60);
        let ensemble = Mfles::new(MflesParams::balanced_preset())
            .fit(&values)
            .unwrap();
        let params = MflesParams {
            smoother: true,
            ..MflesParams::balanced_preset()
        };
        let smoothed = Mfles::new(params).fit(&values).unwrap();
        assert_eq!(
            ensemble.decomposition().level.len(),
            smoothed.decomposition().level.len()
        );
        assert!(smoothed
            .decomposition()
            .level
            .iter()
            .all(|v| v.is_finite()));
    }

    #[test]
    fn es_ensemble_level_averages_toward_the_series_mean() {
        let residual = vec![1.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0, 2.0];
        let level = es_ensemble_level(&residual, 0.05, 1.0, 20);
        assert_eq!(level.len(), residual.len());
        assert!(level.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn r_squared_is_one_for_a_perfect_fit() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        assert!((r_squared(&actual, &actual) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn seasonality_weights_ramp_from_half_to_one_and_a_half() {
        let w = seasonality_weights(11);
        assert!((w[0] - 0.5).abs() < 1e-9);
        assert!((w[10] - 1.5).abs() < 1e-9);
    }
}
