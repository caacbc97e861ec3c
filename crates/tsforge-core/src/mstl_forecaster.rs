//! Forecasts built on top of a fitted [`MstlDecomposition`]: the deseasonalized
//! level is projected forward with a configurable trend method, and each
//! seasonal component is projected by repeating its last observed cycle.

use tracing::warn;

use crate::auto_ets::{auto_ets, AutoEtsSpec};
use crate::error::Result;
use crate::mstl::{MstlDecomposition, MstlResult};
use crate::time_series::TimeSeriesBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendForecastMethod {
    None,
    Ses,
    Holt,
    Linear,
    AutoEts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonalForecastMethod {
    Cyclic,
    AutoEts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeseasonalizedForecastMethod {
    ExponentialSmoothing,
    Linear,
    AutoEts,
}

#[derive(Debug, Clone)]
pub struct MstlForecastConfig {
    pub trend_method: TrendForecastMethod,
    pub seasonal_method: SeasonalForecastMethod,
    pub deseasonalized_method: DeseasonalizedForecastMethod,
}

impl Default for MstlForecastConfig {
    fn default() -> Self {
        Self {
            trend_method: TrendForecastMethod::Linear,
            seasonal_method: SeasonalForecastMethod::Cyclic,
            deseasonalized_method: DeseasonalizedForecastMethod::ExponentialSmoothing,
        }
    }
}

pub struct MstlForecaster<'a> {
    decomposition: &'a MstlDecomposition,
    result: MstlResult,
    config: MstlForecastConfig,
}

impl<'a> MstlForecaster<'a> {
    pub fn new(
        decomposition: &'a MstlDecomposition,
        result: MstlResult,
        config: MstlForecastConfig,
    ) -> Self {
        Self {
            decomposition,
            result,
            config,
        }
    }

    pub fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let trend_plus_remainder = self.deseasonalized_series();

        let trend_forecast = match self.config.trend_method {
            TrendForecastMethod::None => vec![*trend_plus_remainder.last().unwrap(); horizon],
            TrendForecastMethod::Ses => forecast_ses(&trend_plus_remainder, horizon, 0.3),
            TrendForecastMethod::Holt => forecast_holt(&trend_plus_remainder, horizon),
            TrendForecastMethod::Linear => forecast_linear(&trend_plus_remainder, horizon),
            TrendForecastMethod::AutoEts => self.forecast_deseasonalized(horizon)?,
        };

        let mut seasonal_sum = vec![0.0; horizon];
        for (idx, &period) in self.decomposition.periods().iter().enumerate() {
            let component = &self.result.seasonal[idx];
            let projected = match self.config.seasonal_method {
                SeasonalForecastMethod::Cyclic => project_seasonal_cyclic(component, period, horizon),
                SeasonalForecastMethod::AutoEts => {
                    forecast_seasonal_auto_ets(component, period, horizon)
                        .unwrap_or_else(|_| project_seasonal_cyclic(component, period, horizon))
                }
            };
            for h in 0..horizon {
                seasonal_sum[h] += projected[h];
            }
        }

        Ok(trend_forecast
            .iter()
            .zip(&seasonal_sum)
            .map(|(t, s)| t + s)
            .collect())
    }

    /// The `DeseasonalizedForecastMethod` path: forecasts trend+remainder as
    /// a single series rather than decomposing trend and remainder further.
    fn forecast_deseasonalized(&self, horizon: usize) -> Result<Vec<f64>> {
        let deseasonalized = self.deseasonalized_series();
        match self.config.deseasonalized_method {
            DeseasonalizedForecastMethod::ExponentialSmoothing => {
                Ok(forecast_ses(&deseasonalized, horizon, 0.3))
            }
            DeseasonalizedForecastMethod::Linear => Ok(forecast_linear(&deseasonalized, horizon)),
            DeseasonalizedForecastMethod::AutoEts => {
                forecast_deseasonalized_auto_ets(&deseasonalized, horizon)
                    .or_else(|_| Ok(forecast_linear(&deseasonalized, horizon)))
            }
        }
    }

    fn deseasonalized_series(&self) -> Vec<f64> {
        let n = self.result.trend.len();
        (0..n)
            .map(|i| self.result.trend[i] + self.result.remainder[i])
            .collect()
    }
}

/// Repeats the last observed seasonal cycle, wrapping the phase index.
pub(crate) fn project_seasonal_cyclic(component: &[f64], period: usize, horizon: usize) -> Vec<f64> {
    let n = component.len();
    (0..horizon)
        .map(|h| {
            let phase = (n + h) % period;
            let last_cycle_start = n - period;
            component[last_cycle_start + phase]
        })
        .collect()
}

fn forecast_ses(values: &[f64], horizon: usize, alpha: f64) -> Vec<f64> {
    let mut level = values[0];
    for &y in &values[1..] {
        level += alpha * (y - level);
    }
    vec![level; horizon]
}

fn forecast_holt(values: &[f64], horizon: usize) -> Vec<f64> {
    const ALPHA: f64 = 0.3;
    const BETA: f64 = 0.1;
    let mut level = values[0];
    let mut trend = values.get(1).map_or(0.0, |v| v - values[0]);
    for &y in &values[1..] {
        let prev_level = level;
        level = ALPHA * y + (1.0 - ALPHA) * (level + trend);
        trend = BETA * (level - prev_level) + (1.0 - BETA) * trend;
    }
    (1..=horizon)
        .map(|h| level + h as f64 * trend)
        .collect()
}

/// Delegates to AutoETS on a synthetic trend-only series built from the
/// seasonal component, falling back to cyclic repetition when there is less
/// than two full cycles of history or any non-positive value under a
/// multiplicative family.
fn forecast_seasonal_auto_ets(component: &[f64], period: usize, horizon: usize) -> Result<Vec<f64>> {
    if component.len() < 2 * period {
        return Ok(project_seasonal_cyclic(component, period, horizon));
    }
    let series = TimeSeriesBuilder::new()
        .values(component.to_vec())
        .build()?;
    let spec = AutoEtsSpec::parse("ZNA", period)?;
    let (_, fit) = auto_ets(&spec, &series)?;
    fit.predict(horizon)
}

fn forecast_linear(values: &[f64], horizon: usize) -> Vec<f64> {
    let n = values.len();
    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    let slope = if den > 1e-12 { num / den } else { 0.0 };
    let intercept = mean_y - slope * mean_x;
    (0..horizon)
        .map(|h| intercept + slope * (n + h) as f64)
        .collect()
}

fn forecast_deseasonalized_auto_ets(values: &[f64], horizon: usize) -> Result<Vec<f64>> {
    let series = TimeSeriesBuilder::new().values(values.to_vec()).build()?;
    let spec = AutoEtsSpec::parse("ZZN", 1)?;
    match auto_ets(&spec, &series) {
        Ok((_, fit)) => fit.predict(horizon),
        Err(e) => {
            warn!(error = %e, "AutoETS deseasonalized forecast failed, falling back to linear");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_projection_repeats_last_cycle() {
        let component = vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let projected = project_seasonal_cyclic(&component, 3, 4);
        assert_eq!(projected, vec![1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn forecast_end_to_end_on_synthetic_series() {
        let n = 48;
        let values: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64;
                10.0 + 0.1 * t + 5.0 * ((t / 12.0) * std::f64::consts::TAU).sin()
            })
            .collect();
        let mstl = MstlDecomposition::builder(vec![12]).build().unwrap();
        let result = mstl.fit(&values).unwrap();
        let forecaster = MstlForecaster::new(&mstl, result, MstlForecastConfig::default());
        let forecast = forecaster.forecast(6).unwrap();
        assert_eq!(forecast.len(), 6);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }
}
