//! Capability-contract traits shared by every fitted model, replacing the
//! virtual-inheritance/dynamic-cast polymorphism of the original design with
//! plain object-safe trait dispatch.

use crate::error::Result;
use crate::time_series::TimeSeries;

/// Implemented by unfitted model configurations.
pub trait Forecaster {
    type Fitted: FittedForecaster;

    fn fit(&self, series: &TimeSeries) -> Result<Self::Fitted>;
}

/// Implemented by fitted models; `predict` never needs a "was this actually
/// fitted?" runtime check because the type itself only exists post-fit.
pub trait FittedForecaster {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>>;

    fn fitted_values(&self) -> &[f64];

    fn residuals(&self) -> &[f64];
}

impl Forecaster for crate::ets::Ets {
    type Fitted = crate::ets::FittedEts;

    fn fit(&self, series: &TimeSeries) -> Result<Self::Fitted> {
        crate::ets::Ets::fit(self, series)
    }
}

impl FittedForecaster for crate::ets::FittedEts {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        crate::ets::FittedEts::predict(self, horizon)
    }

    fn fitted_values(&self) -> &[f64] {
        crate::ets::FittedEts::fitted_values(self)
    }

    fn residuals(&self) -> &[f64] {
        crate::ets::FittedEts::residuals(self)
    }
}

impl Forecaster for crate::mfles::Mfles {
    type Fitted = crate::mfles::FittedMfles;

    fn fit(&self, series: &TimeSeries) -> Result<Self::Fitted> {
        crate::mfles::Mfles::fit(self, series.values())
    }
}

impl FittedForecaster for crate::mfles::FittedMfles {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        crate::mfles::FittedMfles::predict(self, horizon)
    }

    fn fitted_values(&self) -> &[f64] {
        &self.decomposition().fitted
    }

    fn residuals(&self) -> &[f64] {
        // MFLES does not retain residuals separately from its fitted
        // decomposition; callers needing residuals compute
        // `observed - fitted_values()` themselves.
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ets::{ErrorType, EtsConfig, SeasonType, TrendType};
    use crate::time_series::TimeSeriesBuilder;

    #[test]
    fn ets_implements_the_forecaster_contract() {
        let series = TimeSeriesBuilder::new()
            .values(vec![1.0, 2.0, 3.0, 4.0, 5.0])
            .build()
            .unwrap();
        let config = EtsConfig {
            error: ErrorType::Additive,
            trend: TrendType::None,
            season: SeasonType::None,
            season_length: 1,
            alpha: 0.4,
            beta: None,
            gamma: None,
            phi: None,
        };
        let model = crate::ets::Ets::new(config).unwrap();
        let fitted = Forecaster::fit(&model, &series).unwrap();
        assert_eq!(fitted.fitted_values().len(), 5);
        assert_eq!(FittedForecaster::predict(&fitted, 3).unwrap().len(), 3);
    }
}
