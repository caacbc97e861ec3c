//! Core forecasting library: ETS, AutoETS, MSTL, MFLES and BOCPD over a
//! minimal univariate time-series container.

pub mod auto_ets;
pub mod changepoint;
pub mod error;
pub mod ets;
pub mod ets_gradients;
pub mod forecast;
pub mod metrics;
pub mod mfles;
pub mod mstl;
pub mod mstl_forecaster;
pub mod optimizer;
pub mod stl;
pub mod time_series;

pub use auto_ets::{auto_ets, AutoEtsSpec, ComponentSpec, DampedPolicy};
pub use changepoint::{
    BocpdBuilder, BocpdDetector, DetectionResult, HazardModel, LogisticHazardParams,
    NormalGammaPrior,
};
pub use error::{ForecastError, Result};
pub use ets::{ErrorType, Ets, EtsConfig, FittedEts, SeasonType, SeasonalBuffer, TrendType};
pub use forecast::{FittedForecaster, Forecaster};
pub use metrics::{
    bias, coverage, mae, mape, mase, mqloss, mse, quantile_loss, r2, rmae, rmse, smape,
};
pub use mfles::{FittedMfles, Mfles, MflesDecomposition, MflesParams, TrendMethod};
pub use mstl::{MstlBuilder, MstlDecomposition, MstlResult};
pub use mstl_forecaster::{
    DeseasonalizedForecastMethod, MstlForecastConfig, MstlForecaster, SeasonalForecastMethod,
    TrendForecastMethod,
};
pub use optimizer::{lbfgs, nelder_mead, Bounds, OptimizationResult};
pub use stl::{StlBuilder, StlDecomposition, StlResult};
pub use time_series::{TimeSeries, TimeSeriesBuilder};
