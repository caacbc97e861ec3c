//! AutoETS: automatic model-family selection and parameter optimisation.

use tracing::{debug, info};

use crate::error::{ForecastError, Result};
use crate::ets::{ErrorType, Ets, EtsConfig, FittedEts, SeasonType, TrendType};
use crate::ets_gradients::compute_neg_log_likelihood_with_gradients;
use crate::optimizer::{lbfgs, nelder_mead, Bounds};
use crate::time_series::TimeSeries;

/// Whether a damped-trend variant is forced on/off or left to selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DampedPolicy {
    Auto,
    Always,
    Never,
}

/// A single component specification: either pinned or left to the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentSpec<T> {
    Auto,
    Fixed(T),
}

/// Structured AutoETS request, replacing the stringly-typed "ZZZ" notation
/// at the API boundary while still accepting it via [`AutoEtsSpec::parse`].
#[derive(Debug, Clone)]
pub struct AutoEtsSpec {
    pub error: ComponentSpec<ErrorType>,
    pub trend: ComponentSpec<Option<()>>,
    pub season: ComponentSpec<Option<()>>,
    pub damped: DampedPolicy,
    pub season_length: usize,
}

impl AutoEtsSpec {
    pub fn auto(season_length: usize) -> Self {
        Self {
            error: ComponentSpec::Auto,
            trend: ComponentSpec::Auto,
            season: ComponentSpec::Auto,
            damped: DampedPolicy::Auto,
            season_length,
        }
    }

    /// Parses the 3-char ("ZZZ") or 4-char ("ZZdZ") notation: position order
    /// is error, trend, [damped], season. `Z`=auto, `N`=none, `A`=additive,
    /// `M`=multiplicative, `d`=damped marker.
    pub fn parse(notation: &str, season_length: usize) -> Result<Self> {
        let chars: Vec<char> = notation.chars().collect();
        if chars.len() != 3 && chars.len() != 4 {
            return Err(ForecastError::InvalidInput(format!(
                "ETS notation must be 3 or 4 characters, got '{notation}'"
            )));
        }

        let error_char = chars[0];
        if error_char == 'N' {
            return Err(ForecastError::InvalidInput(
                "error component cannot be 'N' (none)".to_string(),
            ));
        }
        let trend_char = chars[1];
        let trend = parse_trend_presence(trend_char)?;

        let damped = if chars.len() == 4 {
            if chars[2] != 'd' {
                return Err(ForecastError::InvalidInput(format!(
                    "expected damped marker 'd' at position 3, got '{}'",
                    chars[2]
                )));
            }
            DampedPolicy::Always
        } else {
            DampedPolicy::Auto
        };

        let season_char = *chars.last().unwrap();
        let season = parse_trend_presence(season_char)?;

        let error = match error_char {
            'A' => ComponentSpec::Fixed(ErrorType::Additive),
            'M' => ComponentSpec::Fixed(ErrorType::Multiplicative),
            'Z' => ComponentSpec::Auto,
            other => {
                return Err(ForecastError::InvalidInput(format!(
                    "unrecognised error letter '{other}'"
                )))
            }
        };

        Ok(Self {
            error,
            trend,
            season,
            damped,
            season_length,
        })
    }
}

fn parse_component(c: char, _error_position: bool) -> Result<ComponentSpec<Option<()>>> {
    match c {
        'Z' => Ok(ComponentSpec::Auto),
        'N' => Ok(ComponentSpec::Fixed(None)),
        'A' | 'M' => Ok(ComponentSpec::Fixed(Some(()))),
        other => Err(ForecastError::InvalidInput(format!(
            "unrecognised component letter '{other}'"
        ))),
    }
}

fn parse_trend_presence(c: char) -> Result<ComponentSpec<Option<()>>> {
    parse_component(c, false)
}

fn season_letters(spec: &AutoEtsSpec, notation: &str) -> Vec<SeasonType> {
    // `notation` carries the literal letter when the caller parsed a string;
    // `spec.season` only records presence/absence, so re-derive concrete
    // candidates directly from the last character when available.
    let last = notation.chars().last();
    match last {
        Some('N') => vec![SeasonType::None],
        Some('A') => vec![SeasonType::Additive],
        Some('M') => vec![SeasonType::Multiplicative],
        _ => match spec.season {
            ComponentSpec::Fixed(None) => vec![SeasonType::None],
            ComponentSpec::Fixed(Some(())) => vec![SeasonType::Additive, SeasonType::Multiplicative],
            ComponentSpec::Auto => vec![
                SeasonType::None,
                SeasonType::Additive,
                SeasonType::Multiplicative,
            ],
        },
    }
}

/// Candidate (error, trend, season, damped) family before parameters are chosen.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    error: ErrorType,
    trend: TrendType,
    season: SeasonType,
}

fn enumerate_candidates(spec: &AutoEtsSpec, n: usize, strictly_positive: bool) -> Vec<Candidate> {
    let errors = match spec.error {
        ComponentSpec::Fixed(e) => vec![e],
        ComponentSpec::Auto => vec![ErrorType::Additive, ErrorType::Multiplicative],
    };

    let trend_presence = match spec.trend {
        ComponentSpec::Fixed(None) => vec![false],
        ComponentSpec::Fixed(Some(())) => vec![true],
        ComponentSpec::Auto => vec![false, true],
    };

    let season_presence = match spec.season {
        ComponentSpec::Fixed(None) => vec![SeasonType::None],
        ComponentSpec::Fixed(Some(())) => vec![SeasonType::Additive, SeasonType::Multiplicative],
        ComponentSpec::Auto => {
            if spec.season_length >= 2 && n >= 2 * spec.season_length {
                vec![
                    SeasonType::None,
                    SeasonType::Additive,
                    SeasonType::Multiplicative,
                ]
            } else {
                vec![SeasonType::None]
            }
        }
    };

    let damped_options = |has_trend: bool| -> Vec<bool> {
        if !has_trend {
            return vec![false];
        }
        match spec.damped {
            DampedPolicy::Always => vec![true],
            DampedPolicy::Never => vec![false],
            DampedPolicy::Auto => vec![false, true],
        }
    };

    let mut candidates = Vec::new();
    for &error in &errors {
        for &has_trend in &trend_presence {
            for &damped in &damped_options(has_trend) {
                for &season in &season_presence {
                    // Multiplicative error + additive season is rejected by
                    // the same admissibility rule as EtsConfig::validate.
                    if error == ErrorType::Multiplicative && season == SeasonType::Additive {
                        continue;
                    }
                    if (error == ErrorType::Multiplicative || season == SeasonType::Multiplicative)
                        && !strictly_positive
                    {
                        continue;
                    }
                    let trend = if !has_trend {
                        TrendType::None
                    } else if damped {
                        TrendType::DampedAdditive
                    } else {
                        TrendType::Additive
                    };
                    candidates.push(Candidate {
                        error,
                        trend,
                        season,
                    });
                }
            }
        }
    }
    candidates
}

fn alpha_grid() -> Vec<f64> {
    vec![0.1, 0.3, 0.5, 0.7, 0.9]
}

fn beta_grid(alpha: f64) -> Vec<f64> {
    vec![0.0, 0.3 * alpha, (0.7 * alpha).min(0.9999)]
}

fn phi_grid() -> Vec<f64> {
    vec![0.80, 0.85, 0.90, 0.95, 0.98]
}

/// Fixed candidate gammas: multiplicative seasonality searches a narrower,
/// smaller-gamma range than additive.
fn gamma_grid(season: SeasonType) -> Vec<f64> {
    match season {
        SeasonType::Multiplicative => vec![0.01, 0.05, 0.10],
        _ => vec![0.05, 0.2, 0.5, 0.8],
    }
}

struct ScoredFit {
    config: EtsConfig,
    fit: FittedEts,
}

fn better(a: &ScoredFit, b: &ScoredFit) -> bool {
    let aicc_a = a.fit.aicc();
    let aicc_b = b.fit.aicc();
    if aicc_a.is_finite() && aicc_b.is_finite() {
        return aicc_a < aicc_b;
    }
    a.fit.aic() < b.fit.aic()
}

/// Coarse grid search + best-candidate L-BFGS/Nelder-Mead refinement, with
/// early termination after 8 consecutive non-improving candidates.
pub fn auto_ets(spec: &AutoEtsSpec, series: &TimeSeries) -> Result<(EtsConfig, FittedEts)> {
    let n = series.len();
    if n < 4 {
        return Err(ForecastError::InsufficientData { needed: 4, got: n });
    }

    let strictly_positive = series.is_strictly_positive();
    let candidates = enumerate_candidates(spec, n, strictly_positive);
    if candidates.is_empty() {
        return Err(ForecastError::NoValidCandidate {
            driver: "auto_ets".to_string(),
            tried: 0,
        });
    }

    let mut best: Option<ScoredFit> = None;
    let mut tried = 0usize;
    let mut no_improve_streak = 0usize;

    'candidates: for candidate in &candidates {
        let has_trend = !candidate.trend.is_none();
        let has_season = candidate.season != SeasonType::None;

        for &alpha in &alpha_grid() {
            let betas: Vec<Option<f64>> = if has_trend {
                beta_grid(alpha).into_iter().map(Some).collect()
            } else {
                vec![None]
            };
            for beta in &betas {
                let phis: Vec<Option<f64>> = if has_trend && candidate.trend.is_damped() {
                    phi_grid().into_iter().map(Some).collect()
                } else if has_trend {
                    vec![Some(1.0)]
                } else {
                    vec![None]
                };
                for phi in &phis {
                    let gammas: Vec<Option<f64>> = if has_season {
                        gamma_grid(candidate.season).into_iter().map(Some).collect()
                    } else {
                        vec![None]
                    };
                    for gamma in &gammas {
                        tried += 1;
                        let config = EtsConfig {
                            error: candidate.error,
                            trend: candidate.trend,
                            season: candidate.season,
                            season_length: spec.season_length.max(1),
                            alpha,
                            beta: *beta,
                            gamma: *gamma,
                            phi: phi.filter(|_| has_trend && candidate.trend.is_damped()),
                        };
                        if config.validate().is_err() {
                            continue;
                        }
                        let model = match Ets::new(config.clone()) {
                            Ok(m) => m,
                            Err(_) => continue,
                        };
                        let fit = match model.fit(series) {
                            Ok(f) => f,
                            Err(_) => continue,
                        };
                        let candidate_scored = ScoredFit { config, fit };
                        let improved = match &best {
                            None => true,
                            Some(current) => better(&candidate_scored, current),
                        };
                        if improved {
                            let delta = best
                                .as_ref()
                                .map(|b| b.fit.aicc() - candidate_scored.fit.aicc())
                                .unwrap_or(f64::INFINITY);
                            best = Some(candidate_scored);
                            if delta < 0.01 {
                                no_improve_streak += 1;
                            } else {
                                no_improve_streak = 0;
                            }
                        } else {
                            no_improve_streak += 1;
                        }
                        if no_improve_streak >= 8 {
                            debug!(tried, "AutoETS early-stopping after 8 stagnant candidates");
                            break 'candidates;
                        }
                    }
                }
            }
        }
    }

    let best = best.ok_or_else(|| ForecastError::NoValidCandidate {
        driver: "auto_ets".to_string(),
        tried,
    })?;

    let refined = refine(&best.config, series)?;
    info!(
        tried,
        aicc = refined.fit.aicc(),
        "AutoETS selected final model"
    );
    Ok((refined.config, refined.fit))
}

/// Refines the coarse-grid winner's smoothing parameters via gradient-based
/// L-BFGS (damped+seasonal or multiplicative-seasonal families) or
/// Nelder-Mead otherwise, then performs a deterministic final refit from the
/// recovered (level0, trend0).
fn refine(config: &EtsConfig, series: &TimeSeries) -> Result<ScoredFit> {
    let values = series.values();
    let model = Ets::new(config.clone())?;
    let fit = model.fit(series)?;

    let level0 = fit.level();
    let trend0 = fit.trend();
    let seasonal0 = fit.seasonal().as_slice().to_vec();

    let mut param_names = vec!["alpha"];
    let mut lower = vec![0.001];
    let mut upper = vec![0.999];
    let mut initial = vec![config.alpha];
    if config.has_trend() {
        param_names.push("beta");
        lower.push(0.0001);
        upper.push(0.999);
        initial.push(config.beta.unwrap_or(0.01));
    }
    if config.has_season() {
        param_names.push("gamma");
        lower.push(0.0001);
        upper.push(0.999);
        initial.push(config.gamma.unwrap_or(0.01));
    }
    if config.is_damped() {
        param_names.push("phi");
        lower.push(0.80);
        upper.push(0.98);
        initial.push(config.phi());
    }

    let bounds = Bounds { lower, upper };
    let build_config = |point: &[f64]| -> EtsConfig {
        let mut idx = 1;
        let alpha = point[0];
        let beta = if config.has_trend() {
            let v = point[idx];
            idx += 1;
            Some(v)
        } else {
            None
        };
        let gamma = if config.has_season() {
            let v = point[idx];
            idx += 1;
            Some(v)
        } else {
            None
        };
        let phi = if config.is_damped() {
            Some(point[idx])
        } else if config.has_trend() {
            Some(1.0)
        } else {
            None
        };
        EtsConfig {
            error: config.error,
            trend: config.trend,
            season: config.season,
            season_length: config.season_length,
            alpha,
            beta,
            gamma,
            phi,
        }
    };

    let objective = |point: &[f64]| -> f64 {
        let candidate_config = build_config(point);
        if candidate_config.validate().is_err() {
            return f64::INFINITY;
        }
        let (nll, _) = compute_neg_log_likelihood_with_gradients(
            &candidate_config,
            values,
            level0,
            trend0,
            &seasonal0,
        );
        nll
    };

    let use_gradient = (config.is_damped() && config.has_season())
        || config.season == SeasonType::Multiplicative;
    let result = if use_gradient {
        let gradient = |point: &[f64]| -> Vec<f64> {
            let candidate_config = build_config(point);
            let (_, grad) = compute_neg_log_likelihood_with_gradients(
                &candidate_config,
                values,
                level0,
                trend0,
                &seasonal0,
            );
            let mut g = vec![grad.d_alpha];
            if config.has_trend() {
                g.push(grad.d_beta);
            }
            if config.has_season() {
                g.push(grad.d_gamma);
            }
            if config.is_damped() {
                g.push(grad.d_phi);
            }
            g
        };
        lbfgs(objective, gradient, &initial, &bounds, 200)
    } else {
        nelder_mead(objective, &initial, &bounds, 500)
    };

    let refined_config = build_config(&result.point);
    let refined_config = if refined_config.validate().is_ok() {
        refined_config
    } else {
        config.clone()
    };

    let refined_model = Ets::new(refined_config.clone())?;
    let refined_fit =
        refined_model.fit_with_initial_state(series, level0, trend0, seasonal0.clone())?;

    let candidate_scored = ScoredFit {
        config: refined_config,
        fit: refined_fit,
    };
    let fallback_scored = ScoredFit {
        config: config.clone(),
        fit,
    };
    if better(&candidate_scored, &fallback_scored) {
        Ok(candidate_scored)
    } else {
        Ok(fallback_scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_series::TimeSeriesBuilder;

    #[test]
    fn parses_three_char_notation() {
        let spec = AutoEtsSpec::parse("AAN", 1).unwrap();
        assert!(matches!(spec.error, ComponentSpec::Fixed(ErrorType::Additive)));
    }

    #[test]
    fn parses_four_char_damped_notation() {
        let spec = AutoEtsSpec::parse("AAdN", 1).unwrap();
        assert_eq!(spec.damped, DampedPolicy::Always);
    }

    #[test]
    fn rejects_none_error() {
        assert!(AutoEtsSpec::parse("NAN", 1).is_err());
    }

    #[test]
    fn rejects_malformed_length() {
        assert!(AutoEtsSpec::parse("AA", 1).is_err());
    }

    #[test]
    fn auto_selects_a_model_for_trending_series() {
        let values: Vec<f64> = (0..30).map(|i| 10.0 + i as f64 * 0.5).collect();
        let series = TimeSeriesBuilder::new().values(values).build().unwrap();
        let spec = AutoEtsSpec::auto(1);
        let (config, fit) = auto_ets(&spec, &series).unwrap();
        assert!(config.alpha > 0.0);
        assert!(fit.aicc().is_finite() || fit.aic().is_finite());
    }

    #[test]
    fn insufficient_data_is_rejected() {
        let series = TimeSeriesBuilder::new()
            .values(vec![1.0, 2.0])
            .build()
            .unwrap();
        let spec = AutoEtsSpec::auto(1);
        assert!(auto_ets(&spec, &series).is_err());
    }

    #[test]
    fn season_letters_respects_explicit_notation() {
        let spec = AutoEtsSpec::parse("AAM", 4).unwrap();
        assert_eq!(season_letters(&spec, "AAM"), vec![SeasonType::Multiplicative]);
    }
}
