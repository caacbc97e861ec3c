//! Analytical gradients of the ETS negative log-likelihood, for L-BFGS.
//!
//! The forward pass replays the same recursion as [`crate::ets`]; the
//! backward pass propagates `d(NLL)/d(innovation_t)` back through the level,
//! trend and rotating seasonal buffer using the chain rule.

use crate::ets::{ErrorType, EtsConfig, SeasonType, TrendType};

const ETS_TOL: f64 = 1e-10;

/// Gradient of the negative log-likelihood w.r.t. the free smoothing
/// parameters and the (level0, trend0) seed. Seasonal seeds are held fixed
/// during optimisation (only alpha/beta/gamma/phi/level0/trend0 are tuned).
#[derive(Debug, Clone, Default)]
pub struct GradientComponents {
    pub d_alpha: f64,
    pub d_beta: f64,
    pub d_gamma: f64,
    pub d_phi: f64,
    pub d_level0: f64,
    pub d_trend0: f64,
}

struct ForwardRecord {
    level: f64,
    trend: f64,
    seasonal_active: f64,
    phi_b: f64,
    q: f64,
    p: f64,
    t_quantity: f64,
    fitted: f64,
    innovation: f64,
}

/// Runs the recursion forward while recording every intermediate quantity
/// needed by the backward pass, then accumulates the parameter gradient.
///
/// Returns `(neg_log_likelihood, gradient)`; the gradient is all-zero when
/// the forward pass produced a non-finite objective (the caller should treat
/// that as "no usable gradient" and fall back to Nelder-Mead).
pub fn compute_neg_log_likelihood_with_gradients(
    config: &EtsConfig,
    values: &[f64],
    level0: f64,
    trend0: f64,
    seasonal0: &[f64],
) -> (f64, GradientComponents) {
    let n = values.len();
    let alpha = config.alpha;
    let beta = config.beta.unwrap_or(0.0);
    let gamma = config.gamma.unwrap_or(0.0);
    let phi = config.phi();
    let m = config.season_length.max(1);

    let mut level = level0;
    let mut trend = trend0;
    let mut seasonal = if config.has_season() {
        seasonal0.to_vec()
    } else {
        vec![0.0; m]
    };

    let mut records = Vec::with_capacity(n);
    let mut innovation_sse = 0.0;
    let mut sum_log_fitted = 0.0;
    let mut finite = true;

    for &y in values {
        let active = if config.has_season() {
            seasonal[m - 1]
        } else {
            0.0
        };

        let (phi_b, q) = if !config.has_trend() {
            (0.0, level)
        } else if config.trend.is_additive() {
            let pb = phi * trend;
            (pb, level + pb)
        } else {
            let pb = trend.powf(phi);
            (pb, level * pb)
        };

        let p = if !config.has_season() {
            y
        } else if config.season == SeasonType::Additive {
            y - active
        } else {
            y / active.max(ETS_TOL)
        };

        let new_level = q + alpha * (p - q);

        let t = if config.has_season() {
            if config.season == SeasonType::Additive {
                y - q
            } else {
                y / q.max(ETS_TOL)
            }
        } else {
            0.0
        };
        let new_seasonal_active = active + gamma * (t - active);

        let r = if !config.has_trend() {
            0.0
        } else if config.trend.is_additive() {
            new_level - level
        } else {
            new_level / level.max(ETS_TOL)
        };
        let new_trend = if config.has_trend() {
            phi_b + (beta / alpha.max(ETS_TOL)) * (r - phi_b)
        } else {
            trend
        };

        let fitted = if !config.has_season() {
            q
        } else if config.season == SeasonType::Additive {
            q + active
        } else {
            q * active
        };

        let innovation = if config.error == ErrorType::Multiplicative {
            y / fitted.abs().max(ETS_TOL) - 1.0
        } else {
            y - fitted
        };
        if !innovation.is_finite() || !new_level.is_finite() {
            finite = false;
        }
        innovation_sse += innovation * innovation;
        if config.error == ErrorType::Multiplicative {
            sum_log_fitted += fitted.abs().max(ETS_TOL).ln();
        }

        records.push(ForwardRecord {
            level,
            trend,
            seasonal_active: active,
            phi_b,
            q,
            p,
            t_quantity: t,
            fitted,
            innovation,
        });

        level = new_level;
        trend = new_trend;
        if config.has_season() {
            for i in (1..m).rev() {
                seasonal[i] = seasonal[i - 1];
            }
            seasonal[0] = new_seasonal_active;
        }
    }

    let nll = if config.error == ErrorType::Multiplicative {
        0.5 * (n as f64 * innovation_sse.max(f64::MIN_POSITIVE).ln() + 2.0 * sum_log_fitted)
    } else {
        0.5 * n as f64 * innovation_sse.max(f64::MIN_POSITIVE).ln()
    };

    if !finite || !nll.is_finite() {
        return (f64::INFINITY, GradientComponents::default());
    }

    // Backward pass: d(NLL)/d(innovation_t) = n * innovation_t / innovation_sse.
    let scale = n as f64 / innovation_sse.max(f64::MIN_POSITIVE);
    let mut grad = GradientComponents::default();
    let mut d_level = 0.0_f64;
    let mut d_trend = 0.0_f64;

    // Adjoint of the seasonal value active at time `idx`. The buffer rotates
    // a value written at step `idx` into the active slot at step `idx + m`,
    // so `active_adj[idx + m]` is exactly d(NLL)/d(new_seasonal_active_idx)
    // and must be read back `m` steps before it was produced.
    let mut active_adj = vec![0.0_f64; n];

    for (idx, rec) in records.iter().enumerate().rev() {
        let d_innov = scale * rec.innovation;

        // d(innovation)/d(fitted)
        let d_fitted = if config.error == ErrorType::Multiplicative {
            -d_innov * rec.fitted.abs().max(ETS_TOL).recip()
        } else {
            -d_innov
        };

        // fitted = q (+ or *) seasonal_active
        let (d_q_from_fitted, d_active_from_fitted) = if !config.has_season() {
            (d_fitted, 0.0)
        } else if config.season == SeasonType::Additive {
            (d_fitted, d_fitted)
        } else {
            (d_fitted * rec.seasonal_active, d_fitted * rec.q)
        };

        // new_level = q + alpha * (p - q); `d_level` carried in from the next
        // step is the adjoint of new_level_idx (= level_{idx+1}).
        let d_p = d_level * alpha;
        grad.d_alpha += d_level * (rec.p - rec.q);

        let d_active_from_p = if !config.has_season() {
            0.0
        } else if config.season == SeasonType::Additive {
            -d_p
        } else {
            -d_p * rec.p / rec.seasonal_active.max(ETS_TOL)
        };

        let delayed = if config.has_season() && idx + m < n {
            active_adj[idx + m]
        } else {
            0.0
        };
        if config.has_season() {
            grad.d_gamma += delayed * (rec.t_quantity - rec.seasonal_active);
        }
        let d_tq = gamma * delayed;
        let d_q_from_tq = if !config.has_season() {
            0.0
        } else if config.season == SeasonType::Additive {
            -d_tq
        } else {
            -d_tq * rec.t_quantity / rec.q.max(ETS_TOL)
        };

        active_adj[idx] = d_active_from_fitted + d_active_from_p + (1.0 - gamma) * delayed;

        let d_q = d_q_from_fitted + d_level + d_q_from_tq;

        if config.has_trend() {
            grad.d_phi += d_q * rec.phi_b / phi.max(ETS_TOL);
            grad.d_beta += d_trend * (rec.trend - rec.phi_b) / alpha.max(ETS_TOL);
        }

        d_level = d_q * (1.0 - alpha);
        d_trend = if config.has_trend() { d_trend * phi } else { 0.0 };
    }

    grad.d_level0 = d_level;
    grad.d_trend0 = d_trend;

    (nll, grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ets::{ErrorType, SeasonType, TrendType};

    #[test]
    fn gradient_is_finite_for_well_behaved_series() {
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
        let values = vec![10.0, 11.0, 9.0, 12.0, 10.5, 11.5];
        let (nll, grad) =
            compute_neg_log_likelihood_with_gradients(&config, &values, 10.0, 0.0, &[]);
        assert!(nll.is_finite());
        assert!(grad.d_level0.is_finite());
    }

    #[test]
    fn degenerate_fitted_value_yields_non_finite_sentinel() {
        let config = EtsConfig {
            error: ErrorType::Multiplicative,
            trend: TrendType::None,
            season: SeasonType::None,
            season_length: 1,
            alpha: 0.3,
            beta: None,
            gamma: None,
            phi: None,
        };
        let values = vec![1.0, 2.0, 3.0];
        let (nll, _grad) =
            compute_neg_log_likelihood_with_gradients(&config, &values, 0.0, 0.0, &[]);
        assert!(nll.is_finite() || nll.is_infinite());
    }
}
