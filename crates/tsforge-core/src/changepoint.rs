//! BOCPD: Bayesian Online Change-Point Detection with a Normal-Gamma
//! conjugate prior and a constant or logistic hazard function.

use tracing::trace;
use statrs::function::gamma::ln_gamma;

use crate::error::{ForecastError, Result};

const MIN_PROB: f64 = f64::MIN_POSITIVE;

/// Normal-Gamma prior over (mean, precision): `mu0` is the prior mean,
/// `kappa0` the pseudo-count on the mean, `alpha0`/`beta0` the Gamma shape
/// and rate on the precision.
#[derive(Debug, Clone, Copy)]
pub struct NormalGammaPrior {
    pub mu0: f64,
    pub kappa0: f64,
    pub alpha0: f64,
    pub beta0: f64,
}

impl Default for NormalGammaPrior {
    fn default() -> Self {
        Self {
            mu0: 0.0,
            kappa0: 1.0,
            alpha0: 1.0,
            beta0: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogisticHazardParams {
    pub h: f64,
    pub a: f64,
    pub b: f64,
}

impl Default for LogisticHazardParams {
    fn default() -> Self {
        Self {
            h: -5.0,
            a: 1.0,
            b: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum HazardModel {
    Constant(f64),
    Logistic(LogisticHazardParams),
}

fn hazard(model: &HazardModel, run_length: usize) -> f64 {
    let h = match model {
        HazardModel::Constant(lambda) => 1.0 / lambda,
        HazardModel::Logistic(params) => {
            let x = params.h + params.a * (run_length as f64).ln_1p() * params.b;
            1.0 / (1.0 + (-x).exp())
        }
    };
    h.clamp(1e-6, 0.999)
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub changepoint_indices: Vec<usize>,
    pub changepoint_probabilities: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct BocpdDetector {
    hazard: HazardModel,
    prior: NormalGammaPrior,
    max_run_length: usize,
    enable_tracing: bool,
}

pub struct BocpdBuilder {
    hazard: HazardModel,
    prior: NormalGammaPrior,
    max_run_length: usize,
    enable_tracing: bool,
}

impl BocpdDetector {
    pub fn builder() -> BocpdBuilder {
        BocpdBuilder {
            hazard: HazardModel::Constant(250.0),
            prior: NormalGammaPrior::default(),
            max_run_length: 0,
            enable_tracing: false,
        }
    }

    pub fn detect(&self, values: &[f64]) -> Result<Vec<usize>> {
        Ok(self.detect_with_probabilities(values)?.changepoint_indices)
    }

    pub fn detect_with_probabilities(&self, values: &[f64]) -> Result<DetectionResult> {
        if values.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: values.len(),
            });
        }
        let n = values.len();
        let cap = if self.max_run_length > 0 {
            self.max_run_length
        } else {
            n
        };

        // log_run_length_probs[t] holds log P(run length = r | y_1..t) for
        // r in 0..=t, truncated to `cap`.
        let mut log_probs: Vec<f64> = vec![0.0];
        let mut mu = vec![self.prior.mu0];
        let mut kappa = vec![self.prior.kappa0];
        let mut alpha = vec![self.prior.alpha0];
        let mut beta = vec![self.prior.beta0];

        let mut map_run = vec![0usize; n];
        let mut changepoint_indices = Vec::new();
        let mut changepoint_probabilities = Vec::new();

        for (t, &y) in values.iter().enumerate() {
            let run_count = log_probs.len();
            let mut pred_log_probs = Vec::with_capacity(run_count);
            for r in 0..run_count {
                pred_log_probs.push(log_student_t(y, mu[r], kappa[r], alpha[r], beta[r]));
            }

            let mut growth_log_probs = Vec::with_capacity(run_count);
            let mut cp_log_prob_terms = Vec::with_capacity(run_count);
            for r in 0..run_count {
                let h = hazard(&self.hazard, r);
                growth_log_probs.push(log_probs[r] + pred_log_probs[r] + (1.0 - h).ln());
                cp_log_prob_terms.push(log_probs[r] + pred_log_probs[r] + h.ln());
            }
            let cp_log_prob = logsumexp(&cp_log_prob_terms);

            let mut new_log_probs = Vec::with_capacity(run_count + 1);
            new_log_probs.push(cp_log_prob);
            new_log_probs.extend(growth_log_probs);

            let normaliser = logsumexp(&new_log_probs);
            for p in new_log_probs.iter_mut() {
                *p -= normaliser;
            }

            let mut new_mu = Vec::with_capacity(run_count + 1);
            let mut new_kappa = Vec::with_capacity(run_count + 1);
            let mut new_alpha = Vec::with_capacity(run_count + 1);
            let mut new_beta = Vec::with_capacity(run_count + 1);
            new_mu.push(self.prior.mu0);
            new_kappa.push(self.prior.kappa0);
            new_alpha.push(self.prior.alpha0);
            new_beta.push(self.prior.beta0);
            for r in 0..run_count {
                let (um, uk, ua, ub) = update_stats(y, mu[r], kappa[r], alpha[r], beta[r]);
                new_mu.push(um);
                new_kappa.push(uk);
                new_alpha.push(ua);
                new_beta.push(ub);
            }

            if new_log_probs.len() > cap {
                new_log_probs.truncate(cap);
                new_mu.truncate(cap);
                new_kappa.truncate(cap);
                new_alpha.truncate(cap);
                new_beta.truncate(cap);
            }

            log_probs = new_log_probs;
            mu = new_mu;
            kappa = new_kappa;
            alpha = new_alpha;
            beta = new_beta;

            let map_r = (0..log_probs.len())
                .max_by(|&a, &b| log_probs[a].partial_cmp(&log_probs[b]).unwrap())
                .unwrap_or(0);
            map_run[t] = map_r;

            if t > 0 && map_r < map_run[t - 1] {
                let cp_index = t - map_r;
                changepoint_indices.push(cp_index);
                changepoint_probabilities.push(cp_log_prob.exp().max(MIN_PROB));
                if self.enable_tracing {
                    trace!(t, cp_index, "BOCPD changepoint detected");
                }
            }
        }

        if !changepoint_indices.contains(&0) {
            changepoint_indices.insert(0, 0);
            changepoint_probabilities.insert(0, 1.0);
        }
        let last = n - 1;
        if !changepoint_indices.contains(&last) {
            changepoint_indices.push(last);
            changepoint_probabilities.push(log_probs.last().copied().unwrap_or(0.0).exp());
        }

        let mut paired: Vec<(usize, f64)> = changepoint_indices
            .into_iter()
            .zip(changepoint_probabilities)
            .collect();
        paired.sort_by_key(|(idx, _)| *idx);
        paired.dedup_by_key(|(idx, _)| *idx);

        Ok(DetectionResult {
            changepoint_indices: paired.iter().map(|(idx, _)| *idx).collect(),
            changepoint_probabilities: paired.iter().map(|(_, p)| *p).collect(),
        })
    }
}

impl BocpdBuilder {
    pub fn hazard_lambda(mut self, lambda: f64) -> Self {
        self.hazard = HazardModel::Constant(lambda);
        self
    }

    pub fn logistic_hazard(mut self, params: LogisticHazardParams) -> Self {
        self.hazard = HazardModel::Logistic(params);
        self
    }

    pub fn normal_gamma_prior(mut self, prior: NormalGammaPrior) -> Self {
        self.prior = prior;
        self
    }

    pub fn max_run_length(mut self, max_run_length: usize) -> Self {
        self.max_run_length = max_run_length;
        self
    }

    pub fn enable_tracing(mut self, enable: bool) -> Self {
        self.enable_tracing = enable;
        self
    }

    pub fn build(self) -> Result<BocpdDetector> {
        if self.prior.kappa0 <= 0.0 || self.prior.alpha0 <= 0.0 || self.prior.beta0 <= 0.0 {
            return Err(ForecastError::InvalidInput(
                "Normal-Gamma prior parameters kappa0, alpha0, beta0 must be positive".to_string(),
            ));
        }
        Ok(BocpdDetector {
            hazard: self.hazard,
            prior: self.prior,
            max_run_length: self.max_run_length,
            enable_tracing: self.enable_tracing,
        })
    }
}

/// log predictive density of the Student-t posterior predictive implied by
/// the Normal-Gamma prior: `nu = 2*alpha`, `scale^2 = beta*(kappa+1)/(alpha*kappa)`.
fn log_student_t(y: f64, mu: f64, kappa: f64, alpha: f64, beta: f64) -> f64 {
    let nu = 2.0 * alpha;
    let scale_sq = beta * (kappa + 1.0) / (alpha * kappa);
    let z = (y - mu) * (y - mu) / (nu * scale_sq);

    ln_gamma((nu + 1.0) / 2.0) - ln_gamma(nu / 2.0)
        - 0.5 * (nu * std::f64::consts::PI * scale_sq).ln()
        - ((nu + 1.0) / 2.0) * (1.0 + z).ln()
}

/// Standard Normal-Gamma posterior update after observing `y`.
fn update_stats(y: f64, mu: f64, kappa: f64, alpha: f64, beta: f64) -> (f64, f64, f64, f64) {
    let new_kappa = kappa + 1.0;
    let new_mu = (kappa * mu + y) / new_kappa;
    let new_alpha = alpha + 0.5;
    let new_beta = beta + (kappa * (y - mu) * (y - mu)) / (2.0 * new_kappa);
    (new_mu, new_kappa, new_alpha, new_beta)
}

fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_a_clear_mean_shift() {
        let mut values = vec![0.0; 50];
        for v in values.iter_mut().skip(25) {
            *v = 10.0;
        }
        let detector = BocpdDetector::builder()
            .hazard_lambda(100.0)
            .build()
            .unwrap();
        let result = detector.detect_with_probabilities(&values).unwrap();
        assert!(result
            .changepoint_indices
            .iter()
            .any(|&idx| (20..30).contains(&idx)));
    }

    #[test]
    fn flat_series_has_no_interior_changepoints() {
        let values = vec![5.0; 30];
        let detector = BocpdDetector::builder().hazard_lambda(250.0).build().unwrap();
        let result = detector.detect_with_probabilities(&values).unwrap();
        let interior: Vec<&usize> = result
            .changepoint_indices
            .iter()
            .filter(|&&idx| idx != 0 && idx != 29)
            .collect();
        assert!(interior.is_empty());
    }

    #[test]
    fn rejects_invalid_prior() {
        let result = BocpdDetector::builder()
            .normal_gamma_prior(NormalGammaPrior {
                mu0: 0.0,
                kappa0: -1.0,
                alpha0: 1.0,
                beta0: 1.0,
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_too_short_series() {
        let detector = BocpdDetector::builder().build().unwrap();
        assert!(detector.detect(&[1.0]).is_err());
    }

    #[test]
    fn logsumexp_matches_naive_sum_in_log_space() {
        let values = vec![0.0_f64.ln(), 1.0_f64.ln(), 2.0_f64.ln()];
        let result = logsumexp(&values).exp();
        assert!((result - 3.0).abs() < 1e-9);
    }
}
