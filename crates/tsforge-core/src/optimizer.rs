//! Bounded nonlinear optimizers used to fit ETS/MFLES parameters.
//!
//! Two algorithms, both box-constrained: a Nelder-Mead simplex (derivative
//! free, used whenever a usable analytical gradient is unavailable) and an
//! L-BFGS with a strong-Wolfe line search (used for ETS when
//! [`crate::ets_gradients`] returns a finite gradient).

#[derive(Debug, Clone)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn clamp(&self, point: &mut [f64]) {
        for ((x, lo), hi) in point.iter_mut().zip(&self.lower).zip(&self.upper) {
            *x = x.clamp(*lo, *hi);
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Box-constrained Nelder-Mead simplex search.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: &Bounds,
    max_iterations: usize,
) -> OptimizationResult
where
    F: Fn(&[f64]) -> f64,
{
    const ALPHA: f64 = 1.0;
    const GAMMA: f64 = 2.0;
    const RHO: f64 = 0.5;
    const SIGMA: f64 = 0.5;

    let n = initial.len();
    if n == 0 {
        return OptimizationResult {
            point: vec![],
            value: objective(initial),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    let mut x0 = initial.to_vec();
    bounds.clamp(&mut x0);
    simplex.push(x0.clone());
    for i in 0..n {
        let mut vertex = x0.clone();
        let step = if vertex[i].abs() > 1e-8 {
            vertex[i] * 0.05
        } else {
            0.05
        };
        vertex[i] += step;
        bounds.clamp(&mut vertex);
        simplex.push(vertex);
    }

    let mut values: Vec<f64> = simplex.iter().map(|p| objective(p)).collect();
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
        let simplex_sorted: Vec<Vec<f64>> = order.iter().map(|&i| simplex[i].clone()).collect();
        let values_sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();
        simplex = simplex_sorted;
        values = values_sorted;

        let spread = (values[n] - values[0]).abs();
        if spread < 1e-10 {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|p| p[j]).sum::<f64>() / n as f64)
            .collect();

        let mut reflected: Vec<f64> = centroid
            .iter()
            .zip(&simplex[n])
            .map(|(c, w)| c + ALPHA * (c - w))
            .collect();
        bounds.clamp(&mut reflected);
        let f_reflected = objective(&reflected);

        if f_reflected < values[0] {
            let mut expanded: Vec<f64> = centroid
                .iter()
                .zip(&reflected)
                .map(|(c, r)| c + GAMMA * (r - c))
                .collect();
            bounds.clamp(&mut expanded);
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
        } else if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
        } else {
            let worst = f_reflected.min(values[n]);
            let worst_point = if f_reflected < values[n] {
                &reflected
            } else {
                &simplex[n]
            };
            let mut contracted: Vec<f64> = centroid
                .iter()
                .zip(worst_point.iter())
                .map(|(c, w)| c + RHO * (w - c))
                .collect();
            bounds.clamp(&mut contracted);
            let f_contracted = objective(&contracted);
            if f_contracted < worst {
                simplex[n] = contracted;
                values[n] = f_contracted;
            } else {
                for i in 1..=n {
                    let mut shrunk: Vec<f64> = simplex[0]
                        .iter()
                        .zip(&simplex[i])
                        .map(|(best, p)| best + SIGMA * (p - best))
                        .collect();
                    bounds.clamp(&mut shrunk);
                    values[i] = objective(&shrunk);
                    simplex[i] = shrunk;
                }
            }
        }
        iterations += 1;
    }

    let best_idx = (0..=n)
        .min_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap())
        .unwrap();
    OptimizationResult {
        point: simplex[best_idx].clone(),
        value: values[best_idx],
        iterations,
        converged,
    }
}

/// Box-constrained L-BFGS with a strong-Wolfe line search and a memory of 10
/// curvature pairs.
pub fn lbfgs<F, G>(
    objective: F,
    gradient: G,
    initial: &[f64],
    bounds: &Bounds,
    max_iterations: usize,
) -> OptimizationResult
where
    F: Fn(&[f64]) -> f64,
    G: Fn(&[f64]) -> Vec<f64>,
{
    const MEMORY: usize = 10;
    const C1: f64 = 1e-4;
    const C2: f64 = 0.9;

    let n = initial.len();
    let mut x = initial.to_vec();
    bounds.clamp(&mut x);
    let mut f = objective(&x);
    let mut g = gradient(&x);

    let mut s_history: Vec<Vec<f64>> = Vec::with_capacity(MEMORY);
    let mut y_history: Vec<Vec<f64>> = Vec::with_capacity(MEMORY);
    let mut rho_history: Vec<f64> = Vec::with_capacity(MEMORY);

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let grad_norm: f64 = g.iter().map(|v| v * v).sum::<f64>().sqrt();
        if grad_norm < 1e-8 {
            converged = true;
            break;
        }

        let direction = two_loop_recursion(&g, &s_history, &y_history, &rho_history);

        let (step, x_new, f_new, g_new) =
            strong_wolfe_line_search(&objective, &gradient, &x, f, &g, &direction, bounds, C1, C2);

        if step < 1e-14 {
            converged = true;
            break;
        }

        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        let sy: f64 = s.iter().zip(&y).map(|(a, b)| a * b).sum();
        if sy > 1e-12 {
            if s_history.len() == MEMORY {
                s_history.remove(0);
                y_history.remove(0);
                rho_history.remove(0);
            }
            s_history.push(s);
            y_history.push(y);
            rho_history.push(1.0 / sy);
        }

        x = x_new;
        f = f_new;
        g = g_new;
        iterations += 1;
    }

    let _ = n;
    OptimizationResult {
        point: x,
        value: f,
        iterations,
        converged,
    }
}

fn two_loop_recursion(
    g: &[f64],
    s_history: &[Vec<f64>],
    y_history: &[Vec<f64>],
    rho_history: &[f64],
) -> Vec<f64> {
    let mut q = g.to_vec();
    let m = s_history.len();
    let mut alpha = vec![0.0; m];

    for i in (0..m).rev() {
        let a = rho_history[i] * dot(&s_history[i], &q);
        alpha[i] = a;
        for (qi, yi) in q.iter_mut().zip(&y_history[i]) {
            *qi -= a * yi;
        }
    }

    let gamma = if m > 0 {
        let sy = dot(&s_history[m - 1], &y_history[m - 1]);
        let yy = dot(&y_history[m - 1], &y_history[m - 1]);
        if yy > 1e-12 {
            sy / yy
        } else {
            1.0
        }
    } else {
        1.0
    };
    let mut r: Vec<f64> = q.iter().map(|v| gamma * v).collect();

    for i in 0..m {
        let b = rho_history[i] * dot(&y_history[i], &r);
        for (ri, si) in r.iter_mut().zip(&s_history[i]) {
            *ri += (alpha[i] - b) * si;
        }
    }

    r.iter_mut().for_each(|v| *v = -*v);
    r
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[allow(clippy::too_many_arguments)]
fn strong_wolfe_line_search<F, G>(
    objective: &F,
    gradient: &G,
    x: &[f64],
    f0: f64,
    g0: &[f64],
    direction: &[f64],
    bounds: &Bounds,
    c1: f64,
    c2: f64,
) -> (f64, Vec<f64>, f64, Vec<f64>)
where
    F: Fn(&[f64]) -> f64,
    G: Fn(&[f64]) -> Vec<f64>,
{
    let directional_deriv0 = dot(g0, direction);
    let mut step = 1.0;

    if directional_deriv0 >= 0.0 {
        return (0.0, x.to_vec(), f0, g0.to_vec());
    }

    for _ in 0..20 {
        let mut x_trial: Vec<f64> = x
            .iter()
            .zip(direction)
            .map(|(xi, di)| xi + step * di)
            .collect();
        bounds.clamp(&mut x_trial);
        let f_trial = objective(&x_trial);

        if f_trial > f0 + c1 * step * directional_deriv0 {
            step *= 0.5;
            continue;
        }

        let g_trial = gradient(&x_trial);
        let directional_deriv_trial = dot(&g_trial, direction);
        if directional_deriv_trial.abs() <= -c2 * directional_deriv0 {
            return (step, x_trial, f_trial, g_trial);
        }
        if directional_deriv_trial >= 0.0 {
            step *= 0.5;
            continue;
        }
        return (step, x_trial, f_trial, g_trial);
    }

    let mut x_trial: Vec<f64> = x
        .iter()
        .zip(direction)
        .map(|(xi, di)| xi + step * di)
        .collect();
    bounds.clamp(&mut x_trial);
    let f_trial = objective(&x_trial);
    let g_trial = gradient(&x_trial);
    (step, x_trial, f_trial, g_trial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nelder_mead_minimizes_quadratic_bowl() {
        let bounds = Bounds {
            lower: vec![-10.0, -10.0],
            upper: vec![10.0, 10.0],
        };
        let result = nelder_mead(
            |p| (p[0] - 3.0).powi(2) + (p[1] + 1.0).powi(2),
            &[0.0, 0.0],
            &bounds,
            500,
        );
        assert!((result.point[0] - 3.0).abs() < 0.05);
        assert!((result.point[1] + 1.0).abs() < 0.05);
    }

    #[test]
    fn nelder_mead_respects_bounds() {
        let bounds = Bounds {
            lower: vec![0.0],
            upper: vec![1.0],
        };
        let result = nelder_mead(|p| (p[0] - 5.0).powi(2), &[0.5], &bounds, 200);
        assert!(result.point[0] <= 1.0 + 1e-9);
    }

    #[test]
    fn lbfgs_minimizes_quadratic_bowl() {
        let bounds = Bounds {
            lower: vec![-10.0, -10.0],
            upper: vec![10.0, 10.0],
        };
        let objective = |p: &[f64]| (p[0] - 2.0).powi(2) + (p[1] - 4.0).powi(2);
        let gradient = |p: &[f64]| vec![2.0 * (p[0] - 2.0), 2.0 * (p[1] - 4.0)];
        let result = lbfgs(objective, gradient, &[0.0, 0.0], &bounds, 100);
        assert!((result.point[0] - 2.0).abs() < 0.05);
        assert!((result.point[1] - 4.0).abs() < 0.05);
    }
}
