//! Performance benchmark for MSTL/STL and ETS fits at scale.
//!
//! Run with: cargo bench --bench mstl_perf

use std::time::{Duration, Instant};

use tsforge_core::{
    AutoEtsSpec, ErrorType, Ets, EtsConfig, MstlDecomposition, SeasonType, TimeSeriesBuilder,
    TrendType,
};

fn generate_seasonal_series(n: usize, periods: &[usize]) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let trend = 0.01 * i as f64;
            let seasonal: f64 = periods
                .iter()
                .enumerate()
                .map(|(j, &p)| {
                    let amplitude = 10.0 / (j + 1) as f64;
                    amplitude * (2.0 * std::f64::consts::PI * i as f64 / p as f64).sin()
                })
                .sum();
            trend + seasonal + (i % 7) as f64 * 0.1
        })
        .collect()
}

fn benchmark_fn<F, R>(name: &str, iterations: usize, mut f: F) -> Duration
where
    F: FnMut() -> R,
{
    let _ = f();

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "{}: total={:?}, per_iter={:?}, iters={}",
        name, elapsed, per_iter, iterations
    );
    elapsed
}

fn main() {
    println!("=== MSTL/ETS Performance Benchmark ===\n");

    let series_lengths = [100, 500, 1000, 5000];
    let periods_short = vec![12];
    let periods_multi = vec![7, 12, 52];

    println!("--- 1. MSTL Decomposition Benchmarks ---\n");

    for &n in &series_lengths {
        let values = generate_seasonal_series(n, &periods_short);
        let iters = if n <= 1000 { 50 } else { 5 };
        let mstl = MstlDecomposition::builder(periods_short.clone())
            .build()
            .unwrap();

        benchmark_fn(&format!("mstl.fit(n={}, single period)", n), iters, || {
            mstl.fit(&values)
        });
    }

    println!();

    for &n in &series_lengths {
        if n < 2 * 52 {
            continue;
        }
        let values = generate_seasonal_series(n, &periods_multi);
        let iters = if n <= 1000 { 20 } else { 5 };
        let mstl = MstlDecomposition::builder(periods_multi.clone())
            .build()
            .unwrap();

        benchmark_fn(&format!("mstl.fit(n={}, 3 periods)", n), iters, || {
            mstl.fit(&values)
        });
    }

    println!("\n--- 2. ETS Fit Benchmarks ---\n");

    for &n in &series_lengths {
        let values = generate_seasonal_series(n, &periods_short);
        let series = TimeSeriesBuilder::new().values(values).build().unwrap();
        let config = EtsConfig {
            error: ErrorType::Additive,
            trend: TrendType::Additive,
            season: SeasonType::Additive,
            season_length: 12,
            alpha: 0.3,
            beta: Some(0.1),
            gamma: Some(0.1),
            phi: None,
        };
        let model = Ets::new(config).unwrap();
        let iters = if n <= 1000 { 100 } else { 10 };

        benchmark_fn(&format!("ets.fit(n={})", n), iters, || model.fit(&series));
    }

    println!("\n--- 3. AutoETS Selection Benchmark ---\n");

    for &n in &[100, 500] {
        let values = generate_seasonal_series(n, &periods_short);
        let series = TimeSeriesBuilder::new().values(values).build().unwrap();
        let spec = AutoEtsSpec::auto(12);

        benchmark_fn(&format!("auto_ets(n={})", n), 3, || {
            tsforge_core::auto_ets(&spec, &series)
        });
    }

    println!("\n=== Benchmark Complete ===");
}
