// src/strategy/optimization.rs

//! Newsvendor cost functions and the closed-form quantities built on them.

use ndarray::{Array1, ArrayView1, Zip};

/// Per-unit newsvendor cost: `max(d - q, 0) * cu + max(q - d, 0) * co`.
pub fn pinball_loss(
    demand: ArrayView1<f64>,
    action: ArrayView1<f64>,
    underage_cost: ArrayView1<f64>,
    overage_cost: ArrayView1<f64>,
) -> Array1<f64> {
    Zip::from(&demand)
        .and(&action)
        .and(&underage_cost)
        .and(&overage_cost)
        .map_collect(|&d, &q, &cu, &co| (d - q).max(0.0) * cu + (q - d).max(0.0) * co)
}

/// Per-unit quantile loss at service level `sl`:
/// `max((d - q) * sl, (q - d) * (1 - sl))`.
pub fn quantile_loss(
    demand: ArrayView1<f64>,
    action: ArrayView1<f64>,
    service_level: ArrayView1<f64>,
) -> Array1<f64> {
    Zip::from(&demand)
        .and(&action)
        .and(&service_level)
        .map_collect(|&d, &q, &sl| ((d - q) * sl).max((q - d) * (1.0 - sl)))
}

/// The critical ratio `cu / (cu + co)`, i.e. the cost-optimal service level.
///
/// Zero total cost gives a ratio of zero.
pub fn critical_ratio(underage_cost: f64, overage_cost: f64) -> f64 {
    if underage_cost + overage_cost == 0.0 {
        return 0.0;
    }
    underage_cost / (underage_cost + overage_cost)
}

/// Approximate quantile function of the standard normal distribution.
///
/// Abramowitz and Stegun formula 26.2.23, absolute error below 4.5e-4.
/// Probabilities outside `(0, 1)` are capped at five standard deviations.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p >= 1.0 {
        return 5.0;
    }
    if p <= 0.0 {
        return -5.0;
    }
    if p == 0.5 {
        return 0.0;
    }

    // valid for 0 < q <= 0.5, mirrored above the median
    let q = if p < 0.5 { p } else { 1.0 - p };
    let t = (-2.0 * q.ln()).sqrt();

    let (c0, c1, c2) = (2.515517, 0.802853, 0.010328);
    let (d1, d2, d3) = (1.432788, 0.189269, 0.001308);

    let x = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);

    if p < 0.5 {
        -x
    } else {
        x
    }
}

/// Order-up-to level covering demand over the risk horizon.
///
/// Target = mu * (L + 1) + z * sigma * sqrt(L + 1), with `z` the normal
/// quantile at the critical ratio and `L + 1` the lead time plus one review
/// period. Never negative.
pub fn optimal_base_stock(
    underage_cost: f64,
    holding_cost: f64,
    mean_demand: f64,
    std_demand: f64,
    lead_time: usize,
) -> f64 {
    let z = inverse_normal_cdf(critical_ratio(underage_cost, holding_cost));
    let risk_horizon = (lead_time + 1) as f64;

    let mu_l = mean_demand * risk_horizon;
    let sigma_l = std_demand * risk_horizon.sqrt();

    (mu_l + z * sigma_l).max(0.0)
}

/// Empirical quantile of `samples` at probability `p`, taking the smallest
/// sample whose empirical CDF reaches `p`. `None` for an empty sample.
pub fn empirical_quantile(samples: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let rank = (p.clamp(0.0, 1.0) * n as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, n) - 1])
}
