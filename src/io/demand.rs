// src/io/demand.rs

//! Synthetic demand and feature generators for demos and tests.
//!
//! Every generator returns a `(periods, units)` matrix that can be fed
//! straight into an `XYDataLoader`.

use crate::error::ConfigError;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Every period has the exact same demand, per unit.
/// Useful for checking stationary behaviour.
pub fn generate_constant_demand(periods: usize, value: &Array1<f64>) -> Array2<f64> {
    value
        .view()
        .insert_axis(Axis(0))
        .broadcast((periods, value.len()))
        .map(|v| v.to_owned())
        .unwrap_or_else(|| Array2::zeros((periods, value.len())))
}

/// Demand drawn from independent normal distributions, one per unit.
///
/// Draws are rounded to whole units and clamped at zero, since demand
/// cannot be negative.
///
/// # Arguments
/// * `periods` - Number of rows to generate.
/// * `mean` - The average demand per unit (e.g., 10.0).
/// * `std_dev` - The volatility per unit (e.g., 2.0).
pub fn generate_normal_demand<R: Rng>(
    periods: usize,
    mean: &Array1<f64>,
    std_dev: &Array1<f64>,
    rng: &mut R,
) -> Result<Array2<f64>, ConfigError> {
    if mean.len() != std_dev.len() {
        return Err(ConfigError::UnitMismatch {
            expected: mean.len(),
            got: std_dev.len(),
        });
    }
    let distributions = mean
        .iter()
        .zip(std_dev.iter())
        .map(|(&m, &s)| {
            Normal::new(m, s).map_err(|e| ConfigError::InvalidValue {
                field: "std_dev".to_string(),
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut schedule = Array2::zeros((periods, mean.len()));
    for mut row in schedule.rows_mut() {
        for (cell, normal) in row.iter_mut().zip(&distributions) {
            *cell = normal.sample(rng).round().max(0.0);
        }
    }
    Ok(schedule)
}

/// A step pattern: `before` for the first `switch_at` periods, `after` for
/// the rest. A sudden demand shift shows how fast a policy adapts.
pub fn generate_step_demand(
    periods: usize,
    switch_at: usize,
    before: f64,
    after: f64,
    num_units: usize,
) -> Array2<f64> {
    Array2::from_shape_fn((periods, num_units), |(t, _)| {
        if t < switch_at {
            before
        } else {
            after
        }
    })
}

/// Calendar-style features: a constant bias column and a one-hot weekday
/// (seven columns), so tabular loaders have something to look at.
pub fn weekday_features(periods: usize) -> Array2<f64> {
    Array2::from_shape_fn((periods, 8), |(t, col)| match col {
        0 => 1.0,
        c if c - 1 == t % 7 => 1.0,
        _ => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn constant_demand_repeats_each_unit() {
        let demand = generate_constant_demand(3, &array![4.0, 7.0]);
        assert_eq!(demand, array![[4.0, 7.0], [4.0, 7.0], [4.0, 7.0]]);
    }

    #[test]
    fn normal_demand_is_non_negative_integers() {
        let mut rng = StdRng::seed_from_u64(7);
        let demand =
            generate_normal_demand(200, &array![2.0, 50.0], &array![3.0, 5.0], &mut rng).unwrap();
        assert_eq!(demand.dim(), (200, 2));
        assert!(demand.iter().all(|&d| d >= 0.0 && d.fract() == 0.0));
        let mean_high = demand.column(1).mean().unwrap();
        assert!((mean_high - 50.0).abs() < 2.0);
    }

    #[test]
    fn normal_demand_rejects_bad_parameters() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(generate_normal_demand(5, &array![1.0], &array![-1.0], &mut rng).is_err());
        assert!(matches!(
            generate_normal_demand(5, &array![1.0], &array![1.0, 2.0], &mut rng),
            Err(ConfigError::UnitMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn step_demand_switches_once() {
        let demand = generate_step_demand(6, 4, 4.0, 8.0, 1);
        assert_eq!(demand.column(0).to_vec(), vec![4.0, 4.0, 4.0, 4.0, 8.0, 8.0]);
    }

    #[test]
    fn weekday_features_are_one_hot() {
        let x = weekday_features(9);
        assert_eq!(x.dim(), (9, 8));
        for row in x.rows() {
            assert_eq!(row[0], 1.0);
            assert_eq!(row.iter().skip(1).sum::<f64>(), 1.0);
        }
        assert_eq!(x[[7, 1]], 1.0);
    }
}
