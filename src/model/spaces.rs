// src/model/spaces.rs

use ndarray::{Array1, Array2, ArrayD, IxDyn};
use rand::Rng;
use std::collections::BTreeMap;

/// A box-shaped continuous space with per-element bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    pub low: ArrayD<f64>,
    pub high: ArrayD<f64>,
}

impl BoxSpace {
    /// A box with the same bounds for every element.
    pub fn uniform(shape: &[usize], low: f64, high: f64) -> Self {
        Self {
            low: ArrayD::from_elem(IxDyn(shape), low),
            high: ArrayD::from_elem(IxDyn(shape), high),
        }
    }

    /// A box over a vector with per-element bounds.
    pub fn from_bounds(low: Array1<f64>, high: Array1<f64>) -> Self {
        Self {
            low: low.into_dyn(),
            high: high.into_dyn(),
        }
    }

    /// Repeats vector bounds along a new leading axis of length `rows`.
    pub fn tiled(low: &Array1<f64>, high: &Array1<f64>, rows: usize) -> Self {
        let tile = |v: &Array1<f64>| -> ArrayD<f64> {
            let mut out = Array2::zeros((rows, v.len()));
            for mut r in out.rows_mut() {
                r.assign(v);
            }
            out.into_dyn()
        };
        Self {
            low: tile(low),
            high: tile(high),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.low.shape()
    }

    pub fn contains(&self, x: &ArrayD<f64>) -> bool {
        x.shape() == self.shape()
            && x.iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// Samples uniformly inside finite bounds. Unbounded sides fall back to
    /// a standard normal offset from the finite side (or from zero).
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ArrayD<f64> {
        let mut out = ArrayD::zeros(self.low.raw_dim());
        for ((o, lo), hi) in out.iter_mut().zip(self.low.iter()).zip(self.high.iter()) {
            let z: f64 = rng.sample(rand_distr::StandardNormal);
            *o = match (lo.is_finite(), hi.is_finite()) {
                (true, true) if hi > lo => uniform_between(*lo, *hi, rng.gen()),
                (true, true) => *lo,
                (true, false) => lo + z.abs(),
                (false, true) => hi - z.abs(),
                (false, false) => z,
            };
        }
        out
    }
}

/// Point at fraction `u` of `[lo, hi]`. Interpolates without forming
/// `hi - lo` when that span overflows.
fn uniform_between(lo: f64, hi: f64, u: f64) -> f64 {
    let span = hi - lo;
    let x = if span.is_finite() {
        lo + span * u
    } else {
        lo * (1.0 - u) + hi * u
    };
    x.max(lo).min(hi)
}

/// Observation or action space.
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    Box(BoxSpace),
    Dict(BTreeMap<String, BoxSpace>),
}

impl Space {
    pub fn as_box(&self) -> Option<&BoxSpace> {
        match self {
            Space::Box(b) => Some(b),
            Space::Dict(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&BoxSpace> {
        match self {
            Space::Box(_) => None,
            Space::Dict(d) => d.get(key),
        }
    }
}

/// Description of the decision process an agent needs to size its models.
#[derive(Debug, Clone)]
pub struct MDPInfo {
    pub observation_space: Space,
    pub action_space: BoxSpace,
    pub gamma: f64,
    pub horizon: usize,
    /// Simulated control timestep.
    pub dt: f64,
}

impl MDPInfo {
    pub fn new(
        observation_space: Space,
        action_space: BoxSpace,
        gamma: f64,
        horizon: usize,
    ) -> Self {
        Self {
            observation_space,
            action_space,
            gamma,
            horizon,
            dt: 0.1,
        }
    }
}
