// src/io/dataloader.rs

//! Exogenous data (features and demand) consumed by the environments.
//!
//! A loader owns its active [`Regime`]. Environments and supervised-learning
//! views hold the same loader behind an `Rc`, so switching the regime through
//! one holder switches it for all of them.

use crate::error::{ConfigError, DataError};
use ndarray::{concatenate, s, Array1, Array2, Array3, ArrayD, Axis};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Which slice of the data is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Train,
    Val,
    Test,
}

impl Default for Regime {
    fn default() -> Self {
        Regime::Train
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Train => "train",
            Regime::Val => "val",
            Regime::Test => "test",
        };
        f.write_str(s)
    }
}

impl FromStr for Regime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Regime::Train),
            "val" => Ok(Regime::Val),
            "test" => Ok(Regime::Test),
            other => Err(ConfigError::UnknownVariant {
                kind: "mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Indexed access to `(features, demand)` pairs split into train, val and test.
///
/// Indices passed to [`DataLoader::get`] are relative to the active regime.
pub trait DataLoader {
    fn regime(&self) -> Regime;

    /// Switches the active regime. Fails if the regime has no data.
    fn set_regime(&self, regime: Regime) -> Result<(), DataError>;

    fn train(&self) -> Result<(), DataError> {
        self.set_regime(Regime::Train)
    }

    fn val(&self) -> Result<(), DataError> {
        self.set_regime(Regime::Val)
    }

    fn test(&self) -> Result<(), DataError> {
        self.set_regime(Regime::Test)
    }

    /// Total number of samples over all regimes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Features and demand at `idx` of the active regime.
    fn get(&self, idx: usize) -> Result<(ArrayD<f64>, Array1<f64>), DataError>;

    /// `(n_samples, feature dims...)`
    fn x_shape(&self) -> Vec<usize>;

    /// `(n_samples, n_units)`
    fn y_shape(&self) -> Vec<usize>;

    fn len_train(&self) -> usize;

    fn len_val(&self) -> Result<usize, DataError>;

    fn len_test(&self) -> Result<usize, DataError>;

    fn num_units(&self) -> usize;

    /// Loaders training units in the batch dimension put the unit axis last
    /// for val and test samples.
    fn meta_learn_units(&self) -> bool {
        false
    }

    fn regime_len(&self, regime: Regime) -> Result<usize, DataError> {
        match regime {
            Regime::Train => Ok(self.len_train()),
            Regime::Val => self.len_val(),
            Regime::Test => self.len_test(),
        }
    }
}

/// Lag-window preprocessing applied once at construction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LagWindowParams {
    /// Number of past periods stacked in front of the current features.
    pub lag_window: Option<usize>,
    /// Append last period's demand to the features.
    pub include_y: bool,
}

/// Tabular loader over in-memory `X`/`Y` matrices split by start indices.
#[derive(Debug)]
pub struct XYDataLoader {
    x: ArrayD<f64>,
    y: Array2<f64>,
    val_index_start: Option<usize>,
    test_index_start: Option<usize>,
    train_len: usize,
    meta_learn_units: bool,
    regime: Cell<Regime>,
}

impl XYDataLoader {
    pub fn new(
        x: Array2<f64>,
        y: Array2<f64>,
        val_index_start: Option<usize>,
        test_index_start: Option<usize>,
    ) -> Result<Self, DataError> {
        Self::with_lag_window(x, y, val_index_start, test_index_start, &LagWindowParams::default())
    }

    pub fn with_lag_window(
        x: Array2<f64>,
        y: Array2<f64>,
        val_index_start: Option<usize>,
        test_index_start: Option<usize>,
        lag: &LagWindowParams,
    ) -> Result<Self, DataError> {
        if x.nrows() != y.nrows() {
            return Err(DataError::LengthMismatch {
                x: x.nrows(),
                y: y.nrows(),
            });
        }
        let n = y.nrows();
        if let (Some(v), Some(t)) = (val_index_start, test_index_start) {
            if v > t {
                return Err(DataError::InvalidSplit(format!(
                    "val_index_start {} is after test_index_start {}",
                    v, t
                )));
            }
        }
        for start in val_index_start.iter().chain(test_index_start.iter()) {
            if *start > n {
                return Err(DataError::InvalidSplit(format!(
                    "start index {} beyond {} samples",
                    start, n
                )));
            }
        }

        let mut x = x;
        let mut y = y;
        let mut shift = 0;

        if lag.include_y {
            if n < 2 {
                return Err(DataError::InvalidSplit(format!(
                    "lagged demand needs at least 2 samples, got {}",
                    n
                )));
            }
            let mut lagged_y = Array2::zeros(y.raw_dim());
            lagged_y.slice_mut(s![1.., ..]).assign(&y.slice(s![..-1, ..]));
            x = concatenate(Axis(1), &[x.view(), lagged_y.view()])
                .map_err(|e| DataError::InvalidSplit(e.to_string()))?;
            x = x.slice(s![1.., ..]).to_owned();
            y = y.slice(s![1.., ..]).to_owned();
            shift += 1;
        }

        let x: ArrayD<f64> = match lag.lag_window {
            Some(window) if window > 0 => {
                let rows = x.nrows();
                if rows <= window {
                    return Err(DataError::InvalidSplit(format!(
                        "lag window {} needs more than {} samples",
                        window, rows
                    )));
                }
                let mut stacked = Array3::zeros((rows - window, window + 1, x.ncols()));
                for t in 0..rows - window {
                    for p in 0..=window {
                        stacked.slice_mut(s![t, p, ..]).assign(&x.row(t + p));
                    }
                }
                y = y.slice(s![window.., ..]).to_owned();
                shift += window;
                stacked.into_dyn()
            }
            _ => x.into_dyn(),
        };

        let shift_start = |start: Option<usize>| -> Result<Option<usize>, DataError> {
            start
                .map(|s| {
                    s.checked_sub(shift).ok_or_else(|| {
                        DataError::InvalidSplit(format!(
                            "start index {} is consumed by the lag window of {}",
                            s, shift
                        ))
                    })
                })
                .transpose()
        };
        let val_index_start = shift_start(val_index_start)?;
        let test_index_start = shift_start(test_index_start)?;

        let train_len = val_index_start.or(test_index_start).unwrap_or(y.nrows());
        if train_len == 0 {
            return Err(DataError::InvalidSplit("empty training set".to_string()));
        }

        Ok(Self {
            x,
            y,
            val_index_start,
            test_index_start,
            train_len,
            meta_learn_units: false,
            regime: Cell::new(Regime::Train),
        })
    }

    pub fn set_meta_learn_units(&mut self, meta_learn_units: bool) {
        self.meta_learn_units = meta_learn_units;
    }

    fn bounds(&self, regime: Regime) -> Result<(usize, usize), DataError> {
        let n = self.y.nrows();
        match regime {
            Regime::Train => Ok((0, self.train_len)),
            Regime::Val => {
                let start = self
                    .val_index_start
                    .ok_or(DataError::RegimeUndefined(Regime::Val))?;
                Ok((start, self.test_index_start.unwrap_or(n)))
            }
            Regime::Test => {
                let start = self
                    .test_index_start
                    .ok_or(DataError::RegimeUndefined(Regime::Test))?;
                Ok((start, n))
            }
        }
    }

    /// All features of a regime, or of the whole data set for `None`.
    pub fn get_all_x(&self, regime: Option<Regime>) -> Result<ArrayD<f64>, DataError> {
        let (start, end) = match regime {
            Some(r) => self.bounds(r)?,
            None => (0, self.y.nrows()),
        };
        Ok(self.x.slice_axis(Axis(0), (start..end).into()).to_owned())
    }

    /// All demand rows of a regime, or of the whole data set for `None`.
    pub fn get_all_y(&self, regime: Option<Regime>) -> Result<Array2<f64>, DataError> {
        let (start, end) = match regime {
            Some(r) => self.bounds(r)?,
            None => (0, self.y.nrows()),
        };
        Ok(self.y.slice(s![start..end, ..]).to_owned())
    }
}

impl DataLoader for XYDataLoader {
    fn regime(&self) -> Regime {
        self.regime.get()
    }

    fn set_regime(&self, regime: Regime) -> Result<(), DataError> {
        self.bounds(regime)?;
        self.regime.set(regime);
        Ok(())
    }

    fn len(&self) -> usize {
        self.y.nrows()
    }

    fn get(&self, idx: usize) -> Result<(ArrayD<f64>, Array1<f64>), DataError> {
        let regime = self.regime.get();
        let (start, end) = self.bounds(regime)?;
        let len = end - start;
        if idx >= len {
            return Err(DataError::IndexOutOfRange {
                index: idx,
                regime,
                len,
            });
        }
        let row = start + idx;
        Ok((
            self.x.index_axis(Axis(0), row).to_owned(),
            self.y.row(row).to_owned(),
        ))
    }

    fn x_shape(&self) -> Vec<usize> {
        self.x.shape().to_vec()
    }

    fn y_shape(&self) -> Vec<usize> {
        self.y.shape().to_vec()
    }

    fn len_train(&self) -> usize {
        self.train_len
    }

    fn len_val(&self) -> Result<usize, DataError> {
        let (start, end) = self.bounds(Regime::Val)?;
        Ok(end - start)
    }

    fn len_test(&self) -> Result<usize, DataError> {
        let (start, end) = self.bounds(Regime::Test)?;
        Ok(end - start)
    }

    fn num_units(&self) -> usize {
        self.y.ncols()
    }

    fn meta_learn_units(&self) -> bool {
        self.meta_learn_units
    }
}

/// Supervised-learning view over a shared loader. Its length follows the
/// loader's active regime.
#[derive(Clone)]
pub struct DatasetView {
    loader: Rc<dyn DataLoader>,
}

impl DatasetView {
    pub fn new(loader: Rc<dyn DataLoader>) -> Self {
        Self { loader }
    }

    pub fn len(&self) -> Result<usize, DataError> {
        self.loader.regime_len(self.loader.regime())
    }

    pub fn is_empty(&self) -> Result<bool, DataError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, idx: usize) -> Result<(ArrayD<f64>, Array1<f64>), DataError> {
        self.loader.get(idx)
    }

    pub fn regime(&self) -> Regime {
        self.loader.regime()
    }
}
