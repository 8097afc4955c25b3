// src/strategy/processors.rs

//! Action post-processors (bound clipping, rounding to order units, moving a
//! batch axis to the product axis) and observation processors that turn
//! composite observations into flat model inputs.

use crate::error::{ActionError, ObservationError};
use crate::simulation::engine::Observation;
use crate::strategy::traits::{ActionProcessor, ObservationProcessor};
use ndarray::{concatenate, Array1, Array2, Array3, ArrayD, ArrayViewD, Axis, IxDyn, Zip};

fn single_or_matching(bound: &ArrayD<f64>, input: &ArrayD<f64>) -> bool {
    bound.len() == 1 || bound.shape() == input.shape()
}

/// Applies `f(value, bound)` elementwise, broadcasting a single-element bound.
fn apply_bound(input: &mut ArrayD<f64>, bound: &ArrayD<f64>, f: impl Fn(f64, f64) -> f64) {
    if bound.shape() == input.shape() {
        Zip::from(input).and(bound).for_each(|v, &b| *v = f(*v, b));
    } else if let Some(&b) = bound.iter().next() {
        input.mapv_inplace(|v| f(v, b));
    }
}

/// Clips actions into `[lower, upper]`. Missing bounds are not applied.
///
/// Bounds are either a single value for every element or an array of the
/// action's shape.
#[derive(Debug, Clone, Default)]
pub struct ClipAction {
    lower: Option<ArrayD<f64>>,
    upper: Option<ArrayD<f64>>,
}

impl ClipAction {
    pub fn new(lower: Option<ArrayD<f64>>, upper: Option<ArrayD<f64>>) -> Self {
        Self { lower, upper }
    }

    pub fn scalar(lower: Option<f64>, upper: Option<f64>) -> Self {
        let wrap = |v: f64| ArrayD::from_elem(IxDyn(&[1]), v);
        Self {
            lower: lower.map(wrap),
            upper: upper.map(wrap),
        }
    }
}

impl ActionProcessor for ClipAction {
    fn process(&self, action: ArrayD<f64>) -> Result<ArrayD<f64>, ActionError> {
        let mut out = action;
        if let Some(lower) = &self.lower {
            if !single_or_matching(lower, &out) {
                return Err(ActionError::BoundShape { bound: "Lower" });
            }
        }
        if let Some(upper) = &self.upper {
            if !single_or_matching(upper, &out) {
                return Err(ActionError::BoundShape { bound: "Upper" });
            }
        }
        if let Some(lower) = &self.lower {
            apply_bound(&mut out, lower, f64::max);
        }
        if let Some(upper) = &self.upper {
            apply_bound(&mut out, upper, f64::min);
        }
        Ok(out)
    }
}

/// Rounds actions to the nearest multiple of a unit size (10, 1, 0.25, ...).
#[derive(Debug, Clone)]
pub struct RoundAction {
    unit_size: ArrayD<f64>,
}

impl RoundAction {
    pub fn new(unit_size: ArrayD<f64>) -> Result<Self, ActionError> {
        if let Some(&bad) = unit_size.iter().find(|u| !(**u > 0.0)) {
            return Err(ActionError::NonPositiveUnitSize(bad));
        }
        Ok(Self { unit_size })
    }

    pub fn scalar(unit_size: f64) -> Result<Self, ActionError> {
        Self::new(ArrayD::from_elem(IxDyn(&[1]), unit_size))
    }
}

impl ActionProcessor for RoundAction {
    fn process(&self, action: ArrayD<f64>) -> Result<ArrayD<f64>, ActionError> {
        if !single_or_matching(&self.unit_size, &action) {
            return Err(ActionError::UnitSizeShape);
        }
        let mut out = action;
        apply_bound(&mut out, &self.unit_size, |v, unit| (v / unit).round() * unit);
        Ok(out)
    }
}

/// Moves the leading (batch) axis to the end, for models that predict units
/// as batch entries while the environment expects units last.
#[derive(Debug, Clone, Default)]
pub struct MoveBatchToProductDim {
    /// Drop the per-unit action axis when it has length one.
    remove_action_per_unit_dim: bool,
}

impl MoveBatchToProductDim {
    pub fn new(remove_action_per_unit_dim: bool) -> Self {
        Self {
            remove_action_per_unit_dim,
        }
    }
}

impl ActionProcessor for MoveBatchToProductDim {
    fn process(&self, action: ArrayD<f64>) -> Result<ArrayD<f64>, ActionError> {
        let ndim = action.ndim();
        if ndim < 2 {
            return Err(ActionError::TooFewDims(ndim));
        }
        let mut axes: Vec<usize> = (1..ndim).collect();
        axes.push(0);
        let out = action.permuted_axes(axes).as_standard_layout().to_owned();

        if !self.remove_action_per_unit_dim {
            return Ok(out);
        }
        if out.ndim() > 2 {
            return Err(ActionError::CannotRemoveActionDim(
                "an array of shape (actions per unit, units)",
            ));
        }
        if out.shape()[0] != 1 {
            return Err(ActionError::CannotRemoveActionDim("one action per unit"));
        }
        Ok(out.index_axis_move(Axis(0), 0))
    }
}

fn parts(observation: &Observation) -> Vec<(&str, &ArrayD<f64>)> {
    match observation {
        Observation::Features(f) => vec![("features", f)],
        Observation::Composite(p) => p.iter().map(|(k, v)| (k.as_str(), v)).collect(),
    }
}

fn features_of(observation: &Observation) -> Result<&ArrayD<f64>, ObservationError> {
    observation
        .features()
        .ok_or_else(|| ObservationError::MissingKey("features".to_string()))
}

fn reshape(input: &ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>, ObservationError> {
    ArrayD::from_shape_vec(IxDyn(shape), input.iter().copied().collect()).map_err(|_| {
        ObservationError::Dims {
            expected: "one with a matching number of elements",
            got: input.shape().to_vec(),
        }
    })
}

/// Views a part as `(periods, columns)`; a vector is one column.
fn time_matrix(value: &ArrayD<f64>) -> Result<Array2<f64>, ObservationError> {
    let (periods, columns) = match value.shape() {
        [t] => (*t, 1),
        [t, c] => (*t, *c),
        other => {
            return Err(ObservationError::Dims {
                expected: "(periods,) or (periods, columns)",
                got: other.to_vec(),
            })
        }
    };
    let data: Vec<f64> = value.iter().copied().collect();
    Array2::from_shape_vec((periods, columns), data).map_err(|_| ObservationError::Dims {
        expected: "(periods, columns)",
        got: value.shape().to_vec(),
    })
}

/// Joins parts that share their leading time axis along the column axis.
fn join_time_series(parts: &[(&str, &ArrayD<f64>)]) -> Result<Array2<f64>, ObservationError> {
    let mut matrices = Vec::with_capacity(parts.len());
    for (key, value) in parts {
        let matrix = time_matrix(value)?;
        if let Some(first) = matrices.first().map(|m: &Array2<f64>| m.nrows()) {
            if matrix.nrows() != first {
                return Err(ObservationError::TimeDimMismatch {
                    key: key.to_string(),
                    expected: first,
                    got: matrix.nrows(),
                });
            }
        }
        matrices.push(matrix);
    }
    if matrices.is_empty() {
        return Ok(Array2::zeros((0, 0)));
    }
    let views: Vec<_> = matrices.iter().map(|m| m.view()).collect();
    concatenate(Axis(1), &views).map_err(|_| ObservationError::Config("parts cannot be joined"))
}

/// Flattens the time and feature axes of the features, keeping an optional
/// leading batch axis. For models without a notion of time (MLPs,
/// regressions) fed from a lag window.
#[derive(Debug, Clone, Copy)]
pub struct FlattenTimeDim {
    /// Pass inputs that already lack the time axis through unchanged.
    allow_2d: bool,
    batch_dim_included: bool,
}

impl FlattenTimeDim {
    pub fn new(allow_2d: bool, batch_dim_included: bool) -> Self {
        Self {
            allow_2d,
            batch_dim_included,
        }
    }

    pub fn flatten(&self, input: &ArrayD<f64>) -> Result<ArrayD<f64>, ObservationError> {
        let (full, expected) = if self.batch_dim_included {
            (3, "(batch, periods, features)")
        } else {
            (2, "(periods, features)")
        };
        match input.ndim() {
            n if n == full => {}
            n if n + 1 == full && self.allow_2d => return Ok(input.clone()),
            _ => {
                return Err(ObservationError::Dims {
                    expected,
                    got: input.shape().to_vec(),
                })
            }
        }
        if self.batch_dim_included {
            let batch = input.shape()[0];
            reshape(input, &[batch, input.len() / batch.max(1)])
        } else {
            reshape(input, &[input.len()])
        }
    }
}

impl Default for FlattenTimeDim {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl ObservationProcessor for FlattenTimeDim {
    fn process(&self, observation: &Observation) -> Result<ArrayD<f64>, ObservationError> {
        self.flatten(features_of(observation)?)
    }
}

/// Converts a composite observation into one array, visiting parts in key
/// order.
///
/// By default every part is flattened and concatenated into a vector. With
/// `keep_time_dim` each part is read as `(periods, columns)` and the parts
/// are joined column-wise, so all of them must cover the same periods.
/// Naming `time_series_keys` keeps only those parts as time series; the rest
/// is flattened and appended (see [`ConvertDictSpace::split`]).
#[derive(Debug, Clone, Default)]
pub struct ConvertDictSpace {
    keep_time_dim: bool,
    time_series_keys: Option<Vec<String>>,
}

impl ConvertDictSpace {
    pub fn new(
        keep_time_dim: bool,
        time_series_keys: Option<Vec<String>>,
    ) -> Result<Self, ObservationError> {
        if !keep_time_dim && time_series_keys.is_some() {
            return Err(ObservationError::Config(
                "time series keys require keep_time_dim",
            ));
        }
        Ok(Self {
            keep_time_dim,
            time_series_keys,
        })
    }

    /// Time-series parts joined column-wise, and all other parts flattened.
    pub fn split(
        &self,
        observation: &Observation,
    ) -> Result<(Array2<f64>, Array1<f64>), ObservationError> {
        let keys = self.time_series_keys.as_deref().unwrap_or(&[]);
        let all = parts(observation);
        if let Some(missing) = keys.iter().find(|k| !all.iter().any(|(p, _)| p == k)) {
            return Err(ObservationError::MissingKey(missing.clone()));
        }
        let (series, rest): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|(k, _)| keys.iter().any(|s| s == k));
        let series = join_time_series(&series)?;
        let rest = rest.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        Ok((series, rest))
    }
}

impl ObservationProcessor for ConvertDictSpace {
    fn process(&self, observation: &Observation) -> Result<ArrayD<f64>, ObservationError> {
        if self.time_series_keys.is_some() {
            let (series, rest) = self.split(observation)?;
            let flat: Array1<f64> = series.iter().chain(rest.iter()).copied().collect();
            return Ok(flat.into_dyn());
        }
        let parts = parts(observation);
        if self.keep_time_dim {
            return Ok(join_time_series(&parts)?.into_dyn());
        }
        let flat: Array1<f64> = parts.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        Ok(flat.into_dyn())
    }
}

/// Appends every non-feature part (service level, inventory, ...) to the
/// features.
///
/// Without a batch axis, a vector part is appended to flat features, or
/// repeated on every period of `(periods, features)`. With `receive_batch_dim`
/// a part holds one value (or row) per batch entry, or a single one shared by
/// all entries, and is added as extra feature columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddParamsToFeatures {
    keep_time_dim: bool,
    receive_batch_dim: bool,
}

impl AddParamsToFeatures {
    pub fn new(keep_time_dim: bool, receive_batch_dim: bool) -> Self {
        Self {
            keep_time_dim,
            receive_batch_dim,
        }
    }

    fn append(
        &self,
        features: ArrayD<f64>,
        key: &str,
        value: &ArrayD<f64>,
    ) -> Result<ArrayD<f64>, ObservationError> {
        let (feature_shape, value_shape) = (features.shape().to_vec(), value.shape().to_vec());
        let mismatch = || ObservationError::ShapeMismatch {
            key: key.to_string(),
            features: feature_shape.clone(),
            got: value_shape.clone(),
        };

        if features.ndim() == 1 && value.ndim() == 1 {
            return concatenate(Axis(0), &[features.view(), value.view()]).map_err(|_| mismatch());
        }
        let rows = features.shape().first().copied().unwrap_or(0);
        let extra = if self.receive_batch_dim || value.ndim() > 1 {
            per_row(value.view(), rows)
        } else {
            per_row(value.view().insert_axis(Axis(0)), rows)
        }
        .ok_or_else(mismatch)?;

        match features.ndim() {
            2 => {
                let extra = extra.into_dyn();
                concatenate(Axis(1), &[features.view(), extra.view()]).map_err(|_| mismatch())
            }
            3 if self.receive_batch_dim => {
                let periods = features.shape()[1];
                let tiled = Array3::from_shape_fn((rows, periods, extra.ncols()), |(b, _, c)| {
                    extra[[b, c]]
                })
                .into_dyn();
                concatenate(Axis(2), &[features.view(), tiled.view()]).map_err(|_| mismatch())
            }
            _ => Err(mismatch()),
        }
    }
}

/// Expands a `(n,)` or `(n, k)` part to `(rows, k)`, repeating a single row.
fn per_row(value: ArrayViewD<f64>, rows: usize) -> Option<Array2<f64>> {
    let (n, k) = match value.shape() {
        [n] => (*n, 1),
        [n, k] => (*n, *k),
        _ => return None,
    };
    if n != rows && n != 1 {
        return None;
    }
    let data: Vec<f64> = value.iter().copied().collect();
    Some(Array2::from_shape_fn((rows, k), |(r, c)| {
        let row = if n == 1 { 0 } else { r };
        data[row * k + c]
    }))
}

impl ObservationProcessor for AddParamsToFeatures {
    fn process(&self, observation: &Observation) -> Result<ArrayD<f64>, ObservationError> {
        let raw = features_of(observation)?;
        let mut features = match (self.keep_time_dim, self.receive_batch_dim) {
            (false, true) if raw.ndim() == 3 => {
                let batch = raw.shape()[0];
                reshape(raw, &[batch, raw.len() / batch.max(1)])?
            }
            (false, false) => reshape(raw, &[raw.len()])?,
            _ => raw.clone(),
        };
        if let Observation::Composite(parts) = observation {
            for (key, value) in parts.iter().filter(|(k, _)| k.as_str() != "features") {
                features = self.append(features, key, value)?;
            }
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dataloader::{DataLoader, LagWindowParams, XYDataLoader};
    use crate::model::pipeline::PipelineConfig;
    use crate::simulation::config::{
        HorizonTrain, MultiPeriodConfig, SlDistribution, VariableSlConfig,
    };
    use crate::simulation::engine::{InventoryEnvironment, StartIndex};
    use crate::simulation::multi_period::MultiPeriodEnv;
    use crate::simulation::newsvendor::VariableSlEnv;
    use ndarray::{array, s};
    use std::rc::Rc;

    #[test]
    fn clip_with_scalar_and_array_bounds() {
        let clip = ClipAction::scalar(Some(0.0), Some(10.0));
        let out = clip.process(array![-3.0, 4.0, 12.0].into_dyn()).unwrap();
        assert_eq!(out, array![0.0, 4.0, 10.0].into_dyn());

        let per_unit = ClipAction::new(None, Some(array![1.0, 2.0, 3.0].into_dyn()));
        let out = per_unit.process(array![5.0, 5.0, -5.0].into_dyn()).unwrap();
        assert_eq!(out, array![1.0, 2.0, -5.0].into_dyn());
    }

    #[test]
    fn clip_rejects_mismatched_bounds() {
        let clip = ClipAction::new(Some(array![0.0, 0.0].into_dyn()), None);
        let err = clip.process(array![1.0, 2.0, 3.0].into_dyn()).unwrap_err();
        assert_eq!(err, ActionError::BoundShape { bound: "Lower" });
    }

    #[test]
    fn round_to_unit_size() {
        let round = RoundAction::scalar(5.0).unwrap();
        let out = round.process(array![7.0, 8.0, 12.4].into_dyn()).unwrap();
        assert_eq!(out, array![5.0, 10.0, 10.0].into_dyn());

        let fine = RoundAction::scalar(0.25).unwrap();
        let out = fine.process(array![1.1, 1.9].into_dyn()).unwrap();
        assert_eq!(out, array![1.0, 2.0].into_dyn());
    }

    #[test]
    fn round_rejects_non_positive_units() {
        assert_eq!(
            RoundAction::scalar(0.0).unwrap_err(),
            ActionError::NonPositiveUnitSize(0.0)
        );
        let round = RoundAction::new(array![1.0, 2.0].into_dyn()).unwrap();
        assert_eq!(
            round.process(array![1.0, 2.0, 3.0].into_dyn()).unwrap_err(),
            ActionError::UnitSizeShape
        );
    }

    #[test]
    fn move_batch_axis_last() {
        // three units predicted as batch entries with one action each
        let action = array![[1.0], [2.0], [3.0]].into_dyn();
        let out = MoveBatchToProductDim::new(false).process(action.clone()).unwrap();
        assert_eq!(out.shape(), &[1, 3]);

        let out = MoveBatchToProductDim::new(true).process(action).unwrap();
        assert_eq!(out, array![1.0, 2.0, 3.0].into_dyn());
    }

    #[test]
    fn move_batch_axis_errors() {
        let p = MoveBatchToProductDim::new(true);
        assert_eq!(
            p.process(array![1.0, 2.0].into_dyn()).unwrap_err(),
            ActionError::TooFewDims(1)
        );
        assert!(matches!(
            p.process(array![[1.0, 2.0], [3.0, 4.0]].into_dyn()),
            Err(ActionError::CannotRemoveActionDim(_))
        ));
        assert!(matches!(
            p.process(ArrayD::zeros(IxDyn(&[2, 1, 1]))),
            Err(ActionError::CannotRemoveActionDim(_))
        ));
    }

    #[test]
    fn closures_are_processors() {
        let double = |a: ArrayD<f64>| -> Result<ArrayD<f64>, ActionError> { Ok(a * 2.0) };
        let out = double.process(array![1.5].into_dyn()).unwrap();
        assert_eq!(out, array![3.0].into_dyn());
    }

    /// Two units with constant demand 3 and two features, optionally lagged.
    fn two_unit_loader(lag_window: Option<usize>) -> Rc<dyn DataLoader> {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| (10 * j + i) as f64);
        let y = Array2::from_elem((12, 2), 3.0);
        let lag = LagWindowParams {
            lag_window,
            include_y: false,
        };
        Rc::new(XYDataLoader::with_lag_window(x, y, None, None, &lag).unwrap())
    }

    fn multi_period_observation(lag_window: Option<usize>) -> Observation {
        let config = MultiPeriodConfig {
            pipeline: PipelineConfig::fixed(3),
            start_inventory: 4.0.into(),
            horizon_train: HorizonTrain::UseAllData,
            seed: Some(1),
            ..MultiPeriodConfig::default()
        };
        let mut env = MultiPeriodEnv::from_config(two_unit_loader(lag_window), &config).unwrap();
        env.reset(StartIndex::At(0)).unwrap();
        env.step(array![5.0, 6.0].into_dyn())
            .unwrap()
            .observation
            .unwrap()
    }

    fn service_level_observation(lag_window: Option<usize>, skus_in_batch: bool) -> Observation {
        let config = VariableSlConfig {
            sl_distribution: SlDistribution::Fixed,
            underage_cost: 3.0.into(),
            overage_cost: 1.0.into(),
            skus_in_batch_dimension: skus_in_batch,
            seed: Some(2),
            ..VariableSlConfig::default()
        };
        let mut env = VariableSlEnv::from_config(two_unit_loader(lag_window), &config).unwrap();
        env.reset(StartIndex::At(0)).unwrap()
    }

    #[test]
    fn dict_space_flattens_parts_in_key_order() {
        let observation = multi_period_observation(None);
        let features = observation.features().unwrap().clone();
        let out = ConvertDictSpace::default().process(&observation).unwrap();

        // features, inventory, then the (3, 2) pipeline row by row
        assert_eq!(out.shape(), &[10]);
        assert_eq!(out.slice(&s![..2][..]), features);
        assert_eq!(out.slice(&s![2..4][..]), array![1.0, 1.0].into_dyn());
        assert_eq!(out.slice(&s![4..][..]), array![0.0, 0.0, 0.0, 0.0, 5.0, 6.0].into_dyn());
        assert_eq!(
            ConvertDictSpace::default()
                .output_shape(&observation)
                .unwrap(),
            vec![10]
        );
    }

    #[test]
    fn dict_space_keeps_selected_time_series() {
        let observation = multi_period_observation(None);
        let keys = Some(vec!["order_pipeline".to_string()]);
        let convert = ConvertDictSpace::new(true, keys).unwrap();

        let (series, rest) = convert.split(&observation).unwrap();
        assert_eq!(series, array![[0.0, 0.0], [0.0, 0.0], [5.0, 6.0]]);
        assert_eq!(rest.len(), 4);
        assert_eq!(rest.slice(s![2..]), array![1.0, 1.0]);

        let flat = convert.process(&observation).unwrap();
        assert_eq!(flat.len(), 10);
        assert_eq!(flat.slice(&s![4..6][..]), array![5.0, 6.0].into_dyn());
    }

    #[test]
    fn dict_space_checks_time_axes_and_keys() {
        let observation = multi_period_observation(None);
        let err = ConvertDictSpace::new(true, None)
            .unwrap()
            .process(&observation)
            .unwrap_err();
        assert_eq!(
            err,
            ObservationError::TimeDimMismatch {
                key: "order_pipeline".to_string(),
                expected: 2,
                got: 3
            }
        );

        let missing = ConvertDictSpace::new(true, Some(vec!["demand".to_string()])).unwrap();
        assert_eq!(
            missing.process(&observation).unwrap_err(),
            ObservationError::MissingKey("demand".to_string())
        );
        assert!(matches!(
            ConvertDictSpace::new(false, Some(vec![])),
            Err(ObservationError::Config(_))
        ));
    }

    #[test]
    fn flatten_time_dim_of_lagged_features() {
        let observation = multi_period_observation(Some(2));
        let features = observation.features().unwrap().clone();
        assert_eq!(features.shape(), &[3, 2]);

        let out = FlattenTimeDim::new(false, false)
            .process(&observation)
            .unwrap();
        assert_eq!(out.shape(), &[6]);
        assert_eq!(out, reshape(&features, &[6]).unwrap());

        // a single sample lacks the batch axis
        assert!(matches!(
            FlattenTimeDim::default().process(&observation),
            Err(ObservationError::Dims { .. })
        ));
        let passthrough = FlattenTimeDim::new(true, true).process(&observation).unwrap();
        assert_eq!(passthrough, features);

        let batch = ArrayD::zeros(IxDyn(&[4, 3, 2]));
        assert_eq!(FlattenTimeDim::default().flatten(&batch).unwrap().shape(), &[4, 6]);
    }

    #[test]
    fn params_are_appended_to_flat_features() {
        let observation = service_level_observation(None, false);
        let features = observation.features().unwrap().clone();
        let out = AddParamsToFeatures::default().process(&observation).unwrap();
        assert_eq!(out.shape(), &[4]);
        assert_eq!(out.slice(&s![..2][..]), features);
        assert_eq!(out.slice(&s![2..][..]), array![0.75, 0.75].into_dyn());
    }

    #[test]
    fn params_become_columns_per_sku_or_period() {
        // one row of features per SKU, one service level per row
        let batched = service_level_observation(None, true);
        assert_eq!(batched.features().unwrap().shape(), &[2, 2]);
        let out = AddParamsToFeatures::new(true, true).process(&batched).unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(out.slice(&s![.., 2][..]), array![0.75, 0.75].into_dyn());

        // lagged features keep their periods, the service levels repeat
        let lagged = service_level_observation(Some(2), false);
        let out = AddParamsToFeatures::new(true, false).process(&lagged).unwrap();
        assert_eq!(out.shape(), &[3, 4]);
        assert_eq!(out.slice(&s![2, 2..][..]), array![0.75, 0.75].into_dyn());
        let flat = AddParamsToFeatures::new(false, false).process(&lagged).unwrap();
        assert_eq!(flat.shape(), &[8]);
    }

    #[test]
    fn params_of_unrelated_shape_are_rejected() {
        let observation = multi_period_observation(None);
        let err = AddParamsToFeatures::default()
            .process(&observation)
            .unwrap_err();
        assert_eq!(
            err,
            ObservationError::ShapeMismatch {
                key: "order_pipeline".to_string(),
                features: vec![4],
                got: vec![3, 2],
            }
        );
    }
}
