// src/simulation/newsvendor.rs

//! Single-period newsvendor environments.
//!
//! No inventory carries over between periods: each period the order is
//! compared against realised demand and the shortfall or leftover is charged
//! at the underage or overage cost.

use crate::error::{ConfigError, EnvError, Result};
use crate::io::dataloader::{DataLoader, Regime};
use crate::model::param::ParamInput;
use crate::model::spaces::{BoxSpace, Space};
use crate::simulation::config::{
    EvaluationMetric, NewsvendorConfig, SlDistribution, VariableSlConfig,
};
use crate::simulation::engine::{
    EnvCore, InventoryDynamics, InventoryEnv, Observation, StepInfo, Transition,
};
use crate::strategy::optimization::{critical_ratio, pinball_loss, quantile_loss};
use log::{info, warn};
use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};
use rand::Rng;
use std::collections::BTreeMap;
use std::rc::Rc;

fn full_info(demand: &Array1<f64>, action: &Array1<f64>, cost: &Array1<f64>) -> StepInfo {
    StepInfo {
        demand: Some(demand.clone()),
        action: Some(action.clone()),
        cost_per_sku: Some(cost.clone()),
        ..StepInfo::default()
    }
}

fn cost_derived_sl(core: &EnvCore) -> Result<Array1<f64>> {
    let cu = core.vector("underage_cost")?;
    let co = core.vector("overage_cost")?;
    Ok(Zip::from(&cu)
        .and(&co)
        .map_collect(|&u, &o| critical_ratio(u, o)))
}

fn is_uniform(values: &Array1<f64>) -> bool {
    values.iter().all(|v| Some(v) == values.iter().next())
}

/// Replaces the underage and/or overage cost and, where the environment
/// tracks one, the cost-derived service level.
///
/// Updating only one of the two costs keeps the other, which must then be
/// the same for every SKU.
fn update_cu_co(core: &mut EnvCore, cu: ParamInput, co: ParamInput) -> Result<()> {
    let shape = [core.num_units];
    let cu_given = !matches!(cu, ParamInput::None);
    let co_given = !matches!(co, ParamInput::None);

    if !core.params.is_set("underage_cost") || !core.params.is_set("overage_cost") {
        warn!("Underage and overage costs were not set previously, creating them.");
        core.params.set_param("underage_cost", cu, &shape, true)?;
        core.params.set_param("overage_cost", co, &shape, true)?;
    } else {
        match (cu_given, co_given) {
            (true, false) => {
                if !is_uniform(&core.vector("overage_cost")?) {
                    return Err(ConfigError::Incompatible(
                        "cannot update underage_cost alone while overage_cost differs across SKUs"
                            .to_string(),
                    )
                    .into());
                }
                core.params.set_param("underage_cost", cu, &shape, false)?;
            }
            (false, true) => {
                if !is_uniform(&core.vector("underage_cost")?) {
                    return Err(ConfigError::Incompatible(
                        "cannot update overage_cost alone while underage_cost differs across SKUs"
                            .to_string(),
                    )
                    .into());
                }
                core.params.set_param("overage_cost", co, &shape, false)?;
            }
            (true, true) => {
                core.params.set_param("underage_cost", cu, &shape, false)?;
                core.params.set_param("overage_cost", co, &shape, false)?;
            }
            (false, false) => {}
        }
    }

    if core.params.contains("sl")
        && core.params.is_set("underage_cost")
        && core.params.is_set("overage_cost")
    {
        let sl = cost_derived_sl(core)?;
        core.params.set_param("sl", sl, &shape, false)?;
    }
    Ok(())
}

fn register_bounds(
    core: &mut EnvCore,
    q_bound_low: &ParamInput,
    q_bound_high: &ParamInput,
) -> Result<()> {
    core.register("q_bound_low", q_bound_low.clone())?;
    core.register("q_bound_high", q_bound_high.clone())?;
    Ok(())
}

/// Classical newsvendor: pinball loss at the underage and overage costs.
#[derive(Debug, Clone, Default)]
pub struct Newsvendor;

impl InventoryDynamics for Newsvendor {
    fn observation_space(&self, _core: &EnvCore, feature_shape: &[usize]) -> Result<Space> {
        Ok(Space::Box(BoxSpace::uniform(
            feature_shape,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )))
    }

    fn observe(&mut self, _core: &mut EnvCore, features: ArrayD<f64>) -> Result<Observation> {
        Ok(Observation::Features(features))
    }

    fn transition(
        &mut self,
        core: &mut EnvCore,
        action: &Array1<f64>,
        demand: &Array1<f64>,
    ) -> Result<Transition> {
        let cu = core.vector("underage_cost")?;
        let co = core.vector("overage_cost")?;
        let cost = pinball_loss(demand.view(), action.view(), cu.view(), co.view());
        Ok(Transition {
            info: full_info(demand, action, &cost),
            cost_per_sku: cost,
        })
    }
}

pub type NewsvendorEnv = InventoryEnv<Newsvendor>;

impl InventoryEnv<Newsvendor> {
    pub fn from_config(dataloader: Rc<dyn DataLoader>, config: &NewsvendorConfig) -> Result<Self> {
        let mut core = EnvCore::new(dataloader, config.num_skus, config.seed)?;
        register_bounds(&mut core, &config.q_bound_low, &config.q_bound_high)?;
        core.register("underage_cost", config.underage_cost.clone())?;
        core.register("overage_cost", config.overage_cost.clone())?;
        InventoryEnv::new(core, Newsvendor, config.settings())
    }

    pub fn update_cu_co(
        &mut self,
        cu: impl Into<ParamInput>,
        co: impl Into<ParamInput>,
    ) -> Result<()> {
        update_cu_co(self.core_mut(), cu.into(), co.into())
    }
}

/// Newsvendor with a service level in the observation.
///
/// During training the cost is the quantile loss at the period's service
/// level, so one model can learn orders for any service level. Evaluation
/// uses the fixed `sl` parameter or the underage and overage costs.
#[derive(Debug, Clone)]
pub struct VariableServiceLevel {
    sl_distribution: SlDistribution,
    evaluation_metric: EvaluationMetric,
    skus_in_batch_dimension: bool,
    feature_shape: Vec<usize>,
    sl_period: Option<Array1<f64>>,
}

impl VariableServiceLevel {
    pub fn new(
        sl_distribution: SlDistribution,
        evaluation_metric: EvaluationMetric,
        skus_in_batch_dimension: bool,
    ) -> Self {
        Self {
            sl_distribution,
            evaluation_metric,
            skus_in_batch_dimension,
            feature_shape: Vec::new(),
            sl_period: None,
        }
    }

    /// Service level of the current period.
    pub fn sl_period(&self) -> Option<&Array1<f64>> {
        self.sl_period.as_ref()
    }

    fn draw_sl(&self, core: &mut EnvCore) -> Result<Array1<f64>> {
        // a fixed distribution trains on the evaluation level, no bounds involved
        if core.mode != Regime::Train || self.sl_distribution == SlDistribution::Fixed {
            return core.vector("sl");
        }
        let low = core.params.scalar("sl_bound_low")?;
        let high = core.params.scalar("sl_bound_high")?;
        let rng = &mut core.rng;
        Ok(Array1::from_shape_fn(core.num_units, |_| rng.gen_range(low..=high)))
    }
}

impl InventoryDynamics for VariableServiceLevel {
    fn observation_space(&self, core: &EnvCore, feature_shape: &[usize]) -> Result<Space> {
        let mut spaces = BTreeMap::new();
        let (features, service_level) = if self.skus_in_batch_dimension {
            let mut shape = vec![core.num_units];
            shape.extend_from_slice(feature_shape);
            (shape, vec![core.num_units, 1])
        } else {
            (feature_shape.to_vec(), vec![core.num_units])
        };
        spaces.insert(
            "features".to_string(),
            BoxSpace::uniform(&features, f64::NEG_INFINITY, f64::INFINITY),
        );
        spaces.insert(
            "service_level".to_string(),
            BoxSpace::uniform(&service_level, 0.0, 1.0),
        );
        Ok(Space::Dict(spaces))
    }

    fn reset(&mut self, core: &mut EnvCore) -> Result<()> {
        let x_shape = core.dataloader.x_shape();
        self.feature_shape = x_shape.get(1..).unwrap_or(&[]).to_vec();
        Ok(())
    }

    fn observe(&mut self, core: &mut EnvCore, features: ArrayD<f64>) -> Result<Observation> {
        let mut features = features;
        if core.mode != Regime::Train && core.dataloader.meta_learn_units() && features.ndim() > 1 {
            // unit axis comes last in val/test samples of meta-learning loaders
            let ndim = features.ndim();
            let mut axes = vec![ndim - 1];
            axes.extend(0..ndim - 1);
            features = features.permuted_axes(axes).as_standard_layout().to_owned();
        }
        if self.skus_in_batch_dimension && features.shape() == self.feature_shape.as_slice() {
            // one copy of shared features per SKU
            let mut shape = vec![core.num_units];
            shape.extend_from_slice(&self.feature_shape);
            if let Some(tiled) = features.broadcast(IxDyn(&shape)).map(|v| v.to_owned()) {
                features = tiled;
            }
        }

        let sl = self.draw_sl(core)?;
        let service_level = if self.skus_in_batch_dimension {
            sl.clone().insert_axis(Axis(1)).into_dyn()
        } else {
            sl.clone().into_dyn()
        };
        self.sl_period = Some(sl);

        let mut parts = BTreeMap::new();
        parts.insert("features".to_string(), features);
        parts.insert("service_level".to_string(), service_level);
        Ok(Observation::Composite(parts))
    }

    fn transition(
        &mut self,
        core: &mut EnvCore,
        action: &Array1<f64>,
        demand: &Array1<f64>,
    ) -> Result<Transition> {
        let cost = match (core.mode, self.evaluation_metric) {
            (Regime::Train, _) => {
                let sl = self.sl_period.as_ref().ok_or(EnvError::NoPendingDemand)?;
                quantile_loss(demand.view(), action.view(), sl.view())
            }
            (_, EvaluationMetric::PinballLoss) => {
                let cu = core.vector("underage_cost")?;
                let co = core.vector("overage_cost")?;
                pinball_loss(demand.view(), action.view(), cu.view(), co.view())
            }
            (_, EvaluationMetric::QuantileLoss) => {
                let sl = core.vector("sl")?;
                quantile_loss(demand.view(), action.view(), sl.view())
            }
        };
        Ok(Transition {
            info: full_info(demand, action, &cost),
            cost_per_sku: cost,
        })
    }
}

pub type VariableSlEnv = InventoryEnv<VariableServiceLevel>;

impl InventoryEnv<VariableServiceLevel> {
    pub fn from_config(dataloader: Rc<dyn DataLoader>, config: &VariableSlConfig) -> Result<Self> {
        config.validate()?;
        let mut core = EnvCore::new(dataloader, config.num_skus, config.seed)?;
        register_bounds(&mut core, &config.q_bound_low, &config.q_bound_high)?;
        core.register("underage_cost", config.underage_cost.clone())?;
        core.register("overage_cost", config.overage_cost.clone())?;
        core.params
            .set_param("sl_bound_low", config.sl_bound_low, &[1], true)?;
        core.params
            .set_param("sl_bound_high", config.sl_bound_high, &[1], true)?;

        if matches!(config.sl_test_val, ParamInput::None) {
            let sl = cost_derived_sl(&core)?;
            core.register("sl", sl)?;
        } else {
            core.register("sl", config.sl_test_val.clone())?;
        }
        check_service_levels(&core.vector("sl")?)?;

        let dynamics = VariableServiceLevel::new(
            config.sl_distribution,
            config.evaluation_metric,
            config.skus_in_batch_dimension,
        );
        info!(
            "Variable service level env: {:?} training draws, {:?} evaluation",
            config.sl_distribution, config.evaluation_metric
        );
        InventoryEnv::new(core, dynamics, config.settings())
    }

    pub fn update_cu_co(
        &mut self,
        cu: impl Into<ParamInput>,
        co: impl Into<ParamInput>,
    ) -> Result<()> {
        update_cu_co(self.core_mut(), cu.into(), co.into())
    }

    /// Replaces the service level used in val and test mode.
    pub fn set_val_test_sl(&mut self, sl: impl Into<ParamInput>) -> Result<()> {
        let sl = sl.into();
        let values = match &sl {
            ParamInput::Scalar(v) => Array1::from_elem(1, *v),
            ParamInput::Vector(v) => Array1::from(v.clone()),
            ParamInput::Array(a) => a.iter().copied().collect(),
            ParamInput::Shared(p) => p.value().iter().copied().collect(),
            ParamInput::None | ParamInput::Composite(_) => {
                return Err(ConfigError::InvalidValue {
                    field: "sl".to_string(),
                    message: "service level needs numeric values".to_string(),
                }
                .into());
            }
        };
        check_service_levels(&values)?;
        let shape = [self.num_units()];
        self.set_param("sl", sl, &shape, false)
    }
}

fn check_service_levels(sl: &Array1<f64>) -> Result<()> {
    if let Some(bad) = sl.iter().find(|v| !(0.0..=1.0).contains(*v)) {
        return Err(ConfigError::InvalidValue {
            field: "sl".to_string(),
            message: format!("service levels must lie in [0, 1], got {}", bad),
        }
        .into());
    }
    Ok(())
}
