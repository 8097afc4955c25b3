// src/simulation/config.rs

use crate::error::ConfigError;
use crate::io::dataloader::Regime;
use crate::model::param::ParamInput;
use crate::model::pipeline::PipelineConfig;
use serde::Deserialize;
use std::str::FromStr;

/// Episode length in train mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonTrain {
    /// One episode covers the whole training regime, starting at index 0.
    UseAllData,
    /// Rolling windows of fixed length with random starts.
    Fixed(usize),
}

/// How much per-step cost detail ends up in [`StepInfo`](super::engine::StepInfo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepInfoVerbosity {
    None,
    /// Cost breakdown (ordering, underage, holding).
    Costs,
    /// Cost breakdown plus demand, action and cost per SKU.
    Full,
}

impl Default for StepInfoVerbosity {
    fn default() -> Self {
        StepInfoVerbosity::None
    }
}

/// Service level drawn per period during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlDistribution {
    /// No draw: training uses the evaluation `sl` parameter every period.
    Fixed,
    /// Draw per unit in `[sl_bound_low, sl_bound_high]`.
    Uniform,
}

impl FromStr for SlDistribution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(SlDistribution::Fixed),
            "uniform" => Ok(SlDistribution::Uniform),
            other => Err(ConfigError::UnknownVariant {
                kind: "sl_distribution",
                value: other.to_string(),
            }),
        }
    }
}

/// Cost charged in val and test mode by the variable service level env.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMetric {
    /// Uses the underage and overage costs.
    PinballLoss,
    /// Uses the service level only.
    QuantileLoss,
}

impl FromStr for EvaluationMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pinball_loss" => Ok(EvaluationMetric::PinballLoss),
            "quantile_loss" => Ok(EvaluationMetric::QuantileLoss),
            other => Err(ConfigError::UnknownVariant {
                kind: "evaluation_metric",
                value: other.to_string(),
            }),
        }
    }
}

/// Settings shared by every inventory environment, extracted from the
/// per-environment configs.
#[derive(Debug, Clone)]
pub struct EnvSettings {
    pub gamma: f64,
    pub horizon_train: HorizonTrain,
    pub mode: Regime,
    pub return_truncation: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsvendorConfig {
    pub underage_cost: ParamInput,
    pub overage_cost: ParamInput,
    pub q_bound_low: ParamInput,
    pub q_bound_high: ParamInput,
    /// Inferred from the data loader when absent.
    pub num_skus: Option<usize>,
    pub gamma: f64,
    pub horizon_train: HorizonTrain,
    pub mode: Regime,
    pub return_truncation: bool,
    pub seed: Option<u64>,
}

impl Default for NewsvendorConfig {
    fn default() -> Self {
        Self {
            underage_cost: ParamInput::Scalar(1.0),
            overage_cost: ParamInput::Scalar(1.0),
            q_bound_low: ParamInput::Scalar(0.0),
            q_bound_high: ParamInput::Scalar(f64::INFINITY),
            num_skus: None,
            gamma: 1.0,
            horizon_train: HorizonTrain::UseAllData,
            mode: Regime::Train,
            return_truncation: true,
            seed: None,
        }
    }
}

impl NewsvendorConfig {
    pub fn settings(&self) -> EnvSettings {
        EnvSettings {
            gamma: self.gamma,
            horizon_train: self.horizon_train,
            mode: self.mode,
            return_truncation: self.return_truncation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VariableSlConfig {
    pub sl_bound_low: f64,
    pub sl_bound_high: f64,
    pub sl_distribution: SlDistribution,
    pub evaluation_metric: EvaluationMetric,
    /// Evaluation service level. Only valid when both costs are unset.
    pub sl_test_val: ParamInput,
    /// Observations carry one row of features per SKU and a single
    /// service level, for models that treat SKUs as batch entries.
    pub skus_in_batch_dimension: bool,
    pub underage_cost: ParamInput,
    pub overage_cost: ParamInput,
    pub q_bound_low: ParamInput,
    pub q_bound_high: ParamInput,
    pub num_skus: Option<usize>,
    pub gamma: f64,
    pub horizon_train: HorizonTrain,
    pub mode: Regime,
    pub return_truncation: bool,
    pub seed: Option<u64>,
}

impl Default for VariableSlConfig {
    fn default() -> Self {
        Self {
            sl_bound_low: 0.1,
            sl_bound_high: 0.9,
            sl_distribution: SlDistribution::Fixed,
            evaluation_metric: EvaluationMetric::QuantileLoss,
            sl_test_val: ParamInput::None,
            skus_in_batch_dimension: true,
            underage_cost: ParamInput::Scalar(1.0),
            overage_cost: ParamInput::Scalar(1.0),
            q_bound_low: ParamInput::Scalar(0.0),
            q_bound_high: ParamInput::Scalar(f64::INFINITY),
            num_skus: None,
            gamma: 1.0,
            horizon_train: HorizonTrain::UseAllData,
            mode: Regime::Train,
            return_truncation: true,
            seed: None,
        }
    }
}

impl VariableSlConfig {
    pub fn settings(&self) -> EnvSettings {
        EnvSettings {
            gamma: self.gamma,
            horizon_train: self.horizon_train,
            mode: self.mode,
            return_truncation: self.return_truncation,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.sl_bound_low)
            || !(0.0..=1.0).contains(&self.sl_bound_high)
            || self.sl_bound_low > self.sl_bound_high
        {
            return Err(ConfigError::InvalidValue {
                field: "sl_bound_low/sl_bound_high".to_string(),
                message: format!(
                    "need 0 <= low <= high <= 1, got {} and {}",
                    self.sl_bound_low, self.sl_bound_high
                ),
            });
        }
        let costs_unset = matches!(self.underage_cost, ParamInput::None)
            && matches!(self.overage_cost, ParamInput::None);
        let costs_set = !matches!(self.underage_cost, ParamInput::None)
            && !matches!(self.overage_cost, ParamInput::None);
        let sl_given = !matches!(self.sl_test_val, ParamInput::None);

        if sl_given && !costs_unset {
            return Err(ConfigError::Incompatible(
                "sl_test_val can only be used when underage_cost and overage_cost are unset"
                    .to_string(),
            ));
        }
        if !sl_given && !costs_set {
            return Err(ConfigError::Incompatible(
                "either sl_test_val or both underage_cost and overage_cost must be given"
                    .to_string(),
            ));
        }
        if self.evaluation_metric == EvaluationMetric::PinballLoss && !costs_set {
            return Err(ConfigError::Incompatible(
                "pinball loss evaluation needs underage_cost and overage_cost".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MultiPeriodConfig {
    pub underage_cost: ParamInput,
    pub overage_cost: ParamInput,
    /// Charged per SKU whenever its order is positive.
    pub fixed_ordering_cost: ParamInput,
    pub variable_ordering_cost: ParamInput,
    pub holding_cost: ParamInput,
    pub start_inventory: ParamInput,
    pub max_inventory: ParamInput,
    pub pipeline: PipelineConfig,
    pub q_bound_low: ParamInput,
    pub q_bound_high: ParamInput,
    pub num_skus: Option<usize>,
    pub gamma: f64,
    pub horizon_train: HorizonTrain,
    pub mode: Regime,
    pub return_truncation: bool,
    pub step_info_verbosity: StepInfoVerbosity,
    pub seed: Option<u64>,
}

impl Default for MultiPeriodConfig {
    fn default() -> Self {
        Self {
            underage_cost: ParamInput::Scalar(1.0),
            overage_cost: ParamInput::Scalar(0.0),
            fixed_ordering_cost: ParamInput::Scalar(0.0),
            variable_ordering_cost: ParamInput::Scalar(0.0),
            holding_cost: ParamInput::Scalar(1.0),
            start_inventory: ParamInput::Scalar(0.0),
            max_inventory: ParamInput::Scalar(f64::INFINITY),
            pipeline: PipelineConfig::default(),
            q_bound_low: ParamInput::Scalar(0.0),
            q_bound_high: ParamInput::Scalar(f64::INFINITY),
            num_skus: None,
            gamma: 1.0,
            horizon_train: HorizonTrain::Fixed(100),
            mode: Regime::Train,
            return_truncation: true,
            step_info_verbosity: StepInfoVerbosity::None,
            seed: None,
        }
    }
}

impl MultiPeriodConfig {
    pub fn settings(&self) -> EnvSettings {
        EnvSettings {
            gamma: self.gamma,
            horizon_train: self.horizon_train,
            mode: self.mode,
            return_truncation: self.return_truncation,
        }
    }
}
