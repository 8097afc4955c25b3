// src/simulation/engine.rs

//! The episodic state machine shared by every inventory environment.
//!
//! An [`InventoryEnv`] walks an index over the active regime of its data
//! loader. `reset` picks a start index and an episode window, `step` charges
//! the cost of an action against the demand fetched one call earlier and
//! advances the index. What an observation looks like and how costs are
//! charged is delegated to an [`InventoryDynamics`] strategy.

use crate::error::{ActionError, ConfigError, EnvError, Result};
use crate::io::dataloader::{DataLoader, Regime};
use crate::model::param::{ParamInput, ParamStore};
use crate::model::spaces::{BoxSpace, MDPInfo, Space};
use crate::simulation::config::{EnvSettings, HorizonTrain};
use crate::strategy::traits::ActionProcessor;
use log::{debug, info};
use ndarray::{Array1, ArrayD, Axis, Ix1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::rc::Rc;

/// What the environment shows the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Features(ArrayD<f64>),
    /// Named parts, e.g. `features`, `order_pipeline`, `inventory`.
    Composite(BTreeMap<String, ArrayD<f64>>),
}

impl Observation {
    /// The data loader features, whatever the observation layout.
    pub fn features(&self) -> Option<&ArrayD<f64>> {
        match self {
            Observation::Features(f) => Some(f),
            Observation::Composite(parts) => parts.get("features"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ArrayD<f64>> {
        match self {
            Observation::Features(_) => None,
            Observation::Composite(parts) => parts.get(key),
        }
    }
}

/// Per-step diagnostics. Which fields are filled depends on the environment
/// and its verbosity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    pub demand: Option<Array1<f64>>,
    pub action: Option<Array1<f64>>,
    pub cost_per_sku: Option<Array1<f64>>,
    pub variable_ordering_cost: Option<Array1<f64>>,
    pub fixed_ordering_cost: Option<Array1<f64>>,
    pub underage_cost: Option<Array1<f64>>,
    pub holding_cost: Option<Array1<f64>>,
}

/// Result of one call to `step`.
#[derive(Debug, Clone)]
pub struct Step {
    /// `None` once a val or test episode is exhausted.
    pub observation: Option<Observation>,
    pub reward: f64,
    /// Always false: the problem family has no terminal state.
    pub terminated: bool,
    /// `None` when the environment was told not to report truncation.
    pub truncated: Option<bool>,
    pub info: StepInfo,
}

/// Where `reset` starts the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartIndex {
    /// Index 0, except for fixed-horizon training which starts at random.
    Auto,
    At(usize),
    /// Uniform over the training regime. Only valid in train mode.
    Random,
}

impl Default for StartIndex {
    fn default() -> Self {
        StartIndex::Auto
    }
}

/// Cost and per-unit result of one transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub cost_per_sku: Array1<f64>,
    pub info: StepInfo,
}

/// State every dynamics strategy may read or write: parameters, the shared
/// data loader, the current mode and the random source.
pub struct EnvCore {
    pub params: ParamStore,
    pub dataloader: Rc<dyn DataLoader>,
    pub num_units: usize,
    pub mode: Regime,
    pub rng: StdRng,
}

impl EnvCore {
    /// `num_skus` defaults to the loader's unit count and must agree with it.
    pub fn new(
        dataloader: Rc<dyn DataLoader>,
        num_skus: Option<usize>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let loader_units = dataloader.num_units();
        let num_units = num_skus.unwrap_or(loader_units);
        if num_units == 0 {
            return Err(ConfigError::InvalidValue {
                field: "num_skus".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }
        if num_units != loader_units {
            return Err(ConfigError::UnitMismatch {
                expected: loader_units,
                got: num_units,
            }
            .into());
        }
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let mode = dataloader.regime();
        Ok(Self {
            params: ParamStore::new(),
            dataloader,
            num_units,
            mode,
            rng,
        })
    }

    /// Creates a per-unit parameter.
    pub fn register(&mut self, name: &str, input: impl Into<ParamInput>) -> Result<()> {
        let shape = [self.num_units];
        self.params.set_param(name, input, &shape, true)?;
        Ok(())
    }

    pub fn vector(&self, name: &str) -> Result<Array1<f64>> {
        Ok(self.params.vector(name)?)
    }
}

/// Environment-specific behaviour plugged into [`InventoryEnv`].
pub trait InventoryDynamics {
    /// Observation space given the loader's per-sample feature shape.
    fn observation_space(&self, core: &EnvCore, feature_shape: &[usize]) -> Result<Space>;

    /// Restores environment-owned state at the start of an episode.
    fn reset(&mut self, _core: &mut EnvCore) -> Result<()> {
        Ok(())
    }

    /// Builds the observation from freshly fetched features.
    fn observe(&mut self, core: &mut EnvCore, features: ArrayD<f64>) -> Result<Observation>;

    /// Charges `action` against the demand of the current period.
    fn transition(
        &mut self,
        core: &mut EnvCore,
        action: &Array1<f64>,
        demand: &Array1<f64>,
    ) -> Result<Transition>;
}

/// The Gym-like contract exposed to agents and drivers.
pub trait InventoryEnvironment {
    fn reset(&mut self, start: StartIndex) -> Result<Observation>;

    fn step(&mut self, action: ArrayD<f64>) -> Result<Step>;

    fn observation_space(&self) -> &Space;

    fn action_space(&self) -> &BoxSpace;

    fn mdp_info(&self) -> &MDPInfo;

    fn mode(&self) -> Regime;

    /// Switches to the training regime and resets.
    fn train(&mut self) -> Result<Observation>;

    fn val(&mut self) -> Result<Observation>;

    fn test(&mut self) -> Result<Observation>;
}

pub struct InventoryEnv<D> {
    core: EnvCore,
    dynamics: D,
    mdp_info: MDPInfo,
    horizon_train: HorizonTrain,
    postprocessors: Vec<Box<dyn ActionProcessor>>,
    return_truncation: bool,
    index: usize,
    start_index: usize,
    max_index_episode: usize,
    demand: Option<Array1<f64>>,
}

impl<D: InventoryDynamics> InventoryEnv<D> {
    /// Builds spaces from the registered `q_bound_low`/`q_bound_high`
    /// parameters, switches into `settings.mode` and resets.
    pub fn new(core: EnvCore, dynamics: D, settings: EnvSettings) -> Result<Self> {
        if settings.horizon_train == HorizonTrain::Fixed(0) {
            return Err(ConfigError::InvalidValue {
                field: "horizon_train".to_string(),
                message: "a fixed horizon must be positive".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&settings.gamma) {
            return Err(ConfigError::InvalidValue {
                field: "gamma".to_string(),
                message: format!("must lie in [0, 1], got {}", settings.gamma),
            }
            .into());
        }

        let action_space =
            BoxSpace::from_bounds(core.vector("q_bound_low")?, core.vector("q_bound_high")?);
        let x_shape = core.dataloader.x_shape();
        let feature_shape = x_shape.get(1..).unwrap_or(&[]);
        let observation_space = dynamics.observation_space(&core, feature_shape)?;

        let mut env = Self {
            core,
            dynamics,
            mdp_info: MDPInfo::new(observation_space, action_space, settings.gamma, 0),
            horizon_train: settings.horizon_train,
            postprocessors: Vec::new(),
            return_truncation: settings.return_truncation,
            index: 0,
            start_index: 0,
            max_index_episode: 0,
            demand: None,
        };
        env.switch_mode(settings.mode)?;
        Ok(env)
    }

    fn switch_mode(&mut self, regime: Regime) -> Result<Observation> {
        self.core.dataloader.set_regime(regime)?;
        self.core.mode = regime;
        let horizon = match (regime, self.horizon_train) {
            (Regime::Train, HorizonTrain::Fixed(n)) => n,
            (Regime::Train, HorizonTrain::UseAllData) => self.core.dataloader.len_train(),
            (other, _) => self.core.dataloader.regime_len(other)?,
        };
        self.update_mdp_info(None, Some(horizon));
        info!("Environment switched to {} mode with horizon {}", regime, horizon);
        self.reset_episode(StartIndex::Auto)
    }

    fn random_start(&mut self, regime_len: usize) -> usize {
        let horizon = self.mdp_info.horizon;
        if regime_len > horizon {
            self.core.rng.gen_range(0..regime_len - horizon)
        } else {
            0
        }
    }

    fn reset_episode(&mut self, start: StartIndex) -> Result<Observation> {
        let regime = self.core.mode;
        let regime_len = self.core.dataloader.regime_len(regime)?;

        let start_index = match start {
            StartIndex::At(i) => i,
            StartIndex::Random if regime != Regime::Train => {
                return Err(EnvError::RandomStartOutsideTrain(regime));
            }
            StartIndex::Random => self.random_start(regime_len),
            StartIndex::Auto => match (regime, self.horizon_train) {
                (Regime::Train, HorizonTrain::Fixed(_)) => self.random_start(regime_len),
                _ => 0,
            },
        };

        let end = regime_len.min(start_index.saturating_add(self.mdp_info.horizon));
        if end <= start_index {
            return Err(EnvError::DegenerateWindow {
                start: start_index,
                end,
                regime,
            });
        }

        self.start_index = start_index;
        self.max_index_episode = end;
        self.index = start_index;
        self.dynamics.reset(&mut self.core)?;

        debug!(
            "Reset in {} mode: episode window [{}, {})",
            regime, start_index, end
        );
        self.observe()
    }

    /// Fetches features and demand at the current index. The demand is kept
    /// for the next `step`.
    fn observe(&mut self) -> Result<Observation> {
        let (features, demand) = self.core.dataloader.get(self.index)?;
        ensure_finite("features", features.iter(), self.index)?;
        ensure_finite("demand", demand.iter(), self.index)?;
        let observation = self.dynamics.observe(&mut self.core, features)?;
        self.demand = Some(demand);
        Ok(observation)
    }

    /// Squeezes a leading batch axis of length one and checks the action is a
    /// finite vector with one entry per unit.
    fn order_vector(&self, action: ArrayD<f64>) -> std::result::Result<Array1<f64>, ActionError> {
        let expected = self.core.num_units;
        let action = match action.ndim() {
            0 => action.insert_axis(Axis(0)),
            2 if action.shape()[0] == 1 => action.index_axis_move(Axis(0), 0),
            _ => action,
        };
        let got = action.shape().to_vec();
        let action = action
            .into_dimensionality::<Ix1>()
            .map_err(|_| ActionError::DimMismatch {
                expected,
                got: got.clone(),
            })?;
        if action.len() != expected {
            return Err(ActionError::DimMismatch { expected, got });
        }
        if action.iter().any(|v| !v.is_finite()) {
            return Err(ActionError::NonFinite);
        }
        Ok(action)
    }

    /// Creates or updates a parameter of the environment.
    pub fn set_param(
        &mut self,
        name: &str,
        input: impl Into<ParamInput>,
        shape: &[usize],
        new: bool,
    ) -> Result<()> {
        self.core.params.set_param(name, input, shape, new)?;
        Ok(())
    }

    pub fn params(&self) -> &ParamStore {
        &self.core.params
    }

    pub fn update_mdp_info(&mut self, gamma: Option<f64>, horizon: Option<usize>) {
        if let Some(g) = gamma {
            self.mdp_info.gamma = g;
        }
        if let Some(h) = horizon {
            self.mdp_info.horizon = h;
        }
    }

    pub fn set_return_truncation(&mut self, return_truncation: bool) {
        self.return_truncation = return_truncation;
    }

    /// Appends a processor that runs after the ones already registered.
    pub fn add_postprocessor<P: ActionProcessor + 'static>(&mut self, processor: P) {
        self.postprocessors.push(Box::new(processor));
    }

    pub fn with_postprocessor<P: ActionProcessor + 'static>(mut self, processor: P) -> Self {
        self.add_postprocessor(processor);
        self
    }

    pub fn num_units(&self) -> usize {
        self.core.num_units
    }

    pub fn dataloader(&self) -> &Rc<dyn DataLoader> {
        &self.core.dataloader
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn max_index_episode(&self) -> usize {
        self.max_index_episode
    }

    /// Demand that the next `step` will be charged against.
    pub fn pending_demand(&self) -> Option<&Array1<f64>> {
        self.demand.as_ref()
    }

    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    pub(crate) fn core_mut(&mut self) -> &mut EnvCore {
        &mut self.core
    }
}

impl<D: InventoryDynamics> InventoryEnvironment for InventoryEnv<D> {
    fn reset(&mut self, start: StartIndex) -> Result<Observation> {
        self.reset_episode(start)
    }

    fn step(&mut self, action: ArrayD<f64>) -> Result<Step> {
        let mut action = action;
        for processor in &self.postprocessors {
            action = processor.process(action)?;
        }
        let action = self.order_vector(action)?;
        let demand = self.demand.clone().ok_or(EnvError::NoPendingDemand)?;

        let Transition { cost_per_sku, info } =
            self.dynamics.transition(&mut self.core, &action, &demand)?;
        let reward = -cost_per_sku.sum();

        self.index += 1;
        let truncated = self.index >= self.max_index_episode;

        let observation = if !truncated {
            Some(self.observe()?)
        } else if self.core.mode == Regime::Train {
            // keep training on a fresh window
            Some(self.reset_episode(StartIndex::Auto)?)
        } else {
            self.demand = None;
            None
        };

        debug!(
            "Step to index {} in {} mode: reward {:.4}, truncated {}",
            self.index, self.core.mode, reward, truncated
        );

        Ok(Step {
            observation,
            reward,
            terminated: false,
            truncated: self.return_truncation.then(|| truncated),
            info,
        })
    }

    fn observation_space(&self) -> &Space {
        &self.mdp_info.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.mdp_info.action_space
    }

    fn mdp_info(&self) -> &MDPInfo {
        &self.mdp_info
    }

    fn mode(&self) -> Regime {
        self.core.mode
    }

    fn train(&mut self) -> Result<Observation> {
        self.switch_mode(Regime::Train)
    }

    fn val(&mut self) -> Result<Observation> {
        self.switch_mode(Regime::Val)
    }

    fn test(&mut self) -> Result<Observation> {
        self.switch_mode(Regime::Test)
    }
}

fn ensure_finite<'a>(
    field: &'static str,
    mut values: impl Iterator<Item = &'a f64>,
    index: usize,
) -> Result<()> {
    if values.any(|v| !v.is_finite()) {
        return Err(EnvError::NonFinite { field, index });
    }
    Ok(())
}
