// src/simulation/multi_period.rs

use crate::error::{ConfigError, Result};
use crate::io::dataloader::DataLoader;
use crate::model::pipeline::OrderPipeline;
use crate::model::spaces::{BoxSpace, Space};
use crate::simulation::config::{MultiPeriodConfig, StepInfoVerbosity};
use crate::simulation::engine::{
    EnvCore, InventoryDynamics, InventoryEnv, Observation, StepInfo, Transition,
};
use ndarray::{Array1, ArrayD, Zip};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Multi-period inventory with lead times and lost sales.
///
/// Each step the order pays variable and fixed ordering costs and enters the
/// pipeline, arrivals are added to stock, demand is served and the stock is
/// capped at `max_inventory`. Unmet demand is charged at the underage cost
/// and lost; what is left is charged at the holding cost.
#[derive(Debug, Clone)]
pub struct MultiPeriod {
    pipeline: OrderPipeline,
    inventory: Array1<f64>,
    verbosity: StepInfoVerbosity,
}

impl MultiPeriod {
    pub fn new(
        pipeline: OrderPipeline,
        start_inventory: Array1<f64>,
        verbosity: StepInfoVerbosity,
    ) -> Self {
        Self {
            pipeline,
            inventory: start_inventory,
            verbosity,
        }
    }

    pub fn inventory(&self) -> &Array1<f64> {
        &self.inventory
    }

    pub fn pipeline(&self) -> &OrderPipeline {
        &self.pipeline
    }
}

impl InventoryDynamics for MultiPeriod {
    fn observation_space(&self, core: &EnvCore, feature_shape: &[usize]) -> Result<Space> {
        let (len_pipeline, _) = self.pipeline.shape();
        let q_low = core.vector("q_bound_low")?;
        let q_high = core.vector("q_bound_high")?;
        let max_inventory = core.vector("max_inventory")?;

        let mut spaces = BTreeMap::new();
        spaces.insert(
            "features".to_string(),
            BoxSpace::uniform(feature_shape, f64::NEG_INFINITY, f64::INFINITY),
        );
        spaces.insert(
            "order_pipeline".to_string(),
            BoxSpace::tiled(&q_low, &q_high, len_pipeline),
        );
        spaces.insert(
            "inventory".to_string(),
            BoxSpace::from_bounds(Array1::zeros(core.num_units), max_inventory),
        );
        Ok(Space::Dict(spaces))
    }

    fn reset(&mut self, core: &mut EnvCore) -> Result<()> {
        self.pipeline.reset();
        self.inventory = core.vector("start_inventory")?;
        Ok(())
    }

    fn observe(&mut self, _core: &mut EnvCore, features: ArrayD<f64>) -> Result<Observation> {
        let mut parts = BTreeMap::new();
        parts.insert("features".to_string(), features);
        parts.insert(
            "order_pipeline".to_string(),
            self.pipeline.get_pipeline().to_owned().into_dyn(),
        );
        parts.insert("inventory".to_string(), self.inventory.clone().into_dyn());
        Ok(Observation::Composite(parts))
    }

    fn transition(
        &mut self,
        core: &mut EnvCore,
        action: &Array1<f64>,
        demand: &Array1<f64>,
    ) -> Result<Transition> {
        let variable_ordering_cost = action * &core.vector("variable_ordering_cost")?;
        let fixed_ordering_cost = Zip::from(action)
            .and(&core.vector("fixed_ordering_cost")?)
            .map_collect(|&q, &f| if q > 0.0 { f } else { 0.0 });

        let arriving = self.pipeline.step(action.view())?;

        let max_inventory = core.vector("max_inventory")?;
        let mut inventory = &self.inventory + &arriving - demand;
        Zip::from(&mut inventory)
            .and(&max_inventory)
            .for_each(|v, &cap| *v = v.min(cap));

        let underage_cost = inventory.mapv(|v| (-v).max(0.0)) * &core.vector("underage_cost")?;
        inventory.mapv_inplace(|v| v.max(0.0));
        let holding_cost = &inventory * &core.vector("holding_cost")?;
        self.inventory = inventory;

        let cost_per_sku =
            &variable_ordering_cost + &fixed_ordering_cost + &underage_cost + &holding_cost;

        let mut info = StepInfo::default();
        if self.verbosity >= StepInfoVerbosity::Full {
            info.demand = Some(demand.clone());
            info.action = Some(action.clone());
            info.cost_per_sku = Some(cost_per_sku.clone());
        }
        if self.verbosity >= StepInfoVerbosity::Costs {
            info.variable_ordering_cost = Some(variable_ordering_cost);
            info.fixed_ordering_cost = Some(fixed_ordering_cost);
            info.underage_cost = Some(underage_cost);
            info.holding_cost = Some(holding_cost);
        }

        Ok(Transition { cost_per_sku, info })
    }
}

pub type MultiPeriodEnv = InventoryEnv<MultiPeriod>;

impl InventoryEnv<MultiPeriod> {
    pub fn from_config(dataloader: Rc<dyn DataLoader>, config: &MultiPeriodConfig) -> Result<Self> {
        let mut core = EnvCore::new(dataloader, config.num_skus, config.seed)?;
        core.register("q_bound_low", config.q_bound_low.clone())?;
        core.register("q_bound_high", config.q_bound_high.clone())?;
        core.register("underage_cost", config.underage_cost.clone())?;
        core.register("overage_cost", config.overage_cost.clone())?;
        core.register("fixed_ordering_cost", config.fixed_ordering_cost.clone())?;
        core.register("variable_ordering_cost", config.variable_ordering_cost.clone())?;
        core.register("holding_cost", config.holding_cost.clone())?;
        core.register("start_inventory", config.start_inventory.clone())?;
        core.register("max_inventory", config.max_inventory.clone())?;

        let start_inventory = core.vector("start_inventory")?;
        let max_inventory = core.vector("max_inventory")?;
        if start_inventory
            .iter()
            .zip(max_inventory.iter())
            .any(|(s, m)| !(*s >= 0.0 && s <= m))
        {
            return Err(ConfigError::InvalidValue {
                field: "start_inventory".to_string(),
                message: "must lie in [0, max_inventory]".to_string(),
            }
            .into());
        }

        let pipeline = OrderPipeline::new(core.num_units, &config.pipeline, &mut core.rng)?;
        let dynamics = MultiPeriod::new(pipeline, start_inventory, config.step_info_verbosity);
        InventoryEnv::new(core, dynamics, config.settings())
    }

    pub fn inventory(&self) -> &Array1<f64> {
        self.dynamics().inventory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EnvError, PipelineError};
    use crate::io::dataloader::XYDataLoader;
    use crate::model::pipeline::{LeadTime, PipelineConfig};
    use crate::simulation::config::HorizonTrain;
    use crate::simulation::engine::{InventoryEnvironment, StartIndex};
    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn loader(demand: Array2<f64>) -> Rc<dyn DataLoader> {
        let x = Array2::zeros((demand.nrows(), 1));
        Rc::new(XYDataLoader::new(x, demand, None, None).unwrap())
    }

    fn config(lead_time: usize) -> MultiPeriodConfig {
        MultiPeriodConfig {
            underage_cost: 4.0.into(),
            holding_cost: 0.5.into(),
            pipeline: PipelineConfig::fixed(lead_time),
            horizon_train: HorizonTrain::UseAllData,
            step_info_verbosity: StepInfoVerbosity::Full,
            seed: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn inventory_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(17);
        let demand = Array2::from_shape_fn((60, 2), |_| rng.gen_range(0.0..12.0));
        let config = MultiPeriodConfig {
            max_inventory: 15.0.into(),
            start_inventory: 5.0.into(),
            ..config(2)
        };
        let mut env = MultiPeriodEnv::from_config(loader(demand), &config).unwrap();

        for _ in 0..59 {
            let order = array![rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0)];
            let step = env.step(order.into_dyn()).unwrap();
            assert!(env.inventory().iter().all(|v| (0.0..=15.0).contains(v)));
            let underage = step.info.underage_cost.unwrap();
            assert!(underage.iter().all(|c| *c >= 0.0));
        }
    }

    #[test]
    fn shortfall_is_lost_and_charged() {
        let demand = array![[8.0], [3.0], [3.0], [3.0]];
        let config = MultiPeriodConfig {
            start_inventory: 5.0.into(),
            ..config(1)
        };
        let mut env = MultiPeriodEnv::from_config(loader(demand), &config).unwrap();

        // 5 on hand, demand 8: 3 short, nothing carried over
        let step = env.step(array![4.0].into_dyn()).unwrap();
        assert_eq!(step.info.underage_cost, Some(array![12.0]));
        assert_eq!(step.info.holding_cost, Some(array![0.0]));
        assert_eq!(env.inventory(), &array![0.0]);
        assert_eq!(step.reward, -12.0);

        // the order of 4 arrives, demand 3 leaves 1 on hand
        let step = env.step(array![0.0].into_dyn()).unwrap();
        assert_eq!(env.inventory(), &array![1.0]);
        assert_eq!(step.info.underage_cost, Some(array![0.0]));
        assert_eq!(step.info.holding_cost, Some(array![0.5]));
    }

    #[test]
    fn orders_arrive_after_lead_time() {
        let demand = Array2::zeros((8, 1));
        let mut env = MultiPeriodEnv::from_config(loader(demand), &config(3)).unwrap();

        let step = env.step(array![6.0].into_dyn()).unwrap();
        let pipeline = step.observation.unwrap();
        assert_eq!(
            pipeline.get("order_pipeline").unwrap(),
            &array![[0.0], [0.0], [6.0]].into_dyn()
        );
        for _ in 0..2 {
            env.step(array![0.0].into_dyn()).unwrap();
            assert_eq!(env.inventory(), &array![0.0]);
        }
        // ordered three steps ago
        let step = env.step(array![0.0].into_dyn()).unwrap();
        assert_eq!(env.inventory(), &array![6.0]);
        assert_eq!(
            step.observation.unwrap().get("inventory"),
            Some(&array![6.0].into_dyn())
        );
    }

    #[test]
    fn ordering_costs() {
        let demand = Array2::from_elem((5, 2), 0.0);
        let config = MultiPeriodConfig {
            fixed_ordering_cost: 10.0.into(),
            variable_ordering_cost: vec![1.0, 2.0].into(),
            holding_cost: 0.0.into(),
            ..config(1)
        };
        let mut env = MultiPeriodEnv::from_config(loader(demand), &config).unwrap();
        let step = env.step(array![3.0, 0.0].into_dyn()).unwrap();
        assert_eq!(step.info.fixed_ordering_cost, Some(array![10.0, 0.0]));
        assert_eq!(step.info.variable_ordering_cost, Some(array![3.0, 0.0]));
        assert_eq!(step.info.cost_per_sku, Some(array![13.0, 0.0]));
        assert_eq!(step.reward, -13.0);
    }

    #[test]
    fn verbosity_controls_info() {
        let demand = Array2::from_elem((5, 1), 1.0);
        let quiet = MultiPeriodConfig {
            step_info_verbosity: StepInfoVerbosity::None,
            ..config(1)
        };
        let mut env = MultiPeriodEnv::from_config(loader(demand.clone()), &quiet).unwrap();
        assert_eq!(env.step(array![1.0].into_dyn()).unwrap().info, StepInfo::default());

        let costs = MultiPeriodConfig {
            step_info_verbosity: StepInfoVerbosity::Costs,
            ..config(1)
        };
        let mut env = MultiPeriodEnv::from_config(loader(demand), &costs).unwrap();
        let info = env.step(array![1.0].into_dyn()).unwrap().info;
        assert!(info.holding_cost.is_some());
        assert!(info.demand.is_none());
        assert!(info.cost_per_sku.is_none());
    }

    #[test]
    fn reset_restores_inventory_and_empties_pipeline() {
        let demand = Array2::zeros((10, 1));
        let config = MultiPeriodConfig {
            start_inventory: 2.0.into(),
            ..config(2)
        };
        let mut env = MultiPeriodEnv::from_config(loader(demand), &config).unwrap();
        env.step(array![5.0].into_dyn()).unwrap();
        env.step(array![5.0].into_dyn()).unwrap();
        env.step(array![5.0].into_dyn()).unwrap();
        assert_eq!(env.inventory(), &array![7.0]);

        let observation = env.reset(StartIndex::At(4)).unwrap();
        assert_eq!(env.inventory(), &array![2.0]);
        assert_eq!(env.dynamics().pipeline().in_transit(), array![0.0]);
        assert_eq!(
            observation.get("order_pipeline"),
            Some(&Array2::<f64>::zeros((2, 1)).into_dyn())
        );
    }

    #[test]
    fn observation_space_layout() {
        let demand = Array2::zeros((10, 3));
        let config = MultiPeriodConfig {
            pipeline: PipelineConfig {
                lead_time: LeadTime::PerUnit(vec![1, 2, 4]),
                max_lead_time: None,
            },
            q_bound_high: 50.0.into(),
            max_inventory: 100.0.into(),
            ..config(1)
        };
        let env = MultiPeriodEnv::from_config(loader(demand), &config).unwrap();
        let space = env.observation_space();
        assert_eq!(space.get("order_pipeline").unwrap().shape(), &[4, 3]);
        assert_eq!(space.get("order_pipeline").unwrap().high[[3, 2]], 50.0);
        assert_eq!(space.get("inventory").unwrap().high, array![100.0, 100.0, 100.0].into_dyn());
        assert_eq!(space.get("features").unwrap().shape(), &[1]);
    }

    #[test]
    fn invalid_configuration_fails_fast() {
        let demand = Array2::zeros((10, 1));
        let too_long = MultiPeriodConfig {
            pipeline: PipelineConfig {
                lead_time: LeadTime::Fixed(4),
                max_lead_time: Some(2),
            },
            ..config(1)
        };
        assert!(matches!(
            MultiPeriodEnv::from_config(loader(demand.clone()), &too_long),
            Err(EnvError::Pipeline(PipelineError::LeadTimeTooLong { .. }))
        ));

        let negative = MultiPeriodConfig {
            start_inventory: (-1.0).into(),
            ..config(1)
        };
        assert!(matches!(
            MultiPeriodEnv::from_config(loader(demand), &negative),
            Err(EnvError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
