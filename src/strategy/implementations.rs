// src/strategy/implementations.rs

use crate::error::{ConfigError, EnvError, Result};
use crate::io::dataloader::{Regime, XYDataLoader};
use crate::simulation::engine::Observation;
use crate::strategy::optimization::{critical_ratio, empirical_quantile, optimal_base_stock};
use crate::strategy::traits::Policy;
use log::info;
use ndarray::{Array1, ArrayD, ArrayView1, ArrayView2, Axis, Ix1, Zip};

// =========================================================================
// 1. Sample Average Approximation
// =========================================================================

/// The data-driven newsvendor solution without features: order the
/// empirical demand quantile at the critical ratio, per unit.
///
/// Orders zero until fitted.
#[derive(Debug, Clone)]
pub struct SaaPolicy {
    num_units: usize,
    quantiles: Option<Array1<f64>>,
}

impl SaaPolicy {
    pub fn new(num_units: usize) -> Self {
        Self {
            num_units,
            quantiles: None,
        }
    }

    /// Fits on historic demand of shape `(periods, units)`.
    pub fn fit(
        &mut self,
        demand: ArrayView2<f64>,
        service_level: ArrayView1<f64>,
    ) -> std::result::Result<(), ConfigError> {
        if demand.ncols() != self.num_units || service_level.len() != self.num_units {
            return Err(ConfigError::UnitMismatch {
                expected: self.num_units,
                got: demand.ncols().max(service_level.len()),
            });
        }
        let mut quantiles = Array1::zeros(self.num_units);
        for (unit, column) in demand.axis_iter(Axis(1)).enumerate() {
            let samples: Vec<f64> = column.iter().copied().collect();
            quantiles[unit] = empirical_quantile(&samples, service_level[unit]).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "demand".to_string(),
                    message: format!("no finite samples for unit {}", unit),
                }
            })?;
        }
        info!(
            "Fitted SAA policy on {} periods: order quantities {}",
            demand.nrows(),
            quantiles
        );
        self.quantiles = Some(quantiles);
        Ok(())
    }

    /// Fits at the cost-optimal service level `cu / (cu + co)`.
    pub fn fit_costs(
        &mut self,
        demand: ArrayView2<f64>,
        underage_cost: ArrayView1<f64>,
        overage_cost: ArrayView1<f64>,
    ) -> std::result::Result<(), ConfigError> {
        let service_level = Zip::from(&underage_cost)
            .and(&overage_cost)
            .map_collect(|&cu, &co| critical_ratio(cu, co));
        self.fit(demand, service_level.view())
    }

    /// Fits on the training regime of a tabular loader.
    pub fn fit_loader(
        &mut self,
        loader: &XYDataLoader,
        underage_cost: ArrayView1<f64>,
        overage_cost: ArrayView1<f64>,
    ) -> Result<()> {
        let demand = loader.get_all_y(Some(Regime::Train))?;
        self.fit_costs(demand.view(), underage_cost, overage_cost)?;
        Ok(())
    }

    pub fn quantiles(&self) -> Option<&Array1<f64>> {
        self.quantiles.as_ref()
    }
}

impl Policy for SaaPolicy {
    fn draw_action(&mut self, _observation: &Observation) -> Result<ArrayD<f64>> {
        Ok(self
            .quantiles
            .clone()
            .unwrap_or_else(|| Array1::zeros(self.num_units))
            .into_dyn())
    }

    fn name(&self) -> &str {
        "saa"
    }
}

// =========================================================================
// 2. Base Stock Policy (Order-Up-To)
// =========================================================================

/// Orders the gap between a target level and the inventory position
/// (on hand plus in transit). Needs the `inventory` and `order_pipeline`
/// parts of a multi-period observation.
#[derive(Debug, Clone)]
pub struct BaseStockPolicy {
    target_stock: Array1<f64>,
}

impl BaseStockPolicy {
    pub fn new(target_stock: Array1<f64>) -> Self {
        Self { target_stock }
    }

    /// Target from a normal demand model and the cost structure, per unit.
    pub fn with_optimal_target(
        underage_cost: ArrayView1<f64>,
        holding_cost: ArrayView1<f64>,
        mean_demand: ArrayView1<f64>,
        std_demand: ArrayView1<f64>,
        lead_times: &[usize],
    ) -> Self {
        let target_stock = Array1::from_shape_fn(lead_times.len(), |u| {
            optimal_base_stock(
                underage_cost[u],
                holding_cost[u],
                mean_demand[u],
                std_demand[u],
                lead_times[u],
            )
        });
        info!("Base stock targets: {}", target_stock);
        Self { target_stock }
    }

    pub fn target_stock(&self) -> &Array1<f64> {
        &self.target_stock
    }
}

impl Policy for BaseStockPolicy {
    fn draw_action(&mut self, observation: &Observation) -> Result<ArrayD<f64>> {
        let (inventory, pipeline) = match (
            observation.get("inventory"),
            observation.get("order_pipeline"),
        ) {
            (Some(i), Some(p)) => (i, p),
            _ => {
                return Err(EnvError::Config(ConfigError::Incompatible(
                    "base stock policy needs inventory and order_pipeline observations".to_string(),
                )))
            }
        };
        let mismatch = || ConfigError::UnitMismatch {
            expected: self.target_stock.len(),
            got: inventory.len(),
        };
        if pipeline.ndim() != 2 || inventory.shape() != self.target_stock.shape() {
            return Err(mismatch().into());
        }
        let in_transit = pipeline.sum_axis(Axis(0));
        if in_transit.shape() != inventory.shape() {
            return Err(mismatch().into());
        }
        let position = (inventory + &in_transit)
            .into_dimensionality::<Ix1>()
            .map_err(|_| mismatch())?;

        // we cannot order negative amounts
        let order = Zip::from(&self.target_stock)
            .and(&position)
            .map_collect(|&target, &pos| (target - pos).max(0.0));
        Ok(order.into_dyn())
    }

    fn name(&self) -> &str {
        "base_stock"
    }
}

// =========================================================================
// 3. Constant Policy
// =========================================================================

/// Orders the same quantities every period.
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    quantity: Array1<f64>,
}

impl ConstantPolicy {
    pub fn new(quantity: Array1<f64>) -> Self {
        Self { quantity }
    }
}

impl Policy for ConstantPolicy {
    fn draw_action(&mut self, _observation: &Observation) -> Result<ArrayD<f64>> {
        Ok(self.quantity.clone().into_dyn())
    }

    fn name(&self) -> &str {
        "constant"
    }
}
