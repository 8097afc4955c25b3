// src/model/pipeline.rs

use crate::error::PipelineError;
use log::trace;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::Deserialize;

/// How many periods an order spends in transit, per unit.
///
/// Random lead times are drawn once per unit when the pipeline is built.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTime {
    Fixed(usize),
    PerUnit(Vec<usize>),
    Uniform { low: usize, high: usize },
    Poisson { mean: f64 },
}

impl Default for LeadTime {
    fn default() -> Self {
        LeadTime::Fixed(1)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lead_time: LeadTime,
    /// Number of slots to allocate. Defaults to the longest unit lead time,
    /// which may then be at most [`MAX_LEAD_TIME`].
    pub max_lead_time: Option<usize>,
}

/// Longest lead time accepted when `max_lead_time` is not given.
pub const MAX_LEAD_TIME: usize = 365;

impl PipelineConfig {
    pub fn fixed(lead_time: usize) -> Self {
        Self {
            lead_time: LeadTime::Fixed(lead_time),
            max_lead_time: None,
        }
    }
}

/// Orders in transit, indexed by `[periods until arrival - 1, unit]`.
///
/// An order passed to [`OrderPipeline::step`] with lead time `L >= 1` is
/// returned by the `L`-th following call to `step`. A lead time of zero is
/// treated like one: the order arrives at the start of the following step.
#[derive(Debug, Clone)]
pub struct OrderPipeline {
    pipeline: Array2<f64>,
    lead_times: Vec<usize>,
}

impl OrderPipeline {
    pub fn new<R: Rng>(
        num_units: usize,
        config: &PipelineConfig,
        rng: &mut R,
    ) -> Result<Self, PipelineError> {
        let lead_times = match &config.lead_time {
            LeadTime::Fixed(l) => vec![*l; num_units],
            LeadTime::PerUnit(v) => {
                if v.len() != num_units {
                    return Err(PipelineError::LeadTimeCount {
                        expected: num_units,
                        got: v.len(),
                    });
                }
                v.clone()
            }
            LeadTime::Uniform { low, high } => {
                if low > high {
                    return Err(PipelineError::InvalidDistribution(format!(
                        "uniform lead time needs low <= high, got {}..={}",
                        low, high
                    )));
                }
                (0..num_units).map(|_| rng.gen_range(*low..=*high)).collect()
            }
            LeadTime::Poisson { mean } => {
                if !mean.is_finite() {
                    return Err(PipelineError::InvalidDistribution(format!(
                        "poisson mean must be finite, got {}",
                        mean
                    )));
                }
                let poisson = Poisson::new(*mean).map_err(|e| {
                    PipelineError::InvalidDistribution(format!("poisson mean {}: {}", mean, e))
                })?;
                (0..num_units)
                    .map(|_| {
                        // saturates for huge draws, caught by the cap below
                        let draw: f64 = poisson.sample(rng);
                        draw as usize
                    })
                    .collect()
            }
        };

        let cap = config.max_lead_time.unwrap_or(MAX_LEAD_TIME);
        if let Some((unit, &lead_time)) = lead_times.iter().enumerate().find(|(_, l)| **l > cap) {
            return Err(PipelineError::LeadTimeTooLong {
                unit,
                lead_time,
                max_lead_time: cap,
            });
        }
        let longest = lead_times.iter().copied().max().unwrap_or(0);
        let max_lead_time = config.max_lead_time.unwrap_or(longest);

        Ok(Self {
            pipeline: Array2::zeros((max_lead_time.max(1), num_units)),
            lead_times,
        })
    }

    /// Adds `orders` to the pipeline and returns what arrives this period.
    pub fn step(&mut self, orders: ArrayView1<f64>) -> Result<Array1<f64>, PipelineError> {
        let (len, num_units) = self.pipeline.dim();
        if orders.len() != num_units {
            return Err(PipelineError::OrderLength {
                expected: num_units,
                got: orders.len(),
            });
        }

        let arrived = self.pipeline.row(0).to_owned();

        // move every slot one period closer to arrival
        for slot in 1..len {
            for unit in 0..num_units {
                self.pipeline[[slot - 1, unit]] = self.pipeline[[slot, unit]];
            }
        }
        self.pipeline.row_mut(len - 1).fill(0.0);

        for (unit, q) in orders.iter().enumerate() {
            let slot = self.lead_times[unit].max(1) - 1;
            self.pipeline[[slot, unit]] += q;
        }

        trace!("pipeline arrivals: {}", arrived);
        Ok(arrived)
    }

    /// Read-only view of the orders in transit.
    pub fn get_pipeline(&self) -> ArrayView2<f64> {
        self.pipeline.view()
    }

    /// Total quantity in transit per unit.
    pub fn in_transit(&self) -> Array1<f64> {
        self.pipeline.sum_axis(Axis(0))
    }

    /// `(pipeline_length, num_units)`
    pub fn shape(&self) -> (usize, usize) {
        self.pipeline.dim()
    }

    pub fn lead_times(&self) -> &[usize] {
        &self.lead_times
    }

    pub fn reset(&mut self) {
        self.pipeline.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed(num_units: usize, lead_time: usize) -> OrderPipeline {
        let mut rng = StdRng::seed_from_u64(0);
        OrderPipeline::new(num_units, &PipelineConfig::fixed(lead_time), &mut rng).unwrap()
    }

    #[test]
    fn order_arrives_exactly_after_lead_time() {
        let mut p = fixed(1, 3);
        let mut arrivals = Vec::new();
        arrivals.push(p.step(array![7.0].view()).unwrap()[0]);
        for _ in 0..5 {
            arrivals.push(p.step(array![0.0].view()).unwrap()[0]);
        }
        // submitted at call 0, returned at call 3 only
        assert_eq!(arrivals, vec![0.0, 0.0, 0.0, 7.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_lead_time_arrives_next_step() {
        let mut p = fixed(2, 0);
        assert_eq!(p.shape(), (1, 2));
        assert_eq!(p.step(array![3.0, 4.0].view()).unwrap(), array![0.0, 0.0]);
        assert_eq!(p.step(array![0.0, 0.0].view()).unwrap(), array![3.0, 4.0]);
    }

    #[test]
    fn conserves_quantity_once_drained() {
        let mut p = fixed(2, 4);
        let orders = [[1.0, 2.0], [0.0, 5.5], [3.0, 0.0], [2.5, 2.5], [9.0, 1.0]];
        let mut submitted = 0.0;
        let mut returned = 0.0;
        for o in orders.iter() {
            submitted += o[0] + o[1];
            returned += p.step(array![o[0], o[1]].view()).unwrap().sum();
        }
        for _ in 0..4 {
            returned += p.step(array![0.0, 0.0].view()).unwrap().sum();
        }
        assert_eq!(submitted, returned);
        assert_eq!(p.in_transit().sum(), 0.0);
    }

    #[test]
    fn per_unit_lead_times() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = PipelineConfig {
            lead_time: LeadTime::PerUnit(vec![1, 2]),
            max_lead_time: Some(3),
        };
        let mut p = OrderPipeline::new(2, &config, &mut rng).unwrap();
        assert_eq!(p.shape(), (3, 2));
        p.step(array![1.0, 1.0].view()).unwrap();
        assert_eq!(p.get_pipeline().column(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(p.get_pipeline().column(1).to_vec(), vec![0.0, 1.0, 0.0]);
        assert_eq!(p.step(array![0.0, 0.0].view()).unwrap(), array![1.0, 0.0]);
        assert_eq!(p.step(array![0.0, 0.0].view()).unwrap(), array![0.0, 1.0]);
    }

    #[test]
    fn lead_time_beyond_allocation_fails_at_construction() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = PipelineConfig {
            lead_time: LeadTime::Fixed(5),
            max_lead_time: Some(3),
        };
        let err = OrderPipeline::new(2, &config, &mut rng).unwrap_err();
        assert_eq!(
            err,
            PipelineError::LeadTimeTooLong {
                unit: 0,
                lead_time: 5,
                max_lead_time: 3
            }
        );
    }

    #[test]
    fn unbounded_random_lead_time_is_capped() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = PipelineConfig {
            lead_time: LeadTime::Poisson { mean: 1e15 },
            max_lead_time: None,
        };
        let err = OrderPipeline::new(1, &config, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::LeadTimeTooLong {
                unit: 0,
                max_lead_time: MAX_LEAD_TIME,
                ..
            }
        ));

        let infinite = PipelineConfig {
            lead_time: LeadTime::Poisson {
                mean: f64::INFINITY,
            },
            max_lead_time: None,
        };
        assert!(matches!(
            OrderPipeline::new(1, &infinite, &mut rng),
            Err(PipelineError::InvalidDistribution(_))
        ));

        let fixed = PipelineConfig::fixed(MAX_LEAD_TIME + 1);
        assert!(OrderPipeline::new(2, &fixed, &mut rng).is_err());
        let at_cap = PipelineConfig::fixed(MAX_LEAD_TIME);
        let p = OrderPipeline::new(1, &at_cap, &mut rng).unwrap();
        assert_eq!(p.shape(), (MAX_LEAD_TIME, 1));
    }

    #[test]
    fn random_lead_times_fit_allocation() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = PipelineConfig {
            lead_time: LeadTime::Uniform { low: 1, high: 4 },
            max_lead_time: None,
        };
        let p = OrderPipeline::new(6, &config, &mut rng).unwrap();
        let longest = *p.lead_times().iter().max().unwrap();
        assert!(p.lead_times().iter().all(|l| (1..=4).contains(l)));
        assert_eq!(p.shape(), (longest, 6));

        let poisson = PipelineConfig {
            lead_time: LeadTime::Poisson { mean: 2.0 },
            max_lead_time: None,
        };
        let p = OrderPipeline::new(4, &poisson, &mut rng).unwrap();
        assert!(p.shape().0 >= *p.lead_times().iter().max().unwrap());
    }

    #[test]
    fn wrong_order_length_and_reset() {
        let mut p = fixed(2, 2);
        assert!(matches!(
            p.step(array![1.0].view()),
            Err(PipelineError::OrderLength { expected: 2, got: 1 })
        ));
        p.step(array![1.0, 1.0].view()).unwrap();
        p.reset();
        assert_eq!(p.in_transit(), array![0.0, 0.0]);
    }
}
