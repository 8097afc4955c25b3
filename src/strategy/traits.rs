// src/strategy/traits.rs

use crate::error::{ActionError, ObservationError, Result};
use crate::simulation::engine::Observation;
use ndarray::ArrayD;

/// Transforms an action before the environment applies it.
///
/// Processors registered on an environment run in insertion order on every
/// `step`. Any closure `Fn(ArrayD<f64>) -> Result<ArrayD<f64>, ActionError>`
/// is a processor.
pub trait ActionProcessor {
    fn process(&self, action: ArrayD<f64>) -> std::result::Result<ArrayD<f64>, ActionError>;
}

impl<F> ActionProcessor for F
where
    F: Fn(ArrayD<f64>) -> std::result::Result<ArrayD<f64>, ActionError>,
{
    fn process(&self, action: ArrayD<f64>) -> std::result::Result<ArrayD<f64>, ActionError> {
        self(action)
    }
}

/// Turns what the environment returns into a single model input array.
pub trait ObservationProcessor {
    fn process(
        &self,
        observation: &Observation,
    ) -> std::result::Result<ArrayD<f64>, ObservationError>;

    /// Shape of the processed input, for sizing a model from one sample.
    fn output_shape(
        &self,
        sample: &Observation,
    ) -> std::result::Result<Vec<usize>, ObservationError> {
        Ok(self.process(sample)?.shape().to_vec())
    }
}

/// Decision logic driven by the evaluation runner.
///
/// Implementations see exactly what the environment returns from `reset`
/// and `step`, and answer with an order quantity per unit (optionally with
/// a leading batch axis of length one).
pub trait Policy {
    fn draw_action(&mut self, observation: &Observation) -> Result<ArrayD<f64>>;

    /// Name used in logs and reports.
    fn name(&self) -> &str {
        "policy"
    }
}
