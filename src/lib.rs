// src/lib.rs

//! Inventory-control environments with a Gym-like `reset`/`step` contract.
//!
//! The environments walk over time-indexed feature/demand data split into
//! train, val and test regimes, charge newsvendor or multi-period inventory
//! costs, and hand observations to an external policy or learning driver.

pub mod error;
pub mod io;
pub mod model;
pub mod simulation;
pub mod strategy;

pub use error::{EnvError, Result};
pub use io::dataloader::{DataLoader, DatasetView, Regime, XYDataLoader};
pub use model::param::{ParamInput, ParamStore, Parameter};
pub use model::pipeline::{LeadTime, OrderPipeline, PipelineConfig};
pub use model::spaces::{BoxSpace, MDPInfo, Space};
pub use simulation::config::{
    HorizonTrain, MultiPeriodConfig, NewsvendorConfig, StepInfoVerbosity, VariableSlConfig,
};
pub use simulation::engine::{
    InventoryEnv, InventoryEnvironment, Observation, StartIndex, Step, StepInfo,
};
pub use simulation::multi_period::MultiPeriodEnv;
pub use simulation::newsvendor::{NewsvendorEnv, VariableSlEnv};
pub use strategy::traits::{ActionProcessor, ObservationProcessor, Policy};
