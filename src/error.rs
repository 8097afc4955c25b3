// src/error.rs

use crate::io::dataloader::Regime;
use thiserror::Error;

/// Top-level error type for environment construction and interaction.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Observation error: {0}")]
    Observation(#[from] ObservationError),

    #[error("Non-finite values in {field} at index {index}")]
    NonFinite { field: &'static str, index: usize },

    #[error("Degenerate episode window: start index {start} with end {end} in {regime} regime")]
    DegenerateWindow {
        start: usize,
        end: usize,
        regime: Regime,
    },

    #[error("start_index cannot be 'random' in {0} mode")]
    RandomStartOutsideTrain(Regime),

    #[error("No pending demand: the episode has ended or reset was never called")]
    NoPendingDemand,
}

/// Configuration errors raised while building an environment or a component.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Incompatible configuration: {0}")]
    Incompatible(String),

    #[error("Number of units mismatch: expected {expected}, got {got}")]
    UnitMismatch { expected: usize, got: usize },
}

/// Errors of the parameter store.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Parameter {0} does not exist")]
    DoesNotExist(String),

    #[error("Parameter {name}: input of shape {got:?} does not match shape {expected:?} and is not a single value")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Parameter {0} is not set")]
    Unset(String),

    #[error("Parameter {0} is a composite and has no array value")]
    NotAnArray(String),
}

/// Errors raised by data loaders.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Index {index} out of range for {regime} regime of length {len}")]
    IndexOutOfRange {
        index: usize,
        regime: Regime,
        len: usize,
    },

    #[error("No {0} set defined")]
    RegimeUndefined(Regime),

    #[error("X and Y must have the same length, got {x} and {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("Invalid split: {0}")]
    InvalidSplit(String),
}

/// Errors of the order pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Lead time {lead_time} of unit {unit} exceeds the maximum lead time {max_lead_time}")]
    LeadTimeTooLong {
        unit: usize,
        lead_time: usize,
        max_lead_time: usize,
    },

    #[error("Expected {expected} lead times, got {got}")]
    LeadTimeCount { expected: usize, got: usize },

    #[error("Order has {got} units, the pipeline holds {expected}")]
    OrderLength { expected: usize, got: usize },

    #[error("Invalid lead time distribution: {0}")]
    InvalidDistribution(String),
}

/// Errors raised while validating or post-processing an action.
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("Action dimension mismatch: expected {expected}, got {got:?}")]
    DimMismatch { expected: usize, got: Vec<usize> },

    #[error("Action contains non-finite values")]
    NonFinite,

    #[error("{bound} bound array must match the input shape or be a single element")]
    BoundShape { bound: &'static str },

    #[error("Unit size must be positive, got {0}")]
    NonPositiveUnitSize(f64),

    #[error("Unit size array must match the input shape or be a single element")]
    UnitSizeShape,

    #[error("Input array must have at least 2 dimensions, got {0}")]
    TooFewDims(usize),

    #[error("Removing the action dimension requires {0}")]
    CannotRemoveActionDim(&'static str),
}

/// Errors raised while turning an observation into model input.
#[derive(Debug, Error, PartialEq)]
pub enum ObservationError {
    #[error("Observation has no '{0}' part")]
    MissingKey(String),

    #[error("Expected an array of shape {expected}, got {got:?}")]
    Dims {
        expected: &'static str,
        got: Vec<usize>,
    },

    #[error("Part '{key}' of shape {got:?} cannot be added to features of shape {features:?}")]
    ShapeMismatch {
        key: String,
        features: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Part '{key}' has {got} periods, expected {expected}")]
    TimeDimMismatch {
        key: String,
        expected: usize,
        got: usize,
    },

    #[error("Invalid observation processor: {0}")]
    Config(&'static str),
}

pub type Result<T, E = EnvError> = std::result::Result<T, E>;
