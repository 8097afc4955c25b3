// src/model/param.rs

//! Named, shape-checked numeric parameters.
//!
//! Every environment keeps its costs, bounds and inventory levels in a
//! [`ParamStore`]. Inputs are resolved once, when they are set, into a fixed
//! shape: scalars and single-element arrays are broadcast, arrays of the
//! target shape are stored as they are, and anything else is rejected.

use crate::error::ParamError;
use log::warn;
use ndarray::{Array1, ArrayD, Ix1, IxDyn};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug)]
struct ParameterState {
    value: ArrayD<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl ParameterState {
    fn clamp(&mut self) {
        if let Some(min) = self.min {
            self.value.mapv_inplace(|v| v.max(min));
        }
        if let Some(max) = self.max {
            self.value.mapv_inplace(|v| v.min(max));
        }
    }
}

/// A parameter handle shared between several owners (environment, agent,
/// data loader). Clones point to the same value, so an update through one
/// owner is seen by all of them.
#[derive(Debug, Clone)]
pub struct Parameter(Rc<RefCell<ParameterState>>);

impl Parameter {
    /// Creates a handle, clamping the value to `[min, max]` when given.
    pub fn new(value: ArrayD<f64>, min: Option<f64>, max: Option<f64>) -> Self {
        let mut state = ParameterState { value, min, max };
        state.clamp();
        Self(Rc::new(RefCell::new(state)))
    }

    /// A handle filled with a single value.
    pub fn filled(value: f64, shape: &[usize]) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(shape), value), None, None)
    }

    pub fn value(&self) -> ArrayD<f64> {
        self.0.borrow().value.clone()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.borrow().value.shape().to_vec()
    }

    /// Replaces the value. The shape is fixed at creation.
    pub fn set_value(&self, value: ArrayD<f64>) -> Result<(), ParamError> {
        let mut state = self.0.borrow_mut();
        if value.shape() != state.value.shape() {
            return Err(ParamError::ShapeMismatch {
                name: "shared parameter".to_string(),
                expected: state.value.shape().to_vec(),
                got: value.shape().to_vec(),
            });
        }
        state.value = value;
        state.clamp();
        Ok(())
    }
}

/// Raw input accepted by [`ParamStore::set_param`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParamInput {
    /// Registers the name without a value.
    None,
    Scalar(f64),
    Vector(Vec<f64>),
    #[serde(skip)]
    Array(ArrayD<f64>),
    #[serde(skip)]
    Shared(Parameter),
    /// Stored opaquely, e.g. for composite configurations.
    Composite(BTreeMap<String, f64>),
}

impl Default for ParamInput {
    fn default() -> Self {
        ParamInput::None
    }
}

impl From<f64> for ParamInput {
    fn from(v: f64) -> Self {
        ParamInput::Scalar(v)
    }
}

impl From<Vec<f64>> for ParamInput {
    fn from(v: Vec<f64>) -> Self {
        ParamInput::Vector(v)
    }
}

impl From<Array1<f64>> for ParamInput {
    fn from(v: Array1<f64>) -> Self {
        ParamInput::Array(v.into_dyn())
    }
}

impl From<ArrayD<f64>> for ParamInput {
    fn from(v: ArrayD<f64>) -> Self {
        ParamInput::Array(v)
    }
}

impl From<Parameter> for ParamInput {
    fn from(p: Parameter) -> Self {
        ParamInput::Shared(p)
    }
}

impl From<BTreeMap<String, f64>> for ParamInput {
    fn from(m: BTreeMap<String, f64>) -> Self {
        ParamInput::Composite(m)
    }
}

impl<T: Into<ParamInput>> From<Option<T>> for ParamInput {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamInput::None, Into::into)
    }
}

/// A resolved parameter.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Unset,
    Array(ArrayD<f64>),
    Shared(Parameter),
    Composite(BTreeMap<String, f64>),
}

impl ParamValue {
    pub fn is_set(&self) -> bool {
        !matches!(self, ParamValue::Unset)
    }
}

/// Named parameters of one environment or agent.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    params: HashMap<String, ParamValue>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (`new = true`) or updates (`new = false`) the parameter `name`.
    ///
    /// Updating a parameter that does not exist is an error. Creating one
    /// that already exists overwrites it with a warning. An update never
    /// resizes: the stored array must already have `shape`.
    pub fn set_param(
        &mut self,
        name: &str,
        input: impl Into<ParamInput>,
        shape: &[usize],
        new: bool,
    ) -> Result<(), ParamError> {
        if !new && !self.params.contains_key(name) {
            return Err(ParamError::DoesNotExist(name.to_string()));
        }

        let resolved = resolve(name, input.into(), shape)?;

        if new {
            if self.params.contains_key(name) {
                warn!("Parameter {} already exists. Overwriting it.", name);
            }
            self.params.insert(name.to_string(), resolved);
            return Ok(());
        }

        let slot = self
            .params
            .get_mut(name)
            .ok_or_else(|| ParamError::DoesNotExist(name.to_string()))?;

        match &*slot {
            ParamValue::Shared(handle) => {
                if let ParamValue::Array(value) = &resolved {
                    return handle.set_value(value.clone()).map_err(|e| rename(e, name));
                }
            }
            ParamValue::Array(old) => {
                if let ParamValue::Array(value) = &resolved {
                    if old.shape() != value.shape() {
                        return Err(ParamError::ShapeMismatch {
                            name: name.to_string(),
                            expected: old.shape().to_vec(),
                            got: value.shape().to_vec(),
                        });
                    }
                }
            }
            _ => {}
        }
        *slot = resolved;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// True if the parameter exists and holds a value.
    pub fn is_set(&self, name: &str) -> bool {
        self.params.get(name).map_or(false, ParamValue::is_set)
    }

    /// Current array value of `name`, reading through shared handles.
    pub fn array(&self, name: &str) -> Result<ArrayD<f64>, ParamError> {
        match self.params.get(name) {
            None => Err(ParamError::DoesNotExist(name.to_string())),
            Some(ParamValue::Unset) => Err(ParamError::Unset(name.to_string())),
            Some(ParamValue::Array(a)) => Ok(a.clone()),
            Some(ParamValue::Shared(p)) => Ok(p.value()),
            Some(ParamValue::Composite(_)) => Err(ParamError::NotAnArray(name.to_string())),
        }
    }

    /// Value of a one-dimensional parameter.
    pub fn vector(&self, name: &str) -> Result<Array1<f64>, ParamError> {
        let a = self.array(name)?;
        let got = a.shape().to_vec();
        a.into_dimensionality::<Ix1>()
            .map_err(|_| ParamError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![got.iter().product()],
                got,
            })
    }

    /// First element of the parameter.
    pub fn scalar(&self, name: &str) -> Result<f64, ParamError> {
        self.array(name)?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ParamError::Unset(name.to_string()))
    }
}

fn rename(err: ParamError, name: &str) -> ParamError {
    match err {
        ParamError::ShapeMismatch { expected, got, .. } => ParamError::ShapeMismatch {
            name: name.to_string(),
            expected,
            got,
        },
        other => other,
    }
}

fn resolve(name: &str, input: ParamInput, shape: &[usize]) -> Result<ParamValue, ParamError> {
    match input {
        ParamInput::None => Ok(ParamValue::Unset),
        ParamInput::Scalar(v) => Ok(ParamValue::Array(ArrayD::from_elem(IxDyn(shape), v))),
        ParamInput::Vector(v) => broadcast(name, Array1::from(v).into_dyn(), shape),
        ParamInput::Array(a) => broadcast(name, a, shape),
        ParamInput::Shared(p) => {
            if p.shape() != shape {
                return Err(ParamError::ShapeMismatch {
                    name: name.to_string(),
                    expected: shape.to_vec(),
                    got: p.shape(),
                });
            }
            Ok(ParamValue::Shared(p))
        }
        ParamInput::Composite(m) => Ok(ParamValue::Composite(m)),
    }
}

fn broadcast(name: &str, a: ArrayD<f64>, shape: &[usize]) -> Result<ParamValue, ParamError> {
    if a.shape() == shape {
        Ok(ParamValue::Array(a))
    } else if a.len() == 1 {
        let v = a.iter().next().copied().unwrap_or_default();
        Ok(ParamValue::Array(ArrayD::from_elem(IxDyn(shape), v)))
    } else {
        Err(ParamError::ShapeMismatch {
            name: name.to_string(),
            expected: shape.to_vec(),
            got: a.shape().to_vec(),
        })
    }
}
