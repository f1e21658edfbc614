//! Named parameter values passed between priors, the trace and the model.
use crate::{error::EmuError, Real, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, iter::FromIterator};

/// A simple enumeration that may contain a scalar param or a vector value
/// (e.g., the variable process).
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(Real),
    Vector(Vec<Real>),
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::Scalar(0.)
    }
}

impl ParamValue {
    /// Number of scalar components.
    pub fn len(&self) -> usize {
        match self {
            ParamValue::Scalar(_) => 1,
            ParamValue::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat view of components.
    pub fn as_slice(&self) -> &[Real] {
        match self {
            ParamValue::Scalar(x) => std::slice::from_ref(x),
            ParamValue::Vector(v) => v.as_slice(),
        }
    }
}

impl From<Real> for ParamValue {
    fn from(x: Real) -> Self {
        ParamValue::Scalar(x)
    }
}

impl From<Vec<Real>> for ParamValue {
    fn from(v: Vec<Real>) -> Self {
        ParamValue::Vector(v)
    }
}

/// Ordered mapping from parameter name to value.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    /// Return a scalar parameter or fail if it is absent or vector-valued.
    pub fn scalar(&self, name: &str) -> Result<Real> {
        match self.values.get(name) {
            Some(ParamValue::Scalar(x)) => Ok(*x),
            Some(ParamValue::Vector(_)) => Err(EmuError::ParameterShape {
                name: name.to_string(),
                expected: "scalar",
            }),
            None => Err(EmuError::MissingParameter(name.to_string())),
        }
    }

    /// Return a vector parameter or fail if it is absent or scalar.
    pub fn vector(&self, name: &str) -> Result<&[Real]> {
        match self.values.get(name) {
            Some(ParamValue::Vector(v)) => Ok(v.as_slice()),
            Some(ParamValue::Scalar(_)) => Err(EmuError::ParameterShape {
                name: name.to_string(),
                expected: "vector",
            }),
            None => Err(EmuError::MissingParameter(name.to_string())),
        }
    }

    /// Merge other into a copy of self. Values in other take precedence.
    pub fn merged(&self, other: &ParamSet) -> ParamSet {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.values.insert(k.clone(), v.clone());
        }
        out
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParamSet {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
