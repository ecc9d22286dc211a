use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LearnError, LearnResult};

/// Declared value type of a hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Float,
    Int,
    Bool,
    Text,
}

impl ParamKind {
    /// Whether a value may be assigned to a parameter of this kind.
    /// Integers are accepted where floats are expected.
    pub fn accepts(self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (ParamKind::Float, ParamValue::Float(_))
                | (ParamKind::Float, ParamValue::Int(_))
                | (ParamKind::Int, ParamValue::Int(_))
                | (ParamKind::Bool, ParamValue::Bool(_))
                | (ParamKind::Text, ParamValue::Text(_))
        )
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamKind::Float => "float",
            ParamKind::Int => "integer",
            ParamKind::Bool => "boolean",
            ParamKind::Text => "text",
        };
        f.write_str(s)
    }
}

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Text(_) => ParamKind::Text,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Name and declared kind of one hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        ParamSpec { name, kind }
    }
}

/// Strongly-typed hyperparameter set of one learning algorithm.
///
/// Each implementor declares its parameters in `SPECS` and exposes them by
/// name so grids can be expanded without reflection.
pub trait Hyperparameters:
    Clone + Default + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const SPECS: &'static [ParamSpec];

    /// Assign one parameter by name.
    fn set(&mut self, name: &str, value: &ParamValue) -> LearnResult<()>;

    /// Read one parameter by name.
    fn get(&self, name: &str) -> Option<ParamValue>;

    /// Check every value lies within its legal domain.
    fn validate(&self) -> LearnResult<()>;

    fn spec(name: &str) -> Option<&'static ParamSpec> {
        Self::SPECS.iter().find(|s| s.name == name)
    }

    /// All parameters as a name -> value map.
    fn assignment(&self) -> BTreeMap<String, ParamValue> {
        Self::SPECS
            .iter()
            .filter_map(|s| self.get(s.name).map(|v| (s.name.to_string(), v)))
            .collect()
    }
}

// ─── Helpers for `Hyperparameters::set` implementations ─────────────────────

pub fn expect_f64(name: &str, value: &ParamValue) -> LearnResult<f64> {
    value.as_f64().ok_or_else(|| kind_error(name, ParamKind::Float, value))
}

pub fn expect_usize(name: &str, value: &ParamValue) -> LearnResult<usize> {
    let v = value
        .as_i64()
        .ok_or_else(|| kind_error(name, ParamKind::Int, value))?;
    usize::try_from(v).map_err(|_| LearnError::InvalidHyperparameter {
        name: name.to_string(),
        reason: format!("must be non-negative, got {}", v),
    })
}

pub fn expect_u64(name: &str, value: &ParamValue) -> LearnResult<u64> {
    expect_usize(name, value).map(|v| v as u64)
}

pub fn expect_bool(name: &str, value: &ParamValue) -> LearnResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| kind_error(name, ParamKind::Bool, value))
}

pub fn expect_text<'a>(name: &str, value: &'a ParamValue) -> LearnResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| kind_error(name, ParamKind::Text, value))
}

pub fn unknown_param(name: &str) -> LearnError {
    LearnError::InvalidHyperparameter {
        name: name.to_string(),
        reason: "unknown parameter".into(),
    }
}

/// Fail with `InvalidHyperparameter` unless `ok` holds.
pub fn ensure(ok: bool, name: &str, reason: impl Into<String>) -> LearnResult<()> {
    if ok {
        Ok(())
    } else {
        Err(LearnError::InvalidHyperparameter {
            name: name.to_string(),
            reason: reason.into(),
        })
    }
}

fn kind_error(name: &str, expected: ParamKind, value: &ParamValue) -> LearnError {
    LearnError::InvalidHyperparameter {
        name: name.to_string(),
        reason: format!("expected {} value, got {}", expected, value.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_accepts_int_for_float() {
        assert!(ParamKind::Float.accepts(&ParamValue::Int(3)));
        assert!(!ParamKind::Int.accepts(&ParamValue::Float(3.0)));
        assert!(!ParamKind::Bool.accepts(&ParamValue::Text("true".into())));
    }

    #[test]
    fn test_untagged_json_keeps_kind() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[1, 1.0, true, "gini"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Int(1),
                ParamValue::Float(1.0),
                ParamValue::Bool(true),
                ParamValue::Text("gini".into()),
            ]
        );
        let json = serde_json::to_string(&values).unwrap();
        let back: Vec<ParamValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_expect_usize_rejects_negative() {
        assert!(expect_usize("max_depth", &ParamValue::Int(-1)).is_err());
        assert_eq!(expect_usize("max_depth", &ParamValue::Int(4)).unwrap(), 4);
    }
}
