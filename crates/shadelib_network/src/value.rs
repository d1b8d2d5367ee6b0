// SPDX-License-Identifier: MIT OR Apache-2.0
//! Literal attribute values stored on shading nodes.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Value held by an attribute that is not driven by a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Numeric value (floats, ints, enums and booleans alike)
    Scalar(f64),
    /// String value (file paths, notes)
    Text(String),
    /// Two-component value (UV coordinates, repeat)
    Vector2(f64, f64),
    /// Three-component value (colors, positions)
    Vector3(f64, f64, f64),
}

impl AttributeValue {
    /// Short type name used in logs and host errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Text(_) => "text",
            Self::Vector2(..) => "double2",
            Self::Vector3(..) => "double3",
        }
    }

    /// Check whether two values can be written to the same attribute
    pub fn same_type(&self, other: &AttributeValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Whether every numeric component is finite
    ///
    /// JSON has no representation for infinities or NaN.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Text(_) => true,
            Self::Vector2(x, y) => x.is_finite() && y.is_finite(),
            Self::Vector3(x, y, z) => x.is_finite() && y.is_finite() && z.is_finite(),
        }
    }

    /// Empty string, used to reset note attributes
    pub fn empty_text() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Vector2(x, y) => write!(f, "[{x}, {y}]"),
            Self::Vector3(x, y, z) => write!(f, "[{x}, {y}, {z}]"),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<[f64; 2]> for AttributeValue {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::Vector2(x, y)
    }
}

impl From<[f64; 3]> for AttributeValue {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::Vector3(x, y, z)
    }
}

/// Shapes accepted when reading a value back from a file
#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Pair([f64; 2]),
    Triple([f64; 3]),
}

impl From<WireValue> for AttributeValue {
    fn from(wire: WireValue) -> Self {
        match wire {
            WireValue::Bool(b) => Self::Scalar(if b { 1.0 } else { 0.0 }),
            WireValue::Number(v) => Self::Scalar(v),
            WireValue::Text(s) => Self::Text(s),
            WireValue::Pair(p) => p.into(),
            WireValue::Triple(t) => t.into(),
        }
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireValue::deserialize(deserializer).map(Self::from)
    }
}
