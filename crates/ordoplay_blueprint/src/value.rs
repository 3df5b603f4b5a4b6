// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime values carried by data ports.

use crate::port::DataType;
use serde::{Deserialize, Serialize};

/// Value that can be stored in or read from a port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value; readers fall back to their default
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// String
    String(String),
    /// Opaque handle for custom types (entities, assets)
    Handle(u64),
}

impl Value {
    /// Get the built-in data type for this value, if it has one
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::None | Self::Handle(_) => None,
            Self::Bool(_) => Some(DataType::Bool),
            Self::Int(_) => Some(DataType::Int),
            Self::Float(_) => Some(DataType::Float),
            Self::Vector2(_) => Some(DataType::Vector2),
            Self::Vector3(_) => Some(DataType::Vector3),
            Self::Vector4(_) => Some(DataType::Vector4),
            Self::Color(_) => Some(DataType::Color),
            Self::String(_) => Some(DataType::String),
        }
    }

    /// Whether this is [`Value::None`]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Rust types that can be read from and written to ports.
///
/// `from_value` applies the same widening rules the compiler accepts for
/// links; anything else yields `None` and the reader falls back to its default.
pub trait PortData: Sized + Default {
    /// Convert from a port value
    fn from_value(value: Value) -> Option<Self>;

    /// Convert into a port value
    fn into_value(self) -> Value;
}

impl PortData for Value {
    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

impl PortData for bool {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl PortData for i32 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl PortData for f32 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f32),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl PortData for String {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl PortData for u64 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Handle(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Handle(self)
    }
}

impl PortData for [f32; 2] {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Vector2(v) => Some(v),
            Value::Float(v) => Some([v; 2]),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Vector2(self)
    }
}

impl PortData for [f32; 3] {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Vector3(v) => Some(v),
            Value::Vector2([x, y]) => Some([x, y, 0.0]),
            Value::Float(v) => Some([v; 3]),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Vector3(self)
    }
}

impl PortData for [f32; 4] {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Vector4(v) | Value::Color(v) => Some(v),
            Value::Vector3([x, y, z]) => Some([x, y, z, 0.0]),
            Value::Vector2([x, y]) => Some([x, y, 0.0, 0.0]),
            Value::Float(v) => Some([v; 4]),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Vector4(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_conversions() {
        assert_eq!(f32::from_value(Value::Int(3)), Some(3.0));
        assert_eq!(<[f32; 3]>::from_value(Value::Vector2([1.0, 2.0])), Some([1.0, 2.0, 0.0]));
        assert_eq!(<[f32; 4]>::from_value(Value::Color([0.1, 0.2, 0.3, 1.0])), Some([0.1, 0.2, 0.3, 1.0]));
    }

    #[test]
    fn test_mismatch_yields_none() {
        assert_eq!(i32::from_value(Value::Float(1.5)), None);
        assert_eq!(String::from_value(Value::None), None);
        assert_eq!(bool::from_value(Value::String("true".into())), None);
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Float(1.0).data_type(), Some(DataType::Float));
        assert_eq!(Value::Handle(7).data_type(), None);
        assert!(Value::default().is_none());
    }
}
