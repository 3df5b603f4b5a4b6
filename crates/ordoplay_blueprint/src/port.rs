// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node control and data pins.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Control-flow input
    Enter,
    /// Control-flow output
    Exit,
    /// Data-flow input
    Input,
    /// Data-flow output
    Output,
}

impl PortDirection {
    /// Whether this is a control-flow (Enter/Exit) direction
    pub fn is_control(self) -> bool {
        matches!(self, Self::Enter | Self::Exit)
    }

    /// Whether this is a data-flow (Input/Output) direction
    pub fn is_data(self) -> bool {
        !self.is_control()
    }

    /// Whether links leave from this side (Exit or Output)
    pub fn is_source(self) -> bool {
        matches!(self, Self::Exit | Self::Output)
    }

    /// The direction a link must terminate on when it leaves this one
    pub fn opposite(self) -> Self {
        match self {
            Self::Enter => Self::Exit,
            Self::Exit => Self::Enter,
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }

    /// Parse a direction name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "enter" => Some(Self::Enter),
            "exit" => Some(Self::Exit),
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            _ => None,
        }
    }

    /// Lowercase name for messages
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Enter => 1,
            Self::Exit => 2,
            Self::Input => 3,
            Self::Output => 4,
        }
    }
}

/// Data type that can flow through data ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// String value
    String,
    /// Any type (for generic nodes)
    Any,
    /// Custom type registered in the [`TypeRegistry`](crate::types::TypeRegistry)
    Custom(String),
}

impl DataType {
    /// Stable name used for hashing and display
    pub fn name(&self) -> &str {
        match self {
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::Vector4 => "Vector4",
            Self::Color => "Color",
            Self::String => "String",
            Self::Any => "Any",
            Self::Custom(name) => name,
        }
    }

    /// Parse a type name; names that are not built in become [`DataType::Custom`]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Bool" => Self::Bool,
            "Int" => Self::Int,
            "Float" => Self::Float,
            "Vector2" => Self::Vector2,
            "Vector3" => Self::Vector3,
            "Vector4" => Self::Vector4,
            "Color" => Self::Color,
            "String" => Self::String,
            "Any" => Self::Any,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Built-in widening: can a value of `self` flow into a port of `target`?
    ///
    /// Custom subclass rules live in the type registry.
    pub fn widens_to(&self, target: &DataType) -> bool {
        if matches!(self, Self::Any) || matches!(target, Self::Any) || self == target {
            return true;
        }

        matches!(
            (self, target),
            (Self::Int, Self::Float)
                | (Self::Float, Self::Vector2 | Self::Vector3 | Self::Vector4)
                | (Self::Vector2, Self::Vector3 | Self::Vector4)
                | (Self::Vector3, Self::Vector4)
                | (Self::Color, Self::Vector4)
                | (Self::Vector4, Self::Color)
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role flags carried by a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortFlags(u8);

impl PortFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Boundary pin forwarded to the enclosing compound node
    pub const EXTERNAL: Self = Self(1);
    /// Not shown to the author; used for implicit wiring
    pub const HIDDEN: Self = Self(1 << 1);
    /// Reserved for subgraph boundary nodes
    pub const EXPOSED: Self = Self(1 << 2);
    /// Reserved for subgraph boundary nodes
    pub const BUILT_IN: Self = Self(1 << 3);

    /// Check whether all bits of `other` are set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for PortFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name (display and lookup key)
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type; always `None` for control ports, `None` on a data port
    /// while its type is still being inferred
    pub data_type: Option<DataType>,
    /// Role flags
    #[serde(default)]
    pub flags: PortFlags,
    /// Default value (for inputs)
    #[serde(default)]
    pub default_value: Option<Value>,
    /// Jump label (Exit ports jump to Enter ports with an equal label)
    #[serde(default)]
    pub label: Option<String>,
}

impl Port {
    fn new(name: impl Into<String>, direction: PortDirection, data_type: Option<DataType>) -> Self {
        Self {
            name: name.into(),
            direction,
            data_type,
            flags: PortFlags::NONE,
            default_value: None,
            label: None,
        }
    }

    /// Create a control-flow input port
    pub fn enter(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Enter, None)
    }

    /// Create a control-flow output port
    pub fn exit(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Exit, None)
    }

    /// Create a data input port
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PortDirection::Input, Some(data_type))
    }

    /// Create a data output port
    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PortDirection::Output, Some(data_type))
    }

    /// Create a data port whose type is not known yet
    pub fn untyped(name: impl Into<String>, direction: PortDirection) -> Self {
        Self::new(name, direction, None)
    }

    /// Set the default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the jump label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add flags
    pub fn with_flags(mut self, flags: PortFlags) -> Self {
        self.flags.insert(flags);
        self
    }

    /// Whether this port is a boundary pin
    pub fn is_external(&self) -> bool {
        self.flags.contains(PortFlags::EXTERNAL)
    }

    /// Whether this port is a data port still waiting for its type
    pub fn is_unresolved(&self) -> bool {
        self.direction.is_data() && self.data_type.is_none()
    }

    /// Check direction compatibility for a link leaving `self` into `other`
    pub fn can_link_to(&self, other: &Port) -> bool {
        self.direction.is_source() && other.direction == self.direction.opposite()
    }
}

/// FNV-1a over a byte stream
fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Hash of a jump label; the empty label hashes to 0
pub fn label_hash(label: &str) -> u32 {
    if label.is_empty() {
        return 0;
    }
    match fnv1a(label.bytes()) {
        0 => 1,
        hash => hash,
    }
}

/// Signature of a boundary pin: hash of (direction, data type, name)
pub fn signature(direction: PortDirection, data_type: Option<&DataType>, name: &str) -> u32 {
    let type_name = data_type.map(DataType::name).unwrap_or("");
    let bytes = std::iter::once(direction.tag())
        .chain(type_name.bytes())
        .chain(std::iter::once(0))
        .chain(name.bytes());
    fnv1a(bytes)
}
