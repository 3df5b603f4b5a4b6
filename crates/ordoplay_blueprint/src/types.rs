// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of data types that ports may declare.

use crate::port::DataType;
use crate::value::Value;
use indexmap::IndexMap;

/// Registered information about a data type
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// The type
    pub data_type: DataType,
    /// Value an unconnected port of this type reads
    pub default: Value,
    /// Parent type; inputs of the parent accept outputs of this type
    pub parent: Option<DataType>,
}

/// Registry of known data types
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: IndexMap<DataType, TypeInfo>,
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let mut registry = Self {
            types: IndexMap::new(),
        };

        let builtins = [
            (DataType::Bool, Value::Bool(false)),
            (DataType::Int, Value::Int(0)),
            (DataType::Float, Value::Float(0.0)),
            (DataType::Vector2, Value::Vector2([0.0; 2])),
            (DataType::Vector3, Value::Vector3([0.0; 3])),
            (DataType::Vector4, Value::Vector4([0.0; 4])),
            (DataType::Color, Value::Color([0.0, 0.0, 0.0, 1.0])),
            (DataType::String, Value::String(String::new())),
            (DataType::Any, Value::None),
        ];
        for (data_type, default) in builtins {
            registry.insert(data_type, default, None);
        }

        registry
    }

    fn insert(&mut self, data_type: DataType, default: Value, parent: Option<DataType>) {
        self.types.insert(
            data_type.clone(),
            TypeInfo {
                data_type,
                default,
                parent,
            },
        );
    }

    /// Register a custom type, optionally as a subclass of `parent`
    pub fn register(&mut self, name: impl Into<String>, default: Value, parent: Option<&str>) -> DataType {
        let data_type = DataType::Custom(name.into());
        let parent = parent.map(|p| DataType::Custom(p.to_string()));
        self.insert(data_type.clone(), default, parent);
        data_type
    }

    /// Check whether a type is registered
    pub fn contains(&self, data_type: &DataType) -> bool {
        self.types.contains_key(data_type)
    }

    /// Get the info for a type
    pub fn get(&self, data_type: &DataType) -> Option<&TypeInfo> {
        self.types.get(data_type)
    }

    /// Default value for a type (`Value::None` if unregistered)
    pub fn default_value(&self, data_type: &DataType) -> Value {
        self.get(data_type)
            .map(|info| info.default.clone())
            .unwrap_or_default()
    }

    /// Check whether an input of type `input` accepts an output of type `output`
    pub fn accepts(&self, input: &DataType, output: &DataType) -> bool {
        if output.widens_to(input) {
            return true;
        }

        // Walk the subclass chain of the output; the bound stops runaway
        // parent cycles in a misconfigured registry.
        let mut current = self.get(output).and_then(|info| info.parent.as_ref());
        for _ in 0..self.types.len() {
            match current {
                Some(parent) if parent == input => return true,
                Some(parent) => current = self.get(parent).and_then(|info| info.parent.as_ref()),
                None => return false,
            }
        }
        false
    }

    /// Iterate all registered types
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = TypeRegistry::new();
        assert!(registry.contains(&DataType::Float));
        assert!(!registry.contains(&DataType::Custom("Entity".into())));
        assert_eq!(registry.default_value(&DataType::Int), Value::Int(0));
    }

    #[test]
    fn test_subclass_accepts() {
        let mut registry = TypeRegistry::new();
        let actor = registry.register("Actor", Value::Handle(0), None);
        let pawn = registry.register("Pawn", Value::Handle(0), Some("Actor"));
        let character = registry.register("Character", Value::Handle(0), Some("Pawn"));

        assert!(registry.accepts(&actor, &character));
        assert!(registry.accepts(&pawn, &character));
        assert!(!registry.accepts(&character, &actor));
        assert!(registry.accepts(&DataType::Any, &pawn));
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let mut registry = TypeRegistry::new();
        registry.register("A", Value::None, Some("B"));
        registry.register("B", Value::None, Some("A"));
        assert!(!registry.accepts(&DataType::Custom("C".into()), &DataType::Custom("A".into())));
    }
}
