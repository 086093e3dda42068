//! Declarative input/output contracts for every task.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuntimeError;

/// The kinds a schema can demand. Arrays are distinct from objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    String,
    Number,
    Boolean,
    Array,
}

impl SchemaType {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaType::Object => "object",
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
        }
    }

    /// The kind of a concrete value. `null` is reported as `"null"` and
    /// therefore never matches a declared type.
    pub fn kind_of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        Self::kind_of(value) == self.as_str()
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint on a single property of an object payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl PropertySchema {
    pub fn typed(kind: SchemaType) -> Self {
        Self {
            kind: Some(kind),
            allowed: None,
        }
    }

    pub fn one_of(kind: SchemaType, allowed: impl IntoIterator<Item = Value>) -> Self {
        Self {
            kind: Some(kind),
            allowed: Some(allowed.into_iter().collect()),
        }
    }
}

/// Shape of a task payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub kind: SchemaType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertySchema>,
}

impl Schema {
    /// An object schema with no constraints yet.
    pub fn object() -> Self {
        Self {
            kind: SchemaType::Object,
            required: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Declares `name` as a required property of the given kind.
    pub fn require(mut self, name: &str, property: PropertySchema) -> Self {
        self.required.push(name.to_string());
        self.properties.insert(name.to_string(), property);
        self
    }

    /// Declares `name` as an optional property.
    pub fn optional(mut self, name: &str, property: PropertySchema) -> Self {
        self.properties.insert(name.to_string(), property);
        self
    }
}

/// Input and output schema of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContract {
    pub input_schema: Schema,
    pub output_schema: Schema,
}

/// Registry of task contracts, keyed by task name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskGrammar {
    pub tasks: BTreeMap<String, TaskContract>,
}

impl TaskGrammar {
    pub fn with_task(mut self, name: &str, input_schema: Schema, output_schema: Schema) -> Self {
        self.tasks.insert(
            name.to_string(),
            TaskContract {
                input_schema,
                output_schema,
            },
        );
        self
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn input_schema(&self, name: &str) -> Result<&Schema, RuntimeError> {
        self.contract(name).map(|c| &c.input_schema)
    }

    pub fn output_schema(&self, name: &str) -> Result<&Schema, RuntimeError> {
        self.contract(name).map(|c| &c.output_schema)
    }

    fn contract(&self, name: &str) -> Result<&TaskContract, RuntimeError> {
        self.tasks
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownTask(name.to_string()))
    }
}
