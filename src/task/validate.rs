use std::sync::Arc;

use serde_json::Value;

use super::grammar::{PropertySchema, Schema, SchemaType, TaskGrammar};
use crate::error::{RuntimeError, ValidationError};

/// Enforces a [`TaskGrammar`] against concrete task payloads.
#[derive(Debug, Clone)]
pub struct TaskValidator {
    grammar: Arc<TaskGrammar>,
}

impl TaskValidator {
    pub fn new(grammar: Arc<TaskGrammar>) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &TaskGrammar {
        &self.grammar
    }

    pub fn validate_input(&self, task: &str, input: &Value) -> Result<(), RuntimeError> {
        let schema = self.grammar.input_schema(task)?;
        validate(input, schema, &format!("{task} input"))?;
        Ok(())
    }

    pub fn validate_output(&self, task: &str, output: &Value) -> Result<(), RuntimeError> {
        let schema = self.grammar.output_schema(task)?;
        validate(output, schema, &format!("{task} output"))?;
        Ok(())
    }
}

/// Checks `data` against `schema`. Only object schemas are checked in depth;
/// any other schema kind accepts the payload as is.
pub fn validate(data: &Value, schema: &Schema, context: &str) -> Result<(), ValidationError> {
    if schema.kind != SchemaType::Object {
        return Ok(());
    }

    let Some(fields) = data.as_object() else {
        return Err(ValidationError::NotAnObject {
            context: context.to_string(),
        });
    };

    if let Some(field) = schema.required.iter().find(|f| !fields.contains_key(*f)) {
        return Err(ValidationError::MissingField {
            context: context.to_string(),
            field: field.clone(),
        });
    }

    for (name, property) in &schema.properties {
        if let Some(value) = fields.get(name) {
            validate_property(value, property, &format!("{context}.{name}"))?;
        }
    }

    Ok(())
}

fn validate_property(
    value: &Value,
    schema: &PropertySchema,
    context: &str,
) -> Result<(), ValidationError> {
    if let Some(kind) = schema.kind
        && !kind.matches(value)
    {
        return Err(ValidationError::TypeMismatch {
            context: context.to_string(),
            expected: kind.to_string(),
            actual: SchemaType::kind_of(value).to_string(),
        });
    }

    if let Some(allowed) = &schema.allowed
        && !allowed.iter().any(|candidate| same_value(candidate, value))
    {
        return Err(ValidationError::EnumViolation {
            context: context.to_string(),
            allowed: allowed.iter().map(describe).collect::<Vec<_>>().join(", "),
            actual: describe(value),
        });
    }

    Ok(())
}

// Numbers compare by value, so `1` and `1.0` are the same member.
fn same_value(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
