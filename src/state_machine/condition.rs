//! Guard predicates over a JSON context.
//!
//! Transitions are keyed by event name; these predicates additionally gate a
//! `(state, event)` mapping on runtime data. They are attached per transition, either in code through
//! [`StateMachine::with_guard`](super::StateMachine::with_guard) or declaratively
//! through a [`GuardSpec`] in the state machine document.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A predicate evaluated against a transition context.
pub trait Condition: fmt::Debug + Send + Sync {
    fn evaluate(&self, context: &Value) -> bool;
}

/// Always passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysTrue;

impl Condition for AlwaysTrue {
    fn evaluate(&self, _context: &Value) -> bool {
        true
    }
}

/// Passes when `context[property]` equals the expected value.
///
/// A context that is not an object, or lacks the property, never passes.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEquals {
    property: String,
    expected: Value,
}

impl PropertyEquals {
    pub fn new(property: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            expected: expected.into(),
        }
    }
}

impl Condition for PropertyEquals {
    fn evaluate(&self, context: &Value) -> bool {
        context
            .as_object()
            .and_then(|map| map.get(&self.property))
            .is_some_and(|value| *value == self.expected)
    }
}

/// Comparison operator used by [`ThresholdCondition`], written as `>`, `<`,
/// `>=`, `<=`, `==` or `!=` in documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Comparison {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Gt => left > right,
            Comparison::Lt => left < right,
            Comparison::Ge => left >= right,
            Comparison::Le => left <= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        };
        f.write_str(op)
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Comparison::Gt),
            "<" => Ok(Comparison::Lt),
            ">=" => Ok(Comparison::Ge),
            "<=" => Ok(Comparison::Le),
            "==" => Ok(Comparison::Eq),
            "!=" => Ok(Comparison::Ne),
            other => Err(format!("Invalid operator: {other}")),
        }
    }
}

impl TryFrom<String> for Comparison {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Comparison> for String {
    fn from(op: Comparison) -> Self {
        op.to_string()
    }
}

/// Passes when the numeric `context[property]` compares true against a
/// fixed threshold. Non-numeric values never pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCondition {
    property: String,
    threshold: f64,
    operator: Comparison,
}

impl ThresholdCondition {
    pub fn new(property: impl Into<String>, operator: Comparison, threshold: f64) -> Self {
        Self {
            property: property.into(),
            threshold,
            operator,
        }
    }
}

impl Condition for ThresholdCondition {
    fn evaluate(&self, context: &Value) -> bool {
        context
            .as_object()
            .and_then(|map| map.get(&self.property))
            .and_then(Value::as_f64)
            .is_some_and(|value| self.operator.apply(value, self.threshold))
    }
}

/// Declarative form of a guard as written in a state machine document.
///
/// ```json
/// { "kind": "threshold", "property": "score", "operator": ">=", "value": 0.8 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardSpec {
    Always,
    Property {
        property: String,
        equals: Value,
    },
    Threshold {
        property: String,
        operator: Comparison,
        value: f64,
    },
}

impl GuardSpec {
    pub fn build(&self) -> Arc<dyn Condition> {
        match self {
            GuardSpec::Always => Arc::new(AlwaysTrue),
            GuardSpec::Property { property, equals } => {
                Arc::new(PropertyEquals::new(property.clone(), equals.clone()))
            }
            GuardSpec::Threshold {
                property,
                operator,
                value,
            } => Arc::new(ThresholdCondition::new(property.clone(), *operator, *value)),
        }
    }
}
