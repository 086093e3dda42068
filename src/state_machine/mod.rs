mod condition;
mod definition;
mod machine;

pub use condition::{AlwaysTrue, Comparison, Condition, GuardSpec, PropertyEquals, ThresholdCondition};
pub use definition::{StateDefinition, StateKind, StateMachineDefinition};
pub use machine::{StateMachine, events};
