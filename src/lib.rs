//! A configuration-driven runtime that walks a declarative state machine,
//! running one contract-checked task per state.
//!
//! The three inputs are a [`StateMachineDefinition`], a [`TaskGrammar`] and a
//! [`ThresholdModel`], normally loaded together by [`RuntimeConfig::load`].
//! [`Runtime`] ties them to task handlers and drives the machine until it
//! reaches a terminal state.

pub mod config;
pub mod error;
pub mod infra;
pub mod logging;
pub mod orchestrator;
pub mod state_machine;
pub mod task;
pub mod threshold;

pub use config::{ConfigPaths, RuntimeConfig};
pub use error::{ErrorCategory, RuntimeError, ValidationError};
pub use orchestrator::{RunRecord, Runtime, RuntimeBuilder};
pub use state_machine::{StateMachine, StateMachineDefinition};
pub use task::{TaskGrammar, TaskHandler};
pub use threshold::{ThresholdEvaluator, ThresholdModel};
