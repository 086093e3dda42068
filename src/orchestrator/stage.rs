//! Binding from pipeline states to the tasks that run in them.
//!
//! Each state the run loop can execute has a [`StageDescriptor`]: which task
//! to call, how to build its input from the shared store, where to keep its
//! output and how to turn that output into a state machine event. New stages
//! are added by registering a descriptor, not by editing the loop.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::RuntimeError;
use crate::infra::{InMemoryStore, Store};
use crate::state_machine::events;
use crate::task::handlers;
use crate::threshold::{ThresholdEvaluator, Verdict};

/// Builds a task input from the run's shared store.
pub type InputBuilder =
    Arc<dyn Fn(&StageContext<'_>) -> Result<Value, RuntimeError> + Send + Sync>;

/// Maps a validated task output to an event name.
pub type OutputInterpreter =
    Arc<dyn Fn(&Value, &ThresholdEvaluator) -> Result<String, RuntimeError> + Send + Sync>;

/// Fixed inputs of the built-in pipeline that do not come from earlier
/// stages.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub prompt: String,
    pub template: String,
    pub destination: String,
    pub halt_reason: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            prompt: "test prompt".to_string(),
            template: "default".to_string(),
            destination: "https://example.com".to_string(),
            halt_reason: "Runtime completed".to_string(),
        }
    }
}

/// What an input builder can see.
pub struct StageContext<'a> {
    pub state: &'a str,
    pub store: &'a InMemoryStore<Value>,
    pub settings: &'a PipelineSettings,
}

impl StageContext<'_> {
    /// The artifact stored under `key` by an earlier stage.
    pub fn artifact(&self, key: &str) -> Result<&Value, RuntimeError> {
        self.store
            .get(key)
            .ok_or_else(|| RuntimeError::MissingArtifact {
                state: self.state.to_string(),
                key: key.to_string(),
            })
    }

    /// A field of a stored artifact; `null` when the artifact lacks it, so
    /// the task grammar reports the gap.
    pub fn artifact_field(&self, key: &str, field: &str) -> Result<Value, RuntimeError> {
        Ok(self.artifact(key)?.get(field).cloned().unwrap_or(Value::Null))
    }
}

#[derive(Clone)]
pub struct StageDescriptor {
    pub task: String,
    pub store_key: Option<String>,
    pub build_input: InputBuilder,
    pub interpret: OutputInterpreter,
}

impl StageDescriptor {
    /// A stage that runs `task` and reports `SUCCESS` on completion.
    pub fn new(
        task: impl Into<String>,
        build_input: impl Fn(&StageContext<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            task: task.into(),
            store_key: None,
            build_input: Arc::new(build_input),
            interpret: Arc::new(|_: &Value, _: &ThresholdEvaluator| {
                Ok(events::SUCCESS.to_string())
            }),
        }
    }

    /// Keep the task output in the shared store under `key`.
    pub fn stores_as(mut self, key: impl Into<String>) -> Self {
        self.store_key = Some(key.into());
        self
    }

    pub fn interpret_with(
        mut self,
        interpret: impl Fn(&Value, &ThresholdEvaluator) -> Result<String, RuntimeError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.interpret = Arc::new(interpret);
        self
    }
}

impl std::fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("task", &self.task)
            .field("store_key", &self.store_key)
            .finish_non_exhaustive()
    }
}

/// Registered stages keyed by state name.
#[derive(Debug, Clone, Default)]
pub struct StageTable {
    stages: HashMap<String, StageDescriptor>,
}

impl StageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `state` to `stage`, replacing any earlier binding.
    pub fn register(&mut self, state: impl Into<String>, stage: StageDescriptor) {
        self.stages.insert(state.into(), stage);
    }

    pub fn with(mut self, state: impl Into<String>, stage: StageDescriptor) -> Self {
        self.register(state, stage);
        self
    }

    pub fn get(&self, state: &str) -> Option<&StageDescriptor> {
        self.stages.get(state)
    }

    pub fn contains(&self, state: &str) -> bool {
        self.stages.contains_key(state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageDescriptor)> {
        self.stages.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// generate → render → upload → evaluate → mutate → halt.
    pub fn pipeline() -> Self {
        Self::new()
            .with(
                "generating",
                StageDescriptor::new(handlers::GENERATE, |ctx| {
                    Ok(json!({ "prompt": ctx.settings.prompt }))
                })
                .stores_as("generated"),
            )
            .with(
                "rendering",
                StageDescriptor::new(handlers::RENDER, |ctx| {
                    Ok(json!({
                        "content": ctx.artifact_field("generated", "content")?,
                        "template": ctx.settings.template,
                    }))
                })
                .stores_as("rendered"),
            )
            .with(
                "uploading",
                StageDescriptor::new(handlers::UPLOAD, |ctx| {
                    Ok(json!({
                        "data": ctx.artifact_field("rendered", "rendered")?,
                        "destination": ctx.settings.destination,
                    }))
                })
                .stores_as("uploaded"),
            )
            .with(
                "evaluating",
                StageDescriptor::new(handlers::EVALUATE, |ctx| {
                    Ok(json!({ "target": ctx.artifact_field("uploaded", "url")? }))
                })
                .stores_as("evaluated")
                .interpret_with(interpret_evaluation),
            )
            .with(
                "mutating",
                StageDescriptor::new(handlers::MUTATE, |ctx| {
                    let state = ctx.store.get("evaluated").cloned().unwrap_or_else(|| json!({}));
                    Ok(json!({ "state": state }))
                })
                .stores_as("mutated"),
            )
            .with(
                "halt",
                StageDescriptor::new(handlers::HALT, |ctx| {
                    Ok(json!({ "reason": ctx.settings.halt_reason }))
                })
                .interpret_with(|_, _| Ok(events::HALT.to_string())),
            )
    }
}

/// `result` of `pass|retry|fail` maps to `PASS|RETRY|FAIL`; any other
/// string fails. Without a `result`, a numeric `score` is graded by the
/// thresholds.
pub fn interpret_evaluation(
    output: &Value,
    evaluator: &ThresholdEvaluator,
) -> Result<String, RuntimeError> {
    if let Some(result) = output.get("result").and_then(Value::as_str) {
        let verdict = match result {
            "pass" => Verdict::Pass,
            "retry" => Verdict::Retry,
            _ => Verdict::Fail,
        };
        return Ok(verdict.event().to_string());
    }

    match output.get("score").and_then(Value::as_f64) {
        Some(score) => Ok(evaluator.evaluate_score(score).event().to_string()),
        None => Err(RuntimeError::MalformedOutput {
            task: handlers::EVALUATE.to_string(),
            message: "neither `result` nor a numeric `score` is present".to_string(),
        }),
    }
}
