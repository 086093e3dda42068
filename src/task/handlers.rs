//! Placeholder handlers for the built-in pipeline tasks.
//!
//! They honour the bundled grammar and nothing more; real deployments
//! register their own implementations under the same names.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::handler::TaskHandler;
use crate::infra::Clock;
use crate::threshold::ThresholdEvaluator;

pub const GENERATE: &str = "generate";
pub const RENDER: &str = "render";
pub const UPLOAD: &str = "upload";
pub const EVALUATE: &str = "evaluate";
pub const MUTATE: &str = "mutate";
pub const HALT: &str = "halt";

fn string_field<'a>(input: &'a Value, field: &str) -> Result<&'a str> {
    match input.get(field).and_then(Value::as_str) {
        Some(s) => Ok(s),
        None => bail!("{field} must be a string"),
    }
}

pub struct GenerateHandler {
    clock: Arc<dyn Clock>,
}

impl GenerateHandler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl TaskHandler for GenerateHandler {
    async fn execute(&self, input: &Value) -> Result<Value> {
        let prompt = string_field(input, "prompt")?;
        Ok(json!({
            "content": format!("Generated content for: {prompt}"),
            "metadata": { "timestamp": self.clock.now().timestamp_millis() }
        }))
    }
}

pub struct RenderHandler;

#[async_trait]
impl TaskHandler for RenderHandler {
    async fn execute(&self, input: &Value) -> Result<Value> {
        let content = string_field(input, "content")?;
        let template = string_field(input, "template")?;
        Ok(json!({ "rendered": format!("{template}: {content}") }))
    }
}

pub struct UploadHandler {
    clock: Arc<dyn Clock>,
}

impl UploadHandler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl TaskHandler for UploadHandler {
    async fn execute(&self, input: &Value) -> Result<Value> {
        string_field(input, "data")?;
        let destination = string_field(input, "destination")?;
        let stamp = self.clock.now().timestamp_millis();
        Ok(json!({ "url": format!("{}/{stamp}", destination.trim_end_matches('/')) }))
    }
}

/// Scores every target with a fixed score and grades it with the
/// configured thresholds.
pub struct EvaluateHandler {
    evaluator: ThresholdEvaluator,
    score: f64,
}

impl EvaluateHandler {
    pub fn new(evaluator: ThresholdEvaluator, score: f64) -> Self {
        Self { evaluator, score }
    }
}

#[async_trait]
impl TaskHandler for EvaluateHandler {
    async fn execute(&self, input: &Value) -> Result<Value> {
        string_field(input, "target")?;
        let verdict = self.evaluator.evaluate_score(self.score);
        Ok(json!({ "result": verdict, "score": self.score }))
    }
}

pub struct MutateHandler {
    clock: Arc<dyn Clock>,
}

impl MutateHandler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl TaskHandler for MutateHandler {
    async fn execute(&self, input: &Value) -> Result<Value> {
        let Some(state) = input.get("state").and_then(Value::as_object) else {
            bail!("state must be an object");
        };
        let mut mutated = state.clone();
        mutated.insert(
            "mutatedAt".to_string(),
            json!(self.clock.now().timestamp_millis()),
        );
        Ok(json!({ "mutated": mutated }))
    }
}

pub struct HaltHandler;

#[async_trait]
impl TaskHandler for HaltHandler {
    async fn execute(&self, input: &Value) -> Result<Value> {
        let reason = input
            .get("reason")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .unwrap_or("No reason provided");
        Ok(json!({ "halted": true, "reason": reason }))
    }
}

/// The six built-in handlers keyed by task name.
pub fn builtin_handlers(
    clock: Arc<dyn Clock>,
    evaluator: ThresholdEvaluator,
    score: f64,
) -> Vec<(&'static str, Arc<dyn TaskHandler>)> {
    let mut handlers: Vec<(&'static str, Arc<dyn TaskHandler>)> = Vec::with_capacity(6);
    handlers.push((GENERATE, Arc::new(GenerateHandler::new(clock.clone()))));
    handlers.push((RENDER, Arc::new(RenderHandler)));
    handlers.push((UPLOAD, Arc::new(UploadHandler::new(clock.clone()))));
    handlers.push((EVALUATE, Arc::new(EvaluateHandler::new(evaluator, score))));
    handlers.push((MUTATE, Arc::new(MutateHandler::new(clock))));
    handlers.push((HALT, Arc::new(HaltHandler)));
    handlers
}
