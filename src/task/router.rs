use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::handler::TaskHandler;
use super::validate::TaskValidator;
use crate::error::RuntimeError;
use crate::infra::Logger;

/// Dispatches tasks to their handlers, enforcing the grammar on both sides
/// of every call.
pub struct TaskRouter {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    validator: TaskValidator,
    logger: Arc<dyn Logger>,
    timeout: Option<Duration>,
}

impl TaskRouter {
    pub fn new(validator: TaskValidator, logger: Arc<dyn Logger>) -> Self {
        Self {
            handlers: HashMap::new(),
            validator,
            logger,
            timeout: None,
        }
    }

    /// Bound every handler call; an expired call fails with
    /// [`RuntimeError::TaskTimeout`].
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind `name` to `handler`. A later registration replaces an earlier one.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn validator(&self) -> &TaskValidator {
        &self.validator
    }

    /// Run `name` on `input` and return its validated output.
    ///
    /// Fails with `HandlerNotFound` before any validation when nothing is
    /// registered. Input violations fail before the handler is touched. A
    /// handler error, a timeout, or an output that breaks the contract is
    /// logged with the task name and input, then returned unchanged.
    #[tracing::instrument(level = "debug", skip(self, input))]
    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, RuntimeError> {
        self.logger.info(&format!("Executing task: {name}"));

        let handler = self
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::HandlerNotFound(name.to_string()))?;

        self.validator.validate_input(name, &input)?;

        let result = match self.invoke(name, handler.as_ref(), &input).await {
            Ok(output) => self
                .validator
                .validate_output(name, &output)
                .map(|()| output),
            Err(err) => Err(err),
        };

        match result {
            Ok(output) => {
                self.logger.info(&format!("Task completed: {name}"));
                Ok(output)
            }
            Err(err) => {
                self.logger
                    .error(&format!("Task failed: {name} (input: {input})"), &err);
                Err(err)
            }
        }
    }

    async fn invoke(
        &self,
        name: &str,
        handler: &dyn TaskHandler,
        input: &Value,
    ) -> Result<Value, RuntimeError> {
        let call = handler.execute(input);
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                RuntimeError::TaskTimeout {
                    task: name.to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })?,
            None => call.await,
        };
        outcome.map_err(|source| RuntimeError::Handler {
            task: name.to_string(),
            source: source.into(),
        })
    }
}

impl std::fmt::Debug for TaskRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("TaskRouter")
            .field("handlers", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}
