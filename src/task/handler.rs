use async_trait::async_trait;
use serde_json::Value;

/// A named unit of work. The shape of `input` and of the returned value is
/// declared by the task grammar, not by the handler.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, input: &Value) -> anyhow::Result<Value>;
}
