//! Closure-backed task handler.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;
use crate::invoker::TaskHandler;

/// Task handler backed by a plain function or closure.
///
/// The closure runs synchronously on the calling task; long-running or
/// genuinely asynchronous work belongs in a dedicated `TaskHandler`
/// implementation.
pub struct FnHandler {
    resource: String,
    func: Box<dyn Fn(&Value) -> Result<Value, TaskError> + Send + Sync>,
}

impl FnHandler {
    /// Create a handler for `resource` backed by `func`.
    pub fn new<F>(resource: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        Self {
            resource: resource.into(),
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl TaskHandler for FnHandler {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn call(&self, params: &Value) -> Result<Value, TaskError> {
        (self.func)(params)
    }
}

impl std::fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("resource", &self.resource).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_handler_echoes_params() {
        let handler = FnHandler::new("echo", |params| Ok(params.clone()));

        assert_eq!(handler.resource(), "echo");
        let output = handler.call(&serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(output, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_fn_handler_failure() {
        let handler =
            FnHandler::new("broken", |_| Err(TaskError::Failed("always fails".to_string())));

        let result = handler.call(&serde_json::json!({})).await;
        assert!(matches!(result, Err(TaskError::Failed(_))));
    }
}
