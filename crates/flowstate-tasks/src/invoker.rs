//! Task registry and dispatch.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TaskError;

/// Boundary the execution engine dispatches external actions through.
///
/// The resource identifier is opaque to the engine; handlers with `.sync`
/// semantics block until the external operation completes, others return as
/// soon as the operation is started.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    /// Invoke the named resource with a parameter document.
    async fn invoke(&self, resource: &str, params: &Value) -> Result<Value, TaskError>;
}

/// Handler serving a single resource identifier.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The resource identifier this handler serves.
    fn resource(&self) -> &str;

    /// Perform the external action.
    async fn call(&self, params: &Value) -> Result<Value, TaskError>;
}

/// Registry of task handlers keyed by resource identifier.
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its resource identifier.
    pub fn register<H: TaskHandler + 'static>(&mut self, handler: H) {
        let resource = handler.resource().to_string();
        self.handlers.insert(resource, Arc::new(handler));
    }

    /// Get a handler by resource identifier.
    pub fn get(&self, resource: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(resource).cloned()
    }

    /// Check if a resource has a handler.
    pub fn has(&self, resource: &str) -> bool {
        self.handlers.contains_key(resource)
    }

    /// List all registered resource identifiers.
    pub fn list(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl TaskInvoker for TaskRegistry {
    async fn invoke(&self, resource: &str, params: &Value) -> Result<Value, TaskError> {
        let handler = self.get(resource).ok_or_else(|| {
            tracing::warn!(resource = %resource, "No handler for resource");
            TaskError::NotFound(resource.to_string())
        })?;

        tracing::debug!(resource = %resource, "Dispatching task");
        handler.call(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockHandler;

    #[async_trait]
    impl TaskHandler for MockHandler {
        fn resource(&self) -> &str {
            "mock"
        }

        async fn call(&self, _params: &Value) -> Result<Value, TaskError> {
            Ok(serde_json::json!({"mock": true}))
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = TaskRegistry::new();
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_registry_register() {
        let mut registry = TaskRegistry::new();
        registry.register(MockHandler);

        assert!(registry.has("mock"));
        assert!(!registry.has("unknown"));
        assert_eq!(registry.list(), vec!["mock"]);
    }

    #[test]
    fn test_registry_invoke() {
        let mut registry = TaskRegistry::new();
        registry.register(MockHandler);

        let output = tokio_test::block_on(registry.invoke("mock", &serde_json::json!({}))).unwrap();
        assert_eq!(output, serde_json::json!({"mock": true}));
    }

    #[tokio::test]
    async fn test_registry_invoke_not_found() {
        let registry = TaskRegistry::new();
        let result = registry.invoke("unknown", &serde_json::json!({})).await;
        assert!(matches!(result, Err(TaskError::NotFound(_))));
    }
}
