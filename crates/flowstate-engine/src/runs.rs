//! Registry of concurrent executions.
//!
//! Each run owns its context and current-state pointer; the registry holds
//! only handles, keyed by run id. There is no shared mutable state between
//! runs and no process-wide singleton.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::cancel::{cancel_pair, CancelHandle};
use crate::definition::StateMachine;
use crate::engine::{Engine, ExecutionOutcome};

struct RunHandle {
    cancel: CancelHandle,
    join: tokio::task::JoinHandle<ExecutionOutcome>,
}

/// Spawns and tracks independent executions.
pub struct RunRegistry {
    engine: Arc<Engine>,
    permits: Arc<Semaphore>,
    runs: Mutex<HashMap<Uuid, RunHandle>>,
}

impl RunRegistry {
    /// Create a registry over an engine. Concurrency is bounded by the
    /// engine's `max_concurrent_runs`.
    pub fn new(engine: Engine) -> Self {
        let permits = Arc::new(Semaphore::new(engine.config().max_concurrent_runs));
        Self {
            engine: Arc::new(engine),
            permits,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Start a run; returns its id without waiting for completion.
    pub async fn start(&self, definition: Arc<StateMachine>, input: serde_json::Value) -> Uuid {
        let run_id = Uuid::new_v4();
        let (handle, token) = cancel_pair();
        let engine = self.engine.clone();
        let permits = self.permits.clone();

        let join = tokio::spawn(async move {
            // Held for the lifetime of the run.
            let _permit = permits.acquire_owned().await.ok();
            engine.run_as(run_id, &definition, input, token).await
        });

        self.runs.lock().await.insert(run_id, RunHandle { cancel: handle, join });
        tracing::debug!(run_id = %run_id, "Run registered");
        run_id
    }

    /// Request cancellation of a run. Returns false for unknown ids.
    pub async fn cancel(&self, run_id: Uuid) -> bool {
        match self.runs.lock().await.get(&run_id) {
            Some(handle) => {
                tracing::info!(run_id = %run_id, "Cancellation requested");
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Await a run's outcome, removing it from the registry.
    pub async fn join(&self, run_id: Uuid) -> Result<ExecutionOutcome> {
        let handle = self
            .runs
            .lock()
            .await
            .remove(&run_id)
            .ok_or_else(|| anyhow!("unknown run: {run_id}"))?;

        handle.join.await.map_err(|e| anyhow!("run {run_id} panicked: {e}"))
    }

    /// Ids of runs still registered (running or finished but not joined).
    pub async fn running(&self) -> Vec<Uuid> {
        self.runs.lock().await.keys().copied().collect()
    }
}
