//! Execution event stream.
//!
//! Every run reports its lifecycle edges to an optional sink alongside the
//! structured tracing output. Events from concurrent runs share one sink and
//! are distinguished by run id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Lifecycle edge of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    StateEntered,
    TaskStarted,
    TaskSucceeded,
    TaskFailed,
    TaskCaught,
    ChoiceMatched,
    WaitStarted,
    RunSucceeded,
    RunFailed,
    RunAborted,
}

/// One event on a run's event stream.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
    pub run_id: Uuid,
    pub kind: EventKind,

    /// State the event concerns, when any.
    pub state: Option<String>,

    /// Event-specific payload.
    pub payload: Value,

    pub at: DateTime<Utc>,
}

/// Sending half of an event stream.
///
/// Emission never blocks a run; dropping the receiver detaches the sink.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ExecutionEvent>,
}

impl EventSink {
    /// Create a sink and its receiving half.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn emit(&self, run_id: Uuid, kind: EventKind, state: Option<&str>, payload: Value) {
        let event = ExecutionEvent {
            run_id,
            kind,
            state: state.map(str::to_string),
            payload,
            at: Utc::now(),
        };
        let _ = self.tx.send(event);
    }
}
