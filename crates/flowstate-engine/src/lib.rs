//! Flowstate Execution Engine
//!
//! Interprets declarative state machine definitions: Task, Choice, Wait,
//! Succeed and Fail states with first-match-wins choice rules, per-task
//! error catching, timed waits and cooperative cancellation.
//!
//! This crate provides:
//! - A serde model of the JSON definition format with load-time validation
//! - A path-addressable execution context document
//! - The execution engine, walking one state at a time per run
//! - A per-run event stream and structured tracing
//! - A registry of independent concurrent runs

pub mod cancel;
pub mod condition;
pub mod config;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod events;
pub mod runs;
pub mod schedule;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use definition::StateMachine;
pub use engine::{Engine, ExecutionOutcome, ExecutionStatus};
pub use error::{DefinitionError, ExecutionError};
pub use events::{EventKind, EventSink, ExecutionEvent};
pub use runs::RunRegistry;
pub use schedule::{TokioWaitScheduler, WaitScheduler};
