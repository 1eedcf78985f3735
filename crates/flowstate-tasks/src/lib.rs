//! Flowstate Task Library
//!
//! The task-invocation boundary the execution engine dispatches external
//! actions through.
//!
//! This crate provides:
//! - The `TaskInvoker` trait the engine calls with an opaque resource
//!   identifier and a parameter document
//! - A `TaskRegistry` mapping resource identifiers to `TaskHandler`s
//! - Task error classification with catchable error codes
//! - Built-in handlers (JSON-over-HTTP, closure-backed)

pub mod error;
pub mod handlers;
pub mod invoker;

pub use error::TaskError;
pub use handlers::{FnHandler, HttpHandler};
pub use invoker::{TaskHandler, TaskInvoker, TaskRegistry};
