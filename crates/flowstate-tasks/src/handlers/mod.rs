//! Built-in task handlers.
//!
//! This module provides implementations for common task boundaries:
//! - `func` - Closure-backed handler for embedding and tests
//! - `http` - JSON-over-HTTP handler

mod func;
mod http;

pub use self::func::FnHandler;
pub use self::http::HttpHandler;
