//! State machine definition model and load-time validation.
//!
//! Definitions are JSON documents with a `StartAt` state name and a `States`
//! mapping. Transition integrity is checked when the definition is loaded;
//! a dangling `Next`/`Default`/`Catch` target never survives to run time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DefinitionError;

/// Pattern in a `Catch` list matching every error code.
pub const CATCH_ALL: &str = "States.ALL";

/// A parsed state machine definition, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachine {
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Name of the state execution begins at.
    pub start_at: String,

    /// All states, keyed by unique name.
    pub states: HashMap<String, State>,
}

/// A single state, tagged by `Type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum State {
    Task(TaskState),
    Choice(ChoiceState),
    Wait(WaitState),
    Succeed(SucceedState),
    Fail(FailState),
}

/// Invokes an external resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    /// Opaque resource identifier handed to the task invoker.
    pub resource: String,

    /// Parameter template; keys ending in `.$` resolve context paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    /// State to transition to on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// Marks this state terminal; the run succeeds after it.
    #[serde(default, skip_serializing_if = "is_false")]
    pub end: bool,

    /// Deadline for the invocation; expiry raises `States.Timeout`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Error recovery rules, scanned in order on failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<Catcher>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Error-pattern-to-transition rule on a task state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Catcher {
    /// Error codes this rule recovers; `States.ALL` matches any.
    pub error_equals: Vec<String>,

    /// State to transition to when the rule matches.
    pub next: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Catcher {
    /// Whether this rule recovers the given error code.
    pub fn matches(&self, code: &str) -> bool {
        self.error_equals.iter().any(|pattern| pattern == code || pattern == CATCH_ALL)
    }
}

/// Branches on conditions evaluated against the execution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceState {
    /// Rules evaluated in order; the first match selects the transition.
    pub choices: Vec<ChoiceRule>,

    /// Fallback transition when no rule matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A single condition/target pair in a choice state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceRule {
    /// `$.`-rooted path into the execution context.
    pub variable: String,

    /// Comparison applied to the resolved value.
    #[serde(flatten)]
    pub compare: Comparison,

    /// State to transition to when the comparison holds.
    pub next: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Comparison kinds supported in choice rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Comparison {
    /// Exact string equality.
    StringEquals(String),
    /// String match with `*` wildcards.
    StringMatches(String),
    NumericEquals(f64),
    NumericGreaterThan(f64),
    NumericGreaterThanEquals(f64),
    NumericLessThan(f64),
    NumericLessThanEquals(f64),
    BooleanEquals(bool),
    /// Path existence check.
    IsPresent(bool),
}

/// Pauses the run for a fixed number of seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitState {
    pub seconds: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub end: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Terminal state marking the run successful.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SucceedState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Terminal state marking the run failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FailState {
    /// Error code reported as the run's failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl StateMachine {
    /// Parse a definition from JSON text and validate it.
    pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
        let machine: StateMachine = serde_json::from_str(text)?;
        machine.validate()?;
        Ok(machine)
    }

    /// Parse a definition from a JSON value and validate it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DefinitionError> {
        let machine: StateMachine = serde_json::from_value(value)?;
        machine.validate()?;
        Ok(machine)
    }

    /// Look up a state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// Check transition integrity: the start state and every
    /// `Next`/`Default`/`Catch` target must exist, and every non-terminal
    /// state must have exactly one continuation.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if !self.states.contains_key(&self.start_at) {
            return Err(DefinitionError::UnknownStartState(self.start_at.clone()));
        }

        for (name, state) in &self.states {
            match state {
                State::Task(task) => {
                    self.check_continuation(name, task.next.as_deref(), task.end)?;
                    for catcher in &task.catch {
                        self.check_target(name, &catcher.next)?;
                    }
                }
                State::Choice(choice) => {
                    for rule in &choice.choices {
                        self.check_target(name, &rule.next)?;
                    }
                    if let Some(default) = &choice.default {
                        self.check_target(name, default)?;
                    }
                }
                State::Wait(wait) => {
                    self.check_continuation(name, wait.next.as_deref(), wait.end)?;
                }
                State::Succeed(_) | State::Fail(_) => {}
            }
        }

        Ok(())
    }

    fn check_continuation(
        &self,
        name: &str,
        next: Option<&str>,
        end: bool,
    ) -> Result<(), DefinitionError> {
        match (next, end) {
            (Some(next), false) => self.check_target(name, next),
            (None, true) => Ok(()),
            (Some(_), true) => Err(DefinitionError::ConflictingTransition(name.to_string())),
            (None, false) => Err(DefinitionError::MissingTransition(name.to_string())),
        }
    }

    fn check_target(&self, from: &str, target: &str) -> Result<(), DefinitionError> {
        if self.states.contains_key(target) {
            Ok(())
        } else {
            Err(DefinitionError::UndefinedTransition {
                state: from.to_string(),
                target: target.to_string(),
            })
        }
    }
}
