//! Engine error types.

use thiserror::Error;

use flowstate_tasks::TaskError;

/// Errors detected while loading or validating a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The document is not valid JSON for the definition shape.
    #[error("Malformed definition: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `StartAt` does not name a state.
    #[error("Start state not found: {0}")]
    UnknownStartState(String),

    /// A `Next`/`Default`/`Catch` target does not name a state.
    #[error("State {state:?} transitions to undefined state {target:?}")]
    UndefinedTransition { state: String, target: String },

    /// A non-terminal state has neither `Next` nor `End: true`.
    #[error("State {0:?} has no continuation")]
    MissingTransition(String),

    /// A state declares both `Next` and `End: true`.
    #[error("State {0:?} declares both Next and End")]
    ConflictingTransition(String),
}

/// Errors that terminate an execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The definition failed validation before the first state ran.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// A task failed and no catcher matched.
    #[error("Task failed in state {state:?}: {source}")]
    TaskFailed {
        state: String,
        #[source]
        source: TaskError,
    },

    /// A choice state matched no rule and has no default.
    #[error("No matching choice in state {0:?}")]
    NoMatchingChoice(String),

    /// The definition reached an explicit `Fail` state.
    #[error("Execution failed: {}", error.as_deref().unwrap_or("Fail state reached"))]
    FailState {
        error: Option<String>,
        cause: Option<String>,
    },

    /// The configured step guard tripped.
    #[error("Step limit of {0} exceeded")]
    StepLimitExceeded(u64),

    /// The run was cancelled externally.
    #[error("Execution aborted")]
    Aborted,
}

impl ExecutionError {
    /// Error code string for logs and event payloads.
    pub fn code(&self) -> &str {
        match self {
            ExecutionError::Definition(_) => "States.InvalidDefinition",
            ExecutionError::TaskFailed { source, .. } => source.code(),
            ExecutionError::NoMatchingChoice(_) => "States.NoMatchingChoice",
            ExecutionError::FailState { error, .. } => {
                error.as_deref().unwrap_or("States.Failed")
            }
            ExecutionError::StepLimitExceeded(_) => "States.StepLimitExceeded",
            ExecutionError::Aborted => "States.Aborted",
        }
    }
}
