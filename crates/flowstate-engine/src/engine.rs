//! State machine execution.
//!
//! The engine walks a definition one state at a time: Task states dispatch
//! through the task invoker, Choice states branch on the execution context,
//! Wait states suspend the run, Succeed/Fail states (and `End: true`)
//! terminate it. Cycles are legal; the polling pattern
//! Wait -> poll -> Choice -> Wait revisits states until its condition flips.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use flowstate_tasks::{TaskError, TaskInvoker};

use crate::cancel::CancelToken;
use crate::condition;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::definition::{ChoiceState, State, StateMachine, TaskState};
use crate::error::{DefinitionError, ExecutionError};
use crate::events::{EventKind, EventSink};
use crate::schedule::{TokioWaitScheduler, WaitScheduler};

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
    Aborted,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Succeeded => "SUCCEEDED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Aborted => "ABORTED",
        }
    }
}

/// Final result of one run.
///
/// `terminal_state` names the state the run ended at. The status reflects
/// the state machine outcome only; whether a particular terminal state
/// (say, a failure-notification task) means the business outcome failed is
/// the caller's interpretation.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub run_id: Uuid,
    pub status: ExecutionStatus,
    pub terminal_state: Option<String>,
    pub context: Value,
    pub error: Option<ExecutionError>,
    pub steps: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

enum Transition {
    Next(String),
    End,
}

/// Walks state machine definitions, dispatching each state.
///
/// One engine serves any number of concurrent runs; each run owns its
/// context and current-state pointer, so runs never share mutable state.
pub struct Engine {
    invoker: Arc<dyn TaskInvoker>,
    scheduler: Arc<dyn WaitScheduler>,
    config: EngineConfig,
    events: Option<EventSink>,
}

impl Engine {
    /// Create an engine over a task invoker with default configuration.
    pub fn new(invoker: Arc<dyn TaskInvoker>) -> Self {
        Self {
            invoker,
            scheduler: Arc::new(TokioWaitScheduler),
            config: EngineConfig::default(),
            events: None,
        }
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the wait scheduler.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn WaitScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Attach an event sink observed by every run.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a definition to a terminal state.
    pub async fn run(&self, definition: &StateMachine, input: Value) -> ExecutionOutcome {
        self.run_cancellable(definition, input, CancelToken::never()).await
    }

    /// Execute a definition, honoring external cancellation at every state
    /// boundary and during waits and task invocations.
    pub async fn run_cancellable(
        &self,
        definition: &StateMachine,
        input: Value,
        cancel: CancelToken,
    ) -> ExecutionOutcome {
        self.run_as(Uuid::new_v4(), definition, input, cancel).await
    }

    pub(crate) async fn run_as(
        &self,
        run_id: Uuid,
        definition: &StateMachine,
        input: Value,
        cancel: CancelToken,
    ) -> ExecutionOutcome {
        let started_at = Utc::now();
        let mut ctx = ExecutionContext::new(input);

        // Definitions built through the parser are already validated; those
        // assembled in code get the same guarantees here.
        if let Err(err) = definition.validate() {
            tracing::warn!(run_id = %run_id, error = %err, "Definition rejected");
            return self.finish(run_id, None, ctx, Err(err.into()), 0, started_at);
        }

        let mut current = definition.start_at.clone();
        let mut steps: u64 = 0;

        tracing::info!(run_id = %run_id, start_at = %current, "Execution started");
        self.emit(run_id, EventKind::RunStarted, Some(&current), Value::Null);

        let ended: Result<String, (ExecutionError, Option<String>)> = loop {
            if cancel.is_cancelled() {
                break Err((ExecutionError::Aborted, Some(current)));
            }

            if let Some(limit) = self.config.max_steps {
                if steps >= limit {
                    break Err((ExecutionError::StepLimitExceeded(limit), Some(current)));
                }
            }
            steps += 1;

            let Some(state) = definition.state(&current) else {
                // Unreachable for validated definitions.
                let err = DefinitionError::UndefinedTransition {
                    state: current.clone(),
                    target: current.clone(),
                };
                break Err((err.into(), Some(current)));
            };

            tracing::debug!(run_id = %run_id, state = %current, "Entering state");
            self.emit(run_id, EventKind::StateEntered, Some(&current), Value::Null);

            match state {
                State::Task(task) => {
                    match self.execute_task(run_id, &current, task, &mut ctx, &cancel).await {
                        Ok(Transition::Next(next)) => current = next,
                        Ok(Transition::End) => break Ok(current),
                        Err(err) => break Err((err, Some(current))),
                    }
                }
                State::Choice(choice) => {
                    match self.execute_choice(run_id, &current, choice, &ctx) {
                        Ok(next) => current = next,
                        Err(err) => break Err((err, Some(current))),
                    }
                }
                State::Wait(wait) => {
                    tracing::debug!(
                        run_id = %run_id,
                        state = %current,
                        seconds = wait.seconds,
                        "Waiting"
                    );
                    self.emit(
                        run_id,
                        EventKind::WaitStarted,
                        Some(&current),
                        serde_json::json!({ "seconds": wait.seconds }),
                    );

                    tokio::select! {
                        _ = self.scheduler.wait(Duration::from_secs(wait.seconds)) => {}
                        _ = cancel.cancelled() => {
                            break Err((ExecutionError::Aborted, Some(current)));
                        }
                    }

                    match &wait.next {
                        Some(next) => current = next.clone(),
                        None => break Ok(current),
                    }
                }
                State::Succeed(_) => break Ok(current),
                State::Fail(fail) => {
                    let err = ExecutionError::FailState {
                        error: fail.error.clone(),
                        cause: fail.cause.clone(),
                    };
                    break Err((err, Some(current)));
                }
            }
        };

        match ended {
            Ok(terminal) => self.finish(run_id, Some(terminal), ctx, Ok(()), steps, started_at),
            Err((error, terminal)) => {
                self.finish(run_id, terminal, ctx, Err(error), steps, started_at)
            }
        }
    }

    fn finish(
        &self,
        run_id: Uuid,
        terminal_state: Option<String>,
        ctx: ExecutionContext,
        result: Result<(), ExecutionError>,
        steps: u64,
        started_at: DateTime<Utc>,
    ) -> ExecutionOutcome {
        let finished_at = Utc::now();
        let (status, error) = match result {
            Ok(()) => (ExecutionStatus::Succeeded, None),
            Err(ExecutionError::Aborted) => (ExecutionStatus::Aborted, Some(ExecutionError::Aborted)),
            Err(err) => (ExecutionStatus::Failed, Some(err)),
        };

        let kind = match status {
            ExecutionStatus::Succeeded => EventKind::RunSucceeded,
            ExecutionStatus::Failed => EventKind::RunFailed,
            ExecutionStatus::Aborted => EventKind::RunAborted,
        };
        let payload = match &error {
            Some(err) => serde_json::json!({
                "steps": steps,
                "code": err.code(),
                "message": err.to_string(),
            }),
            None => serde_json::json!({ "steps": steps }),
        };
        self.emit(run_id, kind, terminal_state.as_deref(), payload);

        match &error {
            Some(err) => tracing::warn!(
                run_id = %run_id,
                status = status.as_str(),
                steps,
                error = %err,
                "Execution ended"
            ),
            None => tracing::info!(
                run_id = %run_id,
                status = status.as_str(),
                terminal_state = terminal_state.as_deref().unwrap_or(""),
                steps,
                "Execution ended"
            ),
        }

        ExecutionOutcome {
            run_id,
            status,
            terminal_state,
            context: ctx.into_data(),
            error,
            steps,
            started_at,
            finished_at,
        }
    }

    async fn execute_task(
        &self,
        run_id: Uuid,
        name: &str,
        task: &TaskState,
        ctx: &mut ExecutionContext,
        cancel: &CancelToken,
    ) -> Result<Transition, ExecutionError> {
        let params = match &task.parameters {
            Some(template) => ctx.resolve_parameters(template),
            None => Value::Object(serde_json::Map::new()),
        };

        tracing::debug!(run_id = %run_id, state = %name, resource = %task.resource, "Invoking task");
        self.emit(
            run_id,
            EventKind::TaskStarted,
            Some(name),
            serde_json::json!({ "resource": task.resource }),
        );

        let deadline = task
            .timeout_seconds
            .map(Duration::from_secs)
            .or(self.config.default_task_timeout);

        let result = tokio::select! {
            result = self.invoke_with_deadline(&task.resource, &params, deadline) => result,
            _ = cancel.cancelled() => return Err(ExecutionError::Aborted),
        };

        match result {
            Ok(output) => {
                self.emit(run_id, EventKind::TaskSucceeded, Some(name), output.clone());
                ctx.merge(output);
                match &task.next {
                    Some(next) => Ok(Transition::Next(next.clone())),
                    None => Ok(Transition::End),
                }
            }
            Err(err) => {
                let code = err.code();
                tracing::warn!(
                    run_id = %run_id,
                    state = %name,
                    code = %code,
                    error = %err,
                    "Task failed"
                );
                self.emit(
                    run_id,
                    EventKind::TaskFailed,
                    Some(name),
                    serde_json::json!({ "code": code, "message": err.to_string() }),
                );

                match task.catch.iter().find(|catcher| catcher.matches(code)) {
                    Some(catcher) => {
                        tracing::debug!(
                            run_id = %run_id,
                            state = %name,
                            target = %catcher.next,
                            "Error caught"
                        );
                        self.emit(
                            run_id,
                            EventKind::TaskCaught,
                            Some(name),
                            serde_json::json!({ "code": code, "next": catcher.next }),
                        );
                        ctx.record_error(code, &err.to_string());
                        Ok(Transition::Next(catcher.next.clone()))
                    }
                    None => Err(ExecutionError::TaskFailed {
                        state: name.to_string(),
                        source: err,
                    }),
                }
            }
        }
    }

    async fn invoke_with_deadline(
        &self,
        resource: &str,
        params: &Value,
        deadline: Option<Duration>,
    ) -> Result<Value, TaskError> {
        match deadline {
            Some(limit) => {
                match tokio::time::timeout(limit, self.invoker.invoke(resource, params)).await {
                    Ok(result) => result,
                    Err(_) => Err(TaskError::Timeout(limit.as_secs())),
                }
            }
            None => self.invoker.invoke(resource, params).await,
        }
    }

    fn execute_choice(
        &self,
        run_id: Uuid,
        name: &str,
        choice: &ChoiceState,
        ctx: &ExecutionContext,
    ) -> Result<String, ExecutionError> {
        for rule in &choice.choices {
            if condition::evaluate(rule, ctx) {
                tracing::debug!(
                    run_id = %run_id,
                    state = %name,
                    variable = %rule.variable,
                    next = %rule.next,
                    "Choice matched"
                );
                self.emit(
                    run_id,
                    EventKind::ChoiceMatched,
                    Some(name),
                    serde_json::json!({ "variable": rule.variable, "next": rule.next }),
                );
                return Ok(rule.next.clone());
            }
        }

        if let Some(default) = &choice.default {
            tracing::debug!(run_id = %run_id, state = %name, next = %default, "Choice defaulted");
            self.emit(
                run_id,
                EventKind::ChoiceMatched,
                Some(name),
                serde_json::json!({ "next": default, "default": true }),
            );
            return Ok(default.clone());
        }

        Err(ExecutionError::NoMatchingChoice(name.to_string()))
    }

    fn emit(&self, run_id: Uuid, kind: EventKind, state: Option<&str>, payload: Value) {
        if let Some(events) = &self.events {
            events.emit(run_id, kind, state, payload);
        }
    }
}
