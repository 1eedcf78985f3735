//! End-to-end tests over a crawl-then-ingest pipeline definition: a polling
//! loop on a crawler, a job run with error catching, and notification states
//! on both outcomes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use flowstate_engine::{
    Engine, EngineConfig, ExecutionStatus, RunRegistry, StateMachine, WaitScheduler,
};
use flowstate_tasks::{FnHandler, TaskError, TaskInvoker, TaskRegistry};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

fn pipeline_definition() -> StateMachine {
    StateMachine::from_json(
        r#"{
        "Comment": "Crawl the raw bucket, then run the ingestion job and notify",
        "StartAt": "StartCrawler",
        "States": {
            "StartCrawler": {
                "Type": "Task",
                "Resource": "crawler:start",
                "Parameters": { "Name": "daily_raw_crawler" },
                "Next": "GetCrawler"
            },
            "GetCrawler": {
                "Type": "Task",
                "Resource": "crawler:get",
                "Parameters": { "Name": "daily_raw_crawler" },
                "Next": "Crawler Status Check"
            },
            "Crawler Status Check": {
                "Type": "Choice",
                "Choices": [
                    { "Variable": "$.Crawler.State", "StringMatches": "RUNNING", "Next": "Wait" }
                ],
                "Default": "StartIngestJob"
            },
            "Wait": {
                "Type": "Wait",
                "Seconds": 10,
                "Next": "GetCrawler"
            },
            "StartIngestJob": {
                "Type": "Task",
                "Resource": "jobs:run.sync",
                "Parameters": { "JobName": "airline-data-ingestion" },
                "Next": "Job Status Check",
                "Catch": [
                    { "ErrorEquals": ["States.TaskFailed"], "Next": "failed_notification" }
                ]
            },
            "Job Status Check": {
                "Type": "Choice",
                "Choices": [
                    { "Variable": "$.JobRunState", "StringMatches": "SUCCEEDED", "Next": "success_notification" }
                ],
                "Default": "failed_notification"
            },
            "failed_notification": {
                "Type": "Task",
                "Resource": "notify:publish",
                "Parameters": { "Message": "Ingestion job failed" },
                "End": true
            },
            "success_notification": {
                "Type": "Task",
                "Resource": "notify:publish",
                "Parameters": { "Message": "Ingestion job succeeded" },
                "End": true
            }
        }
    }"#,
    )
    .expect("pipeline definition is well-formed")
}

/// Wait scheduler that counts invocations and returns immediately.
#[derive(Default)]
struct CountingScheduler {
    waits: AtomicU64,
}

#[async_trait]
impl WaitScheduler for CountingScheduler {
    async fn wait(&self, _duration: Duration) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted task registry for the pipeline resources.
///
/// The crawler reports RUNNING for `running_polls` status calls, then
/// STOPPING. The job run result is scripted per test. Every invocation is
/// appended to `log`.
fn scripted_registry(
    running_polls: u64,
    job_result: impl Fn() -> Result<Value, TaskError> + Send + Sync + 'static,
    log: Arc<Mutex<Vec<String>>>,
) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    let polls = Arc::new(AtomicU64::new(0));

    let seen = log.clone();
    registry.register(FnHandler::new("crawler:start", move |_| {
        seen.lock().unwrap().push("crawler:start".to_string());
        Ok(json!({}))
    }));

    let seen = log.clone();
    registry.register(FnHandler::new("crawler:get", move |_| {
        seen.lock().unwrap().push("crawler:get".to_string());
        let state = if polls.fetch_add(1, Ordering::SeqCst) < running_polls {
            "RUNNING"
        } else {
            "STOPPING"
        };
        Ok(json!({ "Crawler": { "State": state } }))
    }));

    let seen = log.clone();
    registry.register(FnHandler::new("jobs:run.sync", move |params| {
        assert_eq!(params["JobName"], json!("airline-data-ingestion"));
        seen.lock().unwrap().push("jobs:run.sync".to_string());
        job_result()
    }));

    let seen = log.clone();
    registry.register(FnHandler::new("notify:publish", move |params| {
        let message = params["Message"].as_str().unwrap_or("").to_string();
        seen.lock().unwrap().push(format!("notify:publish {message}"));
        Ok(json!({}))
    }));

    registry
}

#[tokio::test]
async fn polling_loop_waits_once_per_running_poll() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(3, || Ok(json!({ "JobRunState": "SUCCEEDED" })), log.clone());
    let scheduler = Arc::new(CountingScheduler::default());

    let outcome = Engine::new(Arc::new(registry))
        .with_scheduler(scheduler.clone())
        .run(&pipeline_definition(), json!({}))
        .await;

    // Three RUNNING polls, three waits, then the job runs.
    assert_eq!(scheduler.waits.load(Ordering::SeqCst), 3);
    assert!(outcome.is_success());
    assert_eq!(outcome.terminal_state.as_deref(), Some("success_notification"));

    let invocations = log.lock().unwrap();
    assert_eq!(invocations.iter().filter(|r| *r == "crawler:get").count(), 4);
    assert_eq!(invocations.iter().filter(|r| *r == "jobs:run.sync").count(), 1);
}

#[tokio::test]
async fn job_failure_takes_catch_to_failed_notification() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(
        0,
        || Err(TaskError::Failed("job crashed".to_string())),
        log.clone(),
    );

    let outcome = Engine::new(Arc::new(registry))
        .with_scheduler(Arc::new(CountingScheduler::default()))
        .run(&pipeline_definition(), json!({}))
        .await;

    assert_eq!(outcome.terminal_state.as_deref(), Some("failed_notification"));
    // The run itself completed; which branch it ended on carries the
    // business outcome.
    assert!(outcome.is_success());
    assert_eq!(outcome.context["Error"]["Error"], json!("States.TaskFailed"));

    let invocations = log.lock().unwrap();
    assert!(invocations.contains(&"notify:publish Ingestion job failed".to_string()));
    assert!(!invocations.contains(&"notify:publish Ingestion job succeeded".to_string()));
}

#[tokio::test]
async fn job_succeeded_state_reaches_success_notification() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(0, || Ok(json!({ "JobRunState": "SUCCEEDED" })), log.clone());

    let outcome = Engine::new(Arc::new(registry))
        .with_scheduler(Arc::new(CountingScheduler::default()))
        .run(&pipeline_definition(), json!({}))
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.terminal_state.as_deref(), Some("success_notification"));
    assert!(log
        .lock()
        .unwrap()
        .contains(&"notify:publish Ingestion job succeeded".to_string()));
}

#[tokio::test]
async fn job_not_succeeded_takes_default_branch() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(0, || Ok(json!({ "JobRunState": "FAILED" })), log.clone());

    let outcome = Engine::new(Arc::new(registry))
        .with_scheduler(Arc::new(CountingScheduler::default()))
        .run(&pipeline_definition(), json!({}))
        .await;

    assert_eq!(outcome.terminal_state.as_deref(), Some("failed_notification"));
    assert!(log
        .lock()
        .unwrap()
        .contains(&"notify:publish Ingestion job failed".to_string()));
}

#[test]
fn dangling_target_fails_at_load_not_run() {
    let result = StateMachine::from_json(
        r#"{
        "StartAt": "GetCrawler",
        "States": {
            "GetCrawler": { "Type": "Task", "Resource": "crawler:get", "Next": "Misspelled" }
        }
    }"#,
    );

    assert!(matches!(
        result,
        Err(flowstate_engine::DefinitionError::UndefinedTransition { ref target, .. })
            if target == "Misspelled"
    ));
}

#[tokio::test]
async fn step_limit_bounds_endless_polling() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    // Crawler never leaves RUNNING.
    let registry = scripted_registry(u64::MAX, || Ok(json!({})), log);

    let outcome = Engine::new(Arc::new(registry))
        .with_scheduler(Arc::new(CountingScheduler::default()))
        .with_config(EngineConfig {
            max_steps: Some(50),
            ..EngineConfig::default()
        })
        .run(&pipeline_definition(), json!({}))
        .await;

    assert_eq!(outcome.status, ExecutionStatus::Failed);
    assert!(matches!(
        outcome.error,
        Some(flowstate_engine::ExecutionError::StepLimitExceeded(50))
    ));
}

#[tokio::test]
async fn cancellation_marks_run_aborted() {
    init_tracing();

    /// Invoker that never completes, holding the run inside a task state.
    struct BlockedInvoker;

    #[async_trait]
    impl TaskInvoker for BlockedInvoker {
        async fn invoke(&self, _resource: &str, _params: &Value) -> Result<Value, TaskError> {
            std::future::pending().await
        }
    }

    let definition = Arc::new(pipeline_definition());
    let registry = RunRegistry::new(Engine::new(Arc::new(BlockedInvoker)));

    let run_id = registry.start(definition, json!({})).await;
    assert!(registry.cancel(run_id).await);

    let outcome = registry.join(run_id).await.unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Aborted);
    assert!(matches!(
        outcome.error,
        Some(flowstate_engine::ExecutionError::Aborted)
    ));
}

#[tokio::test]
async fn event_stream_reports_lifecycle_edges() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(1, || Ok(json!({ "JobRunState": "SUCCEEDED" })), log);
    let (sink, mut events) = flowstate_engine::EventSink::channel();

    let outcome = Engine::new(Arc::new(registry))
        .with_scheduler(Arc::new(CountingScheduler::default()))
        .with_events(sink)
        .run(&pipeline_definition(), json!({}))
        .await;
    assert!(outcome.is_success());

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.run_id, outcome.run_id);
        kinds.push(event.kind);
    }

    use flowstate_engine::EventKind;
    assert_eq!(kinds.first(), Some(&EventKind::RunStarted));
    assert_eq!(kinds.last(), Some(&EventKind::RunSucceeded));
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::WaitStarted).count(), 1);
    assert!(kinds.contains(&EventKind::ChoiceMatched));
}

#[tokio::test]
async fn concurrent_runs_do_not_interfere() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(2, || Ok(json!({ "JobRunState": "SUCCEEDED" })), log);

    let engine = Engine::new(Arc::new(registry))
        .with_scheduler(Arc::new(CountingScheduler::default()));
    let runs = RunRegistry::new(engine);
    let definition = Arc::new(pipeline_definition());

    let a = runs.start(definition.clone(), json!({ "Trigger": "schedule" })).await;
    let b = runs.start(definition.clone(), json!({ "Trigger": "manual" })).await;

    let outcome_a = runs.join(a).await.unwrap();
    let outcome_b = runs.join(b).await.unwrap();

    assert_eq!(outcome_a.context["Trigger"], json!("schedule"));
    assert_eq!(outcome_b.context["Trigger"], json!("manual"));
    assert_ne!(outcome_a.run_id, outcome_b.run_id);
}
