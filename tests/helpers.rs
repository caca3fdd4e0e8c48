//! Test utility functions for adaptors

#![allow(dead_code)]

use adaptors::adaptors::bigquery::{LoadJob, TableReference, WarehouseClient};
use adaptors::core::operation::{boxed, named};
use adaptors::{
    compose_next_state, AdaptorError, BoxedOperation, ExecutionEngine, ExecutionEvent,
    ExecutionStatus, Job, JobConfig, Result, RunSummary, State,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Shared log the recording operations append to
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Operation that records its name and installs `value` as data
pub fn recording(name: &str, log: &Log, value: Value) -> BoxedOperation {
    let label = name.to_string();
    let log = log.clone();
    boxed(named(name, move |state: State| {
        log.lock().unwrap().push(label.clone());
        let value = value.clone();
        async move { Ok(compose_next_state(&state, value)) }
    }))
}

/// Operation that records its name and then fails with a configuration error
pub fn failing(name: &str, log: &Log, message: &str) -> BoxedOperation {
    let label = name.to_string();
    let log = log.clone();
    let message = message.to_string();
    boxed(named(name, move |_state: State| {
        log.lock().unwrap().push(label.clone());
        let message = message.clone();
        async move { Err(AdaptorError::Configuration(message)) }
    }))
}

/// Operation that yields to the runtime before recording
pub fn suspended(name: &str, log: &Log, millis: u64) -> BoxedOperation {
    let label = name.to_string();
    let log = log.clone();
    boxed(named(name, move |state: State| {
        let log = log.clone();
        let label = label.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
            log.lock().unwrap().push(label);
            Ok(state)
        }
    }))
}

/// Outcome of running a job through the engine
pub struct RunResult {
    pub summary: RunSummary,
    pub result: Result<State>,
    pub events: Vec<ExecutionEvent>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self.summary.status, ExecutionStatus::Completed) && self.result.is_ok()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.summary.status, ExecutionStatus::Failed) && self.result.is_err()
    }

    pub fn state(&self) -> &State {
        match &self.result {
            Ok(state) => state,
            Err(e) => panic!("Run failed: {}", e),
        }
    }

    pub fn error(&self) -> &AdaptorError {
        match &self.result {
            Ok(_) => panic!("Run should have failed: {}", self.describe()),
            Err(e) => e,
        }
    }

    /// Step IDs that finished, successfully or not, in event order
    pub fn execution_order(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::OperationCompleted { step_id, .. }
                | ExecutionEvent::OperationFailed { step_id, .. } => Some(step_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn describe(&self) -> String {
        let status = match self.summary.status {
            ExecutionStatus::Completed => "✅ Completed",
            ExecutionStatus::Failed => "❌ Failed",
            ExecutionStatus::Running => "🔄 Running",
            ExecutionStatus::Pending => "❓ Pending",
        };
        format!(
            "{} - {}/{} operations completed",
            status, self.summary.completed_operations, self.summary.total_operations
        )
    }
}

/// Run a job with an engine that records every event
pub async fn run_job(job: &Job, state: State) -> RunResult {
    let engine = ExecutionEngine::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let (summary, result) = engine.execute(job, state).await;
    let events = events.lock().unwrap().clone();
    RunResult {
        summary,
        result,
        events,
    }
}

/// Parse, validate and run a YAML job
pub async fn run_job_yaml(yaml: &str, state: State) -> RunResult {
    let config = JobConfig::from_yaml(yaml).expect("job YAML should be valid");
    run_job(&config.to_job(), state).await
}

/// Assert the run completed successfully
pub fn assert_run_completed(result: &RunResult) {
    assert!(
        result.is_success(),
        "Run should be completed, but was: {}",
        result.describe()
    );
}

/// Assert the run failed at `step_id` with an error mentioning `expected`
pub fn assert_run_failed_at(result: &RunResult, step_id: &str, expected: &str) {
    assert!(
        result.is_failed(),
        "Run should have failed, but was: {}",
        result.describe()
    );
    assert_eq!(result.summary.failed_step.as_deref(), Some(step_id));

    let message = result.error().to_string();
    assert!(
        message.contains(expected),
        "Error:\n{}\n\ndoes not contain:\n{}",
        message,
        expected
    );
}

/// Assert specific steps finished in order
pub fn assert_execution_order(result: &RunResult, expected_order: &[&str]) {
    let actual = result.execution_order();
    assert_eq!(
        actual, expected_order,
        "Expected execution order: {:?}\nActual: {:?}",
        expected_order, actual
    );
}

/// Warehouse double that records loaded files
pub struct MockWarehouse {
    pub loaded: Mutex<Vec<PathBuf>>,
    pub job_errors: Vec<Value>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self {
            loaded: Mutex::new(Vec::new()),
            job_errors: Vec::new(),
        }
    }

    pub fn with_job_errors(errors: Vec<Value>) -> Self {
        Self {
            loaded: Mutex::new(Vec::new()),
            job_errors: errors,
        }
    }

    pub fn loaded_names(&self) -> Vec<String> {
        self.loaded
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect()
    }
}

#[async_trait]
impl WarehouseClient for MockWarehouse {
    async fn get_table(&self, dataset_id: &str, table_id: &str) -> Result<TableReference> {
        Ok(TableReference {
            project_id: "test-project".to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        })
    }

    async fn load_file(
        &self,
        destination: &TableReference,
        file: &Path,
        load_config: &Value,
    ) -> Result<LoadJob> {
        self.loaded.lock().unwrap().push(file.to_path_buf());
        let index = self.loaded.lock().unwrap().len();

        let job = json!({
            "id": format!("{}:job_{}", destination.project_id, index),
            "jobReference": {"projectId": destination.project_id, "jobId": format!("job_{}", index)},
            "configuration": {"load": load_config},
            "status": {"state": "DONE", "errors": self.job_errors}
        });
        Ok(serde_json::from_value(job).expect("mock job should deserialize"))
    }
}
