//! Main execution engine - runs a job and reports on it

use crate::core::operation::BoxedOperation;
use crate::core::{Job, Operation, State};
use crate::error::Result;
use crate::execution::sequencer::execute;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every operation succeeded
    Completed,
    /// An operation failed
    Failed,
}

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        job_name: String,
        total_operations: usize,
    },
    OperationStarted {
        step_id: String,
        operation: String,
        index: usize,
    },
    OperationCompleted {
        step_id: String,
        operation: String,
    },
    OperationFailed {
        step_id: String,
        error: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

type Handlers = Arc<Mutex<Vec<EventHandler>>>;

/// What happened during one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Name of the job that ran
    pub job_name: String,

    /// Final status
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed or failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Operations that finished successfully
    pub completed_operations: usize,

    /// Operations in the job
    pub total_operations: usize,

    /// Step that failed, if any
    pub failed_step: Option<String>,
}

impl RunSummary {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_name: job_name.into(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            completed_operations: 0,
            total_operations: 0,
            failed_step: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_operations: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_operations = total_operations;
    }

    /// Mark run as completed
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self, step_id: Option<String>) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.failed_step = step_id;
    }

    /// Wall-clock duration, once the run finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

async fn emit(handlers: &Handlers, event: ExecutionEvent) {
    let handlers = handlers.lock().await;
    for handler in handlers.iter() {
        handler(event.clone());
    }
}

/// Wraps a step's operation so the engine hears about it
struct Tracked {
    step_id: String,
    index: usize,
    inner: BoxedOperation,
    handlers: Handlers,
    completed: Arc<AtomicUsize>,
    failed_step: Arc<std::sync::Mutex<Option<String>>>,
}

#[async_trait]
impl Operation for Tracked {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, state: State) -> Result<State> {
        emit(
            &self.handlers,
            ExecutionEvent::OperationStarted {
                step_id: self.step_id.clone(),
                operation: self.inner.name().to_string(),
                index: self.index,
            },
        )
        .await;

        match self.inner.run(state).await {
            Ok(next) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                emit(
                    &self.handlers,
                    ExecutionEvent::OperationCompleted {
                        step_id: self.step_id.clone(),
                        operation: self.inner.name().to_string(),
                    },
                )
                .await;
                Ok(next)
            }
            Err(e) => {
                if let Ok(mut failed) = self.failed_step.lock() {
                    *failed = Some(self.step_id.clone());
                }
                emit(
                    &self.handlers,
                    ExecutionEvent::OperationFailed {
                        step_id: self.step_id.clone(),
                        error: e.to_string(),
                    },
                )
                .await;
                Err(e)
            }
        }
    }
}

/// Runs jobs and notifies event handlers along the way
#[derive(Default)]
pub struct ExecutionEngine {
    event_handlers: Handlers,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Execute the whole job against `state`
    ///
    /// The summary is returned alongside the outcome so callers can report
    /// on failed runs too.
    pub async fn execute(&self, job: &Job, state: State) -> (RunSummary, Result<State>) {
        let mut summary = RunSummary::new(&job.name);
        let run_id = summary.run_id;

        info!("Starting job: {} ({})", job.name, run_id);
        summary.start(job.len());
        emit(
            &self.event_handlers,
            ExecutionEvent::RunStarted {
                run_id,
                job_name: job.name.clone(),
                total_operations: job.len(),
            },
        )
        .await;

        let completed = Arc::new(AtomicUsize::new(0));
        let failed_step = Arc::new(std::sync::Mutex::new(None));
        let sequence = execute(job.steps.iter().enumerate().map(|(index, step)| {
            Arc::new(Tracked {
                step_id: step.id.clone(),
                index,
                inner: step.operation.clone(),
                handlers: self.event_handlers.clone(),
                completed: completed.clone(),
                failed_step: failed_step.clone(),
            }) as BoxedOperation
        }));

        let result = sequence.run(state).await;

        summary.completed_operations = completed.load(Ordering::SeqCst);
        match &result {
            Ok(_) => {
                summary.complete();
                info!(
                    "Job finished: {} - {} operation(s) completed",
                    job.name, summary.completed_operations
                );
            }
            Err(e) => {
                let step = failed_step.lock().ok().and_then(|mut f| f.take());
                error!(
                    "Job failed: {} at step {}: {}",
                    job.name,
                    step.as_deref().unwrap_or("?"),
                    e
                );
                summary.fail(step);
            }
        }

        emit(
            &self.event_handlers,
            ExecutionEvent::RunCompleted {
                run_id,
                status: summary.status,
            },
        )
        .await;

        (summary, result)
    }
}
