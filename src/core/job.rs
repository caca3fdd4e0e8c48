//! Job domain model

use crate::core::config::JobConfig;
use crate::core::operation::BoxedOperation;
use crate::execution::sequencer::{execute, Sequence};

/// One runnable step of a job
#[derive(Clone)]
pub struct JobStep {
    /// Step ID from the job file
    pub id: String,

    /// Operation kind, e.g. `parse_csv`
    pub kind: String,

    /// The operation itself
    pub operation: BoxedOperation,
}

impl std::fmt::Debug for JobStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStep")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A named, ordered list of operations
#[derive(Debug, Clone)]
pub struct Job {
    /// Job name
    pub name: String,

    /// Steps in run order
    pub steps: Vec<JobStep>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Create a job from configuration
    pub fn from_config(config: &JobConfig) -> Self {
        let steps = config
            .steps
            .iter()
            .map(|step| JobStep {
                id: step.id.clone(),
                kind: step.operation.kind().to_string(),
                operation: step.operation.to_operation(),
            })
            .collect();

        Job {
            name: config.name.clone(),
            steps,
        }
    }

    /// Append a step
    pub fn step(mut self, id: impl Into<String>, operation: BoxedOperation) -> Self {
        let kind = operation.name().to_string();
        self.steps.push(JobStep {
            id: id.into(),
            kind,
            operation,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step IDs in run order
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// The job's operations as a single sequence
    pub fn sequence(&self) -> Sequence {
        execute(self.steps.iter().map(|s| s.operation.clone()))
    }
}
