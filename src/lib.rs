//! adaptors - composable operations for moving data between CSV files,
//! Google BigQuery and DHIS2

pub mod adaptors;
pub mod cli;
pub mod core;
pub mod error;
pub mod execution;

// Re-export commonly used types
pub use crate::core::common::{alter_state, combine, each, field, fields, merge, set_data};
pub use crate::core::config::{load_state, JobConfig};
pub use crate::core::{compose_next_state, BoxedOperation, Input, Job, Operation, State, StatePath};
pub use error::{AdaptorError, Result};
pub use execution::{ExecutionEngine, ExecutionEvent, ExecutionStatus, RunSummary, Sequence};
