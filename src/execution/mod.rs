//! Job execution: the sequencer and the engine around it

pub mod engine;
pub mod sequencer;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, ExecutionStatus, RunSummary};
pub use sequencer::{execute, Sequence};
