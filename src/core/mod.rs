//! Core domain models
//!
//! This module defines the pipeline state, the operation contract, state
//! references, the generic operations and job configuration.

pub mod common;
pub mod config;
pub mod job;
pub mod operation;
pub mod reference;
pub mod state;

pub use job::*;
pub use operation::{BoxedOperation, Operation};
pub use reference::{Input, StatePath};
pub use state::{compose_next_state, State};
