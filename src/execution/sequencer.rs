//! Sequencer - chains operations into a single operation

use crate::core::{operation::BoxedOperation, Operation, State};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

/// An ordered list of operations that runs as one operation
///
/// Each step receives the state returned by the previous one. Steps never
/// overlap: the next step starts only once the previous future resolved.
/// The first error stops the chain and is returned unchanged.
#[derive(Clone, Default)]
pub struct Sequence {
    operations: Vec<BoxedOperation>,
}

/// Compose operations into a [`Sequence`]
pub fn execute<I>(operations: I) -> Sequence
where
    I: IntoIterator<Item = BoxedOperation>,
{
    Sequence {
        operations: operations.into_iter().collect(),
    }
}

/// Build a [`Sequence`] from operation expressions, boxing each one
#[macro_export]
macro_rules! execute {
    ($($op:expr),* $(,)?) => {
        $crate::execution::sequencer::execute(vec![$($crate::core::operation::boxed($op)),*])
    };
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation
    pub fn then<O: Operation + 'static>(mut self, op: O) -> Self {
        self.operations.push(std::sync::Arc::new(op));
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Run against host-supplied JSON, seeding `references` and `data`
    /// when the caller did not provide them
    pub async fn run_value(&self, initial: Value) -> Result<State> {
        let state = State::from_value(initial)?;
        self.run(state).await
    }
}

#[async_trait]
impl Operation for Sequence {
    fn name(&self) -> &str {
        "execute"
    }

    async fn run(&self, state: State) -> Result<State> {
        let total = self.operations.len();
        let mut state = state;

        for (index, op) in self.operations.iter().enumerate() {
            debug!("Running operation {}/{}: {}", index + 1, total, op.name());
            state = match op.run(state).await {
                Ok(next) => next,
                Err(e) => {
                    error!("Operation {}/{} ({}) failed: {}", index + 1, total, op.name(), e);
                    return Err(e);
                }
            };
        }

        debug!("Sequence of {} operation(s) finished", total);
        Ok(state)
    }
}
