//! The operation abstraction - one step of a pipeline

use crate::core::state::State;
use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A single pipeline step: takes ownership of a state and returns the next one
#[async_trait]
pub trait Operation: Send + Sync {
    /// Human-readable name used in logs and events
    fn name(&self) -> &str {
        "operation"
    }

    /// Run the step
    async fn run(&self, state: State) -> Result<State>;
}

/// Shared, type-erased operation
pub type BoxedOperation = Arc<dyn Operation>;

#[async_trait]
impl<O: Operation + ?Sized> Operation for Arc<O> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self, state: State) -> Result<State> {
        (**self).run(state).await
    }
}

/// Operation backed by an async closure
pub struct FnOperation<F> {
    name: String,
    func: F,
}

#[async_trait]
impl<F, Fut> Operation for FnOperation<F>
where
    F: Fn(State) -> Fut + Send + Sync,
    Fut: Future<Output = Result<State>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: State) -> Result<State> {
        (self.func)(state).await
    }
}

/// Wrap an async closure as an operation
pub fn operation<F, Fut>(func: F) -> FnOperation<F>
where
    F: Fn(State) -> Fut + Send + Sync,
    Fut: Future<Output = Result<State>> + Send + 'static,
{
    named("operation", func)
}

/// Wrap an async closure as an operation with a name
pub fn named<F, Fut>(name: impl Into<String>, func: F) -> FnOperation<F>
where
    F: Fn(State) -> Fut + Send + Sync,
    Fut: Future<Output = Result<State>> + Send + 'static,
{
    FnOperation {
        name: name.into(),
        func,
    }
}

/// Erase an operation's type so it can sit in a sequence
pub fn boxed<O: Operation + 'static>(op: O) -> BoxedOperation {
    Arc::new(op)
}
