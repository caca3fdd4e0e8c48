//! Common operations shared by every adaptor
//!
//! These are the building blocks job authors reach for between adaptor
//! calls: reshaping state, iterating over data, and selecting values.

use crate::core::operation::{named, BoxedOperation, FnOperation, Operation};
use crate::core::reference::{Input, StatePath};
use crate::core::state::{compose_next_state, type_name, State};
use crate::error::{AdaptorError, Result};
use crate::execution::sequencer::{execute, Sequence};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

/// Path to a key under `data`
pub fn data_path(path: &str) -> String {
    let path = path.trim_start_matches("$.").trim_start_matches('.');
    if path.is_empty() {
        "$.data".to_string()
    } else {
        format!("$.data.{}", path)
    }
}

/// Reference to a value under `data`
pub fn data_value(path: &str) -> Result<Input> {
    Input::reference(&data_path(path))
}

/// Reference to a value anywhere in the state
pub fn source_value(path: &str) -> Result<Input> {
    Input::reference(path)
}

/// Reference to a value inside the most recently archived data
pub fn last_reference_value(path: &str) -> Result<Input> {
    let path = path.trim_start_matches("$.").trim_start_matches('.');
    if path.is_empty() {
        Input::reference("$.references[0]")
    } else {
        Input::reference(&format!("$.references[0].{}", path))
    }
}

/// Arbitrary state transformation
pub fn alter_state<F, Fut>(func: F) -> FnOperation<F>
where
    F: Fn(State) -> Fut + Send + Sync,
    Fut: Future<Output = Result<State>> + Send + 'static,
{
    named("alter_state", func)
}

/// Run operations one after the other as a single operation
pub fn combine<I>(operations: I) -> Sequence
where
    I: IntoIterator<Item = BoxedOperation>,
{
    execute(operations)
}

/// Install a declared input as the new data
pub fn set_data(input: Input) -> SetData {
    SetData { input }
}

pub struct SetData {
    input: Input,
}

#[async_trait]
impl Operation for SetData {
    fn name(&self) -> &str {
        "set_data"
    }

    async fn run(&self, state: State) -> Result<State> {
        let value = self.input.expand(&state)?;
        Ok(compose_next_state(&state, value))
    }
}

/// Run `operation` once per element of the array at `path`
///
/// Each run sees the element as `data` on top of the state returned by the
/// previous run. The state returned by the last run is the result.
pub fn each<O: Operation + 'static>(path: StatePath, operation: O) -> Each {
    Each {
        path,
        operation: std::sync::Arc::new(operation),
    }
}

pub struct Each {
    path: StatePath,
    operation: BoxedOperation,
}

#[async_trait]
impl Operation for Each {
    fn name(&self) -> &str {
        "each"
    }

    async fn run(&self, state: State) -> Result<State> {
        let items = expect_array(&self.path, self.path.require(&state)?)?;
        debug!("each: {} item(s) at {}", items.len(), self.path);

        let mut current = state;
        for item in items {
            current = self
                .operation
                .run(State {
                    data: item,
                    ..current
                })
                .await?;
        }

        Ok(current)
    }
}

/// A key and the input that produces its value
pub fn field(key: impl Into<String>, input: impl Into<Input>) -> (String, Input) {
    (key.into(), input.into())
}

/// Collect fields for [`merge`]
pub fn fields<I>(pairs: I) -> Vec<(String, Input)>
where
    I: IntoIterator<Item = (String, Input)>,
{
    pairs.into_iter().collect()
}

/// Merge the given fields into every object of the array at `path`
///
/// Field inputs are expanded once against the incoming state. The merged
/// array becomes the new data.
pub fn merge(path: StatePath, fields: Vec<(String, Input)>) -> Merge {
    Merge { path, fields }
}

pub struct Merge {
    path: StatePath,
    fields: Vec<(String, Input)>,
}

#[async_trait]
impl Operation for Merge {
    fn name(&self) -> &str {
        "merge"
    }

    async fn run(&self, state: State) -> Result<State> {
        let items = expect_array(&self.path, self.path.require(&state)?)?;

        let mut resolved = Vec::with_capacity(self.fields.len());
        for (key, input) in &self.fields {
            resolved.push((key.clone(), input.expand(&state)?));
        }

        let merged = items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut map) => {
                    for (key, value) in &resolved {
                        map.insert(key.clone(), value.clone());
                    }
                    Ok(Value::Object(map))
                }
                other => Err(AdaptorError::reference(
                    self.path.to_string(),
                    format!("cannot merge fields into {}", type_name(&other)),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(compose_next_state(&state, Value::Array(merged)))
    }
}

fn expect_array(path: &StatePath, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(AdaptorError::reference(
            path.to_string(),
            format!("expected an array, found {}", type_name(&other)),
        )),
    }
}
