//! Pipeline state and the state composer

use crate::error::{AdaptorError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The record threaded through every operation of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Current data produced by the most recent operation
    #[serde(default)]
    pub data: Value,

    /// Previous data values, most recent first
    #[serde(default)]
    pub references: Vec<Value>,

    /// Credentials and connection settings, read-only during a run
    #[serde(default)]
    pub configuration: Value,

    /// Any other top-level fields supplied by the host, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Default fields seeded into every initial state
pub fn initial_state() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("references".to_string(), Value::Array(Vec::new()));
    defaults.insert("data".to_string(), Value::Null);
    defaults
}

/// Merge `supplied` over `defaults`.
///
/// Precedence is shallow and caller-first: a key present in `supplied` is
/// kept as-is (even when it is `null`), a key only present in `defaults` is
/// copied in. Neither input is modified.
pub fn merge_defaults(defaults: &Map<String, Value>, supplied: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in supplied {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

impl State {
    /// Create an empty state carrying the given configuration
    pub fn new(configuration: Value) -> Self {
        Self {
            data: Value::Null,
            references: Vec::new(),
            configuration,
            extra: Map::new(),
        }
    }

    /// Build a state from host-supplied JSON, seeding missing defaults
    pub fn from_value(value: Value) -> Result<Self> {
        let supplied = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(AdaptorError::Configuration(format!(
                    "initial state must be a JSON object, got {}",
                    type_name(&other)
                )))
            }
        };

        let merged = merge_defaults(&initial_state(), &supplied);
        serde_json::from_value(Value::Object(merged))
            .map_err(|e| AdaptorError::Configuration(format!("invalid initial state: {}", e)))
    }

    /// Serialize the state back into a JSON object
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| AdaptorError::parse("state", e))
    }

    /// Deserialize a typed view of the configuration
    pub fn configuration_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.configuration.clone())
            .map_err(|e| AdaptorError::Configuration(e.to_string()))
    }

    /// The most recently archived data value, if any
    pub fn last_reference(&self) -> Option<&Value> {
        self.references.first()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

/// Produce the next state: `data` becomes `data`, the previous data is
/// archived at the front of `references`, every other field is copied.
pub fn compose_next_state(state: &State, data: Value) -> State {
    let mut references = Vec::with_capacity(state.references.len() + 1);
    references.push(state.data.clone());
    references.extend(state.references.iter().cloned());

    State {
        data,
        references,
        configuration: state.configuration.clone(),
        extra: state.extra.clone(),
    }
}

/// Like [`compose_next_state`], deriving the new data from the current state
pub fn compose_next_state_with<F>(state: &State, derive: F) -> State
where
    F: FnOnce(&State) -> Value,
{
    let data = derive(state);
    compose_next_state(state, data)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
