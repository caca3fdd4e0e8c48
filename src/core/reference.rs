//! References into pipeline state and declared operation inputs

use crate::core::state::State;
use crate::error::{AdaptorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// One step of a state path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A path into the state, written `$.data.rows[0].name`
///
/// The leading `$.` is optional. Keys are separated by dots and array
/// positions are written as `[n]` after a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatePath {
    segments: Vec<Segment>,
}

fn segment_regex() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| {
        Regex::new(r"^(?P<key>[^\[\]]*)(?P<indices>(?:\[\d+\])*)$").expect("valid segment regex")
    })
}

fn index_regex() -> &'static Regex {
    static INDEX: OnceLock<Regex> = OnceLock::new();
    INDEX.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("valid index regex"))
}

impl StatePath {
    /// Parse a path expression
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        let body = trimmed
            .strip_prefix("$.")
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed);

        let mut segments = Vec::new();
        if body.is_empty() {
            return Ok(Self { segments });
        }

        for part in body.split('.') {
            let caps = segment_regex()
                .captures(part)
                .ok_or_else(|| AdaptorError::reference(expr, format!("malformed segment '{}'", part)))?;

            let key = &caps["key"];
            let indices = &caps["indices"];
            if key.is_empty() && indices.is_empty() {
                return Err(AdaptorError::reference(expr, "empty path segment"));
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            for index in index_regex().captures_iter(indices) {
                let position = index[1]
                    .parse::<usize>()
                    .map_err(|e| AdaptorError::reference(expr, e.to_string()))?;
                segments.push(Segment::Index(position));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Walk this path inside an arbitrary JSON value
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        walk(root, &self.segments)
    }

    /// Resolve this path against a state
    ///
    /// The first segment picks a state field; only the matched value is
    /// cloned.
    pub fn resolve(&self, state: &State) -> Option<Value> {
        let Some((first, rest)) = self.segments.split_first() else {
            return serde_json::to_value(state).ok();
        };
        let key = match first {
            Segment::Key(key) => key.as_str(),
            Segment::Index(_) => return None,
        };

        match key {
            "data" => walk(&state.data, rest).cloned(),
            "configuration" => walk(&state.configuration, rest).cloned(),
            "references" => match rest.split_first() {
                None => Some(Value::Array(state.references.clone())),
                Some((Segment::Index(index), rest)) => {
                    state.references.get(*index).and_then(|v| walk(v, rest)).cloned()
                }
                Some((Segment::Key(_), _)) => None,
            },
            other => state.extra.get(other).and_then(|v| walk(v, rest)).cloned(),
        }
    }

    /// Resolve this path, failing when nothing is found
    pub fn require(&self, state: &State) -> Result<Value> {
        self.resolve(state)
            .ok_or_else(|| AdaptorError::reference(self.to_string(), "no value at path"))
    }
}

fn walk<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| match segment {
        Segment::Key(key) => current.get(key.as_str()),
        Segment::Index(index) => current.get(*index),
    })
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for StatePath {
    type Error = AdaptorError;

    fn try_from(value: String) -> Result<Self> {
        StatePath::parse(&value)
    }
}

impl From<StatePath> for String {
    fn from(path: StatePath) -> Self {
        path.to_string()
    }
}

/// An operation input whose shape is declared up front
///
/// A literal is used as given, even if it happens to look like a path.
/// A reference is looked up in the state exactly once, when the operation
/// runs.
///
/// Accepted forms: a `{"literal": ..}` or `{"reference": ..}` map (JSON, and
/// YAML job steps), or a YAML tag such as `!reference $.data.rows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Input {
    Literal(Value),
    Reference(StatePath),
}

impl Input {
    pub fn literal(value: impl Into<Value>) -> Self {
        Input::Literal(value.into())
    }

    pub fn reference(expr: &str) -> Result<Self> {
        Ok(Input::Reference(StatePath::parse(expr)?))
    }

    /// Produce the concrete value for the given state
    pub fn expand(&self, state: &State) -> Result<Value> {
        match self {
            Input::Literal(value) => Ok(value.clone()),
            Input::Reference(path) => path.require(state),
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Literal(value)
    }
}
