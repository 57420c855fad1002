//! Data Model: Event, ResultBinding, State, OutputItem
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded input line, used as `input` for a single evaluation cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The event produced for a line that could not be decoded.
    pub fn degenerate() -> Self {
        Self(Map::new())
    }

    pub fn is_degenerate(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl TryFrom<Value> for Event {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}

/// Variable bindings of one query solution, in the order the engine produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultBinding(Map<String, Value>);

impl ResultBinding {
    pub fn new(bindings: Map<String, Value>) -> Self {
        Self(bindings)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for ResultBinding {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Document threaded from one event to the next when feedback is enabled.
///
/// A `State` is never mutated in place: [`State::advance`] consumes the
/// current value and returns its successor, so only the owner can move it
/// forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    version: u64,
    document: Value,
}

impl State {
    /// `null` at version 0.
    pub fn initial() -> Self {
        Self::default()
    }

    pub fn advance(self, document: Value) -> Self {
        Self {
            version: self.version + 1,
            document,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

/// A single value handed to the output formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputItem(pub Value);

impl OutputItem {
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<ResultBinding> for OutputItem {
    fn from(binding: ResultBinding) -> Self {
        Self(binding.into_value())
    }
}

impl From<Value> for OutputItem {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
