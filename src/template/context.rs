//! Per-request render arguments

use serde::Serialize;
use serde_json::{Map, Value};

/// The argument mapping threaded through capture and render calls.
///
/// One context belongs to one request. The render engine writes captured
/// slot fragments into it before the final render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RenderContext {
    args: Map<String, Value>,
}

impl RenderContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an argument
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.args.insert(key.into(), value.into())
    }

    /// Set an argument from any serializable value
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.args.insert(key.into(), value);
        Ok(())
    }

    /// Builder form of [`RenderContext::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.args.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.args.remove(key)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Borrow the underlying mapping
    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }
}

impl From<Map<String, Value>> for RenderContext {
    fn from(args: Map<String, Value>) -> Self {
        Self { args }
    }
}
