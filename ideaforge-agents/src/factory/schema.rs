//! Shape checks for agent output.
//!
//! A missing or null field takes the caller's default. A field that is
//! present with the wrong JSON type is a `SchemaViolation`.

use serde_json::{Map, Value};

use crate::error::SchemaViolation;

pub(crate) struct Fields<'a> {
    agent: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn new(agent: &'a str, map: &'a Map<String, Value>) -> Self {
        Self { agent, map }
    }

    pub fn violation(&self, reason: impl Into<String>) -> SchemaViolation {
        SchemaViolation {
            agent: self.agent.to_string(),
            reason: reason.into(),
            raw: Value::Object(self.map.clone()).to_string(),
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String, SchemaViolation> {
        Ok(self.opt_string(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>, SchemaViolation> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.violation(format!("'{key}' should be a string, got {}", kind(other)))),
        }
    }

    pub fn string_list(&self, key: &str) -> Result<Vec<String>, SchemaViolation> {
        let items = self.array(key)?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(self.violation(format!("'{key}[{i}]' should be a string, got {}", kind(other)))),
            })
            .collect()
    }

    pub fn array(&self, key: &str) -> Result<&'a [Value], SchemaViolation> {
        match self.present(key) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(other) => Err(self.violation(format!("'{key}' should be an array, got {}", kind(other)))),
        }
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
