use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::error::{DomainError, DomainResult};

/// Matches `{{input.path}}` and `{{steps.name.path}}` references, with an
/// optional `|default` suffix: `{{input.tone|neutral}}`.
static EXPR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*(input|steps)((?:\.[a-zA-Z0-9_-]+)*)\s*(?:\|([^}]*))?\}\}")
        .expect("invalid expression regex")
});

/// Run-time state of a workflow: the trigger input plus the output of
/// every completed step, addressable from later steps.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    input: Value,
    step_outputs: HashMap<String, Value>,
}

impl WorkflowContext {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            step_outputs: HashMap::new(),
        }
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn step_output(&self, step: &str) -> Option<&Value> {
        self.step_outputs.get(step)
    }

    pub fn set_step_output(&mut self, step: impl Into<String>, output: Value) {
        self.step_outputs.insert(step.into(), output);
    }

    /// Resolves an expression to a JSON value. A string that is exactly one
    /// reference keeps the referenced value's type; anything else goes
    /// through string interpolation.
    pub fn resolve_expression(&self, expression: &str) -> DomainResult<Value> {
        let trimmed = expression.trim();
        if let Some(capture) = EXPR_PATTERN.captures(trimmed) {
            if capture.get(0).map(|m| m.as_str().len()) == Some(trimmed.len()) {
                return self.lookup(
                    &capture[1],
                    capture.get(2).map_or("", |m| m.as_str()),
                    capture.get(3).map(|m| m.as_str()),
                );
            }
        }
        Ok(Value::String(self.resolve_string(expression)?))
    }

    /// Interpolates every reference in a string.
    pub fn resolve_string(&self, template: &str) -> DomainResult<String> {
        let mut error = None;
        let result = EXPR_PATTERN.replace_all(template, |caps: &regex::Captures| {
            match self.lookup(
                &caps[1],
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map(|m| m.as_str()),
            ) {
                Ok(value) => value_to_string(&value),
                Err(err) => {
                    if error.is_none() {
                        error = Some(err);
                    }
                    String::new()
                }
            }
        });
        match error {
            Some(err) => Err(err),
            None => Ok(result.into_owned()),
        }
    }

    /// Interpolates string leaves of a JSON value in place.
    pub fn resolve_value(&self, value: &Value) -> DomainResult<Value> {
        Ok(match value {
            Value::String(s) => self.resolve_expression(s)?,
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<DomainResult<_>>()?,
            ),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.resolve_value(item)?);
                }
                Value::Object(out)
            }
            other => other.clone(),
        })
    }

    fn lookup(&self, root: &str, dotted: &str, default: Option<&str>) -> DomainResult<Value> {
        let mut segments = dotted.split('.').filter(|s| !s.is_empty());
        let resolved = match root {
            "input" => get_nested(&self.input, segments),
            "steps" => match segments.next() {
                Some(step) => self
                    .step_outputs
                    .get(step)
                    .and_then(|output| get_nested(output, segments)),
                None => None,
            },
            _ => None,
        };
        match resolved {
            Some(value) => Ok(value.clone()),
            None => match default {
                Some(raw) => Ok(parse_default(raw)),
                None => Err(DomainError::validation(format!(
                    "unresolved reference '{{{{{root}{dotted}}}}}'"
                ))),
            },
        }
    }
}

fn get_nested<'a, I>(value: &'a Value, segments: I) -> Option<&'a Value>
where
    I: Iterator<Item = &'a str>,
{
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Renders a JSON value for string interpolation: strings unquoted,
/// everything else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Defaults are written as bare text; JSON scalars are recognized so
/// `|0` and `|false` keep their types.
fn parse_default(raw: &str) -> Value {
    let trimmed = raw.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => value,
        _ => Value::String(trimmed.to_string()),
    }
}
