//! Typed condition evaluator: a fixed operator table over resolved values
//! (§4.2).

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resolver;
use crate::types::{Route, State};

/// One of the operators in the fixed table (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    In,
    NotIn,
    Exists,
    Empty,
    Truthy,
    Falsy,
}

/// `{field, op, value}`. `field` is resolved against state as `$field`;
/// `value` is resolved through the resolver. A condition never throws — a
/// failed resolution simply yields `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn evaluate(&self, state: &State) -> bool {
        let actual = resolver::resolve_path(state, &self.field);
        let expected = resolver::resolve(state, &self.value);
        apply(self.op, &actual, &expected)
    }
}

/// Applies `op` to an `(actual, expected)` pair. Numeric comparisons coerce
/// both sides to `f64`; a side that doesn't coerce makes the comparison
/// `false` rather than panicking.
pub fn apply(op: Operator, actual: &Value, expected: &Value) -> bool {
    match op {
        Operator::Eq => actual == expected,
        Operator::Neq => actual != expected,
        Operator::Gt => numeric(actual, expected, |a, b| a > b),
        Operator::Gte => numeric(actual, expected, |a, b| a >= b),
        Operator::Lt => numeric(actual, expected, |a, b| a < b),
        Operator::Lte => numeric(actual, expected, |a, b| a <= b),
        Operator::Contains => contains(actual, expected),
        Operator::StartsWith => as_str(actual)
            .zip(as_str(expected))
            .is_some_and(|(a, b)| a.starts_with(b)),
        Operator::EndsWith => as_str(actual)
            .zip(as_str(expected))
            .is_some_and(|(a, b)| a.ends_with(b)),
        Operator::Matches => as_str(actual)
            .zip(as_str(expected))
            .is_some_and(|(a, pattern)| compile_regex(pattern).is_some_and(|re| re.is_match(a))),
        Operator::In => match expected {
            Value::Array(items) => items.contains(actual),
            _ => false,
        },
        Operator::NotIn => match expected {
            Value::Array(items) => !items.contains(actual),
            _ => true,
        },
        Operator::Exists => !actual.is_null(),
        Operator::Empty => is_empty(actual),
        Operator::Truthy => is_truthy(actual),
        Operator::Falsy => !is_truthy(actual),
    }
}

fn numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_f64(actual), as_f64(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.contains(expected),
        Value::String(s) => as_str(expected).is_some_and(|needle| s.contains(needle)),
        Value::Object(map) => as_str(expected).is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn compile_regex(pattern: &str) -> Option<Regex> {
    // Cheap per-call compile; condition evaluation is not on a hot path
    // here, unlike a long-lived service the way `resolver`'s reference
    // regexes are reused across every call.
    Regex::new(pattern).ok()
}

/// Returns the first matching route, or `None` if none match and there is
/// no default (the `router` executor supplies `default` separately).
pub fn find_route<'a>(state: &State, routes: &'a [Route]) -> Option<&'a Route> {
    routes.iter().find(|r| r.when.evaluate(state))
}
