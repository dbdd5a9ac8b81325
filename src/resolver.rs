//! The `$path` expression language (§4.1, §6).
//!
//! Roots are `input`, `now`, `history`, or a key in `ctx`. A string that is
//! *exactly* one reference returns the underlying typed value; a string
//! with embedded references is templated (stringified substitution).
//! Missing intermediates resolve to `null`, never an error.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};

use crate::types::State;

/// A string that, trimmed, is nothing but one `$path` reference.
static FULL_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*|\.\d+)*$").unwrap());

/// Any `$path` reference embedded inside a larger string.
static EMBEDDED_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*|\.\d+)*").unwrap());

/// Resolves `$path` references in `value` against `state`, recursing into
/// mappings and sequences element-by-element.
pub fn resolve(state: &State, value: &Value) -> Value {
    match value {
        Value::String(s) => resolve_string(state, s),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(state, v)).collect()),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve(state, v));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn resolve_string(state: &State, s: &str) -> Value {
    if FULL_REFERENCE.is_match(s) {
        return resolve_path(state, &s[1..]);
    }

    if !EMBEDDED_REFERENCE.is_match(s) {
        return Value::String(s.to_string());
    }

    let interpolated = EMBEDDED_REFERENCE.replace_all(s, |caps: &regex::Captures| {
        let reference = &caps[0];
        stringify(&resolve_path(state, &reference[1..]))
    });
    Value::String(interpolated.into_owned())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Resolves a dotted path (without the leading `$`) against `state`.
pub fn resolve_path(state: &State, path: &str) -> Value {
    let mut segments = path.split('.');
    let root = match segments.next() {
        Some(r) => r,
        None => return Value::Null,
    };

    let mut current = root_value(state, root);
    for segment in segments {
        current = step_into(&current, segment);
    }
    current
}

fn root_value(state: &State, root: &str) -> Value {
    match root {
        "input" => map_to_value(&state.input),
        "now" => Value::String(Utc::now().to_rfc3339()),
        "history" => state.history.clone().unwrap_or(Value::Null),
        other => state.ctx.get(other).cloned().unwrap_or(Value::Null),
    }
}

fn map_to_value(map: &std::collections::HashMap<String, Value>) -> Value {
    let mut out = Map::with_capacity(map.len());
    for (k, v) in map {
        out.insert(k.clone(), v.clone());
    }
    Value::Object(out)
}

/// One step of path traversal: object key, or all-digits array index.
/// A missing intermediate (wrong container kind, absent key, out-of-range
/// index) yields `null` rather than erroring.
fn step_into(current: &Value, segment: &str) -> Value {
    match current {
        Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
        Value::Array(items) => {
            if segment.chars().all(|c| c.is_ascii_digit()) && !segment.is_empty() {
                segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| items.get(idx).cloned())
                    .unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn state_with_ctx(pairs: &[(&str, Value)]) -> State {
        let mut s = State::new(Uuid::now_v7(), "wf");
        for (k, v) in pairs {
            s.ctx.insert(k.to_string(), v.clone());
        }
        s
    }

    #[test]
    fn non_dollar_values_round_trip() {
        let state = state_with_ctx(&[]);
        let v = json!({"a": 1, "b": [1, 2, "x"], "c": null});
        assert_eq!(resolve(&state, &v), v);
    }

    #[test]
    fn full_reference_preserves_type() {
        let state = state_with_ctx(&[("foo", json!({"bar": 42}))]);
        assert_eq!(resolve(&state, &json!("$foo")), json!({"bar": 42}));
        assert_eq!(resolve(&state, &json!("$foo.bar")), json!(42));
    }

    #[test]
    fn embedded_reference_interpolates_as_string() {
        let state = state_with_ctx(&[("name", json!("Ada"))]);
        assert_eq!(
            resolve(&state, &json!("hello $name!")),
            json!("hello Ada!")
        );
    }

    #[test]
    fn missing_intermediate_is_null_not_error() {
        let state = state_with_ctx(&[("foo", json!({"bar": 1}))]);
        assert_eq!(resolve(&state, &json!("$foo.baz.qux")), Value::Null);
    }

    #[test]
    fn array_index_traversal() {
        let state = state_with_ctx(&[("items", json!([10, 20, 30]))]);
        assert_eq!(resolve(&state, &json!("$items.1")), json!(20));
        assert_eq!(resolve(&state, &json!("$items.9")), Value::Null);
    }

    #[test]
    fn input_and_now_roots_resolve() {
        let mut state = state_with_ctx(&[]);
        state.input.insert("a".into(), json!(1));
        assert_eq!(resolve(&state, &json!("$input.a")), json!(1));
        let now = resolve(&state, &json!("$now"));
        assert!(now.is_string());
    }

    #[test]
    fn recurses_into_nested_collections() {
        let state = state_with_ctx(&[("x", json!(5))]);
        let v = json!({"list": ["$x", "static"], "nested": {"y": "$x"}});
        assert_eq!(
            resolve(&state, &v),
            json!({"list": [5, "static"], "nested": {"y": 5}})
        );
    }
}
