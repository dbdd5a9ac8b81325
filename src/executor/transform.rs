//! `transform` step semantics (§4.3.9): a small pipeline algebra over a
//! resolved input value.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Executor, ExecutorContext, StepOutcome};
use crate::error::ExecutionError;
use crate::resolver;
use crate::types::{State, StepConfig, StepDef};

/// Runs `expression` (an ordered list of `op: arg` pairs) against `input`
/// (or `ctx` as a whole if `input` is absent), threading the result of
/// each operation into the next, and stores the final value at `output`.
pub struct TransformExecutor;

#[async_trait]
impl Executor for TransformExecutor {
    async fn call(
        &self,
        _ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Transform(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        let mut current = match &config.input {
            Some(expr) => resolver::resolve(&state, expr),
            None => resolver::resolve(
                &state,
                &Value::Object(
                    state
                        .ctx
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                ),
            ),
        };

        for (op, arg) in &config.expression {
            let arg = resolver::resolve(&state, arg);
            current = apply_op(op, &arg, current)?;
        }

        let next_state = state.with_ctx(config.output.clone(), current.clone());
        Ok(StepOutcome::cont(next_state, None, Some(current)))
    }
}

fn apply_op(op: &str, arg: &Value, value: Value) -> Result<Value, ExecutionError> {
    match op {
        "map" => {
            let field = arg.as_str();
            let arr = as_array(value)?;
            Ok(Value::Array(
                arr.into_iter()
                    .map(|item| match field {
                        Some(f) => item.get(f).cloned().unwrap_or(Value::Null),
                        None => item,
                    })
                    .collect(),
            ))
        }
        "pluck" => apply_op("map", arg, value),
        "select" => {
            let field = arg.as_str().ok_or_else(op_arg_error("select"))?;
            let arr = as_array(value)?;
            Ok(Value::Array(
                arr.into_iter()
                    .filter(|item| truthy(item.get(field).unwrap_or(&Value::Null)))
                    .collect(),
            ))
        }
        "reject" => {
            let field = arg.as_str().ok_or_else(op_arg_error("reject"))?;
            let arr = as_array(value)?;
            Ok(Value::Array(
                arr.into_iter()
                    .filter(|item| !truthy(item.get(field).unwrap_or(&Value::Null)))
                    .collect(),
            ))
        }
        "first" => Ok(as_array(value)?.into_iter().next().unwrap_or(Value::Null)),
        "last" => Ok(as_array(value)?.into_iter().last().unwrap_or(Value::Null)),
        "flatten" => {
            let arr = as_array(value)?;
            let mut out = Vec::new();
            for item in arr {
                match item {
                    Value::Array(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            Ok(Value::Array(out))
        }
        "compact" => {
            let arr = as_array(value)?;
            Ok(Value::Array(arr.into_iter().filter(|v| !v.is_null()).collect()))
        }
        "uniq" => {
            let arr = as_array(value)?;
            let mut seen: Vec<Value> = Vec::new();
            for item in arr {
                if !seen.contains(&item) {
                    seen.push(item);
                }
            }
            Ok(Value::Array(seen))
        }
        "reverse" => {
            let mut arr = as_array(value)?;
            arr.reverse();
            Ok(Value::Array(arr))
        }
        "sort" => {
            let field = arg.as_str();
            let mut arr = as_array(value)?;
            arr.sort_by(|a, b| {
                let (ka, kb) = match field {
                    Some(f) => (a.get(f).cloned().unwrap_or(Value::Null), b.get(f).cloned().unwrap_or(Value::Null)),
                    None => (a.clone(), b.clone()),
                };
                compare_values(&ka, &kb)
            });
            Ok(Value::Array(arr))
        }
        "count" => Ok(Value::from(as_array(value)?.len())),
        "sum" => {
            let arr = as_array(value)?;
            let total: f64 = arr.iter().filter_map(Value::as_f64).sum();
            Ok(serde_json::json!(total))
        }
        "keys" => {
            let map = as_object(value)?;
            Ok(Value::Array(map.keys().map(|k| Value::String(k.clone())).collect()))
        }
        "values" => {
            let map = as_object(value)?;
            Ok(Value::Array(map.values().cloned().collect()))
        }
        "pick" => {
            let fields = as_string_list(arg);
            let map = as_object(value)?;
            let mut out = Map::new();
            for f in fields {
                if let Some(v) = map.get(&f) {
                    out.insert(f, v.clone());
                }
            }
            Ok(Value::Object(out))
        }
        "omit" => {
            let fields = as_string_list(arg);
            let map = as_object(value)?;
            let mut out = Map::new();
            for (k, v) in map {
                if !fields.contains(&k) {
                    out.insert(k, v);
                }
            }
            Ok(Value::Object(out))
        }
        "merge" => {
            let mut base = as_object(value)?;
            if let Value::Object(extra) = arg {
                for (k, v) in extra {
                    base.insert(k.clone(), v.clone());
                }
            }
            Ok(Value::Object(base))
        }
        other => Err(ExecutionError::Other(format!("unknown transform op: {other}"))),
    }
}

fn op_arg_error(op: &str) -> impl Fn() -> ExecutionError + '_ {
    move || ExecutionError::Other(format!("transform op '{op}' requires a string field argument"))
}

fn as_array(value: Value) -> Result<Vec<Value>, ExecutionError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ExecutionError::Other(format!(
            "transform op expected an array, got {other}"
        ))),
    }
}

fn as_object(value: Value) -> Result<Map<String, Value>, ExecutionError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExecutionError::Other(format!(
            "transform op expected an object, got {other}"
        ))),
    }
}

fn as_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        _ => a
            .as_str()
            .unwrap_or_default()
            .cmp(b.as_str().unwrap_or_default()),
    }
}
