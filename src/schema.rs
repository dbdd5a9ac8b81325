//! Runtime JSON-schema validation of `call` step outputs (§4.10).
//!
//! Deliberately separate from the validator's static schema-path check
//! (§4.5): that one is mandatory and cheap (string matching against
//! `properties` keys at validation time); this one actually compiles and
//! runs a JSON Schema against a value at execution time, and is only
//! invoked when a `call` step's `output` carries a schema.

use serde_json::Value;

use crate::error::ExecutionError;

/// Validates `value` against `schema`. On failure, returns an
/// `ExecutionError::Other` wrapping `ValidationError`-shaped text — schema
/// failures on a `call` output are documented (§4.3.3) to raise a
/// `ValidationError`, so the engine maps this back to one at the call site.
pub fn validate(schema: &Value, value: &Value) -> Result<(), String> {
    let compiled = jsonschema::validator_for(schema)
        .map_err(|e| format!("invalid output schema: {e}"))?;

    let errors: Vec<String> = compiled.iter_errors(value).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Convenience wrapper returning the engine's runtime error type directly.
pub fn validate_or_execution_error(schema: &Value, value: &Value) -> Result<(), ExecutionError> {
    validate(schema, value).map_err(ExecutionError::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_conforming_value() {
        let schema = json!({
            "type": "object",
            "properties": {"result": {"type": "number"}},
            "required": ["result"]
        });
        assert!(validate(&schema, &json!({"result": 2.5})).is_ok());
    }

    #[test]
    fn rejects_nonconforming_value() {
        let schema = json!({
            "type": "object",
            "properties": {"result": {"type": "number"}},
            "required": ["result"]
        });
        assert!(validate(&schema, &json!({"result": "not a number"})).is_err());
    }
}
