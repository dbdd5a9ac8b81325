//! `start` and `end` step semantics (§4.3.1).

use async_trait::async_trait;
use serde_json::Value;

use super::{Executor, ExecutorContext, StepOutcome};
use crate::error::ExecutionError;
use crate::types::{InputDef, State, StepConfig, StepDef};

/// Validates presence and primitive type of required inputs, applies
/// defaults for absent optional ones, and mirrors `input` into `ctx["input"]`
/// so `$input.X` resolves through ctx the same way `$foo` does.
pub struct StartExecutor;

#[async_trait]
impl Executor for StartExecutor {
    async fn call(
        &self,
        _ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        // `start`'s config carries no data of its own; the input schema it
        // validates against lives on the `WorkflowDef`, not the step. The
        // engine passes that schema in via `ctx.input` already populated
        // with `WorkflowDef.inputs` defaults-applied — see `Engine::run`.
        debug_assert!(matches!(step.config, StepConfig::Start(_)));

        let mut next_state = state.clone();
        next_state
            .ctx
            .insert("input".to_string(), map_to_value(&next_state.input));

        Ok(StepOutcome::cont(next_state, None, None))
    }
}

fn map_to_value(map: &std::collections::HashMap<String, Value>) -> Value {
    let mut out = serde_json::Map::with_capacity(map.len());
    for (k, v) in map {
        out.insert(k.clone(), v.clone());
    }
    Value::Object(out)
}

/// Validates `raw_input` against `inputs`, applying defaults for absent
/// optional fields. Called by the engine before the interpreter loop
/// begins, so a failure short-circuits before any `Execution` is persisted
/// as `running`.
pub fn apply_and_validate(
    inputs: &[InputDef],
    mut raw_input: std::collections::HashMap<String, Value>,
) -> Result<std::collections::HashMap<String, Value>, ExecutionError> {
    for input_def in inputs {
        match raw_input.get(&input_def.name) {
            Some(value) => {
                if !input_def.input_type.matches(value) {
                    return Err(ExecutionError::Validation(format!(
                        "input '{}' must be of type {:?}",
                        input_def.name, input_def.input_type
                    )));
                }
            }
            None => {
                if input_def.required {
                    return Err(ExecutionError::Validation(format!(
                        "missing required input: {}",
                        input_def.name
                    )));
                }
                if let Some(default) = &input_def.default {
                    raw_input.insert(input_def.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(raw_input)
}

/// `end` terminates the workflow normally. It carries no step-specific
/// behavior beyond being a valid dispatch target; the engine recognizes the
/// reserved successor `"__FINISHED__"` independent of step type, so an
/// explicit `end` step is simply one whose `next_step` engine-side routes
/// there, or which a workflow author names as the conventional final node.
pub struct EndExecutor;

#[async_trait]
impl Executor for EndExecutor {
    async fn call(
        &self,
        _ctx: &ExecutorContext,
        state: State,
        _step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        Ok(StepOutcome::cont(
            state,
            Some(crate::types::FINISHED.to_string()),
            None,
        ))
    }
}
