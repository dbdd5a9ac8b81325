//! `assign` step semantics (§4.3.2).

use async_trait::async_trait;

use super::{Executor, ExecutorContext, StepOutcome};
use crate::error::ExecutionError;
use crate::resolver;
use crate::types::{State, StepConfig, StepDef};

/// Resolves each `set` entry in insertion order against the state produced
/// by the previous entry, so a later key may reference an earlier one's
/// freshly-assigned value. The step's output is the value of the last pair.
pub struct AssignExecutor;

#[async_trait]
impl Executor for AssignExecutor {
    async fn call(
        &self,
        _ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Assign(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        let mut current = state;
        let mut last_value = None;
        for (key, expr) in &config.set {
            let resolved = resolver::resolve(&current, expr);
            current = current.with_ctx(key.clone(), resolved.clone());
            last_value = Some(resolved);
        }

        Ok(StepOutcome::cont(current, None, last_value))
    }
}
