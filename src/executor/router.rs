//! `router` step semantics (§4.3.4, §6).

use async_trait::async_trait;

use super::{Executor, ExecutorContext, StepOutcome};
use crate::condition;
use crate::error::ExecutionError;
use crate::types::{State, StepConfig, StepDef};

/// Evaluates `routes` in order and jumps to the first match's `then`. Falls
/// back to `default` if none match; raises `NoMatchingRoute` if there is no
/// default either.
pub struct RouterExecutor;

#[async_trait]
impl Executor for RouterExecutor {
    async fn call(
        &self,
        _ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Router(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        let next = match condition::find_route(&state, &config.routes) {
            Some(route) => route.then.clone(),
            None => match &config.default {
                Some(default) => default.clone(),
                None => return Err(ExecutionError::NoMatchingRoute),
            },
        };

        Ok(StepOutcome::cont(state, Some(next), None))
    }
}
