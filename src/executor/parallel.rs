//! `parallel` step semantics (§4.3.6): concurrent branches joined by a
//! `wait` policy (`all`, `any`, or a target completion count).

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

use super::{Executor, ExecutorContext, NestedOutcome, StepOutcome};
use crate::error::ExecutionError;
use crate::types::{ParallelConfig, State, StepConfig, StepDef, WaitMode, WaitModeKind};

pub struct ParallelExecutor;

#[async_trait]
impl Executor for ParallelExecutor {
    async fn call(
        &self,
        ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Parallel(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        let branch_results = join_all(config.branches.iter().enumerate().map(|(idx, branch)| {
            let key_prefix = format!("{}:{}", step.id, idx);
            let state = state.clone();
            async move { ctx.runtime.run_branch(state, branch, &key_prefix).await }
        }))
        .await;

        // A branch halting mid-flight halts the whole step; there is no
        // partial-parallel resume model, so the first halt observed wins.
        for result in &branch_results {
            if let Ok(NestedOutcome::Halted { state, halt }) = result {
                return Ok(StepOutcome::halt(
                    state.clone(),
                    halt.data.clone(),
                    halt.resume_step.clone(),
                    halt.prompt.clone(),
                ));
            }
        }

        let succeeded = branch_results
            .iter()
            .filter(|r| matches!(r, Ok(NestedOutcome::Completed { .. })))
            .count();
        let required = match config.wait {
            WaitMode::Named(WaitModeKind::All) => config.branches.len(),
            WaitMode::Named(WaitModeKind::Any) => 1.min(config.branches.len().max(1)),
            WaitMode::Count(n) => n as usize,
        };

        if succeeded < required {
            if matches!(config.wait, WaitMode::Named(WaitModeKind::All)) {
                let failed = branch_results.len() - succeeded;
                return Err(ExecutionError::ParallelFailed(failed));
            }
            return Err(ExecutionError::InsufficientCompletions);
        }

        // Under `any`/count-mode, only the branches needed to satisfy
        // `required` are merged, in branch order; the rest completed too
        // (futures aren't cancellable once started) but their ctx writes
        // are discarded along with the failures'.
        let mut merged = state;
        let mut outputs = Vec::with_capacity(branch_results.len());
        let mut merged_count = 0usize;
        for result in branch_results {
            match result {
                Ok(NestedOutcome::Completed { state: branch_state, output }) => {
                    if merged_count < required {
                        for (k, v) in branch_state.ctx {
                            merged.ctx.insert(k, v);
                        }
                        outputs.push(output.unwrap_or(Value::Null));
                        merged_count += 1;
                    } else {
                        outputs.push(Value::Null);
                    }
                }
                Ok(NestedOutcome::Halted { .. }) => unreachable!("halts handled above"),
                Err(_) => outputs.push(Value::Null),
            }
        }

        let next = merged.with_ctx(config.output.clone(), Value::Array(outputs));
        Ok(StepOutcome::cont(next, None, None))
    }
}
