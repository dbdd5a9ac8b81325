//! `workflow` step semantics (§4.3.10): invoke another registered workflow
//! as a single step, forwarding halts and failures from the child.

use async_trait::async_trait;

use super::{Executor, ExecutorContext, StepOutcome, SubWorkflowOutcome};
use crate::error::ExecutionError;
use crate::resolver;
use crate::types::{State, StepConfig, StepDef};

pub struct SubWorkflowExecutor;

#[async_trait]
impl Executor for SubWorkflowExecutor {
    async fn call(
        &self,
        ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Workflow(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        let input = resolver::resolve(&state, &config.input);
        let timeout = config.timeout_seconds.map(std::time::Duration::from_secs);

        match ctx
            .runtime
            .run_sub_workflow(&config.workflow_id, input, timeout)
            .await?
        {
            SubWorkflowOutcome::Completed(result) => {
                let next = state.with_ctx(config.output.clone(), result.clone());
                Ok(StepOutcome::cont(next, None, Some(result)))
            }
            // A sub-workflow that halts suspends its parent in turn; there
            // is no independent resume point inside the parent for this —
            // resuming the parent execution resumes the child instead. The
            // bubbled resume_step must name *this* step in the parent's own
            // step namespace, not the child's internal halted step id.
            SubWorkflowOutcome::Halted(halt) => Ok(StepOutcome::halt(
                state,
                halt.data,
                Some(step.id.clone()),
                halt.prompt,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorRuntime, HaltResult, NestedOutcome, StepResult};
    use crate::service::ServiceRegistry;
    use crate::types::SubWorkflowConfig;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    struct FixedOutcomeRuntime {
        outcome: std::sync::Mutex<Option<SubWorkflowOutcome>>,
    }

    #[async_trait]
    impl ExecutorRuntime for FixedOutcomeRuntime {
        async fn run_body(
            &self,
            state: State,
            _steps: &[StepDef],
            _key_prefix: &str,
        ) -> Result<NestedOutcome, ExecutionError> {
            Ok(NestedOutcome::Completed { state, output: None })
        }

        async fn run_branch(
            &self,
            state: State,
            _branch: &StepDef,
            _key_prefix: &str,
        ) -> Result<NestedOutcome, ExecutionError> {
            Ok(NestedOutcome::Completed { state, output: None })
        }

        async fn run_sub_workflow(
            &self,
            _workflow_id: &str,
            _input: Value,
            _timeout: Option<Duration>,
        ) -> Result<SubWorkflowOutcome, ExecutionError> {
            Ok(self.outcome.lock().unwrap().take().unwrap())
        }
    }

    fn ctx_returning(outcome: SubWorkflowOutcome) -> ExecutorContext {
        ExecutorContext {
            services: Arc::new(ServiceRegistry::new()),
            runtime: Arc::new(FixedOutcomeRuntime {
                outcome: std::sync::Mutex::new(Some(outcome)),
            }),
        }
    }

    fn step() -> StepDef {
        StepDef {
            id: "sub1".into(),
            config: StepConfig::Workflow(SubWorkflowConfig {
                workflow_id: "child".into(),
                input: json!({}),
                output: "child_result".into(),
                timeout_seconds: None,
            }),
            next_step: None,
            on_error: None,
        }
    }

    #[tokio::test]
    async fn completed_child_stores_result() {
        let state = State::new(Uuid::now_v7(), "wf");
        let ctx = ctx_returning(SubWorkflowOutcome::Completed(json!({"ok": true})));
        let outcome = SubWorkflowExecutor.call(&ctx, state, &step()).await.unwrap();
        assert_eq!(
            outcome.state.ctx.get("child_result"),
            Some(&json!({"ok": true}))
        );
        assert!(matches!(outcome.result, StepResult::Continue(_)));
    }

    #[tokio::test]
    async fn halted_child_halts_parent() {
        let state = State::new(Uuid::now_v7(), "wf");
        let ctx = ctx_returning(SubWorkflowOutcome::Halted(HaltResult {
            data: json!({"reason": "waiting"}),
            resume_step: Some("sub1".into()),
            prompt: None,
        }));
        let outcome = SubWorkflowExecutor.call(&ctx, state, &step()).await.unwrap();
        assert!(matches!(outcome.result, StepResult::Halt(_)));
    }
}
