//! `loop` step semantics (§4.3.5): `foreach` over a resolved array, or
//! `while` against a condition, bounded by `max` either way.

use async_trait::async_trait;
use serde_json::Value;

use super::{Executor, ExecutorContext, NestedOutcome, StepOutcome};
use crate::error::ExecutionError;
use crate::resolver;
use crate::types::{LoopConfig, State, StepConfig, StepDef};

pub struct LoopExecutor;

#[async_trait]
impl Executor for LoopExecutor {
    async fn call(
        &self,
        ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Loop(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        if config.is_foreach() {
            run_foreach(ctx, state, step, config).await
        } else {
            run_while(ctx, state, step, config).await
        }
    }
}

async fn run_foreach(
    ctx: &ExecutorContext,
    state: State,
    step: &StepDef,
    config: &LoopConfig,
) -> Result<StepOutcome, ExecutionError> {
    let items = match resolver::resolve(&state, config.over.as_ref().expect("is_foreach checked")) {
        Value::Array(items) => items,
        other => {
            return Err(ExecutionError::Validation(format!(
                "loop.over must resolve to an array, got {other}"
            )))
        }
    };

    let mut current = state;
    let mut results = Vec::new();

    for (index, item) in items.iter().enumerate() {
        if index as u64 >= config.max {
            return exhausted(current, config, results);
        }

        current = current.with_ctx("iteration", Value::from(index));
        if let Some(as_name) = &config.r#as {
            current = current.with_ctx(as_name.clone(), item.clone());
        }
        if let Some(index_as) = &config.index_as {
            current = current.with_ctx(index_as.clone(), Value::from(index));
        }

        let key_prefix = format!("{}:{}", step.id, index);
        match ctx
            .runtime
            .run_body(current, &config.body, &key_prefix)
            .await?
        {
            NestedOutcome::Halted { state, halt } => {
                return Ok(StepOutcome::halt(state, halt.data, halt.resume_step, halt.prompt));
            }
            NestedOutcome::Completed { state, output } => {
                current = state;
                results.push(output.unwrap_or(Value::Null));
                if current.ctx.get("break_loop") == Some(&Value::Bool(true)) {
                    break;
                }
            }
        }
    }

    current = strip_loop_vars(current, config);
    let next = current.with_ctx(config.output.clone(), Value::Array(results));
    Ok(StepOutcome::cont(next, None, None))
}

async fn run_while(
    ctx: &ExecutorContext,
    state: State,
    step: &StepDef,
    config: &LoopConfig,
) -> Result<StepOutcome, ExecutionError> {
    let condition = config
        .while_cond
        .as_ref()
        .expect("validator rejects a loop with neither over nor while");

    let mut current = state;
    let mut results = Vec::new();
    let mut iteration: u64 = 0;

    while condition.evaluate(&current) {
        if iteration >= config.max {
            return exhausted(current, config, results);
        }

        current = current.with_ctx("iteration", Value::from(iteration));
        let key_prefix = format!("{}:{}", step.id, iteration);
        match ctx
            .runtime
            .run_body(current, &config.body, &key_prefix)
            .await?
        {
            NestedOutcome::Halted { state, halt } => {
                return Ok(StepOutcome::halt(state, halt.data, halt.resume_step, halt.prompt));
            }
            NestedOutcome::Completed { state, output } => {
                current = state;
                results.push(output.unwrap_or(Value::Null));
                if current.ctx.get("break_loop") == Some(&Value::Bool(true)) {
                    break;
                }
            }
        }
        iteration += 1;
    }

    current = strip_loop_vars(current, config);
    let next = current.with_ctx(config.output.clone(), Value::Array(results));
    Ok(StepOutcome::cont(next, None, None))
}

fn exhausted(state: State, config: &LoopConfig, results: Vec<Value>) -> Result<StepOutcome, ExecutionError> {
    match &config.on_exhausted {
        Some(target) => {
            let next = state.with_ctx(config.output.clone(), Value::Array(results));
            Ok(StepOutcome::cont(next, Some(target.clone()), None))
        }
        None => Err(ExecutionError::LoopExhausted(config.max)),
    }
}

fn strip_loop_vars(mut state: State, config: &LoopConfig) -> State {
    state.ctx.remove("iteration");
    state.ctx.remove("break_loop");
    if let Some(as_name) = &config.r#as {
        state.ctx.remove(as_name);
    }
    if let Some(index_as) = &config.index_as {
        state.ctx.remove(index_as);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorRuntime, StepResult, SubWorkflowOutcome};
    use crate::service::ServiceRegistry;
    use crate::condition::{Condition, Operator};
    use crate::types::AssignConfig;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    /// A runtime whose `run_body` directly interprets a single `assign`
    /// step, enough to exercise `loop`'s iteration bookkeeping without
    /// pulling in the full engine.
    struct AssignOnlyRuntime;

    #[async_trait]
    impl ExecutorRuntime for AssignOnlyRuntime {
        async fn run_body(
            &self,
            state: State,
            steps: &[StepDef],
            _key_prefix: &str,
        ) -> Result<NestedOutcome, ExecutionError> {
            let mut current = state;
            let mut output = None;
            for step in steps {
                if let StepConfig::Assign(AssignConfig { set }) = &step.config {
                    for (k, expr) in set {
                        let resolved = resolver::resolve(&current, expr);
                        current = current.with_ctx(k.clone(), resolved.clone());
                        output = Some(resolved);
                    }
                }
            }
            Ok(NestedOutcome::Completed {
                state: current,
                output,
            })
        }

        async fn run_branch(
            &self,
            state: State,
            _branch: &StepDef,
            _key_prefix: &str,
        ) -> Result<NestedOutcome, ExecutionError> {
            Ok(NestedOutcome::Completed {
                state,
                output: None,
            })
        }

        async fn run_sub_workflow(
            &self,
            _workflow_id: &str,
            _input: Value,
            _timeout: Option<std::time::Duration>,
        ) -> Result<SubWorkflowOutcome, ExecutionError> {
            unimplemented!()
        }
    }

    fn ctx() -> ExecutorContext {
        ExecutorContext {
            services: Arc::new(ServiceRegistry::new()),
            runtime: Arc::new(AssignOnlyRuntime),
        }
    }

    fn assign_body(key: &str, expr: Value) -> Vec<StepDef> {
        vec![StepDef {
            id: "body1".into(),
            config: StepConfig::Assign(AssignConfig {
                set: vec![(key.to_string(), expr)],
            }),
            next_step: None,
            on_error: None,
        }]
    }

    #[tokio::test]
    async fn foreach_collects_body_output_per_item() {
        let state = State::new(Uuid::now_v7(), "wf");
        let step = StepDef {
            id: "loop1".into(),
            config: StepConfig::Loop(LoopConfig {
                over: Some(json!([1, 2, 3])),
                r#as: Some("item".into()),
                index_as: None,
                while_cond: None,
                max: 100,
                on_exhausted: None,
                body: assign_body("doubled", json!("$item")),
                output: "results".into(),
            }),
            next_step: None,
            on_error: None,
        };
        let outcome = LoopExecutor.call(&ctx(), state, &step).await.unwrap();
        match outcome.result {
            StepResult::Continue(_) => {
                assert_eq!(
                    outcome.state.ctx.get("results"),
                    Some(&json!([1, 2, 3]))
                );
                assert!(!outcome.state.ctx.contains_key("item"));
                assert!(!outcome.state.ctx.contains_key("iteration"));
            }
            _ => panic!("expected continue"),
        }
    }

    #[tokio::test]
    async fn while_loop_respects_condition_and_max() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        state.ctx.insert("count".into(), json!(0));
        let step = StepDef {
            id: "loop1".into(),
            config: StepConfig::Loop(LoopConfig {
                over: None,
                r#as: None,
                index_as: None,
                while_cond: Some(Condition {
                    field: "count".into(),
                    op: Operator::Lt,
                    value: json!(3),
                }),
                max: 10,
                on_exhausted: None,
                body: assign_body("count", json!("$iteration")),
                output: "results".into(),
            }),
            next_step: None,
            on_error: None,
        };
        let outcome = LoopExecutor.call(&ctx(), state, &step).await.unwrap();
        match outcome.result {
            StepResult::Continue(_) => {
                assert_eq!(outcome.state.ctx.get("count"), Some(&json!(2)));
            }
            _ => panic!("expected continue"),
        }
    }

    #[tokio::test]
    async fn exhaustion_without_handler_errors() {
        let state = State::new(Uuid::now_v7(), "wf");
        let step = StepDef {
            id: "loop1".into(),
            config: StepConfig::Loop(LoopConfig {
                over: Some(json!([1, 2, 3, 4])),
                r#as: Some("item".into()),
                index_as: None,
                while_cond: None,
                max: 2,
                on_exhausted: None,
                body: assign_body("x", json!("$item")),
                output: "results".into(),
            }),
            next_step: None,
            on_error: None,
        };
        let result = LoopExecutor.call(&ctx(), state, &step).await;
        assert!(matches!(result, Err(ExecutionError::LoopExhausted(2))));
    }
}
