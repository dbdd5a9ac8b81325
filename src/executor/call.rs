//! `call` step semantics (§4.3.3): service invocation with timeout, retry,
//! and optional output schema validation.

use async_trait::async_trait;
use tokio::time;

use super::{Executor, ExecutorContext, StepOutcome};
use crate::error::ExecutionError;
use crate::resolver;
use crate::schema;
use crate::types::{State, StepConfig, StepDef};

/// Resolves `input`, invokes the named service/method through the
/// `ServiceResolver`, retrying per the step's retry policy and bounding
/// each attempt by `timeout_seconds` if set. On success, validates the
/// result against `output`'s schema (if any) before storing it at
/// `output.key`.
pub struct CallExecutor;

#[async_trait]
impl Executor for CallExecutor {
    #[tracing::instrument(skip_all, fields(step_id = %step.id))]
    async fn call(
        &self,
        ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Call(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        let service = ctx
            .services
            .resolve(&config.service)
            .ok_or_else(|| ExecutionError::UnknownService(config.service.clone()))?;

        let resolved_input = resolver::resolve(&state, &config.input);
        let policy = config.retry_policy();
        let timeout = config.timeout_seconds.map(std::time::Duration::from_secs);

        let mut attempt = 1u32;
        let value = loop {
            let delay = policy.delay_for_attempt(attempt);
            if !delay.is_zero() {
                time::sleep(delay).await;
            }

            let call_fut = service.call(&config.method, resolved_input.clone());
            let outcome = match timeout {
                Some(d) => match time::timeout(d, call_fut).await {
                    Ok(r) => r,
                    Err(_) => Err(ExecutionError::Timeout(step.id.clone(), d.as_secs())),
                },
                None => call_fut.await,
            };

            match outcome {
                Ok(value) => break value,
                Err(err) => {
                    if policy.has_attempts_remaining(attempt) {
                        tracing::warn!(step_id = %step.id, attempt, error = %err, "call attempt failed, retrying");
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        };

        let mut next_state = state;
        if let Some(output) = &config.output {
            if let Some(output_schema) = output.schema() {
                schema::validate_or_execution_error(output_schema, &value)
                    .map_err(|e| ExecutionError::Validation(e.to_string()))?;
            }
            next_state = next_state.with_ctx(output.key(), value.clone());
        }

        Ok(StepOutcome::cont(next_state, None, Some(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::service::{Service, ServiceRegistry, ServiceResolver};
    use crate::types::{CallConfig, OutputSpec};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    struct FlakyTwice {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Service for FlakyTwice {
        async fn call(&self, _method: &str, input: Value) -> Result<Value, ExecutionError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ExecutionError::ServiceCall("transient".into()))
            } else {
                Ok(input)
            }
        }
    }

    fn ctx_with(name: &str, service: Arc<dyn Service>) -> ExecutorContext {
        let mut registry = ServiceRegistry::new();
        registry.register(name, service);
        ExecutorContext {
            services: Arc::new(registry),
            runtime: crate::executor::tests_support::noop_ctx().runtime,
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let service = Arc::new(FlakyTwice {
            attempts: AtomicU32::new(0),
        });
        let ctx = ctx_with("flaky", service);
        let step = StepDef {
            id: "c1".into(),
            config: StepConfig::Call(CallConfig {
                service: "flaky".into(),
                method: "go".into(),
                input: json!({"x": 1}),
                output: Some(OutputSpec::Key("result_value".into())),
                timeout_seconds: None,
                retries: Some(3),
                retry_delay: Some(0.0),
                retry_backoff: Some(1.0),
            }),
            next_step: None,
            on_error: None,
        };
        let state = State::new(Uuid::now_v7(), "wf");
        let outcome = CallExecutor.call(&ctx, state, &step).await.unwrap();
        assert_eq!(
            outcome.state.ctx.get("result_value"),
            Some(&json!({"x": 1}))
        );
    }

    #[tokio::test]
    async fn unknown_service_errors() {
        let ctx = ctx_with("other", Arc::new(FlakyTwice {
            attempts: AtomicU32::new(0),
        }));
        let step = StepDef {
            id: "c1".into(),
            config: StepConfig::Call(CallConfig {
                service: "missing".into(),
                method: "go".into(),
                input: Value::Null,
                output: None,
                timeout_seconds: None,
                retries: None,
                retry_delay: None,
                retry_backoff: None,
            }),
            next_step: None,
            on_error: None,
        };
        let state = State::new(Uuid::now_v7(), "wf");
        let result = CallExecutor.call(&ctx, state, &step).await;
        assert!(matches!(result, Err(ExecutionError::UnknownService(_))));
    }

    #[tokio::test]
    async fn schema_mismatch_on_output_fails() {
        struct ReturnsString;
        #[async_trait]
        impl Service for ReturnsString {
            async fn call(&self, _m: &str, _i: Value) -> Result<Value, ExecutionError> {
                Ok(json!("not a number"))
            }
        }
        let ctx = ctx_with("svc", Arc::new(ReturnsString));
        let step = StepDef {
            id: "c1".into(),
            config: StepConfig::Call(CallConfig {
                service: "svc".into(),
                method: "go".into(),
                input: Value::Null,
                output: Some(OutputSpec::Schema {
                    key: "n".into(),
                    schema: json!({"type": "number"}),
                }),
                timeout_seconds: None,
                retries: None,
                retry_delay: None,
                retry_backoff: None,
            }),
            next_step: None,
            on_error: None,
        };
        let state = State::new(Uuid::now_v7(), "wf");
        let result = CallExecutor.call(&ctx, state, &step).await;
        assert!(matches!(result, Err(ExecutionError::Validation(_))));
    }
}
