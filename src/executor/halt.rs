//! `halt` step semantics (§4.3.8).

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{Executor, ExecutorContext, StepOutcome};
use crate::error::ExecutionError;
use crate::resolver;
use crate::types::{State, StepConfig, StepDef};

/// Unconditionally suspends the execution. `reason`/`data` are resolved and
/// recorded as the halt payload (`{reason, halted_at, ...data}` — `data`'s
/// own keys are spread at the top level, not nested under a `data` key);
/// `resume_step` overrides the default resume point (the step following
/// this one).
pub struct HaltExecutor;

#[async_trait]
impl Executor for HaltExecutor {
    async fn call(
        &self,
        _ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Halt(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        let reason = resolver::resolve(&state, &config.reason);
        let data = resolver::resolve(&state, &config.data);

        let mut payload = serde_json::Map::new();
        payload.insert("reason".to_string(), reason);
        payload.insert("halted_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        match data {
            Value::Object(fields) => payload.extend(fields),
            Value::Null => {}
            other => {
                payload.insert("data".to_string(), other);
            }
        }

        Ok(StepOutcome::halt(
            state,
            Value::Object(payload),
            config.resume_step.clone(),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StepResult;
    use crate::types::HaltConfig;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn halt_carries_resolved_reason_and_non_object_data_under_data_key() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        state.ctx.insert("amount".into(), json!(500));
        let step = StepDef {
            id: "h1".into(),
            config: StepConfig::Halt(HaltConfig {
                reason: json!("needs_review"),
                data: json!("$amount"),
                resume_step: Some("after".into()),
            }),
            next_step: None,
            on_error: None,
        };

        let ctx = crate::executor::tests_support::noop_ctx();
        let outcome = HaltExecutor.call(&ctx, state, &step).await.unwrap();
        match outcome.result {
            StepResult::Halt(h) => {
                assert_eq!(h.data["reason"], json!("needs_review"));
                assert_eq!(h.data["data"], json!(500));
                assert!(h.data["halted_at"].is_string());
                assert_eq!(h.resume_step.as_deref(), Some("after"));
            }
            _ => panic!("expected halt"),
        }
    }

    #[tokio::test]
    async fn halt_spreads_object_data_at_the_top_level() {
        let state = State::new(Uuid::now_v7(), "wf");
        let step = StepDef {
            id: "h1".into(),
            config: StepConfig::Halt(HaltConfig {
                reason: json!("needs_review"),
                data: json!({"ticket_id": "T-42", "priority": "high"}),
                resume_step: Some("after".into()),
            }),
            next_step: None,
            on_error: None,
        };

        let ctx = crate::executor::tests_support::noop_ctx();
        let outcome = HaltExecutor.call(&ctx, state, &step).await.unwrap();
        match outcome.result {
            StepResult::Halt(h) => {
                assert_eq!(h.data["reason"], json!("needs_review"));
                assert_eq!(h.data["ticket_id"], json!("T-42"));
                assert_eq!(h.data["priority"], json!("high"));
                assert!(h.data.get("data").is_none());
            }
            _ => panic!("expected halt"),
        }
    }
}
