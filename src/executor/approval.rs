//! `approval` step semantics (§4.3.7).
//!
//! The first dispatch halts with `prompt`/`context` as the halt payload and
//! `resume_step` set to this same step, so resuming re-enters `call` here,
//! alongside a reserved `_approval_requested_at` ctx key that anchors the
//! timeout clock. A resumed call inspects the reserved `approved` ctx key
//! (written by whatever resumed the execution — see `Engine::resume`) to
//! decide whether to continue or route to `on_reject`; once consumed,
//! `approved` and the timeout anchor are stripped from ctx so a later
//! re-entry of this same step (e.g. from a loop) doesn't see a stale
//! decision. A resume that arrives after `timeout_seconds` has elapsed
//! since the halt — decision or not — routes to `on_timeout`, or raises
//! `ApprovalTimeout` if none is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Executor, ExecutorContext, StepOutcome};
use crate::error::ExecutionError;
use crate::resolver;
use crate::types::{State, StepConfig, StepDef};

const REQUESTED_AT_KEY: &str = "_approval_requested_at";

pub struct ApprovalExecutor;

#[async_trait]
impl Executor for ApprovalExecutor {
    async fn call(
        &self,
        _ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError> {
        let config = match &step.config {
            StepConfig::Approval(c) => c,
            _ => unreachable!("registry dispatches by type_name"),
        };

        if let (Some(timeout_secs), Some(requested_at)) = (
            config.timeout_seconds,
            state.ctx.get(REQUESTED_AT_KEY).and_then(Value::as_str),
        ) {
            let elapsed = DateTime::parse_from_rfc3339(requested_at)
                .map(|t| Utc::now().signed_duration_since(t).num_seconds())
                .unwrap_or(0);
            if elapsed >= timeout_secs as i64 {
                let cleared = state.without_ctx("approved").without_ctx(REQUESTED_AT_KEY);
                return match &config.on_timeout {
                    Some(target) => Ok(StepOutcome::cont(cleared, Some(target.clone()), None)),
                    None => Err(ExecutionError::ApprovalTimeout),
                };
            }
        }

        match state.ctx.get("approved").cloned() {
            None => {
                let prompt = resolver::resolve(&state, &config.prompt);
                let context = resolver::resolve(&state, &config.context);
                let payload = serde_json::json!({
                    "prompt": prompt,
                    "context": context,
                    "approvers": config.approvers,
                });
                let requested_at = state
                    .ctx
                    .get(REQUESTED_AT_KEY)
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| Utc::now().to_rfc3339());
                let next = state.with_ctx(REQUESTED_AT_KEY, Value::from(requested_at));
                Ok(StepOutcome::halt(
                    next,
                    payload.clone(),
                    Some(step.id.clone()),
                    Some(payload),
                ))
            }
            Some(Value::Bool(true)) => {
                let response = state.ctx.get("response").cloned();
                let next = state.without_ctx("approved").without_ctx(REQUESTED_AT_KEY);
                Ok(StepOutcome::cont(next, None, response))
            }
            Some(Value::Bool(false)) => {
                let next = state.without_ctx("approved").without_ctx(REQUESTED_AT_KEY);
                match &config.on_reject {
                    Some(target) => Ok(StepOutcome::cont(next, Some(target.clone()), None)),
                    None => Err(ExecutionError::ApprovalRejected),
                }
            }
            Some(other) => Err(ExecutionError::Other(format!(
                "approval ctx key must be a boolean, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tests_support::noop_ctx;
    use crate::executor::StepResult;
    use crate::types::ApprovalConfig;
    use serde_json::json;
    use uuid::Uuid;

    fn step() -> StepDef {
        StepDef {
            id: "approve1".into(),
            config: StepConfig::Approval(ApprovalConfig {
                prompt: json!("Approve refund?"),
                context: json!({"amount": "$amount"}),
                approvers: vec!["finance".into()],
                timeout_seconds: Some(3600),
                on_reject: Some("reject_path".into()),
                on_timeout: Some("timeout_path".into()),
            }),
            next_step: Some("after".into()),
            on_error: None,
        }
    }

    #[tokio::test]
    async fn first_dispatch_halts_with_prompt() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        state.ctx.insert("amount".into(), json!(250));
        let outcome = ApprovalExecutor.call(&noop_ctx(), state, &step()).await.unwrap();
        match outcome.result {
            StepResult::Halt(h) => {
                assert_eq!(h.resume_step.as_deref(), Some("approve1"));
                assert_eq!(h.data["prompt"], json!("Approve refund?"));
                assert_eq!(h.data["context"]["amount"], json!(250));
            }
            _ => panic!("expected halt"),
        }
    }

    #[tokio::test]
    async fn approved_resume_continues() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        state.ctx.insert("approved".into(), json!(true));
        state.ctx.insert("response".into(), json!({"note": "ok"}));
        let outcome = ApprovalExecutor.call(&noop_ctx(), state, &step()).await.unwrap();
        match outcome.result {
            StepResult::Continue(c) => {
                assert_eq!(c.next_step, None);
                assert_eq!(c.output, Some(json!({"note": "ok"})));
            }
            _ => panic!("expected continue"),
        }
    }

    #[tokio::test]
    async fn rejected_resume_routes_to_on_reject() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        state.ctx.insert("approved".into(), json!(false));
        let outcome = ApprovalExecutor.call(&noop_ctx(), state, &step()).await.unwrap();
        match outcome.result {
            StepResult::Continue(c) => assert_eq!(c.next_step.as_deref(), Some("reject_path")),
            _ => panic!("expected continue"),
        }
    }

    #[tokio::test]
    async fn resume_strips_approved_and_timeout_anchor_from_ctx() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        state.ctx.insert("approved".into(), json!(true));
        state
            .ctx
            .insert(REQUESTED_AT_KEY.into(), json!(Utc::now().to_rfc3339()));
        let outcome = ApprovalExecutor.call(&noop_ctx(), state, &step()).await.unwrap();
        assert!(!outcome.state.ctx.contains_key("approved"));
        assert!(!outcome.state.ctx.contains_key(REQUESTED_AT_KEY));
    }

    #[tokio::test]
    async fn resume_past_timeout_routes_to_on_timeout() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        let requested_at = Utc::now() - chrono::Duration::seconds(7200);
        state
            .ctx
            .insert(REQUESTED_AT_KEY.into(), json!(requested_at.to_rfc3339()));
        let outcome = ApprovalExecutor.call(&noop_ctx(), state, &step()).await.unwrap();
        match outcome.result {
            StepResult::Continue(c) => assert_eq!(c.next_step.as_deref(), Some("timeout_path")),
            _ => panic!("expected continue"),
        }
    }

    #[tokio::test]
    async fn resume_past_timeout_without_on_timeout_errors() {
        let mut state = State::new(Uuid::now_v7(), "wf");
        let requested_at = Utc::now() - chrono::Duration::seconds(7200);
        state
            .ctx
            .insert(REQUESTED_AT_KEY.into(), json!(requested_at.to_rfc3339()));
        let mut no_timeout_step = step();
        if let StepConfig::Approval(c) = &mut no_timeout_step.config {
            c.on_timeout = None;
        }
        let result = ApprovalExecutor.call(&noop_ctx(), state, &no_timeout_step).await;
        assert!(matches!(result, Err(ExecutionError::ApprovalTimeout)));
    }
}
