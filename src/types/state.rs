//! Runtime state, the persistence unit, and the audit trail (§3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Ctx keys the engine and its built-in executors own; user `assign.set`
/// writes to these are rejected by the validator (§6, §9 "Reserved ctx
/// prefix `_`").
pub const RESERVED_CTX_KEYS: &[&str] = &[
    "result",
    "response",
    "approved",
    "_last_error",
    "_halt",
    "_approval_requested_at",
    "_current_agent",
    "_handoff_to",
    "_guardrail_failure",
    "iteration",
    "break_loop",
];

/// The in-flight variable environment of one execution between steps (§3).
///
/// Immutable during one execution cycle: every executor returns a new
/// `State` rather than mutating one in place, which keeps persistence a
/// plain snapshot and eliminates step-local aliasing hazards (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub execution_id: Uuid,
    pub workflow_id: String,
    pub input: HashMap<String, Value>,
    pub ctx: HashMap<String, Value>,
    pub current_step: Option<String>,
    #[serde(default)]
    pub history: Option<Value>,
}

impl State {
    pub fn new(execution_id: Uuid, workflow_id: impl Into<String>) -> Self {
        Self {
            execution_id,
            workflow_id: workflow_id.into(),
            input: HashMap::new(),
            ctx: HashMap::new(),
            current_step: None,
            history: None,
        }
    }

    /// Structural-sharing-friendly clone-and-mutate helper: executors build
    /// their returned `State` by cloning the input and patching `ctx`.
    pub fn with_ctx(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.ctx.insert(key.into(), value);
        next
    }

    pub fn with_current_step(&self, step: Option<String>) -> Self {
        let mut next = self.clone();
        next.current_step = step;
        next
    }

    /// Clone-and-mutate helper that drops a ctx key, e.g. to stop a
    /// consumed reserved key (`approved`) from reappearing on a later
    /// resume.
    pub fn without_ctx(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.ctx.remove(key);
        next
    }
}

/// Status of an `Execution` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Halted,
    Failed,
}

/// The persistence unit (§3). A `*halted*` execution may be reloaded and
/// re-entered, at which point it returns to `Running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub input: HashMap<String, Value>,
    pub ctx: HashMap<String, Value>,
    pub current_step: Option<String>,
    pub result: Option<Value>,
    pub recover_to: Option<String>,
    pub halt_data: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn pending(id: Uuid, workflow_id: impl Into<String>, input: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id,
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Pending,
            input,
            ctx: HashMap::new(),
            current_step: None,
            result: None,
            recover_to: None,
            halt_data: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Materialize a `State` from a persisted execution, e.g. for resume.
    pub fn to_state(&self) -> State {
        State {
            execution_id: self.id,
            workflow_id: self.workflow_id.clone(),
            input: self.input.clone(),
            ctx: self.ctx.clone(),
            current_step: self.current_step.clone(),
            history: None,
        }
    }

    pub fn apply_state(&mut self, state: &State) {
        self.ctx = state.ctx.clone();
        self.current_step = state.current_step.clone();
        self.updated_at = Utc::now();
    }
}

/// Action recorded on an `Entry` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    Completed,
    Halted,
    Failed,
}

/// Append-only audit record for one step invocation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_id: String,
    pub step_type: String,
    pub action: EntryAction,
    pub duration_ms: u64,
    pub input: Value,
    pub output: Value,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        execution_id: Uuid,
        step_id: impl Into<String>,
        step_type: impl Into<String>,
        action: EntryAction,
        duration_ms: u64,
        input: Value,
        output: Value,
        error: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            execution_id,
            step_id: step_id.into(),
            step_type: step_type.into(),
            action,
            duration_ms,
            input,
            output,
            error,
            timestamp: Utc::now(),
        }
    }
}
