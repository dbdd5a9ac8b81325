//! The step executor contract (§4.3) and the registry that dispatches a
//! `StepDef.type` to its implementation (§4.3, §9 "registry-based
//! polymorphism over inheritance").

mod approval;
mod assign;
mod call;
mod halt;
mod loop_step;
mod parallel;
mod registry;
mod router;
mod start;
mod sub_workflow;
mod transform;

pub use registry::ExecutorRegistry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExecutionError;
use crate::service::ServiceResolver;
use crate::types::{State, StepDef};

/// Advance to the next step, or (if `next_step` is `None`) fall back to the
/// step's own `next_step` (§4.3).
#[derive(Debug, Clone, Default)]
pub struct ContinueResult {
    pub next_step: Option<String>,
    pub output: Option<Value>,
}

/// Suspend the execution durably (§4.3).
#[derive(Debug, Clone)]
pub struct HaltResult {
    pub data: Value,
    pub resume_step: Option<String>,
    pub prompt: Option<Value>,
}

/// What an executor's `call` produced, besides the new `State`.
#[derive(Debug, Clone)]
pub enum StepResult {
    Continue(ContinueResult),
    Halt(HaltResult),
}

/// `{state, result}` — an executor never mutates `State`; it constructs a
/// new one (§4.3).
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: State,
    pub result: StepResult,
}

impl StepOutcome {
    pub fn cont(state: State, next_step: Option<String>, output: Option<Value>) -> Self {
        Self {
            state,
            result: StepResult::Continue(ContinueResult { next_step, output }),
        }
    }

    pub fn halt(state: State, data: Value, resume_step: Option<String>, prompt: Option<Value>) -> Self {
        Self {
            state,
            result: StepResult::Halt(HaltResult {
                data,
                resume_step,
                prompt,
            }),
        }
    }
}

/// Outcome of running a sub-workflow to completion or suspension, used by
/// both the `workflow` executor and `ExecutorRuntime::run_sub_workflow`.
#[derive(Debug, Clone)]
pub enum SubWorkflowOutcome {
    Completed(Value),
    Halted(HaltResult),
}

/// Outcome of running a nested body (loop iteration) or a single branch
/// (parallel) through the engine's step dispatch, without the top-level
/// per-step `Execution` persistence that only applies to the driving loop.
#[derive(Debug, Clone)]
pub enum NestedOutcome {
    Completed { state: State, output: Option<Value> },
    Halted { state: State, halt: HaltResult },
}

/// The capabilities an executor needs from the engine that would otherwise
/// require a generic `Engine<S>` parameter threaded through every executor.
/// Implemented by `Engine<S>` for any store `S`, then erased to a trait
/// object so the executor registry stays store-agnostic (mirrors how the
/// teacher's `AnyWorkflow` erases `Workflow`'s associated types).
#[async_trait]
pub trait ExecutorRuntime: Send + Sync {
    /// Runs `steps` in array order (ignoring each step's own `next_step`,
    /// per §4.3.5), honoring `on_error` by jumping to a step within the
    /// same list. Used by `loop` for its `do` body.
    async fn run_body(
        &self,
        state: State,
        steps: &[StepDef],
        key_prefix: &str,
    ) -> Result<NestedOutcome, ExecutionError>;

    /// Runs a single branch `StepDef` to completion. Used by `parallel`.
    async fn run_branch(
        &self,
        state: State,
        branch: &StepDef,
        key_prefix: &str,
    ) -> Result<NestedOutcome, ExecutionError>;

    /// Runs another registered workflow to completion (or suspension).
    async fn run_sub_workflow(
        &self,
        workflow_id: &str,
        input: Value,
        timeout: Option<Duration>,
    ) -> Result<SubWorkflowOutcome, ExecutionError>;
}

/// Everything an executor needs besides the current `State` and `StepDef`.
#[derive(Clone)]
pub struct ExecutorContext {
    pub services: Arc<dyn ServiceResolver>,
    pub runtime: Arc<dyn ExecutorRuntime>,
}

/// Implements one step type's semantics (§4.3).
///
/// Executors are pure apart from their authorized side effects (service
/// invocation, sub-workflow execution). They never mutate `State`; they
/// construct new ones.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn call(
        &self,
        ctx: &ExecutorContext,
        state: State,
        step: &StepDef,
    ) -> Result<StepOutcome, ExecutionError>;
}

pub use approval::ApprovalExecutor;
pub use assign::AssignExecutor;
pub use call::CallExecutor;
pub use halt::HaltExecutor;
pub use loop_step::LoopExecutor;
pub use parallel::ParallelExecutor;
pub use router::RouterExecutor;
pub use start::{apply_and_validate, EndExecutor, StartExecutor};
pub use sub_workflow::SubWorkflowExecutor;
pub use transform::TransformExecutor;
