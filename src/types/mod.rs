//! Immutable workflow, step, config, state, and result records (§3).

mod state;
mod workflow_def;

pub use state::{Entry, EntryAction, Execution, ExecutionStatus, State, RESERVED_CTX_KEYS};
pub use workflow_def::{
    AssignConfig, CallConfig, EndConfig, HaltConfig, InputDef, InputType, LoopConfig, OutputSpec,
    ParallelConfig, Route, RouterConfig, StartConfig, StepConfig, StepDef, SubWorkflowConfig,
    TransformConfig, WaitMode, WaitModeKind, WorkflowDef, FINISHED,
};
