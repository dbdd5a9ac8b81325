//! Error types for the workflow engine
//!
//! Three enums, one per failure domain (see `spec.md` §7): `ConfigError` for
//! fatal construction-time problems, `ValidationError` for static workflow
//! checks, and `ExecutionError` for runtime faults. `EngineError` composes
//! them for call sites that can fail for more than one reason.

use thiserror::Error;

/// Fatal configuration problems, raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No store was supplied to the engine.
    #[error("no store configured")]
    MissingStore,

    /// Two executors were registered under the same step type name.
    #[error("executor already registered for step type: {0}")]
    DuplicateExecutor(String),

    /// Two workflows were registered under the same id.
    #[error("workflow already registered: {0}")]
    DuplicateWorkflow(String),
}

/// A workflow failed static validation, or a step encountered a type/schema
/// violation while running.
///
/// The validator is total (§4.5): it collects every issue rather than
/// stopping at the first, so this carries the full list.
#[derive(Debug, Error, Clone)]
#[error("validation failed:\n{}", format_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

fn format_issues(issues: &[String]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ValidationError {
    pub fn single(issue: impl Into<String>) -> Self {
        Self {
            issues: vec![issue.into()],
        }
    }

    pub fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Any runtime fault: unknown step type, unknown workflow, service
/// invocation failure, timeout, approval rejection, loop exhaustion without
/// a handler, parallel aggregate failure.
#[derive(Debug, Error, Clone)]
pub enum ExecutionError {
    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Service call failed: {0}")]
    ServiceCall(String),

    #[error("Step {0} timed out after {1}s")]
    Timeout(String, u64),

    #[error("Workflow timeout after {0}s")]
    WorkflowTimeout(u64),

    #[error("no matching route")]
    NoMatchingRoute,

    #[error("Loop exhausted after {0} iterations")]
    LoopExhausted(u64),

    #[error("Rejected")]
    ApprovalRejected,

    #[error("Approval timeout")]
    ApprovalTimeout,

    #[error("Sub-workflow failed: {0}")]
    SubWorkflowFailed(String),

    #[error("Sub-workflow not found: {0}")]
    SubWorkflowNotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Parallel failed: {0} errors")]
    ParallelFailed(usize),

    #[error("Insufficient completions")]
    InsufficientCompletions,

    /// A runtime type/schema violation in `start` (missing/mistyped input)
    /// or `call` (output schema mismatch) — conceptually a `ValidationError`
    /// per §4.3.1/§4.3.3, kept inside `ExecutionError` so every executor
    /// returns one error type (the engine's `Entry`/`_last_error` plumbing
    /// is uniform); `class_name` still reports it as `ValidationError`.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

impl ExecutionError {
    /// Class name used as the prefix of `Execution.error` on unrecovered
    /// failure (§8 scenario e: "`load(id).error` starts with the class
    /// name").
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::StepNotFound(_) => "StepNotFound",
            Self::UnknownStepType(_) => "UnknownStepType",
            Self::UnknownService(_) => "UnknownService",
            Self::ServiceCall(_) => "ServiceCall",
            Self::Timeout(_, _) => "Timeout",
            Self::WorkflowTimeout(_) => "WorkflowTimeout",
            Self::NoMatchingRoute => "NoMatchingRoute",
            Self::LoopExhausted(_) => "LoopExhausted",
            Self::ApprovalRejected => "ApprovalRejected",
            Self::ApprovalTimeout => "ApprovalTimeout",
            Self::SubWorkflowFailed(_) => "SubWorkflowFailed",
            Self::SubWorkflowNotFound(_) => "SubWorkflowNotFound",
            Self::WorkflowNotFound(_) => "WorkflowNotFound",
            Self::ParallelFailed(_) => "ParallelFailed",
            Self::InsufficientCompletions => "InsufficientCompletions",
            Self::Validation(_) => "ValidationError",
            Self::Other(_) => "ExecutionError",
        }
    }

    /// Render as `"{ClassName}: {message}"`, the shape `_last_error.message`
    /// and `Execution.error` are specified to carry.
    pub fn with_class(&self) -> String {
        format!("{}: {}", self.class_name(), self)
    }
}

/// Umbrella error for call sites that span subsystems.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Store(#[from] crate::persistence::StoreError),
}
