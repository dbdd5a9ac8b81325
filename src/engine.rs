//! The interpreter loop (§4.4): drives a `WorkflowDef` step by step,
//! persisting the `Execution` after every step so a crash loses at most one
//! step and a halted execution can be resumed by any process holding the
//! same `Store`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{ConfigError, EngineError, ExecutionError};
use crate::executor::{
    apply_and_validate, ContinueResult, ExecutorContext, ExecutorRegistry, ExecutorRuntime,
    HaltResult, NestedOutcome, StepResult, SubWorkflowOutcome,
};
use crate::persistence::Store;
use crate::registry::WorkflowRegistry;
use crate::service::{ServiceRegistry, ServiceResolver};
use crate::types::{
    Entry, EntryAction, Execution, ExecutionStatus, State, StepDef, WorkflowDef, FINISHED,
};
use crate::validator;

/// Construction-time engine settings. `with_*` builders mirror the
/// teacher's `EngineConfig`/`WorkerConfig` style of config structs.
#[derive(Clone)]
pub struct EngineConfig {
    /// Caps how many steps one `run`/`resume` call may execute before
    /// giving up — a backstop against a validator gap producing a live
    /// cycle, not a normal termination path.
    pub max_steps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_steps: 10_000 }
    }
}

impl EngineConfig {
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// The interpreter. Generic over the storage backend; executors never see
/// `S` directly — they reach the engine through the object-safe
/// `ExecutorRuntime` trait, erased at each step dispatch.
pub struct Engine<S: Store> {
    store: Arc<S>,
    workflows: Arc<WorkflowRegistry>,
    executors: Arc<ExecutorRegistry>,
    services: Arc<dyn ServiceResolver>,
    config: EngineConfig,
}

impl<S: Store> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            workflows: self.workflows.clone(),
            executors: self.executors.clone(),
            services: self.services.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Store + 'static> Engine<S> {
    pub fn new(store: Arc<S>, workflows: WorkflowRegistry) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            workflows: Arc::new(workflows),
            executors: Arc::new(ExecutorRegistry::with_builtins()),
            services: Arc::new(ServiceRegistry::new()),
            config: EngineConfig::default(),
        })
    }

    pub fn with_services(mut self, services: Arc<dyn ServiceResolver>) -> Self {
        self.services = services;
        self
    }

    pub fn with_executors(mut self, executors: ExecutorRegistry) -> Self {
        self.executors = Arc::new(executors);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    fn exec_ctx(&self) -> ExecutorContext {
        ExecutorContext {
            services: self.services.clone(),
            runtime: Arc::new(self.clone()),
        }
    }

    /// Starts a new execution of `workflow_id` with `input`, validating the
    /// workflow (§4.5) and the input (§4.3.1) before the first step runs.
    #[instrument(skip(self, input), fields(workflow_id))]
    pub async fn run(
        &self,
        workflow_id: &str,
        input: HashMap<String, Value>,
    ) -> Result<Execution, EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .ok_or_else(|| ExecutionError::WorkflowNotFound(workflow_id.to_string()))?;

        validator::validate(&workflow)?;

        let validated_input = apply_and_validate(&workflow.inputs, input)?;

        let execution_id = Uuid::now_v7();
        let mut execution = Execution::pending(execution_id, workflow_id, validated_input.clone());
        let first_step = workflow
            .first_step()
            .ok_or_else(|| ExecutionError::StepNotFound("<none>".to_string()))?;
        execution.status = ExecutionStatus::Running;
        execution.current_step = Some(first_step.id.clone());
        self.store.save(&execution).await?;

        let mut state = execution.to_state();
        state.input = validated_input;

        self.drive(&workflow, execution, state).await
    }

    /// Reloads a halted execution and continues from its recorded
    /// `current_step` (the resume point written when it halted).
    #[instrument(skip(self, resume_ctx))]
    pub async fn resume(
        &self,
        execution_id: Uuid,
        resume_ctx: HashMap<String, Value>,
    ) -> Result<Execution, EngineError> {
        let mut execution = self
            .store
            .load(execution_id)
            .await?
            .ok_or(crate::persistence::StoreError::NotFound(execution_id))?;

        if execution.status != ExecutionStatus::Halted {
            return Err(ExecutionError::Other(format!(
                "execution {execution_id} is not halted (status: {:?})",
                execution.status
            ))
            .into());
        }

        let workflow = self
            .workflows
            .get(&execution.workflow_id)
            .ok_or_else(|| ExecutionError::WorkflowNotFound(execution.workflow_id.clone()))?;

        let mut state = execution.to_state();
        for (k, v) in resume_ctx {
            state.ctx.insert(k, v);
        }
        execution.status = ExecutionStatus::Running;
        execution.apply_state(&state);
        self.store.save(&execution).await?;

        self.drive(&workflow, execution, state).await
    }

    async fn drive(
        &self,
        workflow: &WorkflowDef,
        mut execution: Execution,
        mut state: State,
    ) -> Result<Execution, EngineError> {
        let deadline = workflow.timeout_seconds.map(Duration::from_secs);
        let started = Instant::now();

        let mut steps_run = 0u64;
        let mut current_id = state
            .current_step
            .clone()
            .or_else(|| workflow.first_step().map(|s| s.id.clone()))
            .ok_or_else(|| ExecutionError::StepNotFound("<none>".to_string()))?;

        loop {
            if let Some(deadline) = deadline {
                if started.elapsed() > deadline {
                    let err = ExecutionError::WorkflowTimeout(deadline.as_secs());
                    execution.status = ExecutionStatus::Failed;
                    execution.error = Some(err.with_class());
                    execution.apply_state(&state);
                    self.store.save(&execution).await?;
                    return Ok(execution);
                }
            }

            steps_run += 1;
            if steps_run > self.config.max_steps {
                let err = ExecutionError::Other(format!(
                    "exceeded max_steps ({})",
                    self.config.max_steps
                ));
                execution.status = ExecutionStatus::Failed;
                execution.error = Some(err.with_class());
                execution.apply_state(&state);
                self.store.save(&execution).await?;
                return Ok(execution);
            }

            let step = workflow
                .step(&current_id)
                .ok_or_else(|| ExecutionError::StepNotFound(current_id.clone()))?;

            match self.run_one_step(step, state.clone()).await {
                StepOutcomeOrError::Continue(new_state, cont) => {
                    state = new_state;
                    let next = cont.next_step.or_else(|| step.next_step.clone());
                    let finished = match &next {
                        None => true,
                        Some(n) => n == FINISHED,
                    };
                    if finished {
                        let result = state.ctx.get("result").cloned().or(cont.output);
                        execution.status = ExecutionStatus::Completed;
                        execution.result = result;
                        execution.error = None;
                        execution.apply_state(&state);
                        self.store.save(&execution).await?;
                        return Ok(execution);
                    }
                    let next_id = next.expect("finished case handled above");
                    state = state.with_current_step(Some(next_id.clone()));
                    current_id = next_id;
                }
                StepOutcomeOrError::Halt(new_state, halt) => {
                    let resume_to = halt
                        .resume_step
                        .clone()
                        .or_else(|| step.next_step.clone())
                        .unwrap_or_else(|| FINISHED.to_string());
                    state = new_state.with_current_step(Some(resume_to));
                    execution.status = ExecutionStatus::Halted;
                    execution.halt_data = Some(halt.data);
                    execution.error = None;
                    execution.apply_state(&state);
                    self.store.save(&execution).await?;
                    return Ok(execution);
                }
                StepOutcomeOrError::Error(err) => {
                    if let Some(target) = &step.on_error {
                        let annotated = state.with_ctx(
                            "_last_error",
                            serde_json::json!({
                                "message": err.with_class(),
                                "class": err.class_name(),
                                "step": step.id,
                            }),
                        );
                        state = annotated.with_current_step(Some(target.clone()));
                        current_id = target.clone();
                        continue;
                    }
                    execution.status = ExecutionStatus::Failed;
                    execution.error = Some(err.with_class());
                    execution.apply_state(&state);
                    self.store.save(&execution).await?;
                    return Ok(execution);
                }
            }
        }
    }

    async fn run_one_step(&self, step: &StepDef, state: State) -> StepOutcomeOrError {
        let executor = match self.executors.get(step.config.type_name()) {
            Some(e) => e,
            None => {
                return StepOutcomeOrError::Error(ExecutionError::UnknownStepType(
                    step.config.type_name().to_string(),
                ))
            }
        };

        let ctx = self.exec_ctx();
        let started = Instant::now();
        let step_input = serde_json::to_value(&step.config).unwrap_or(Value::Null);
        let execution_id = state.execution_id;

        match executor.call(&ctx, state, step).await {
            Ok(outcome) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                match outcome.result {
                    StepResult::Continue(cont) => {
                        self.record(
                            execution_id,
                            step,
                            EntryAction::Completed,
                            duration_ms,
                            step_input,
                            cont.output.clone().unwrap_or(Value::Null),
                            None,
                        )
                        .await;
                        StepOutcomeOrError::Continue(outcome.state, cont)
                    }
                    StepResult::Halt(halt) => {
                        self.record(
                            execution_id,
                            step,
                            EntryAction::Halted,
                            duration_ms,
                            step_input,
                            halt.data.clone(),
                            None,
                        )
                        .await;
                        StepOutcomeOrError::Halt(outcome.state, halt)
                    }
                }
            }
            Err(err) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.record(
                    execution_id,
                    step,
                    EntryAction::Failed,
                    duration_ms,
                    step_input,
                    Value::Null,
                    Some(err.with_class()),
                )
                .await;
                StepOutcomeOrError::Error(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        execution_id: Uuid,
        step: &StepDef,
        action: EntryAction,
        duration_ms: u64,
        input: Value,
        output: Value,
        error: Option<String>,
    ) {
        let entry = Entry::new(
            execution_id,
            step.id.clone(),
            step.config.type_name(),
            action,
            duration_ms,
            input,
            output,
            error,
        );
        if let Err(e) = self.store.record(&entry).await {
            tracing::error!(error = %e, step_id = %step.id, "failed to record step entry");
        }
    }
}

enum StepOutcomeOrError {
    Continue(State, ContinueResult),
    Halt(State, HaltResult),
    Error(ExecutionError),
}

#[async_trait]
impl<S: Store + 'static> ExecutorRuntime for Engine<S> {
    async fn run_body(
        &self,
        mut state: State,
        steps: &[StepDef],
        _key_prefix: &str,
    ) -> Result<NestedOutcome, ExecutionError> {
        let mut output = None;
        let mut idx = 0usize;

        while idx < steps.len() {
            let step = &steps[idx];
            match self.run_one_step(step, state.clone()).await {
                StepOutcomeOrError::Continue(new_state, cont) => {
                    state = new_state;
                    output = cont.output.or(output);
                    idx += 1;
                }
                StepOutcomeOrError::Halt(new_state, halt) => {
                    return Ok(NestedOutcome::Halted {
                        state: new_state,
                        halt,
                    });
                }
                StepOutcomeOrError::Error(err) => {
                    if let Some(target) = &step.on_error {
                        match steps.iter().position(|s| &s.id == target) {
                            Some(target_idx) => {
                                state = state.with_ctx(
                                    "_last_error",
                                    serde_json::json!({
                                        "message": err.with_class(),
                                        "class": err.class_name(),
                                        "step": step.id,
                                    }),
                                );
                                idx = target_idx;
                                continue;
                            }
                            None => return Err(err),
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(NestedOutcome::Completed { state, output })
    }

    async fn run_branch(
        &self,
        state: State,
        branch: &StepDef,
        _key_prefix: &str,
    ) -> Result<NestedOutcome, ExecutionError> {
        match self.run_one_step(branch, state).await {
            StepOutcomeOrError::Continue(state, cont) => Ok(NestedOutcome::Completed {
                state,
                output: cont.output,
            }),
            StepOutcomeOrError::Halt(state, halt) => Ok(NestedOutcome::Halted { state, halt }),
            StepOutcomeOrError::Error(err) => Err(err),
        }
    }

    async fn run_sub_workflow(
        &self,
        workflow_id: &str,
        input: Value,
        timeout: Option<Duration>,
    ) -> Result<SubWorkflowOutcome, ExecutionError> {
        let input_map: HashMap<String, Value> = match input {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => HashMap::new(),
            other => {
                return Err(ExecutionError::Validation(format!(
                    "sub-workflow input must be an object, got {other}"
                )))
            }
        };

        let run_fut = self.run(workflow_id, input_map);
        let execution = match timeout {
            Some(d) => match tokio::time::timeout(d, run_fut).await {
                Ok(r) => r,
                Err(_) => return Err(ExecutionError::Timeout(workflow_id.to_string(), d.as_secs())),
            },
            None => run_fut.await,
        }
        .map_err(|e| ExecutionError::SubWorkflowFailed(e.to_string()))?;

        match execution.status {
            ExecutionStatus::Completed => {
                Ok(SubWorkflowOutcome::Completed(execution.result.unwrap_or(Value::Null)))
            }
            ExecutionStatus::Halted => Ok(SubWorkflowOutcome::Halted(HaltResult {
                data: execution.halt_data.unwrap_or(Value::Null),
                resume_step: execution.current_step,
                prompt: None,
            })),
            ExecutionStatus::Failed => Err(ExecutionError::SubWorkflowFailed(
                execution.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            ExecutionStatus::Pending | ExecutionStatus::Running => {
                Err(ExecutionError::SubWorkflowFailed(
                    "sub-workflow did not reach a terminal state".to_string(),
                ))
            }
        }
    }
}
