//! Name -> executor factory lookup (§2 "Executor Registry").

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    ApprovalExecutor, AssignExecutor, CallExecutor, EndExecutor, Executor, HaltExecutor,
    LoopExecutor, ParallelExecutor, RouterExecutor, StartExecutor, SubWorkflowExecutor,
    TransformExecutor,
};
use crate::error::ConfigError;

/// Maps a `StepDef.type` string to the executor that implements it.
/// Extensions add new tags by registering a factory + config schema (§9);
/// here that's just another `register` call.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// An empty registry with none of the ten built-in step types.
    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// The registry pre-populated with all ten built-in step executors
    /// named in §3 ("StepConfig variants").
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register("start", Arc::new(StartExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("end", Arc::new(EndExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("assign", Arc::new(AssignExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("call", Arc::new(CallExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("router", Arc::new(RouterExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("loop", Arc::new(LoopExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("parallel", Arc::new(ParallelExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("halt", Arc::new(HaltExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("approval", Arc::new(ApprovalExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("transform", Arc::new(TransformExecutor))
            .expect("builtin registration cannot collide");
        registry
            .register("workflow", Arc::new(SubWorkflowExecutor))
            .expect("builtin registration cannot collide");
        registry
    }

    pub fn register(
        &mut self,
        step_type: impl Into<String>,
        executor: Arc<dyn Executor>,
    ) -> Result<(), ConfigError> {
        let step_type = step_type.into();
        if self.executors.contains_key(&step_type) {
            return Err(ConfigError::DuplicateExecutor(step_type));
        }
        self.executors.insert(step_type, executor);
        Ok(())
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.executors.contains_key(step_type)
    }

    pub fn get(&self, step_type: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(step_type).cloned()
    }

    pub fn step_types(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(|s| s.as_str())
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
