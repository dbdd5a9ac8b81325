//! Runs a workflow to completion (or suspension) on the caller's task,
//! returning once the execution reaches a terminal or halted state (§5).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::persistence::Store;
use crate::types::Execution;

/// The simplest runner: `run`/`resume` just delegate straight to the
/// engine. Useful for tests, scripts, and request/response services where
/// the caller is willing to block until the workflow halts or finishes.
pub struct SyncRunner<S: Store> {
    engine: Arc<Engine<S>>,
}

impl<S: Store + 'static> SyncRunner<S> {
    pub fn new(engine: Arc<Engine<S>>) -> Self {
        Self { engine }
    }

    pub async fn run(
        &self,
        workflow_id: &str,
        input: HashMap<String, Value>,
    ) -> Result<Execution, EngineError> {
        self.engine.run(workflow_id, input).await
    }

    pub async fn resume(
        &self,
        execution_id: Uuid,
        resume_ctx: HashMap<String, Value>,
    ) -> Result<Execution, EngineError> {
        self.engine.resume(execution_id, resume_ctx).await
    }
}
