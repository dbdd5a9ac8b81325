//! Queue-backed runner (§5): `submit_*` hands a job to an `Adapter` instead
//! of running inline; a worker loop drains the queue and drives the engine.
//! Mirrors the teacher's worker/queue split without its Postgres-backed
//! poller, backpressure, or dead-letter handling (§C) — the default
//! `Adapter` is an in-process channel, swappable for a real queue.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::persistence::Store;

/// One unit of work an `Adapter` carries between `submit_*` and the worker
/// loop.
#[derive(Debug, Clone)]
pub enum Job {
    Run {
        workflow_id: String,
        input: HashMap<String, Value>,
    },
    Resume {
        execution_id: Uuid,
        resume_ctx: HashMap<String, Value>,
    },
}

/// A pluggable queue backend. The default `InMemoryAdapter` is a bounded
/// channel; a production deployment would back this with whatever
/// broker the surrounding service already runs.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), EngineError>;

    /// Blocks until a job is available, or returns `None` once the queue is
    /// closed and drained.
    async fn dequeue(&self) -> Option<Job>;
}

pub struct InMemoryAdapter {
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
}

impl InMemoryAdapter {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl Adapter for InMemoryAdapter {
    async fn enqueue(&self, job: Job) -> Result<(), EngineError> {
        self.tx
            .send(job)
            .await
            .map_err(|_| crate::error::ExecutionError::Other("job queue closed".into()).into())
    }

    async fn dequeue(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }
}

pub struct AsyncRunner<S: Store> {
    engine: Arc<Engine<S>>,
    adapter: Arc<dyn Adapter>,
}

impl<S: Store + 'static> AsyncRunner<S> {
    pub fn new(engine: Arc<Engine<S>>, adapter: Arc<dyn Adapter>) -> Self {
        Self { engine, adapter }
    }

    pub async fn submit_run(
        &self,
        workflow_id: impl Into<String>,
        input: HashMap<String, Value>,
    ) -> Result<(), EngineError> {
        self.adapter
            .enqueue(Job::Run {
                workflow_id: workflow_id.into(),
                input,
            })
            .await
    }

    pub async fn submit_resume(
        &self,
        execution_id: Uuid,
        resume_ctx: HashMap<String, Value>,
    ) -> Result<(), EngineError> {
        self.adapter
            .enqueue(Job::Resume {
                execution_id,
                resume_ctx,
            })
            .await
    }

    /// Drains jobs until the adapter reports none remain. A deployment
    /// would instead spawn this as a long-lived task per worker; left as a
    /// plain drain loop here since spawning/supervision policy belongs to
    /// the host application, not the engine.
    pub async fn run_worker_loop(&self) {
        while let Some(job) = self.adapter.dequeue().await {
            let result = match job {
                Job::Run { workflow_id, input } => self.engine.run(&workflow_id, input).await,
                Job::Resume {
                    execution_id,
                    resume_ctx,
                } => self.engine.resume(execution_id, resume_ctx).await,
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "queued workflow job failed");
            }
        }
    }
}
