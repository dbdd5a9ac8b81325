//! Event-emitting runner (§5): runs a workflow on a background task and
//! streams its `Entry` trail plus a terminal event over a channel, so a
//! caller can show live progress instead of blocking on the final result.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::engine::Engine;
use crate::persistence::Store;
use crate::types::{Entry, EntryAction, Execution, ExecutionStatus};

/// One notification pushed to a stream subscriber.
#[derive(Debug, Clone)]
pub enum Event {
    Started { execution_id: uuid::Uuid, workflow_id: String },
    Step(Entry),
    Finished(Execution),
    Failed(String),
}

pub struct StreamRunner<S: Store> {
    engine: Arc<Engine<S>>,
    store: Arc<S>,
}

impl<S: Store + 'static> StreamRunner<S> {
    pub fn new(engine: Arc<Engine<S>>, store: Arc<S>) -> Self {
        Self { engine, store }
    }

    /// Spawns the run and returns a receiver fed with every recorded
    /// `Entry` in order, followed by a single terminal `Finished`/`Failed`
    /// event. The channel closes once the terminal event has been sent.
    pub fn run(
        &self,
        workflow_id: impl Into<String>,
        input: HashMap<String, Value>,
    ) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(64);
        let engine = self.engine.clone();
        let store = self.store.clone();
        let workflow_id = workflow_id.into();

        tokio::spawn(async move {
            let _ = tx
                .send(Event::Started {
                    execution_id: uuid::Uuid::nil(),
                    workflow_id: workflow_id.clone(),
                })
                .await;

            match engine.run(&workflow_id, input).await {
                Ok(execution) => {
                    emit_entries(&store, &tx, execution.id).await;
                    let _ = tx.send(Event::Finished(execution)).await;
                }
                Err(err) => {
                    let _ = tx.send(Event::Failed(err.to_string())).await;
                }
            }
        });

        rx
    }
}

async fn emit_entries<S: Store>(store: &Arc<S>, tx: &mpsc::Sender<Event>, execution_id: uuid::Uuid) {
    match store.entries(execution_id).await {
        Ok(entries) => {
            for entry in entries {
                let _ = tx.send(Event::Step(entry)).await;
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to read entries for stream replay");
        }
    }
}

/// Human-friendly label for an `Entry`'s outcome, used by consumers that
/// just want a one-line progress update rather than the full record.
pub fn describe(entry: &Entry) -> String {
    match entry.action {
        EntryAction::Completed => format!("{} completed in {}ms", entry.step_id, entry.duration_ms),
        EntryAction::Halted => format!("{} halted", entry.step_id),
        EntryAction::Failed => format!(
            "{} failed: {}",
            entry.step_id,
            entry.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Whether an `Execution`'s terminal status represents a durable success.
pub fn is_success(execution: &Execution) -> bool {
    matches!(
        execution.status,
        ExecutionStatus::Completed | ExecutionStatus::Halted
    )
}
