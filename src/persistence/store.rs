//! The storage contract (§4.6): every step persists the whole `Execution`
//! after it runs, so a crash mid-workflow loses at most one step, and a
//! `halted` execution can be reloaded by any process and resumed.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Entry, Execution, ExecutionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("execution not found: {0}")]
    NotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persists `Execution`s and their `Entry` audit trail. Implementations
/// must make `save` atomic per execution id — last writer wins (§4.6) —
/// since nested step dispatch (loop bodies, parallel branches) can race to
/// persist the same execution concurrently.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save(&self, execution: &Execution) -> Result<(), StoreError>;

    async fn load(&self, id: Uuid) -> Result<Option<Execution>, StoreError>;

    async fn record(&self, entry: &Entry) -> Result<(), StoreError>;

    async fn entries(&self, execution_id: Uuid) -> Result<Vec<Entry>, StoreError>;

    /// Lists executions for a workflow, optionally filtered by status, most
    /// recently updated first.
    async fn find(
        &self,
        workflow_id: &str,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<Execution>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn execution_ids(&self) -> Result<Vec<Uuid>, StoreError>;
}
