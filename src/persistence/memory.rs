//! In-process `Store` backed by `parking_lot`-guarded maps, mirroring the
//! teacher's `persistence::memory::InMemoryStore` shape (a reference/test
//! backend, not meant to survive process restart).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::types::{Entry, Execution, ExecutionStatus};

#[derive(Default)]
pub struct InMemoryStore {
    executions: RwLock<HashMap<Uuid, Execution>>,
    entries: RwLock<HashMap<Uuid, Vec<Entry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save(&self, execution: &Execution) -> Result<(), StoreError> {
        self.executions
            .write()
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Execution>, StoreError> {
        Ok(self.executions.read().get(&id).cloned())
    }

    async fn record(&self, entry: &Entry) -> Result<(), StoreError> {
        self.entries
            .write()
            .entry(entry.execution_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn entries(&self, execution_id: Uuid) -> Result<Vec<Entry>, StoreError> {
        Ok(self
            .entries
            .read()
            .get(&execution_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find(
        &self,
        workflow_id: &str,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<Execution>, StoreError> {
        let mut matches: Vec<Execution> = self
            .executions
            .read()
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.executions.write().remove(&id);
        self.entries.write().remove(&id);
        Ok(())
    }

    async fn execution_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.executions.read().keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryStore::new();
        let exec = Execution::pending(Uuid::now_v7(), "wf", HashMap::new());
        store.save(&exec).await.unwrap();
        let loaded = store.load(exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, exec.id);
    }

    #[tokio::test]
    async fn later_save_overwrites_earlier() {
        let store = InMemoryStore::new();
        let mut exec = Execution::pending(Uuid::now_v7(), "wf", HashMap::new());
        store.save(&exec).await.unwrap();
        exec.status = ExecutionStatus::Completed;
        store.save(&exec).await.unwrap();
        let loaded = store.load(exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn find_filters_by_workflow_and_status() {
        let store = InMemoryStore::new();
        let mut a = Execution::pending(Uuid::now_v7(), "wf-a", HashMap::new());
        a.status = ExecutionStatus::Completed;
        let b = Execution::pending(Uuid::now_v7(), "wf-a", HashMap::new());
        let c = Execution::pending(Uuid::now_v7(), "wf-b", HashMap::new());
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();
        store.save(&c).await.unwrap();

        let completed = store.find("wf-a", Some(ExecutionStatus::Completed)).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, a.id);

        let all_a = store.find("wf-a", None).await.unwrap();
        assert_eq!(all_a.len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_execution_and_entries() {
        let store = InMemoryStore::new();
        let exec = Execution::pending(Uuid::now_v7(), "wf", HashMap::new());
        store.save(&exec).await.unwrap();
        store.delete(exec.id).await.unwrap();
        assert!(store.load(exec.id).await.unwrap().is_none());
    }
}
