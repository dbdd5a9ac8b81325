//! Process-wide workflow definition registry (§3), mirroring the teacher's
//! `engine/registry.rs` `WorkflowRegistry` shape one level up: that one maps
//! a workflow id to a compiled `Workflow` implementation, this one maps a
//! workflow id to a parsed `WorkflowDef` tree. The `workflow` step executor
//! looks sub-workflows up here.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::types::WorkflowDef;

#[derive(Default, Clone)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<WorkflowDef>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: WorkflowDef) -> Result<(), ConfigError> {
        if self.workflows.contains_key(&def.id) {
            return Err(ConfigError::DuplicateWorkflow(def.id));
        }
        self.workflows.insert(def.id.clone(), Arc::new(def));
        Ok(())
    }

    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDef>> {
        self.workflows.get(workflow_id).cloned()
    }

    pub fn contains(&self, workflow_id: &str) -> bool {
        self.workflows.contains_key(workflow_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.workflows.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str) -> WorkflowDef {
        WorkflowDef {
            id: id.into(),
            name: id.into(),
            version: "1".into(),
            description: None,
            timeout_seconds: None,
            inputs: vec![],
            steps: vec![],
            extensions: HashMap::new(),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = WorkflowRegistry::new();
        registry.register(def("wf1")).unwrap();
        let result = registry.register(def("wf1"));
        assert!(matches!(result, Err(ConfigError::DuplicateWorkflow(_))));
    }

    #[test]
    fn get_returns_registered_workflow() {
        let mut registry = WorkflowRegistry::new();
        registry.register(def("wf1")).unwrap();
        assert!(registry.get("wf1").is_some());
        assert!(registry.get("missing").is_none());
    }
}
