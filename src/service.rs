//! Service resolution for the `call` step (§4.3.3, §9).
//!
//! The core must not hardwire a reflective lookup mechanism (§9): it
//! accepts a `ServiceResolver` injected at configuration time. The default
//! resolver is a plain name registry, mirroring the teacher's
//! `WorkflowRegistry` (`engine/registry.rs`) shape — a map from name to a
//! boxed implementation, looked up at dispatch time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExecutionError;

/// A named, callable service. `method` selects the operation within it.
#[async_trait]
pub trait Service: Send + Sync {
    async fn call(&self, method: &str, input: Value) -> Result<Value, ExecutionError>;
}

/// Looks up a `Service` implementation by name. An interface, not a core
/// dependency — callers may back this with a database, an RPC client, or
/// (the default) an in-process map.
pub trait ServiceResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Service>>;
}

/// Default resolver: an in-process name -> service map.
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, service: Arc<dyn Service>) {
        self.services.insert(name.into(), service);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

impl ServiceResolver for ServiceRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).cloned()
    }
}
