//! A durable workflow interpreter: parse a declarative step graph once,
//! then run it forward from whatever `Execution` a `Store` hands back —
//! freshly started or reloaded mid-halt — persisting after every step so a
//! crash costs at most one step's work.
//!
//! The pieces: [`types`] is the parsed AST and the persistence unit;
//! [`resolver`] and [`condition`] are the `$path` expression language and
//! its fixed operator table; [`validator`] runs every static check against
//! a [`types::WorkflowDef`] before the first step is dispatched; [`executor`]
//! implements each step type against an [`executor::ExecutorContext`];
//! [`engine`] drives the interpreter loop and is the thing that actually
//! implements [`executor::ExecutorRuntime`] for nested dispatch; [`persistence`]
//! is the storage contract; [`runners`] are thin conveniences layered on
//! top of [`engine::Engine`].

pub mod condition;
pub mod engine;
pub mod error;
pub mod executor;
pub mod persistence;
pub mod registry;
pub mod reliability;
pub mod resolver;
pub mod runners;
pub mod schema;
pub mod service;
pub mod types;
pub mod validator;

/// Common imports for a host embedding the engine.
pub mod prelude {
    pub use crate::engine::{Engine, EngineConfig};
    pub use crate::error::{ConfigError, EngineError, ExecutionError, ValidationError};
    pub use crate::executor::ExecutorRegistry;
    pub use crate::persistence::{InMemoryStore, Store};
    pub use crate::registry::WorkflowRegistry;
    pub use crate::service::{Service, ServiceRegistry, ServiceResolver};
    pub use crate::types::{
        Execution, ExecutionStatus, InputDef, InputType, StepDef, WorkflowDef,
    };
}
