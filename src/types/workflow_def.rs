//! Workflow AST: the immutable, parsed form of a workflow document (§3).
//!
//! Parsing the serialized document (YAML/JSON) into this tree is explicitly
//! out of scope (§1) — these types are the contract the external parser
//! produces and the validator/engine consume.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reliability::RetryPolicy;

/// Reserved successor name meaning "end of workflow" (§3, §6).
pub const FINISHED: &str = "__FINISHED__";

/// Primitive input types a workflow can declare (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl InputType {
    /// Whether `value` matches this primitive type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One declared workflow input (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A route entry inside `router.routes` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub when: crate::condition::Condition,
    pub then: String,
}

/// An output binding for a `call` step: either a bare ctx key, or a key plus
/// a JSON Schema the result must satisfy before being stored (§4.3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    Key(String),
    Schema { key: String, schema: Value },
}

impl OutputSpec {
    pub fn key(&self) -> &str {
        match self {
            Self::Key(k) => k,
            Self::Schema { key, .. } => key,
        }
    }

    pub fn schema(&self) -> Option<&Value> {
        match self {
            Self::Key(_) => None,
            Self::Schema { schema, .. } => Some(schema),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConfig {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndConfig {}

/// `assign` iterates `set` in insertion order, so this is an ordered
/// `Vec<(key, value)>` rather than a `HashMap` — map iteration order is not
/// guaranteed and §4.3.2 requires insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignConfig {
    #[serde(with = "ordered_map")]
    pub set: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    pub service: String,
    pub method: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Option<OutputSpec>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub retry_delay: Option<f64>,
    #[serde(default)]
    pub retry_backoff: Option<f64>,
}

impl CallConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retries.unwrap_or(0) + 1,
            initial_delay_secs: self.retry_delay.unwrap_or(1.0),
            backoff: self.retry_backoff.unwrap_or(1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub routes: Vec<Route>,
    #[serde(default)]
    pub default: Option<String>,
}

fn default_loop_max() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default)]
    pub over: Option<Value>,
    #[serde(default)]
    pub r#as: Option<String>,
    #[serde(default)]
    pub index_as: Option<String>,
    #[serde(rename = "while", default)]
    pub while_cond: Option<crate::condition::Condition>,
    #[serde(default = "default_loop_max")]
    pub max: u64,
    #[serde(default)]
    pub on_exhausted: Option<String>,
    #[serde(rename = "do")]
    pub body: Vec<StepDef>,
    pub output: String,
}

impl LoopConfig {
    pub fn is_foreach(&self) -> bool {
        self.over.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", untagged)]
pub enum WaitMode {
    Named(WaitModeKind),
    Count(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitModeKind {
    All,
    Any,
}

impl Default for WaitMode {
    fn default() -> Self {
        Self::Named(WaitModeKind::All)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub branches: Vec<StepDef>,
    #[serde(default)]
    pub wait: WaitMode,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltConfig {
    #[serde(default)]
    pub reason: Value,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub resume_step: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub prompt: Value,
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub on_reject: Option<String>,
    #[serde(default)]
    pub on_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub input: Option<Value>,
    pub expression: Vec<(String, Value)>,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubWorkflowConfig {
    pub workflow_id: String,
    #[serde(default)]
    pub input: Value,
    pub output: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Per-step-type configuration (§3 "StepConfig variants").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    Start(StartConfig),
    End(EndConfig),
    Assign(AssignConfig),
    Call(CallConfig),
    Router(RouterConfig),
    Loop(LoopConfig),
    Parallel(ParallelConfig),
    Halt(HaltConfig),
    Approval(ApprovalConfig),
    Transform(TransformConfig),
    Workflow(SubWorkflowConfig),
}

impl StepConfig {
    /// The registered executor name this config dispatches to.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::End(_) => "end",
            Self::Assign(_) => "assign",
            Self::Call(_) => "call",
            Self::Router(_) => "router",
            Self::Loop(_) => "loop",
            Self::Parallel(_) => "parallel",
            Self::Halt(_) => "halt",
            Self::Approval(_) => "approval",
            Self::Transform(_) => "transform",
            Self::Workflow(_) => "workflow",
        }
    }
}

/// One node in the workflow graph (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub id: String,
    #[serde(flatten)]
    pub config: StepConfig,
    #[serde(default)]
    pub next_step: Option<String>,
    #[serde(default)]
    pub on_error: Option<String>,
}

/// A parsed, immutable workflow specification (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    pub steps: Vec<StepDef>,
    #[serde(default)]
    pub extensions: HashMap<String, Value>,
}

impl WorkflowDef {
    /// The entry point: the first declared step.
    pub fn first_step(&self) -> Option<&StepDef> {
        self.steps.first()
    }

    pub fn step(&self, id: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// Serde helper preserving insertion order for `assign.set` and
/// `transform.expression` (both ordered maps per §4.3.2 / §4.3.9).
mod ordered_map {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use serde_json::Value;
    use std::fmt;

    pub fn serialize<S>(pairs: &[(String, Value)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (k, v) in pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, Value)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor;

        impl<'de> Visitor<'de> for OrderedMapVisitor {
            type Value = Vec<(String, Value)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((k, v)) = map.next_entry::<String, Value>()? {
                    out.push((k, v));
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_type_matches_primitives() {
        assert!(InputType::Integer.matches(&Value::from(5)));
        assert!(!InputType::Integer.matches(&Value::from("5")));
        assert!(InputType::Array.matches(&Value::from(vec![1, 2])));
    }

    #[test]
    fn step_config_type_name_matches_variant() {
        let cfg = StepConfig::Halt(HaltConfig {
            reason: Value::Null,
            data: Value::Null,
            resume_step: None,
        });
        assert_eq!(cfg.type_name(), "halt");
    }
}
