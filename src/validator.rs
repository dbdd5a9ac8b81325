//! Static workflow validation (§4.5): every check runs and every failure is
//! collected, rather than stopping at the first — a workflow author fixing
//! one typo at a time against a single-error validator is the complaint
//! this exists to avoid.

use std::collections::{HashSet, VecDeque};

use crate::error::ValidationError;
use crate::types::{OutputSpec, StepConfig, StepDef, WorkflowDef, FINISHED};

pub fn validate(workflow: &WorkflowDef) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    check_unique_ids(workflow, &mut issues);
    check_inputs(workflow, &mut issues);
    check_references(workflow, &mut issues);
    check_reachability(workflow, &mut issues);
    check_output_schemas(workflow, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues))
    }
}

fn check_unique_ids(workflow: &WorkflowDef, issues: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for step in &workflow.steps {
        if !seen.insert(step.id.as_str()) {
            issues.push(format!("duplicate step id: {}", step.id));
        }
    }
    if workflow.steps.is_empty() {
        issues.push("workflow has no steps".to_string());
    }
}

fn check_inputs(workflow: &WorkflowDef, issues: &mut Vec<String>) {
    for input in &workflow.inputs {
        if let Some(default) = &input.default {
            if !input.input_type.matches(default) {
                issues.push(format!(
                    "input '{}' default does not match declared type {:?}",
                    input.name, input.input_type
                ));
            }
        }
    }
}

/// Valid jump targets are another step's id or the `FINISHED` sentinel.
fn is_valid_target(workflow: &WorkflowDef, target: &str) -> bool {
    target == FINISHED || workflow.step(target).is_some()
}

fn check_references(workflow: &WorkflowDef, issues: &mut Vec<String>) {
    for step in &workflow.steps {
        check_edge(workflow, step, &step.next_step, "next_step", issues);
        check_edge(workflow, step, &step.on_error, "on_error", issues);

        match &step.config {
            StepConfig::Router(router) => {
                for (idx, route) in router.routes.iter().enumerate() {
                    if !is_valid_target(workflow, &route.then) {
                        issues.push(format!(
                            "step '{}': route[{idx}].then targets unknown step '{}'",
                            step.id, route.then
                        ));
                    }
                }
                check_edge(workflow, step, &router.default, "router.default", issues);
            }
            StepConfig::Loop(loop_cfg) => {
                check_edge(workflow, step, &loop_cfg.on_exhausted, "loop.on_exhausted", issues);
                if !loop_cfg.is_foreach() && loop_cfg.while_cond.is_none() {
                    issues.push(format!(
                        "step '{}': loop must declare either 'over' or 'while'",
                        step.id
                    ));
                }
                check_body_ids(&step.id, &loop_cfg.body, issues);
            }
            StepConfig::Parallel(parallel) => {
                if parallel.branches.is_empty() {
                    issues.push(format!("step '{}': parallel has no branches", step.id));
                }
                if let crate::types::WaitMode::Count(n) = parallel.wait {
                    if n == 0 || n as usize > parallel.branches.len() {
                        issues.push(format!(
                            "step '{}': parallel wait count {n} is out of range for {} branches",
                            step.id,
                            parallel.branches.len()
                        ));
                    }
                }
            }
            StepConfig::Halt(halt) => {
                check_edge(workflow, step, &halt.resume_step, "halt.resume_step", issues);
            }
            StepConfig::Approval(approval) => {
                check_edge(workflow, step, &approval.on_reject, "approval.on_reject", issues);
                check_edge(workflow, step, &approval.on_timeout, "approval.on_timeout", issues);
            }
            _ => {}
        }
    }
}

fn check_edge(
    workflow: &WorkflowDef,
    step: &StepDef,
    target: &Option<String>,
    field: &str,
    issues: &mut Vec<String>,
) {
    if let Some(target) = target {
        if !is_valid_target(workflow, target) {
            issues.push(format!(
                "step '{}': {field} targets unknown step '{target}'",
                step.id
            ));
        }
    }
}

/// Inside a `loop` body, only `on_error` jumps are resolved (`run_body`
/// dispatches the list in array order, ignoring `next_step`), and only to
/// another step within the same body.
fn check_body_ids(owner_id: &str, body: &[StepDef], issues: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for step in body {
        if !seen.insert(step.id.as_str()) {
            issues.push(format!(
                "loop '{owner_id}': duplicate body step id '{}'",
                step.id
            ));
        }
    }
    for step in body {
        if let Some(target) = &step.on_error {
            if !body.iter().any(|s| &s.id == target) {
                issues.push(format!(
                    "loop '{owner_id}': body step '{}' on_error targets unknown body step '{target}'",
                    step.id
                ));
            }
        }
    }
}

/// BFS over every documented jump edge, starting from the first step.
/// Anything left unvisited is a dead step — a workflow author's leftover
/// draft, or a broken refactor.
fn check_reachability(workflow: &WorkflowDef, issues: &mut Vec<String>) {
    let Some(first) = workflow.first_step() else {
        return;
    };

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(first.id.as_str());
    visited.insert(first.id.as_str());

    while let Some(id) = queue.pop_front() {
        let Some(step) = workflow.step(id) else {
            continue;
        };
        let mut edges: Vec<&str> = Vec::new();
        if let Some(n) = &step.next_step {
            edges.push(n);
        }
        if let Some(n) = &step.on_error {
            edges.push(n);
        }
        match &step.config {
            StepConfig::Router(router) => {
                edges.extend(router.routes.iter().map(|r| r.then.as_str()));
                if let Some(d) = &router.default {
                    edges.push(d);
                }
            }
            StepConfig::Loop(loop_cfg) => {
                if let Some(n) = &loop_cfg.on_exhausted {
                    edges.push(n);
                }
            }
            StepConfig::Halt(halt) => {
                if let Some(n) = &halt.resume_step {
                    edges.push(n);
                }
            }
            StepConfig::Approval(approval) => {
                if let Some(n) = &approval.on_reject {
                    edges.push(n);
                }
                if let Some(n) = &approval.on_timeout {
                    edges.push(n);
                }
            }
            _ => {}
        }

        for edge in edges {
            if edge != FINISHED && workflow.step(edge).is_some() && visited.insert(edge) {
                queue.push_back(edge);
            }
        }
    }

    for step in &workflow.steps {
        if !visited.contains(step.id.as_str()) {
            issues.push(format!("unreachable step: {}", step.id));
        }
    }
}

/// `call.output`'s optional JSON Schema must itself be a compilable schema
/// document; a typo here would otherwise surface as a confusing runtime
/// failure on the first execution to reach the step.
fn check_output_schemas(workflow: &WorkflowDef, issues: &mut Vec<String>) {
    for step in &workflow.steps {
        if let StepConfig::Call(call) = &step.config {
            if let Some(OutputSpec::Schema { schema, .. }) = &call.output {
                if let Err(e) = jsonschema::validator_for(schema) {
                    issues.push(format!(
                        "step '{}': output schema is invalid: {e}",
                        step.id
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operator};
    use crate::types::{
        AssignConfig, EndConfig, InputDef, InputType, RouterConfig, Route, StartConfig,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn minimal_workflow(steps: Vec<StepDef>) -> WorkflowDef {
        WorkflowDef {
            id: "wf".into(),
            name: "wf".into(),
            version: "1".into(),
            description: None,
            timeout_seconds: None,
            inputs: vec![],
            steps,
            extensions: HashMap::new(),
        }
    }

    fn start_step() -> StepDef {
        StepDef {
            id: "start".into(),
            config: StepConfig::Start(StartConfig {}),
            next_step: Some("end".into()),
            on_error: None,
        }
    }

    fn end_step() -> StepDef {
        StepDef {
            id: "end".into(),
            config: StepConfig::End(EndConfig {}),
            next_step: None,
            on_error: None,
        }
    }

    #[test]
    fn minimal_valid_workflow_passes() {
        let wf = minimal_workflow(vec![start_step(), end_step()]);
        assert!(validate(&wf).is_ok());
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let wf = minimal_workflow(vec![start_step(), start_step()]);
        let err = validate(&wf).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("duplicate step id")));
    }

    #[test]
    fn dangling_reference_is_reported() {
        let mut broken_start = start_step();
        broken_start.next_step = Some("nowhere".into());
        let wf = minimal_workflow(vec![broken_start, end_step()]);
        let err = validate(&wf).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("unknown step 'nowhere'")));
    }

    #[test]
    fn unreachable_step_is_reported() {
        let mut start = start_step();
        start.next_step = Some("end".into());
        let orphan = StepDef {
            id: "orphan".into(),
            config: StepConfig::Assign(AssignConfig { set: vec![] }),
            next_step: None,
            on_error: None,
        };
        let wf = minimal_workflow(vec![start, orphan, end_step()]);
        let err = validate(&wf).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("unreachable step: orphan")));
    }

    #[test]
    fn router_routes_are_validated() {
        let router = StepDef {
            id: "route".into(),
            config: StepConfig::Router(RouterConfig {
                routes: vec![Route {
                    when: Condition {
                        field: "x".into(),
                        op: Operator::Truthy,
                        value: json!(null),
                    },
                    then: "missing_target".into(),
                }],
                default: None,
            }),
            next_step: None,
            on_error: None,
        };
        let wf = minimal_workflow(vec![router]);
        let err = validate(&wf).unwrap_err();
        assert!(err
            .issues
            .iter()
            .any(|i| i.contains("route[0].then targets unknown step")));
    }

    #[test]
    fn input_default_type_mismatch_is_reported() {
        let mut wf = minimal_workflow(vec![start_step(), end_step()]);
        wf.inputs.push(InputDef {
            name: "amount".into(),
            input_type: InputType::Number,
            required: false,
            default: Some(json!("not a number")),
            description: None,
        });
        let err = validate(&wf).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("default does not match")));
    }
}
