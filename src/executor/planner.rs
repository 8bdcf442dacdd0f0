//! Successor planner: given a just-completed step and the outcome its
//! handler produced, decides what `WorkflowStep` rows (if any) come next.
//! Pure over its inputs — no store or provider access — so it is
//! unit-testable the same way `graph` and `rate_limit` are.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::graph::{self, NextStepInfo};
use crate::models::step::{NewWorkflowStep, WorkflowStep};
use crate::models::workflow::{ConditionalType, Workflow, WorkflowNodeType};

/// What a per-kind handler reports back to the planner after a successful
/// execution, in addition to the `execution_result` persisted onto the
/// step's own `raw_response`.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub execution_result: serde_json::Value,
    /// `Some(poll_type)` when the handler wants a polling step created at the
    /// same node (`send_connection_request`, `send_followup`).
    pub should_poll: Option<WorkflowNodeType>,
}

/// The shape a `check_connection_status` / `check_message_reply` handler
/// produces as its `execution_result`.
#[derive(Debug, Clone, Deserialize)]
struct PollExecutionResult {
    #[serde(default, rename = "isConnected")]
    is_connected: Option<bool>,
    #[serde(default, rename = "hasReplied")]
    has_replied: Option<bool>,
    #[serde(default, rename = "providerId")]
    provider_id: Option<String>,
    #[serde(rename = "nextStepsInfo", default)]
    next_steps_info: Vec<NextStepInfo>,
    #[serde(rename = "pollingStartedAt")]
    polling_started_at: i64,
    #[serde(rename = "shouldContinuePolling")]
    should_continue_polling: bool,
}

/// Resolves the target node's declared type from the workflow, falling back
/// to `AddStep` (a placeholder, which `executor::mod` never schedules) if
/// the edge somehow points at an unknown node — `graph::outgoing`/
/// `pick_branch` only ever return retained-node targets, so this is
/// defensive rather than expected.
fn resolve_step_type(workflow: &Workflow, node_id: &str) -> WorkflowNodeType {
    workflow
        .find_node(node_id)
        .map(|n| n.data.node_type)
        .unwrap_or(WorkflowNodeType::AddStep)
}

pub fn plan_successors(
    now: DateTime<Utc>,
    workflow: &Workflow,
    step: &WorkflowStep,
    step_type: WorkflowNodeType,
    outcome: &HandlerOutcome,
) -> Vec<NewWorkflowStep> {
    if step_type.is_polling() {
        plan_from_polling_step(now, workflow, step, step_type, outcome)
    } else {
        plan_from_regular_step(now, workflow, step, outcome)
    }
}

fn plan_from_polling_step(
    now: DateTime<Utc>,
    workflow: &Workflow,
    step: &WorkflowStep,
    step_type: WorkflowNodeType,
    outcome: &HandlerOutcome,
) -> Vec<NewWorkflowStep> {
    let parsed: Result<PollExecutionResult, _> = serde_json::from_value(outcome.execution_result.clone());
    let Ok(result) = parsed else {
        return Vec::new();
    };

    if result.should_continue_polling {
        return vec![reschedule_same_poll(now, step, step_type, &result)];
    }

    if step_type == WorkflowNodeType::CheckMessageReply && result.has_replied.unwrap_or(false) {
        // A reply terminates the workflow path.
        return Vec::new();
    }

    let connected_or_replied = result.is_connected.or(result.has_replied).unwrap_or(false);
    let wanted = if connected_or_replied {
        ConditionalType::Accepted
    } else {
        ConditionalType::NotAccepted
    };

    match graph::pick_branch(&result.next_steps_info, wanted) {
        Some(branch) => vec![NewWorkflowStep::pending(
            step.organization_id,
            step.lead_id,
            step.campaign_id,
            branch.node_id.clone(),
            step.step_index + 1,
            resolve_step_type(workflow, &branch.node_id),
            now.timestamp(),
        )],
        None => Vec::new(),
    }
}

fn reschedule_same_poll(
    now: DateTime<Utc>,
    step: &WorkflowStep,
    step_type: WorkflowNodeType,
    result: &PollExecutionResult,
) -> NewWorkflowStep {
    let raw_response = json!({
        "providerId": result.provider_id,
        "pollingStartedAt": result.polling_started_at,
        "nextStepsInfo": result.next_steps_info,
    });
    let mut next = NewWorkflowStep::pending(
        step.organization_id,
        step.lead_id,
        step.campaign_id,
        step.id_in_workflow.clone(),
        step.step_index + 1,
        step_type,
        now.timestamp() + 3600,
    );
    next.retries = step.retries + 1;
    next.raw_response = raw_response;
    next
}

fn plan_from_regular_step(
    now: DateTime<Utc>,
    workflow: &Workflow,
    step: &WorkflowStep,
    outcome: &HandlerOutcome,
) -> Vec<NewWorkflowStep> {
    let next_steps = graph::outgoing(workflow, &step.id_in_workflow);
    if next_steps.is_empty() {
        return Vec::new();
    }

    if let Some(poll_type) = outcome.should_poll {
        let raw_response = json!({
            "providerId": outcome.execution_result.get("providerId"),
            "pollingStartedAt": now.timestamp(),
            "nextStepsInfo": next_steps,
        });
        let mut polling = NewWorkflowStep::pending(
            step.organization_id,
            step.lead_id,
            step.campaign_id,
            step.id_in_workflow.clone(),
            step.step_index + 1,
            poll_type,
            now.timestamp() + 3600,
        );
        polling.raw_response = raw_response;
        return vec![polling];
    }

    // Branch policy: a non-polling step's multiple outgoing edges are all
    // realized, conditional or not — conditional selection only happens
    // when a polling step completes.
    next_steps
        .iter()
        .map(|next| {
            NewWorkflowStep::pending(
                step.organization_id,
                step.lead_id,
                step.campaign_id,
                next.node_id.clone(),
                step.step_index + 1,
                resolve_step_type(workflow, &next.node_id),
                now.timestamp() + next.delay_ms / 1000,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::step::WORKFLOW_TYPE_CAMPAIGN;
    use crate::models::workflow::{DelayData, EdgeData, NodeData, Workflow, WorkflowEdge, WorkflowNode};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn node(id: &str, kind: WorkflowNodeType) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            kind: "action".to_string(),
            data: NodeData {
                node_type: kind,
                config: serde_json::json!({}),
            },
        }
    }

    fn edge(id: &str, source: &str, target: &str, data: EdgeData) -> WorkflowEdge {
        WorkflowEdge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            data,
        }
    }

    fn step(id_in_workflow: &str, step_index: i32, retries: i32) -> WorkflowStep {
        let now = Utc::now();
        WorkflowStep {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            lead_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            id_in_workflow: id_in_workflow.to_string(),
            step_index,
            workflow_type: WORKFLOW_TYPE_CAMPAIGN.to_string(),
            step_type: "profile_visit".to_string(),
            status: "pending".to_string(),
            retries,
            execute_after: 0,
            last_try_at: None,
            raw_response: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn regular_step_fans_out_to_every_outgoing_edge() {
        let workflow = Workflow {
            nodes: vec![
                node("a", WorkflowNodeType::ProfileVisit),
                node("b", WorkflowNodeType::SendConnectionRequest),
                node("c", WorkflowNodeType::LikePost),
            ],
            edges: vec![
                edge("e1", "a", "b", EdgeData::default()),
                edge("e2", "a", "c", EdgeData::default()),
            ],
        };
        let prev = step("a", 0, 0);
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let successors = plan_successors(now, &workflow, &prev, WorkflowNodeType::ProfileVisit, &HandlerOutcome::default());
        assert_eq!(successors.len(), 2);
        assert!(successors.iter().all(|s| s.step_index == 1));
    }

    #[test]
    fn regular_step_with_no_outgoing_edges_terminates() {
        let workflow = Workflow {
            nodes: vec![node("a", WorkflowNodeType::ProfileVisit)],
            edges: vec![],
        };
        let prev = step("a", 0, 0);
        let now = Utc::now();
        let successors = plan_successors(now, &workflow, &prev, WorkflowNodeType::ProfileVisit, &HandlerOutcome::default());
        assert!(successors.is_empty());
    }

    #[test]
    fn regular_step_that_should_poll_creates_one_polling_step_at_same_node() {
        let workflow = Workflow {
            nodes: vec![
                node("a", WorkflowNodeType::SendConnectionRequest),
                node("b", WorkflowNodeType::SendFollowup),
            ],
            edges: vec![edge(
                "e1",
                "a",
                "b",
                EdgeData {
                    is_conditional_path: Some(true),
                    is_positive: Some(true),
                    delay_data: Some(DelayData { delay: "1".into(), unit: "d".into() }),
                },
            )],
        };
        let prev = step("a", 0, 0);
        let now = Utc::now();
        let outcome = HandlerOutcome {
            execution_result: serde_json::json!({"providerId": "p1"}),
            should_poll: Some(WorkflowNodeType::CheckConnectionStatus),
        };
        let successors = plan_successors(now, &workflow, &prev, WorkflowNodeType::SendConnectionRequest, &outcome);
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].id_in_workflow, "a");
        assert_eq!(successors[0].step_type, WorkflowNodeType::CheckConnectionStatus);
        assert_eq!(successors[0].execute_after, now.timestamp() + 3600);
    }

    #[test]
    fn polling_step_continuing_reschedules_itself_with_incremented_retries() {
        let workflow = Workflow { nodes: vec![node("a", WorkflowNodeType::SendConnectionRequest)], edges: vec![] };
        let prev = step("a", 1, 2);
        let now = Utc::now();
        let outcome = HandlerOutcome {
            execution_result: serde_json::json!({
                "isConnected": false,
                "providerId": "p1",
                "nextStepsInfo": [],
                "pollingStartedAt": now.timestamp(),
                "shouldContinuePolling": true,
            }),
            should_poll: None,
        };
        let successors = plan_successors(now, &workflow, &prev, WorkflowNodeType::CheckConnectionStatus, &outcome);
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].retries, 3);
        assert_eq!(successors[0].step_index, 2);
    }

    #[test]
    fn message_reply_poll_with_reply_true_terminates_the_lead() {
        let workflow = Workflow { nodes: vec![node("a", WorkflowNodeType::SendFollowup)], edges: vec![] };
        let prev = step("a", 1, 0);
        let now = Utc::now();
        let outcome = HandlerOutcome {
            execution_result: serde_json::json!({
                "hasReplied": true,
                "nextStepsInfo": [],
                "pollingStartedAt": now.timestamp(),
                "shouldContinuePolling": false,
            }),
            should_poll: None,
        };
        let successors = plan_successors(now, &workflow, &prev, WorkflowNodeType::CheckMessageReply, &outcome);
        assert!(successors.is_empty());
    }

    #[test]
    fn polling_step_resolves_to_accepted_branch_on_connection() {
        let workflow = Workflow {
            nodes: vec![
                node("a", WorkflowNodeType::SendConnectionRequest),
                node("b", WorkflowNodeType::SendFollowup),
                node("c", WorkflowNodeType::WithdrawRequest),
            ],
            edges: vec![],
        };
        let prev = step("a", 1, 0);
        let now = Utc::now();
        let next_steps_info = vec![
            NextStepInfo {
                node_id: "b".into(),
                edge_id: "e1".into(),
                delay_ms: 0,
                is_conditional: true,
                conditional_type: Some(crate::graph::ConditionalTypeWire::Accepted),
            },
            NextStepInfo {
                node_id: "c".into(),
                edge_id: "e2".into(),
                delay_ms: 0,
                is_conditional: true,
                conditional_type: Some(crate::graph::ConditionalTypeWire::NotAccepted),
            },
        ];
        let outcome = HandlerOutcome {
            execution_result: serde_json::json!({
                "isConnected": true,
                "nextStepsInfo": next_steps_info,
                "pollingStartedAt": now.timestamp(),
                "shouldContinuePolling": false,
            }),
            should_poll: None,
        };
        let successors = plan_successors(now, &workflow, &prev, WorkflowNodeType::CheckConnectionStatus, &outcome);
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].id_in_workflow, "b");
        assert_eq!(successors[0].step_type, WorkflowNodeType::SendFollowup);
    }
}
