//! Graph Navigator: pure functions over a `Workflow`.
//!
//! Nothing here touches a store or a clock — the planner that decides what
//! to persist next lives in `executor::planner` and calls into this module
//! for the graph facts (entry node, outgoing edges, conditional
//! classification).

use crate::clock::delay_to_millis;
use crate::models::workflow::{ConditionalType, Workflow, WorkflowEdge, WorkflowNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One outgoing edge from a node, already resolved to its delay-in-millis
/// and conditional classification. Serialized camelCase since it round-trips
/// through `WorkflowStep::raw_response` alongside the rest of the wire JSON
/// (`providerId`, `pollingStartedAt`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStepInfo {
    pub node_id: String,
    pub edge_id: String,
    pub delay_ms: i64,
    pub is_conditional: bool,
    /// `None` when `is_conditional` is false.
    pub conditional_type: Option<ConditionalTypeWire>,
}

/// `ConditionalType` mirrored with a serde-friendly representation so it can
/// round-trip through `WorkflowStep::raw_response` — polling steps
/// denormalize `next_steps` into their own row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalTypeWire {
    Accepted,
    NotAccepted,
}

impl From<ConditionalType> for ConditionalTypeWire {
    fn from(c: ConditionalType) -> Self {
        match c {
            ConditionalType::Accepted => ConditionalTypeWire::Accepted,
            ConditionalType::NotAccepted => ConditionalTypeWire::NotAccepted,
        }
    }
}

impl From<ConditionalTypeWire> for ConditionalType {
    fn from(c: ConditionalTypeWire) -> Self {
        match c {
            ConditionalTypeWire::Accepted => ConditionalType::Accepted,
            ConditionalTypeWire::NotAccepted => ConditionalType::NotAccepted,
        }
    }
}

/// Finds the entry node: zero-incoming-edge node among the retained
/// (non-`addStep`) nodes, first in node order on ties, falling back to the
/// first retained node if every node has an incoming edge.
pub fn entry_node<'a>(workflow: &'a Workflow) -> Option<&'a WorkflowNode> {
    let retained = workflow.retained_nodes();
    if retained.is_empty() {
        return None;
    }
    let retained_ids: std::collections::HashSet<&str> =
        retained.iter().map(|n| n.id.as_str()).collect();

    let mut incoming: HashMap<&str, u32> = HashMap::new();
    for node in &retained {
        incoming.entry(node.id.as_str()).or_insert(0);
    }
    for edge in &workflow.edges {
        if retained_ids.contains(edge.source.as_str()) && retained_ids.contains(edge.target.as_str())
        {
            *incoming.entry(edge.target.as_str()).or_insert(0) += 1;
        }
    }

    retained
        .iter()
        .find(|n| incoming.get(n.id.as_str()).copied().unwrap_or(0) == 0)
        .copied()
        .or_else(|| retained.first().copied())
}

/// Outgoing edges from `node_id` whose target is a retained node, resolved
/// to `NextStepInfo`.
pub fn outgoing(workflow: &Workflow, node_id: &str) -> Vec<NextStepInfo> {
    let retained_ids: std::collections::HashSet<&str> = workflow
        .retained_nodes()
        .iter()
        .map(|n| n.id.as_str())
        .collect();

    workflow
        .edges
        .iter()
        .filter(|e| e.source == node_id && retained_ids.contains(e.target.as_str()))
        .map(|edge| resolve_edge(edge))
        .collect()
}

fn resolve_edge(edge: &WorkflowEdge) -> NextStepInfo {
    let delay_ms = edge
        .data
        .delay_data
        .as_ref()
        .map(|d| delay_to_millis(&d.delay, &d.unit))
        .unwrap_or(0);
    let is_conditional = edge.data.is_conditional_path.unwrap_or(false);
    let conditional_type = if is_conditional {
        Some(if edge.data.is_positive.unwrap_or(false) {
            ConditionalTypeWire::Accepted
        } else {
            ConditionalTypeWire::NotAccepted
        })
    } else {
        None
    };

    NextStepInfo {
        node_id: edge.target.clone(),
        edge_id: edge.id.clone(),
        delay_ms,
        is_conditional,
        conditional_type,
    }
}

/// Picks the outgoing edge matching `outcome` from a set of `NextStepInfo`
/// previously computed for a polling step. Returns `None` if there is no
/// matching branch, in which case the lead terminates cleanly.
pub fn pick_branch(next_steps: &[NextStepInfo], outcome: ConditionalType) -> Option<&NextStepInfo> {
    let wire: ConditionalTypeWire = outcome.into();
    next_steps
        .iter()
        .find(|n| n.conditional_type == Some(wire))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::{DelayData, EdgeData, NodeData, WorkflowNodeType};

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

    #[test]
    fn entry_node_is_the_zero_incoming_node() {
        let workflow = Workflow {
            nodes: vec![
                node("a", WorkflowNodeType::SendConnectionRequest),
                node("b", WorkflowNodeType::SendFollowup),
            ],
            edges: vec![edge("e1", "a", "b", EdgeData::default())],
        };
        assert_eq!(entry_node(&workflow).unwrap().id, "a");
    }

    #[test]
    fn entry_node_filters_add_step_placeholders() {
        let workflow = Workflow {
            nodes: vec![
                node("placeholder", WorkflowNodeType::AddStep),
                node("a", WorkflowNodeType::SendConnectionRequest),
            ],
            edges: vec![edge(
                "e1",
                "placeholder",
                "a",
                EdgeData::default(),
            )],
        };
        // The edge from the placeholder is dropped with its source, so `a`
        // has zero incoming edges among retained nodes.
        assert_eq!(entry_node(&workflow).unwrap().id, "a");
    }

    #[test]
    fn entry_node_falls_back_to_first_node_when_every_node_has_incoming() {
        let workflow = Workflow {
            nodes: vec![
                node("a", WorkflowNodeType::SendConnectionRequest),
                node("b", WorkflowNodeType::SendFollowup),
            ],
            edges: vec![
                edge("e1", "a", "b", EdgeData::default()),
                edge("e2", "b", "a", EdgeData::default()),
            ],
        };
        assert_eq!(entry_node(&workflow).unwrap().id, "a");
    }

    #[test]
    fn outgoing_classifies_conditional_edges() {
        let workflow = Workflow {
            nodes: vec![
                node("a", WorkflowNodeType::SendConnectionRequest),
                node("b", WorkflowNodeType::SendFollowup),
                node("c", WorkflowNodeType::WithdrawRequest),
            ],
            edges: vec![
                edge(
                    "e1",
                    "a",
                    "b",
                    EdgeData {
                        is_conditional_path: Some(true),
                        is_positive: Some(true),
                        delay_data: Some(DelayData {
                            delay: "2".to_string(),
                            unit: "d".to_string(),
                        }),
                    },
                ),
                edge(
                    "e2",
                    "a",
                    "c",
                    EdgeData {
                        is_conditional_path: Some(true),
                        is_positive: Some(false),
                        delay_data: Some(DelayData {
                            delay: "2".to_string(),
                            unit: "d".to_string(),
                        }),
                    },
                ),
            ],
        };

        let next_steps = outgoing(&workflow, "a");
        assert_eq!(next_steps.len(), 2);
        let accepted = pick_branch(&next_steps, ConditionalType::Accepted).unwrap();
        assert_eq!(accepted.node_id, "b");
        assert_eq!(accepted.delay_ms, 172_800_000);

        let not_accepted = pick_branch(&next_steps, ConditionalType::NotAccepted).unwrap();
        assert_eq!(not_accepted.node_id, "c");
    }

    #[test]
    fn outgoing_drops_edges_to_placeholder_targets() {
        let workflow = Workflow {
            nodes: vec![
                node("a", WorkflowNodeType::SendConnectionRequest),
                node("placeholder", WorkflowNodeType::AddStep),
            ],
            edges: vec![edge("e1", "a", "placeholder", EdgeData::default())],
        };
        assert!(outgoing(&workflow, "a").is_empty());
    }

    #[test]
    fn pick_branch_returns_none_when_no_matching_branch_exists() {
        let next_steps = vec![NextStepInfo {
            node_id: "b".to_string(),
            edge_id: "e1".to_string(),
            delay_ms: 0,
            is_conditional: true,
            conditional_type: Some(ConditionalTypeWire::Accepted),
        }];
        assert!(pick_branch(&next_steps, ConditionalType::NotAccepted).is_none());
    }
}
