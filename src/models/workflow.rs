//! The immutable per-campaign workflow JSON.

use serde::{Deserialize, Serialize};

/// `data.type` on a node. `AddStep` nodes are placeholders the Graph
/// Navigator filters out everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNodeType {
    AddStep,
    ProfileVisit,
    SendConnectionRequest,
    SendFollowup,
    LikePost,
    CommentPost,
    WithdrawRequest,
    Webhook,
    SendInmail,
    /// Internal polling kinds. These never appear in the authored workflow
    /// JSON; they are synthesized by the successor planner, but share the
    /// same tag space as `WorkflowStep::step_type`.
    CheckConnectionStatus,
    CheckMessageReply,
}

impl WorkflowNodeType {
    pub fn is_placeholder(self) -> bool {
        matches!(self, WorkflowNodeType::AddStep)
    }

    pub fn is_polling(self) -> bool {
        matches!(
            self,
            WorkflowNodeType::CheckConnectionStatus | WorkflowNodeType::CheckMessageReply
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "type")]
    pub node_type: WorkflowNodeType,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub data: NodeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalType {
    Accepted,
    NotAccepted,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DelayData {
    pub delay: String,
    pub unit: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EdgeData {
    #[serde(default, rename = "isConditionalPath")]
    pub is_conditional_path: Option<bool>,
    #[serde(default, rename = "isPositive")]
    pub is_positive: Option<bool>,
    #[serde(default, rename = "delayData")]
    pub delay_data: Option<DelayData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub data: EdgeData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Workflow {
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
}

impl Workflow {
    /// Nodes with `addStep` filtered out.
    pub fn retained_nodes(&self) -> Vec<&WorkflowNode> {
        self.nodes
            .iter()
            .filter(|n| !n.data.node_type.is_placeholder())
            .collect()
    }

    pub fn find_node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
