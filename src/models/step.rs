use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::workflow::WorkflowNodeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Complete,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Complete => "complete",
            StepStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "complete" => Ok(StepStatus::Complete),
            "failed" => Ok(StepStatus::Failed),
            other => Err(format!("unknown step status: {other}")),
        }
    }
}

pub const WORKFLOW_TYPE_CAMPAIGN: &str = "CAMPAIGN_WORKFLOW";

/// The scheduler's ledger — one row per scheduled action per lead.
/// `step_type` reuses `WorkflowNodeType` since the polling kinds
/// (`check_connection_status`, `check_message_reply`) live in the same tag
/// space as the authored node types.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Uuid,
    pub id_in_workflow: String,
    pub step_index: i32,
    pub workflow_type: String,
    pub step_type: String,
    pub status: String,
    pub retries: i32,
    pub execute_after: i64,
    pub last_try_at: Option<DateTime<Utc>>,
    pub raw_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStep {
    pub fn status(&self) -> Result<StepStatus, String> {
        self.status.parse()
    }

    pub fn step_type(&self) -> Result<WorkflowNodeType, String> {
        serde_json::from_value(serde_json::Value::String(self.step_type.clone()))
            .map_err(|e| format!("unknown step_type '{}': {e}", self.step_type))
    }

    pub fn is_eligible(&self, now_unix_seconds: i64) -> bool {
        self.status().map(|s| s == StepStatus::Pending).unwrap_or(false)
            && self.execute_after <= now_unix_seconds
    }
}

/// Fields needed to create a new successor step; the store assigns `id`,
/// `created_at`, `updated_at`.
#[derive(Debug, Clone)]
pub struct NewWorkflowStep {
    pub organization_id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Uuid,
    pub id_in_workflow: String,
    pub step_index: i32,
    pub step_type: WorkflowNodeType,
    pub execute_after: i64,
    pub retries: i32,
    pub raw_response: serde_json::Value,
}

impl NewWorkflowStep {
    pub fn pending(
        organization_id: Uuid,
        lead_id: Uuid,
        campaign_id: Uuid,
        id_in_workflow: impl Into<String>,
        step_index: i32,
        step_type: WorkflowNodeType,
        execute_after: i64,
    ) -> Self {
        Self {
            organization_id,
            lead_id,
            campaign_id,
            id_in_workflow: id_in_workflow.into(),
            step_index,
            step_type,
            execute_after,
            retries: 0,
            raw_response: serde_json::json!({}),
        }
    }
}
