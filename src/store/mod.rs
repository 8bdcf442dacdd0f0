//! Store interfaces: each trait exposes only the semantic queries actually
//! used, not a generic SQL DSL. Each trait is the seam the
//! executor/orchestrator/tick driver code against; `postgres` provides the
//! concrete `sqlx` implementation used in production, while tests use
//! hand-written in-memory fakes (see `executor::tests` and
//! `orchestrator::tests`).

pub mod postgres;

use crate::error::EngineResult;
use crate::models::account::ConnectedAccount;
use crate::models::campaign::Campaign;
use crate::models::lead::{Lead, LeadEnrichment};
use crate::models::step::{NewWorkflowStep, StepStatus, WorkflowStep};
use crate::rate_limit::CounterPatch;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get(&self, id: Uuid) -> EngineResult<Campaign>;

    /// Non-deleted campaigns in `SCHEDULED` or `DRAFT` with a non-null
    /// `start_date`, used by `check-scheduled-campaigns`.
    async fn due_scheduled(&self, now: chrono::DateTime<chrono::Utc>) -> EngineResult<Vec<Campaign>>;

    /// Non-deleted campaigns currently `IN_PROGRESS`, used by
    /// `start-daily-leads` and `retry-failed-steps`.
    async fn in_progress(&self) -> EngineResult<Vec<Campaign>>;

    async fn set_status(&self, id: Uuid, status: &str) -> EngineResult<()>;

    /// Applies a rate-limit counter patch atomically, so a reset and an
    /// increment never race as two separate writes.
    async fn apply_counter_patch(&self, id: Uuid, patch: &CounterPatch) -> EngineResult<()>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get(&self, id: Uuid) -> EngineResult<Lead>;

    async fn list_for_campaign(&self, campaign_id: Uuid) -> EngineResult<Vec<Lead>>;

    async fn apply_enrichment(&self, id: Uuid, enrichment: &LeadEnrichment) -> EngineResult<()>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: Uuid) -> EngineResult<ConnectedAccount>;

    /// Sets the sender-wide connection-request cooldown.
    async fn set_connection_blocked_until(
        &self,
        id: Uuid,
        blocked_until: chrono::DateTime<chrono::Utc>,
    ) -> EngineResult<()>;
}

#[async_trait]
pub trait StepStore: Send + Sync {
    async fn get(&self, id: Uuid) -> EngineResult<WorkflowStep>;

    /// Every `PENDING` step whose `execute_after <= now`, in store order,
    /// used by `process-daily-leads`.
    async fn due_pending(&self, now_unix_seconds: i64) -> EngineResult<Vec<WorkflowStep>>;

    /// All steps (any status) for the given leads under
    /// `CAMPAIGN_WORKFLOW`, used to compute unstarted leads.
    async fn for_leads(&self, lead_ids: &[Uuid]) -> EngineResult<Vec<WorkflowStep>>;

    /// `FAILED` steps for the given leads under `CAMPAIGN_WORKFLOW`.
    async fn failed_for_leads(&self, lead_ids: &[Uuid]) -> EngineResult<Vec<WorkflowStep>>;

    /// Every `PENDING` `send_connection_request` step whose lead's campaign
    /// uses the given sender account, used for the cooldown bulk defer.
    async fn pending_connection_requests_for_sender(
        &self,
        account_id: Uuid,
    ) -> EngineResult<Vec<WorkflowStep>>;

    /// Every `PENDING` `check_message_reply` step for leads whose
    /// `provider_id` (read out of `raw_response`) matches one of
    /// `attendee_provider_ids`, used by the inbound reply webhook.
    async fn pending_message_reply_steps_for_provider_ids(
        &self,
        attendee_provider_ids: &[String],
    ) -> EngineResult<Vec<WorkflowStep>>;

    async fn create(&self, step: NewWorkflowStep) -> EngineResult<WorkflowStep>;

    async fn set_execute_after(&self, id: Uuid, execute_after: i64) -> EngineResult<()>;

    async fn mark_complete(&self, id: Uuid, raw_response: serde_json::Value) -> EngineResult<()>;

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> EngineResult<()>;

    /// Re-arms a `FAILED` step to `PENDING` with `execute_after = now`.
    async fn rearm(&self, id: Uuid, execute_after: i64) -> EngineResult<()>;

    async fn set_raw_response(&self, id: Uuid, raw_response: serde_json::Value) -> EngineResult<()>;
}

/// Handy so test fakes and the executor can agree on what a "step still
/// pending" assertion means without re-deriving `StepStatus::Pending` at
/// every call site.
pub fn is_pending(step: &WorkflowStep) -> bool {
    step.status().map(|s| s == StepStatus::Pending).unwrap_or(false)
}
