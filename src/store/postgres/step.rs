use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::step::{NewWorkflowStep, WorkflowStep, WORKFLOW_TYPE_CAMPAIGN};
use crate::store::StepStore;

pub struct PgStepStore {
    pool: Arc<PgPool>,
}

impl PgStepStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StepStore for PgStepStore {
    async fn get(&self, id: Uuid) -> EngineResult<WorkflowStep> {
        sqlx::query_as::<_, WorkflowStep>("SELECT * FROM workflow_steps WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("workflow step {id} not found")))
    }

    async fn due_pending(&self, now_unix_seconds: i64) -> EngineResult<Vec<WorkflowStep>> {
        let rows = sqlx::query_as::<_, WorkflowStep>(
            r#"
            SELECT * FROM workflow_steps
            WHERE status = 'pending' AND execute_after <= $1
            ORDER BY created_at ASC, step_index ASC
            "#,
        )
        .bind(now_unix_seconds)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn for_leads(&self, lead_ids: &[Uuid]) -> EngineResult<Vec<WorkflowStep>> {
        let rows = sqlx::query_as::<_, WorkflowStep>(
            r#"
            SELECT * FROM workflow_steps
            WHERE lead_id = ANY($1) AND workflow_type = $2
            "#,
        )
        .bind(lead_ids)
        .bind(WORKFLOW_TYPE_CAMPAIGN)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn failed_for_leads(&self, lead_ids: &[Uuid]) -> EngineResult<Vec<WorkflowStep>> {
        let rows = sqlx::query_as::<_, WorkflowStep>(
            r#"
            SELECT * FROM workflow_steps
            WHERE lead_id = ANY($1) AND workflow_type = $2 AND status = 'failed'
            "#,
        )
        .bind(lead_ids)
        .bind(WORKFLOW_TYPE_CAMPAIGN)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn pending_connection_requests_for_sender(
        &self,
        account_id: Uuid,
    ) -> EngineResult<Vec<WorkflowStep>> {
        let rows = sqlx::query_as::<_, WorkflowStep>(
            r#"
            SELECT ws.* FROM workflow_steps ws
            INNER JOIN campaigns c ON c.id = ws.campaign_id
            WHERE c.sender_account_id = $1
              AND ws.status = 'pending'
              AND ws.step_type = 'send_connection_request'
            "#,
        )
        .bind(account_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn pending_message_reply_steps_for_provider_ids(
        &self,
        attendee_provider_ids: &[String],
    ) -> EngineResult<Vec<WorkflowStep>> {
        let rows = sqlx::query_as::<_, WorkflowStep>(
            r#"
            SELECT * FROM workflow_steps
            WHERE status = 'pending'
              AND step_type = 'check_message_reply'
              AND raw_response ->> 'providerId' = ANY($1)
            "#,
        )
        .bind(attendee_provider_ids)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn create(&self, step: NewWorkflowStep) -> EngineResult<WorkflowStep> {
        let step_type = serde_json::to_value(step.step_type)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EngineError::Validation("step_type did not serialize to a string".into()))?;

        let row = sqlx::query_as::<_, WorkflowStep>(
            r#"
            INSERT INTO workflow_steps (
                id, organization_id, lead_id, campaign_id, id_in_workflow, step_index,
                workflow_type, step_type, status, retries, execute_after, raw_response,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10, $11, NOW(), NOW()
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(step.organization_id)
        .bind(step.lead_id)
        .bind(step.campaign_id)
        .bind(step.id_in_workflow)
        .bind(step.step_index)
        .bind(WORKFLOW_TYPE_CAMPAIGN)
        .bind(step_type)
        .bind(step.retries)
        .bind(step.execute_after)
        .bind(step.raw_response)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(row)
    }

    async fn set_execute_after(&self, id: Uuid, execute_after: i64) -> EngineResult<()> {
        sqlx::query("UPDATE workflow_steps SET execute_after = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(execute_after)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn mark_complete(&self, id: Uuid, raw_response: serde_json::Value) -> EngineResult<()> {
        sqlx::query(
            "UPDATE workflow_steps SET status = 'complete', raw_response = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(raw_response)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE workflow_steps SET
                status = 'failed',
                retries = retries + 1,
                last_try_at = NOW(),
                raw_response = jsonb_build_object('error', $2::text),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn rearm(&self, id: Uuid, execute_after: i64) -> EngineResult<()> {
        sqlx::query(
            "UPDATE workflow_steps SET status = 'pending', execute_after = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(execute_after)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn set_raw_response(&self, id: Uuid, raw_response: serde_json::Value) -> EngineResult<()> {
        sqlx::query("UPDATE workflow_steps SET raw_response = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(raw_response)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
