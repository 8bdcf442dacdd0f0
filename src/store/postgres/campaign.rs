use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::campaign::Campaign;
use crate::rate_limit::CounterPatch;
use crate::store::CampaignStore;

pub struct PgCampaignStore {
    pool: Arc<PgPool>,
}

impl PgCampaignStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn get(&self, id: Uuid) -> EngineResult<Campaign> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("campaign {id} not found")))
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> EngineResult<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE is_deleted = FALSE
              AND status IN ('draft', 'scheduled')
              AND start_date IS NOT NULL
              AND start_date <= $1
            "#,
        )
        .bind(now)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn in_progress(&self) -> EngineResult<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE is_deleted = FALSE AND status = 'in_progress'",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn set_status(&self, id: Uuid, status: &str) -> EngineResult<()> {
        sqlx::query("UPDATE campaigns SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn apply_counter_patch(&self, id: Uuid, patch: &CounterPatch) -> EngineResult<()> {
        // A single statement folds the reset and the increment together so
        // the two never race as separate writes.
        sqlx::query(
            r#"
            UPDATE campaigns SET
                requests_sent_this_day = CASE WHEN $2 THEN 0 ELSE requests_sent_this_day END + $3,
                requests_sent_this_week = CASE WHEN $4 THEN 0 ELSE requests_sent_this_week END + $5,
                last_daily_requests_reset = COALESCE($6, last_daily_requests_reset),
                last_weekly_requests_reset = COALESCE($7, last_weekly_requests_reset),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.reset_day.is_some())
        .bind(patch.increment_day)
        .bind(patch.reset_week.is_some())
        .bind(patch.increment_week)
        .bind(patch.reset_day_at)
        .bind(patch.reset_week_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}
