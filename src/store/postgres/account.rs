use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::account::ConnectedAccount;
use crate::store::AccountStore;

pub struct PgAccountStore {
    pool: Arc<PgPool>,
}

impl PgAccountStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn get(&self, id: Uuid) -> EngineResult<ConnectedAccount> {
        sqlx::query_as::<_, ConnectedAccount>("SELECT * FROM connected_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("connected account {id} not found")))
    }

    async fn set_connection_blocked_until(
        &self,
        id: Uuid,
        blocked_until: DateTime<Utc>,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE connected_accounts
            SET metadata = jsonb_set(
                    COALESCE(metadata, '{}'::jsonb),
                    '{connection_request_blocked_until}',
                    to_jsonb($2::timestamptz)
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(blocked_until)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}
