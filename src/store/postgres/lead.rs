use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::lead::{Lead, LeadEnrichment};
use crate::store::LeadStore;

pub struct PgLeadStore {
    pool: Arc<PgPool>,
}

impl PgLeadStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn get(&self, id: Uuid) -> EngineResult<Lead> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("lead {id} not found")))
    }

    async fn list_for_campaign(&self, campaign_id: Uuid) -> EngineResult<Vec<Lead>> {
        let rows = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(rows)
    }

    async fn apply_enrichment(&self, id: Uuid, enrichment: &LeadEnrichment) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE leads SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                title = COALESCE($4, title),
                company = COALESCE($5, company),
                email = COALESCE($6, email),
                phone = COALESCE($7, phone),
                location = COALESCE($8, location),
                linkedin_id = COALESCE($9, linkedin_id),
                public_identifier = COALESCE($10, public_identifier),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&enrichment.first_name)
        .bind(&enrichment.last_name)
        .bind(&enrichment.title)
        .bind(&enrichment.company)
        .bind(&enrichment.email)
        .bind(&enrichment.phone)
        .bind(&enrichment.location)
        .bind(&enrichment.linkedin_id)
        .bind(&enrichment.public_identifier)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}
