//! Postgres-backed adapters for the two narrow seams `CampaignOrchestrator`
//! needs at `start_campaign`. CSV parsing and object-storage retrieval of
//! the original prospect-list upload are external collaborators; by the
//! time this engine sees a `prospect_list_id`, an external import path has
//! already staged the rows in `prospect_list_entries`.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::orchestrator::{LeadCreator, ProspectListSource, ProspectRow};

pub struct PgProspectListSource {
    pool: Arc<PgPool>,
}

impl PgProspectListSource {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProspectRowRecord {
    linkedin_url: String,
    public_identifier: Option<String>,
}

#[async_trait]
impl ProspectListSource for PgProspectListSource {
    async fn load(&self, prospect_list_id: Uuid) -> EngineResult<Vec<ProspectRow>> {
        let rows = sqlx::query_as::<_, ProspectRowRecord>(
            "SELECT linkedin_url, public_identifier FROM prospect_list_entries WHERE prospect_list_id = $1",
        )
        .bind(prospect_list_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ProspectRow {
                linkedin_url: r.linkedin_url,
                public_identifier: r.public_identifier,
            })
            .collect())
    }
}

pub struct PgLeadCreator {
    pool: Arc<PgPool>,
}

impl PgLeadCreator {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadCreator for PgLeadCreator {
    async fn create(&self, organization_id: Uuid, campaign_id: Uuid, row: &ProspectRow) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO leads (id, organization_id, campaign_id, linkedin_url, public_identifier, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(campaign_id)
        .bind(&row.linkedin_url)
        .bind(&row.public_identifier)
        .execute(self.pool.as_ref())
        .await?;
        Ok(id)
    }
}
