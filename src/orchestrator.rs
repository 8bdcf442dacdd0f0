//! Campaign Orchestrator: the four public campaign operations and the
//! lead-admission bulk-create used by `start_campaign`.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::graph;
use crate::models::campaign::{Campaign, CampaignStatus, CampaignStatusView};
use crate::models::step::NewWorkflowStep;
use crate::store::{AccountStore, CampaignStore, LeadStore, StepStore};
use crate::workflow_source::WorkflowSource;

/// Prospect-list rows, loaded by an external collaborator (CSV parsing and
/// object-storage I/O are out of scope here) and handed to `start_campaign`
/// as plain lead-creation inputs.
#[derive(Debug, Clone)]
pub struct ProspectRow {
    pub linkedin_url: String,
    pub public_identifier: Option<String>,
}

/// Loads the prospect list backing a campaign. Kept as a narrow trait for
/// the same reason as `WorkflowSource`: this engine only needs to consume
/// the rows, not parse CSVs or talk to object storage.
#[async_trait::async_trait]
pub trait ProspectListSource: Send + Sync {
    async fn load(&self, prospect_list_id: Uuid) -> EngineResult<Vec<ProspectRow>>;
}

#[async_trait::async_trait]
pub trait LeadCreator: Send + Sync {
    async fn create(&self, organization_id: Uuid, campaign_id: Uuid, row: &ProspectRow) -> EngineResult<Uuid>;
}

pub struct CampaignOrchestrator {
    campaigns: Arc<dyn CampaignStore>,
    leads: Arc<dyn LeadStore>,
    steps: Arc<dyn StepStore>,
    accounts: Arc<dyn AccountStore>,
    prospect_lists: Arc<dyn ProspectListSource>,
    lead_creator: Arc<dyn LeadCreator>,
    workflows: Arc<dyn WorkflowSource>,
}

const LEAD_CREATION_CHUNK_SIZE: usize = 5;

impl CampaignOrchestrator {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        leads: Arc<dyn LeadStore>,
        steps: Arc<dyn StepStore>,
        accounts: Arc<dyn AccountStore>,
        prospect_lists: Arc<dyn ProspectListSource>,
        lead_creator: Arc<dyn LeadCreator>,
        workflows: Arc<dyn WorkflowSource>,
    ) -> Self {
        Self {
            campaigns,
            leads,
            steps,
            accounts,
            prospect_lists,
            lead_creator,
            workflows,
        }
    }

    /// Idempotent on already-`IN_PROGRESS` campaigns (returns `Validation`);
    /// safe to call again on `PAUSED` or `FAILED` campaigns.
    pub async fn start_campaign(&self, campaign_id: Uuid) -> EngineResult<()> {
        let campaign = self.campaigns.get(campaign_id).await?;
        let status = campaign
            .status()
            .map_err(|e| EngineError::Validation(format!("invalid campaign status: {e}")))?;

        if matches!(status, CampaignStatus::InProgress | CampaignStatus::Completed) {
            return Err(EngineError::Validation(format!(
                "campaign {campaign_id} cannot be started from status {status}"
            )));
        }

        self.validate_sender_account(campaign.sender_account_id).await?;

        let rows = self.prospect_lists.load(campaign.prospect_list_id).await?;
        if rows.is_empty() {
            return Err(EngineError::Validation("prospect list is empty".into()));
        }

        for chunk in rows.chunks(LEAD_CREATION_CHUNK_SIZE) {
            let creations = chunk
                .iter()
                .map(|row| self.lead_creator.create(campaign.organization_id, campaign.id, row));
            let results = join_all(creations).await;
            for result in results {
                result?;
            }
        }

        self.campaigns.set_status(campaign.id, CampaignStatus::InProgress.as_str()).await?;
        Ok(())
    }

    /// `startCampaign` requires the sender account to exist and be usable;
    /// a missing or disconnected/deleted sender fails with `Validation`
    /// rather than surfacing the store's `NotFound`.
    async fn validate_sender_account(&self, sender_account_id: Uuid) -> EngineResult<()> {
        let account = match self.accounts.get(sender_account_id).await {
            Ok(account) => account,
            Err(EngineError::NotFound(_)) => {
                return Err(EngineError::Validation(format!(
                    "sender account {sender_account_id} not found"
                )))
            }
            Err(e) => return Err(e),
        };
        if account.status != "connected" {
            return Err(EngineError::Validation(format!(
                "sender account {sender_account_id} is not connected (status: {})",
                account.status
            )));
        }
        Ok(())
    }

    /// Idempotent from `PAUSED`.
    pub async fn pause_campaign(&self, campaign_id: Uuid) -> EngineResult<()> {
        let campaign = self.campaigns.get(campaign_id).await?;
        let status = campaign
            .status()
            .map_err(|e| EngineError::Validation(format!("invalid campaign status: {e}")))?;
        match status {
            CampaignStatus::InProgress | CampaignStatus::Paused => {
                self.campaigns.set_status(campaign.id, CampaignStatus::Paused.as_str()).await
            }
            other => Err(EngineError::Validation(format!("cannot pause campaign in status {other}"))),
        }
    }

    /// Only `PAUSED -> IN_PROGRESS`.
    pub async fn resume_campaign(&self, campaign_id: Uuid) -> EngineResult<()> {
        let campaign = self.campaigns.get(campaign_id).await?;
        let status = campaign
            .status()
            .map_err(|e| EngineError::Validation(format!("invalid campaign status: {e}")))?;
        if status != CampaignStatus::Paused {
            return Err(EngineError::Validation(format!("cannot resume campaign in status {status}")));
        }
        self.campaigns.set_status(campaign.id, CampaignStatus::InProgress.as_str()).await
    }

    /// Returns the campaign's current status view.
    pub async fn campaign_status(&self, campaign_id: Uuid) -> EngineResult<CampaignStatusView> {
        let campaign = self.campaigns.get(campaign_id).await?;
        let status = campaign
            .status()
            .map_err(|e| EngineError::Validation(format!("invalid campaign status: {e}")))?;
        Ok(status.into())
    }

    /// `start-daily-leads` admission for a single campaign.
    pub async fn admit_daily_leads(&self, campaign: &Campaign) -> EngineResult<()> {
        let leads = self.leads.list_for_campaign(campaign.id).await?;
        if leads.is_empty() {
            self.campaigns.set_status(campaign.id, CampaignStatus::Completed.as_str()).await?;
            return Ok(());
        }

        let lead_ids: Vec<Uuid> = leads.iter().map(|l| l.id).collect();
        let existing_steps = self.steps.for_leads(&lead_ids).await?;
        let started: std::collections::HashSet<Uuid> = existing_steps.iter().map(|s| s.lead_id).collect();
        let mut unstarted: Vec<Uuid> = lead_ids.into_iter().filter(|id| !started.contains(id)).collect();

        if unstarted.is_empty() {
            self.campaigns.set_status(campaign.id, CampaignStatus::Completed.as_str()).await?;
            return Ok(());
        }

        shuffle(&mut unstarted);
        let admit_count = (campaign.leads_per_day as usize).min(unstarted.len());
        let admitted = &unstarted[..admit_count];

        let workflow = self.workflows.load(&campaign.workflow_file_location).await?;
        let entry = graph::entry_node(&workflow)
            .ok_or_else(|| EngineError::Validation("workflow has no entry node".into()))?;

        let now = Utc::now().timestamp();
        for lead_id in admitted {
            let step = NewWorkflowStep::pending(
                campaign.organization_id,
                *lead_id,
                campaign.id,
                entry.id.clone(),
                0,
                entry.data.node_type,
                now,
            );
            self.steps.create(step).await?;
        }
        Ok(())
    }
}

/// Uniform shuffle over the unstarted-lead set before admission.
fn shuffle(ids: &mut [Uuid]) {
    use rand::seq::SliceRandom;
    ids.shuffle(&mut rand::thread_rng());
}
