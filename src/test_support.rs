//! In-memory fakes for the store/provider/workflow-source traits, used by
//! `executor::tests` and `orchestrator::tests`. Test-only: gated on
//! `#[cfg(test)]` in `lib.rs` so none of this ships in the binaries.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::account::ConnectedAccount;
use crate::models::campaign::Campaign;
use crate::models::lead::{Lead, LeadEnrichment};
use crate::models::step::{NewWorkflowStep, WorkflowStep};
use crate::models::workflow::Workflow;
use crate::orchestrator::{LeadCreator, ProspectListSource, ProspectRow};
use crate::provider::{Invitation, Post, ProviderClient, ProviderProfile, ReactionType};
use crate::rate_limit::CounterPatch;
use crate::store::{AccountStore, CampaignStore, LeadStore, StepStore};
use crate::workflow_source::WorkflowSource;

#[derive(Default)]
pub struct FakeCampaignStore {
    pub campaigns: Mutex<HashMap<Uuid, Campaign>>,
}

impl FakeCampaignStore {
    pub fn with(campaign: Campaign) -> Self {
        let mut map = HashMap::new();
        map.insert(campaign.id, campaign);
        Self { campaigns: Mutex::new(map) }
    }

    pub fn get_snapshot(&self, id: Uuid) -> Campaign {
        self.campaigns.lock().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl CampaignStore for FakeCampaignStore {
    async fn get(&self, id: Uuid) -> EngineResult<Campaign> {
        self.campaigns
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("campaign {id}")))
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> EngineResult<Vec<Campaign>> {
        let map = self.campaigns.lock().unwrap();
        Ok(map
            .values()
            .filter(|c| {
                !c.is_deleted
                    && matches!(c.status().ok(), Some(crate::models::campaign::CampaignStatus::Scheduled | crate::models::campaign::CampaignStatus::Draft))
                    && c.start_date.map(|d| d <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn in_progress(&self) -> EngineResult<Vec<Campaign>> {
        let map = self.campaigns.lock().unwrap();
        Ok(map
            .values()
            .filter(|c| !c.is_deleted && c.status().ok() == Some(crate::models::campaign::CampaignStatus::InProgress))
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: &str) -> EngineResult<()> {
        let mut map = self.campaigns.lock().unwrap();
        let campaign = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("campaign {id}")))?;
        campaign.status = status.to_string();
        Ok(())
    }

    async fn apply_counter_patch(&self, id: Uuid, patch: &CounterPatch) -> EngineResult<()> {
        let mut map = self.campaigns.lock().unwrap();
        let campaign = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("campaign {id}")))?;
        campaign.requests_sent_this_day = patch.resulting_day_count(campaign.requests_sent_this_day);
        campaign.requests_sent_this_week = patch.resulting_week_count(campaign.requests_sent_this_week);
        if let Some(at) = patch.reset_day_at {
            campaign.last_daily_requests_reset = at;
        }
        if let Some(at) = patch.reset_week_at {
            campaign.last_weekly_requests_reset = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLeadStore {
    pub leads: Mutex<HashMap<Uuid, Lead>>,
}

impl FakeLeadStore {
    pub fn with(leads: Vec<Lead>) -> Self {
        Self { leads: Mutex::new(leads.into_iter().map(|l| (l.id, l)).collect()) }
    }
}

#[async_trait]
impl LeadStore for FakeLeadStore {
    async fn get(&self, id: Uuid) -> EngineResult<Lead> {
        self.leads.lock().unwrap().get(&id).cloned().ok_or_else(|| EngineError::NotFound(format!("lead {id}")))
    }

    async fn list_for_campaign(&self, campaign_id: Uuid) -> EngineResult<Vec<Lead>> {
        Ok(self.leads.lock().unwrap().values().filter(|l| l.campaign_id == campaign_id).cloned().collect())
    }

    async fn apply_enrichment(&self, id: Uuid, enrichment: &LeadEnrichment) -> EngineResult<()> {
        let mut map = self.leads.lock().unwrap();
        let lead = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("lead {id}")))?;
        if enrichment.first_name.is_some() {
            lead.first_name = enrichment.first_name.clone();
        }
        if enrichment.last_name.is_some() {
            lead.last_name = enrichment.last_name.clone();
        }
        if enrichment.title.is_some() {
            lead.title = enrichment.title.clone();
        }
        if enrichment.company.is_some() {
            lead.company = enrichment.company.clone();
        }
        if enrichment.email.is_some() {
            lead.email = enrichment.email.clone();
        }
        if enrichment.phone.is_some() {
            lead.phone = enrichment.phone.clone();
        }
        if enrichment.location.is_some() {
            lead.location = enrichment.location.clone();
        }
        if enrichment.linkedin_id.is_some() {
            lead.linkedin_id = enrichment.linkedin_id.clone();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAccountStore {
    pub accounts: Mutex<HashMap<Uuid, ConnectedAccount>>,
}

impl FakeAccountStore {
    pub fn with(account: ConnectedAccount) -> Self {
        let mut map = HashMap::new();
        map.insert(account.id, account);
        Self { accounts: Mutex::new(map) }
    }

    pub fn get_snapshot(&self, id: Uuid) -> ConnectedAccount {
        self.accounts.lock().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl AccountStore for FakeAccountStore {
    async fn get(&self, id: Uuid) -> EngineResult<ConnectedAccount> {
        self.accounts.lock().unwrap().get(&id).cloned().ok_or_else(|| EngineError::NotFound(format!("account {id}")))
    }

    async fn set_connection_blocked_until(&self, id: Uuid, blocked_until: DateTime<Utc>) -> EngineResult<()> {
        let mut map = self.accounts.lock().unwrap();
        let account = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("account {id}")))?;
        let mut meta = account.parsed_metadata();
        meta.connection_request_blocked_until = Some(blocked_until);
        account.metadata = serde_json::to_value(meta).unwrap();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStepStore {
    pub steps: Mutex<HashMap<Uuid, WorkflowStep>>,
}

impl FakeStepStore {
    pub fn with(steps: Vec<WorkflowStep>) -> Self {
        Self { steps: Mutex::new(steps.into_iter().map(|s| (s.id, s)).collect()) }
    }

    pub fn get_snapshot(&self, id: Uuid) -> WorkflowStep {
        self.steps.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn all(&self) -> Vec<WorkflowStep> {
        self.steps.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl StepStore for FakeStepStore {
    async fn get(&self, id: Uuid) -> EngineResult<WorkflowStep> {
        self.steps.lock().unwrap().get(&id).cloned().ok_or_else(|| EngineError::NotFound(format!("step {id}")))
    }

    async fn due_pending(&self, now_unix_seconds: i64) -> EngineResult<Vec<WorkflowStep>> {
        Ok(self.steps.lock().unwrap().values().filter(|s| s.is_eligible(now_unix_seconds)).cloned().collect())
    }

    async fn for_leads(&self, lead_ids: &[Uuid]) -> EngineResult<Vec<WorkflowStep>> {
        Ok(self.steps.lock().unwrap().values().filter(|s| lead_ids.contains(&s.lead_id)).cloned().collect())
    }

    async fn failed_for_leads(&self, lead_ids: &[Uuid]) -> EngineResult<Vec<WorkflowStep>> {
        Ok(self
            .steps
            .lock()
            .unwrap()
            .values()
            .filter(|s| lead_ids.contains(&s.lead_id) && s.status().ok() == Some(crate::models::step::StepStatus::Failed))
            .cloned()
            .collect())
    }

    async fn pending_connection_requests_for_sender(&self, account_id: Uuid) -> EngineResult<Vec<WorkflowStep>> {
        let _ = account_id;
        Ok(self
            .steps
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.status().ok() == Some(crate::models::step::StepStatus::Pending)
                    && s.step_type().ok() == Some(crate::models::workflow::WorkflowNodeType::SendConnectionRequest)
            })
            .cloned()
            .collect())
    }

    async fn pending_message_reply_steps_for_provider_ids(&self, attendee_provider_ids: &[String]) -> EngineResult<Vec<WorkflowStep>> {
        Ok(self
            .steps
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.status().ok() == Some(crate::models::step::StepStatus::Pending)
                    && s.step_type().ok() == Some(crate::models::workflow::WorkflowNodeType::CheckMessageReply)
                    && s.raw_response
                        .get("providerId")
                        .and_then(serde_json::Value::as_str)
                        .map(|id| attendee_provider_ids.iter().any(|a| a == id))
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn create(&self, step: NewWorkflowStep) -> EngineResult<WorkflowStep> {
        let now = Utc::now();
        let step_type = serde_json::to_value(step.step_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let created = WorkflowStep {
            id: Uuid::new_v4(),
            organization_id: step.organization_id,
            lead_id: step.lead_id,
            campaign_id: step.campaign_id,
            id_in_workflow: step.id_in_workflow,
            step_index: step.step_index,
            workflow_type: crate::models::step::WORKFLOW_TYPE_CAMPAIGN.to_string(),
            step_type,
            status: "pending".to_string(),
            retries: step.retries,
            execute_after: step.execute_after,
            last_try_at: None,
            raw_response: step.raw_response,
            created_at: now,
            updated_at: now,
        };
        self.steps.lock().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_execute_after(&self, id: Uuid, execute_after: i64) -> EngineResult<()> {
        let mut map = self.steps.lock().unwrap();
        let step = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("step {id}")))?;
        step.execute_after = execute_after;
        Ok(())
    }

    async fn mark_complete(&self, id: Uuid, raw_response: serde_json::Value) -> EngineResult<()> {
        let mut map = self.steps.lock().unwrap();
        let step = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("step {id}")))?;
        step.status = "complete".to_string();
        step.raw_response = raw_response;
        step.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> EngineResult<()> {
        let mut map = self.steps.lock().unwrap();
        let step = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("step {id}")))?;
        step.status = "failed".to_string();
        step.retries += 1;
        step.last_try_at = Some(Utc::now());
        step.raw_response = serde_json::json!({ "error": error_message });
        Ok(())
    }

    async fn rearm(&self, id: Uuid, execute_after: i64) -> EngineResult<()> {
        let mut map = self.steps.lock().unwrap();
        let step = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("step {id}")))?;
        step.status = "pending".to_string();
        step.execute_after = execute_after;
        step.updated_at = Utc::now();
        Ok(())
    }

    async fn set_raw_response(&self, id: Uuid, raw_response: serde_json::Value) -> EngineResult<()> {
        let mut map = self.steps.lock().unwrap();
        let step = map.get_mut(&id).ok_or_else(|| EngineError::NotFound(format!("step {id}")))?;
        step.raw_response = raw_response;
        Ok(())
    }
}

/// Canned provider responses. Every field has a plausible default so a test
/// only sets the fields its scenario cares about.
pub struct FakeProviderClient {
    pub provider_id: String,
    pub send_invitation_error: Option<EngineError>,
    pub is_connected: bool,
    pub recent_posts: Vec<Post>,
    pub invitations_sent: Vec<Invitation>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeProviderClient {
    fn default() -> Self {
        Self {
            provider_id: "provider-1".to_string(),
            send_invitation_error: None,
            is_connected: false,
            recent_posts: Vec::new(),
            invitations_sent: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeProviderClient {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    async fn visit_profile(&self, _account_id: Uuid, _identifier: &str, _notify: bool) -> EngineResult<ProviderProfile> {
        self.record("visit_profile");
        Ok(ProviderProfile {
            provider_id: self.provider_id.clone(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            headline: Some("Engineer".to_string()),
            current_company: Some("Acme".to_string()),
            location: Some("Remote".to_string()),
            emails: vec!["ada@example.com".to_string()],
            phones: vec![],
        })
    }

    async fn send_invitation(&self, _account_id: Uuid, _provider_id: &str, _message: &str) -> EngineResult<()> {
        self.record("send_invitation");
        match &self.send_invitation_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn start_or_continue_chat(&self, _account_id: Uuid, _provider_ids: &[String], _text: &str) -> EngineResult<()> {
        self.record("start_or_continue_chat");
        Ok(())
    }

    async fn react_to_post(&self, _account_id: Uuid, _post_id: &str, _reaction_type: ReactionType) -> EngineResult<()> {
        self.record("react_to_post");
        Ok(())
    }

    async fn comment_post(&self, _account_id: Uuid, _post_id: &str, _text: &str) -> EngineResult<()> {
        self.record("comment_post");
        Ok(())
    }

    async fn list_recent_posts(&self, _account_id: Uuid, _identifier: &str, _last_days: i64, _limit: usize) -> EngineResult<Vec<Post>> {
        self.record("list_recent_posts");
        Ok(self.recent_posts.clone())
    }

    async fn list_invitations_sent(&self, _account_id: Uuid) -> EngineResult<Vec<Invitation>> {
        self.record("list_invitations_sent");
        Ok(self.invitations_sent.clone())
    }

    async fn cancel_invitation(&self, _account_id: Uuid, _invitation_id: &str) -> EngineResult<()> {
        self.record("cancel_invitation");
        Ok(())
    }

    async fn is_connected(&self, _account_id: Uuid, _identifier: &str) -> EngineResult<bool> {
        self.record("is_connected");
        Ok(self.is_connected)
    }
}

pub struct FakeWorkflowSource {
    pub workflow: Workflow,
}

#[async_trait]
impl WorkflowSource for FakeWorkflowSource {
    async fn load(&self, _location: &str) -> EngineResult<Workflow> {
        Ok(self.workflow.clone())
    }
}

pub struct FakeAlertSink {
    pub alerts: Mutex<Vec<(String, String)>>,
}

impl Default for FakeAlertSink {
    fn default() -> Self {
        Self { alerts: Mutex::new(Vec::new()) }
    }
}

impl crate::services::alert::AlertSink for FakeAlertSink {
    fn alert(&self, context: &str, message: &str) {
        self.alerts.lock().unwrap().push((context.to_string(), message.to_string()));
    }
}

pub struct FakeProspectListSource {
    pub rows: Vec<ProspectRow>,
}

#[async_trait]
impl ProspectListSource for FakeProspectListSource {
    async fn load(&self, _prospect_list_id: Uuid) -> EngineResult<Vec<ProspectRow>> {
        Ok(self.rows.clone())
    }
}

#[derive(Default)]
pub struct FakeLeadCreator {
    pub created: Mutex<Vec<(Uuid, Uuid, ProspectRow)>>,
}

#[async_trait]
impl LeadCreator for FakeLeadCreator {
    async fn create(&self, organization_id: Uuid, campaign_id: Uuid, row: &ProspectRow) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        self.created.lock().unwrap().push((organization_id, campaign_id, row.clone()));
        Ok(id)
    }
}

pub fn campaign_fixture(sender_account_id: Uuid, prospect_list_id: Uuid) -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        sender_account_id,
        prospect_list_id,
        workflow_file_location: "https://example.test/workflow.json".to_string(),
        status: "in_progress".to_string(),
        start_date: None,
        leads_per_day: 10,
        requests_sent_this_day: 0,
        requests_sent_this_week: 0,
        last_daily_requests_reset: now,
        last_weekly_requests_reset: now,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn lead_fixture(campaign_id: Uuid) -> Lead {
    let now = Utc::now();
    Lead {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        campaign_id,
        linkedin_url: "https://linkedin.com/in/ada".to_string(),
        public_identifier: Some("ada".to_string()),
        linkedin_id: Some("li-ada".to_string()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        title: None,
        company: None,
        email: None,
        phone: None,
        location: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn account_fixture() -> ConnectedAccount {
    let now = Utc::now();
    ConnectedAccount {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        provider: "linkedin".to_string(),
        provider_account_id: "sender-1".to_string(),
        status: "connected".to_string(),
        metadata: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}
