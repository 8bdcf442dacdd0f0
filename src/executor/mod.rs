//! Step Executor: dispatches a single pending step by kind, updates step
//! state, and invokes the successor planner. This is the largest component
//! in the engine — most of the workflow's behavior lives in its per-kind
//! handlers.

pub mod planner;
pub mod templates;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::account::ConnectedAccount;
use crate::models::campaign::{Campaign, CampaignStatus};
use crate::models::lead::{Lead, LeadEnrichment};
use crate::models::step::WorkflowStep;
use crate::models::workflow::{Workflow, WorkflowNode, WorkflowNodeType};
use crate::provider::{ProviderClient, ProviderProfile, ReactionType};
use crate::rate_limit::{self, CampaignCounters, RateLimitConfig};
use crate::services::alert::AlertSink;
use crate::store::{self, AccountStore, CampaignStore, LeadStore, StepStore};
use crate::workflow_source::WorkflowSource;

use planner::HandlerOutcome;

pub struct StepExecutor {
    campaigns: Arc<dyn CampaignStore>,
    leads: Arc<dyn LeadStore>,
    accounts: Arc<dyn AccountStore>,
    steps: Arc<dyn StepStore>,
    provider: Arc<dyn ProviderClient>,
    workflows: Arc<dyn WorkflowSource>,
    rate_limit_config: RateLimitConfig,
    alert: Arc<dyn AlertSink>,
}

impl StepExecutor {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        leads: Arc<dyn LeadStore>,
        accounts: Arc<dyn AccountStore>,
        steps: Arc<dyn StepStore>,
        provider: Arc<dyn ProviderClient>,
        workflows: Arc<dyn WorkflowSource>,
        rate_limit_config: RateLimitConfig,
        alert: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            campaigns,
            leads,
            accounts,
            steps,
            provider,
            workflows,
            rate_limit_config,
            alert,
        }
    }

    /// Resolves lead, campaign, sender, and workflow for a pending step;
    /// returns silently if the campaign is paused.
    pub async fn execute_step(&self, step_id: Uuid) -> EngineResult<()> {
        let step = self.steps.get(step_id).await?;
        if !store::is_pending(&step) {
            return Ok(());
        }

        let campaign = self.campaigns.get(step.campaign_id).await?;
        if campaign.status().ok() == Some(CampaignStatus::Paused) {
            // Cancellation signal: leave the step untouched.
            return Ok(());
        }

        let lead = self.leads.get(step.lead_id).await?;
        let account = self.accounts.get(campaign.sender_account_id).await?;
        let workflow = self.workflows.load(&campaign.workflow_file_location).await?;

        let step_type = match step.step_type() {
            Ok(t) => t,
            Err(e) => {
                self.fail(&step, &e).await?;
                return Ok(());
            }
        };

        if !step_type.is_polling() && workflow.find_node(&step.id_in_workflow).is_none() {
            self.fail(&step, "Node not found in workflow").await?;
            return Ok(());
        }
        let node = workflow.find_node(&step.id_in_workflow);

        if step_type == WorkflowNodeType::SendConnectionRequest {
            match self
                .run_send_connection_request(&step, &campaign, &lead, &account, node)
                .await
            {
                Ok(Some(outcome)) => self.complete(&step, &workflow, step_type, outcome).await?,
                Ok(None) => {} // deferred: cooldown or rate-limit gate, step left PENDING
                Err(e) => self.fail_with_cooldown(&step, step_type, e).await?,
            }
            return Ok(());
        }

        let result = self.dispatch(&step, step_type, &lead, &account, node).await;

        match result {
            Ok(outcome) => self.complete(&step, &workflow, step_type, outcome).await?,
            Err(e) => self.fail_with_cooldown(&step, step_type, e).await?,
        }
        Ok(())
    }

    async fn complete(
        &self,
        step: &WorkflowStep,
        workflow: &Workflow,
        step_type: WorkflowNodeType,
        outcome: HandlerOutcome,
    ) -> EngineResult<()> {
        self.steps.mark_complete(step.id, outcome.execution_result.clone()).await?;
        let now = Utc::now();
        let successors = planner::plan_successors(now, workflow, step, step_type, &outcome);
        for successor in successors {
            self.steps.create(successor).await?;
        }
        Ok(())
    }

    async fn fail(&self, step: &WorkflowStep, message: &str) -> EngineResult<()> {
        self.steps.mark_failed(step.id, message).await?;
        Ok(())
    }

    /// Marks the step failed and, on a `cannot_resend_yet` provider error
    /// for a connection request, also applies the sender-wide cooldown.
    async fn fail_with_cooldown(
        &self,
        step: &WorkflowStep,
        step_type: WorkflowNodeType,
        error: EngineError,
    ) -> EngineResult<()> {
        warn!(step_id = %step.id, error = %error, "step execution failed");
        self.fail(step, &error.to_string()).await?;

        if step_type == WorkflowNodeType::SendConnectionRequest {
            if let EngineError::ProviderError { code, .. } = &error {
                if code.to_string() == "cannot_resend_yet" {
                    if let Err(e) = self.apply_sender_cooldown(step.campaign_id).await {
                        self.alert.alert("sender_cooldown", &e.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    async fn apply_sender_cooldown(&self, campaign_id: Uuid) -> EngineResult<()> {
        let campaign = self.campaigns.get(campaign_id).await?;
        let now = Utc::now();
        let blocked_until = now + chrono::Duration::hours(24);
        self.accounts
            .set_connection_blocked_until(campaign.sender_account_id, blocked_until)
            .await?;

        let pending = self
            .steps
            .pending_connection_requests_for_sender(campaign.sender_account_id)
            .await?;
        let execute_after = blocked_until.timestamp();
        for step in pending {
            self.steps.set_execute_after(step.id, execute_after).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        step: &WorkflowStep,
        step_type: WorkflowNodeType,
        lead: &Lead,
        account: &ConnectedAccount,
        node: Option<&WorkflowNode>,
    ) -> EngineResult<HandlerOutcome> {
        let identifier = lead_identifier(lead);
        let config = node.map(|n| &n.data.config).cloned().unwrap_or(json!({}));

        match step_type {
            WorkflowNodeType::ProfileVisit => self.handle_profile_visit(account.id, lead, &identifier).await,
            WorkflowNodeType::LikePost => self.handle_like_post(account.id, &identifier, &config).await,
            WorkflowNodeType::CommentPost => self.handle_comment_post(account.id, &identifier, &config).await,
            WorkflowNodeType::SendFollowup => self.handle_send_followup(account.id, lead, &identifier, &config).await,
            WorkflowNodeType::WithdrawRequest => self.handle_withdraw_request(account.id, lead).await,
            WorkflowNodeType::Webhook | WorkflowNodeType::SendInmail => Ok(HandlerOutcome::default()),
            WorkflowNodeType::CheckConnectionStatus => {
                self.handle_check_connection_status(account.id, &identifier, step).await
            }
            WorkflowNodeType::CheckMessageReply => self.handle_check_message_reply(step),
            WorkflowNodeType::SendConnectionRequest => unreachable!("handled by run_send_connection_request"),
            WorkflowNodeType::AddStep => Err(EngineError::Validation("addStep is a placeholder node".into())),
        }
    }

    async fn handle_profile_visit(
        &self,
        account_id: Uuid,
        lead: &Lead,
        identifier: &str,
    ) -> EngineResult<HandlerOutcome> {
        let profile = self.provider.visit_profile(account_id, identifier, false).await?;
        self.leads.apply_enrichment(lead.id, &enrichment_from_profile(&profile)).await?;
        Ok(HandlerOutcome {
            execution_result: json!({ "providerId": profile.provider_id }),
            should_poll: None,
        })
    }

    /// `send_connection_request`: the most constrained kind. Returns
    /// `Ok(Some(outcome))` on success, `Ok(None)` when a gate deferred the
    /// step (it stays `PENDING`), `Err` on a provider/database failure.
    async fn run_send_connection_request(
        &self,
        step: &WorkflowStep,
        campaign: &Campaign,
        lead: &Lead,
        account: &ConnectedAccount,
        node: Option<&WorkflowNode>,
    ) -> EngineResult<Option<HandlerOutcome>> {
        let now = Utc::now();

        if let Some(blocked_until) = account.is_connection_blocked(now) {
            self.steps.set_execute_after(step.id, blocked_until.timestamp()).await?;
            return Ok(None);
        }

        let counters = CampaignCounters {
            requests_sent_this_day: campaign.requests_sent_this_day,
            requests_sent_this_week: campaign.requests_sent_this_week,
            last_daily_requests_reset: campaign.last_daily_requests_reset,
            last_weekly_requests_reset: campaign.last_weekly_requests_reset,
        };
        let decision = rate_limit::check(now, counters, self.rate_limit_config);
        if !decision.can_proceed {
            if !decision.patch.is_empty() {
                self.campaigns.apply_counter_patch(campaign.id, &decision.patch).await?;
            }
            let wait_ms = decision.wait_until_ms.unwrap_or(0);
            self.steps
                .set_execute_after(step.id, (now.timestamp_millis() + wait_ms) / 1000)
                .await?;
            return Ok(None);
        }

        let identifier = lead_identifier(lead);
        let profile = self.provider.visit_profile(account.id, &identifier, false).await?;

        let config = node.map(|n| &n.data.config).cloned().unwrap_or(json!({}));
        let vars = template_vars(lead);
        let message = compose_message(&config, "useAI", "customMessage", DEFAULT_CONNECTION_MESSAGE, &vars);

        self.provider.send_invitation(account.id, &profile.provider_id, &message).await?;

        let patch = decision.patch.merge_increment(1, 1);
        self.campaigns.apply_counter_patch(campaign.id, &patch).await?;

        Ok(Some(HandlerOutcome {
            execution_result: json!({ "providerId": profile.provider_id, "pollingStartedAt": now.timestamp() }),
            should_poll: Some(WorkflowNodeType::CheckConnectionStatus),
        }))
    }

    async fn handle_like_post(&self, account_id: Uuid, identifier: &str, config: &Value) -> EngineResult<HandlerOutcome> {
        let last_days = config.get("lastDays").and_then(Value::as_i64).unwrap_or(7);
        let posts = self.provider.list_recent_posts(account_id, identifier, last_days, 25).await?;
        let Some(post) = posts.choose(&mut rand::thread_rng()) else {
            return Ok(HandlerOutcome { execution_result: json!({ "skipped": true }), should_poll: None });
        };
        let reaction = config
            .get("reactionType")
            .and_then(Value::as_str)
            .and_then(parse_reaction_type)
            .unwrap_or(ReactionType::Like);
        self.provider.react_to_post(account_id, &post.post_id, reaction).await?;
        Ok(HandlerOutcome {
            execution_result: json!({ "postId": post.post_id, "reactionType": reaction }),
            should_poll: None,
        })
    }

    async fn handle_comment_post(&self, account_id: Uuid, identifier: &str, config: &Value) -> EngineResult<HandlerOutcome> {
        let last_days = config.get("lastDays").and_then(Value::as_i64).unwrap_or(7);
        let posts = self.provider.list_recent_posts(account_id, identifier, last_days, 25).await?;
        let Some(post) = posts.choose(&mut rand::thread_rng()) else {
            return Ok(HandlerOutcome { execution_result: json!({ "skipped": true }), should_poll: None });
        };
        let mut vars = HashMap::new();
        if let Some(first_name) = &post.author_first_name {
            vars.insert("first_name", first_name.clone());
        }
        let comment = compose_message(config, "configureWithAI", "customComment", DEFAULT_COMMENT, &vars);
        self.provider.comment_post(account_id, &post.post_id, &comment).await?;
        Ok(HandlerOutcome {
            execution_result: json!({ "postId": post.post_id, "comment": comment }),
            should_poll: None,
        })
    }

    async fn handle_send_followup(
        &self,
        account_id: Uuid,
        lead: &Lead,
        identifier: &str,
        config: &Value,
    ) -> EngineResult<HandlerOutcome> {
        let now = Utc::now();
        let profile = self.provider.visit_profile(account_id, identifier, false).await?;
        let vars = template_vars(lead);
        let text = compose_message(config, "configureWithAI", "customMessage", DEFAULT_FOLLOWUP_MESSAGE, &vars);
        self.provider
            .start_or_continue_chat(account_id, &[profile.provider_id.clone()], &text)
            .await?;
        Ok(HandlerOutcome {
            execution_result: json!({ "providerId": profile.provider_id, "pollingStartedAt": now.timestamp() }),
            should_poll: Some(WorkflowNodeType::CheckMessageReply),
        })
    }

    async fn handle_withdraw_request(&self, account_id: Uuid, lead: &Lead) -> EngineResult<HandlerOutcome> {
        let provider_id = lead.linkedin_id.clone();
        let Some(provider_id) = provider_id else {
            return Ok(HandlerOutcome { execution_result: json!({ "skipped": true }), should_poll: None });
        };
        let invitations = self.provider.list_invitations_sent(account_id).await?;
        let Some(invitation) = invitations.iter().find(|i| i.recipient_provider_id == provider_id) else {
            return Ok(HandlerOutcome { execution_result: json!({ "skipped": true }), should_poll: None });
        };
        self.provider.cancel_invitation(account_id, &invitation.invitation_id).await?;
        Ok(HandlerOutcome {
            execution_result: json!({ "invitationId": invitation.invitation_id }),
            should_poll: None,
        })
    }

    async fn handle_check_connection_status(
        &self,
        account_id: Uuid,
        identifier: &str,
        step: &WorkflowStep,
    ) -> EngineResult<HandlerOutcome> {
        let is_connected = self.provider.is_connected(account_id, identifier).await?;
        self.finish_poll(step, is_connected, "isConnected")
    }

    /// `check_message_reply` never calls the provider: `hasReplied` is
    /// written by the inbound reply webhook.
    fn handle_check_message_reply(&self, step: &WorkflowStep) -> EngineResult<HandlerOutcome> {
        let has_replied = step
            .raw_response
            .get("hasReplied")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.finish_poll(step, has_replied, "hasReplied")
    }

    fn finish_poll(&self, step: &WorkflowStep, outcome: bool, outcome_key: &str) -> EngineResult<HandlerOutcome> {
        let provider_id = step.raw_response.get("providerId").cloned().unwrap_or(Value::Null);
        let next_steps_info = step.raw_response.get("nextStepsInfo").cloned().unwrap_or(json!([]));
        let polling_started_at = step.raw_response.get("pollingStartedAt").and_then(Value::as_i64).unwrap_or(0);

        let timeout_ms = next_steps_info
            .as_array()
            .and_then(|arr| {
                arr.iter().find(|n| n.get("conditionalType").and_then(Value::as_str) == Some("accepted"))
            })
            .and_then(|n| n.get("delayMs"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let timeout_seconds = timeout_ms / 1000;

        let now_unix = Utc::now().timestamp();
        let has_timed_out = (now_unix - polling_started_at) > timeout_seconds;
        let should_continue_polling = !outcome && !has_timed_out;

        info!(step_id = %step.id, outcome, has_timed_out, "poll evaluated");

        Ok(HandlerOutcome {
            execution_result: json!({
                outcome_key: outcome,
                "providerId": provider_id,
                "nextStepsInfo": next_steps_info,
                "pollingStartedAt": polling_started_at,
                "shouldContinuePolling": should_continue_polling,
                "hasTimedOut": has_timed_out,
            }),
            should_poll: None,
        })
    }
}

const DEFAULT_CONNECTION_MESSAGE: &str = "Hi {{first_name}}, I'd love to connect.";
const DEFAULT_FOLLOWUP_MESSAGE: &str = "Hi {{first_name}}, just following up on my connection request.";
const DEFAULT_COMMENT: &str = "Great post, {{first_name}}!";

fn lead_identifier(lead: &Lead) -> String {
    lead.public_identifier.clone().unwrap_or_else(|| lead.linkedin_url.clone())
}

fn template_vars(lead: &Lead) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("first_name", lead.first_name_or_default().to_string());
    if let Some(last_name) = &lead.last_name {
        vars.insert("last_name", last_name.clone());
    }
    if let Some(company) = &lead.company {
        vars.insert("company", company.clone());
    }
    vars
}

/// Composes message/comment text. AI-generated text is outside this engine's
/// scope (no AI client is part of the provider contract), so a
/// `useAI`/`configureWithAI` flag falls back to the configured custom text
/// the same as when the flag is absent, and finally to `default`. Templates
/// are then substituted.
fn compose_message(config: &Value, ai_flag_key: &str, custom_key: &str, default: &str, vars: &HashMap<&str, String>) -> String {
    let _ = config.get(ai_flag_key); // acknowledged, but no AI backend is wired up
    let raw = config
        .get(custom_key)
        .and_then(Value::as_str)
        .unwrap_or(default);
    templates::render(raw, vars)
}

fn parse_reaction_type(s: &str) -> Option<ReactionType> {
    match s {
        "like" => Some(ReactionType::Like),
        "celebrate" => Some(ReactionType::Celebrate),
        "support" => Some(ReactionType::Support),
        "love" => Some(ReactionType::Love),
        "insightful" => Some(ReactionType::Insightful),
        "funny" => Some(ReactionType::Funny),
        _ => None,
    }
}

fn enrichment_from_profile(profile: &ProviderProfile) -> LeadEnrichment {
    LeadEnrichment {
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        title: profile.headline.clone(),
        company: profile.current_company.clone(),
        email: profile.emails.first().cloned(),
        phone: profile.phones.first().cloned(),
        location: profile.location.clone(),
        linkedin_id: Some(profile.provider_id.clone()),
        public_identifier: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::AccountMetadata;
    use crate::models::step::WORKFLOW_TYPE_CAMPAIGN;
    use crate::models::workflow::{EdgeData, NodeData, WorkflowEdge};
    use crate::rate_limit::RateLimitConfig;
    use crate::test_support::{
        account_fixture, campaign_fixture, lead_fixture, FakeAccountStore, FakeAlertSink,
        FakeCampaignStore, FakeLeadStore, FakeProviderClient, FakeStepStore, FakeWorkflowSource,
    };

    fn workflow_with_connection_request() -> Workflow {
        Workflow {
            nodes: vec![
                WorkflowNode {
                    id: "a".to_string(),
                    kind: "action".to_string(),
                    data: NodeData { node_type: WorkflowNodeType::SendConnectionRequest, config: json!({}) },
                },
                WorkflowNode {
                    id: "b".to_string(),
                    kind: "action".to_string(),
                    data: NodeData { node_type: WorkflowNodeType::SendFollowup, config: json!({}) },
                },
            ],
            edges: vec![WorkflowEdge {
                id: "e1".to_string(),
                source: "a".to_string(),
                target: "b".to_string(),
                data: EdgeData::default(),
            }],
        }
    }

    fn connection_request_step(campaign_id: Uuid, lead_id: Uuid, organization_id: Uuid) -> WorkflowStep {
        let now = Utc::now();
        WorkflowStep {
            id: Uuid::new_v4(),
            organization_id,
            lead_id,
            campaign_id,
            id_in_workflow: "a".to_string(),
            step_index: 0,
            workflow_type: WORKFLOW_TYPE_CAMPAIGN.to_string(),
            step_type: "send_connection_request".to_string(),
            status: "pending".to_string(),
            retries: 0,
            execute_after: 0,
            last_try_at: None,
            raw_response: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    struct Harness {
        executor: StepExecutor,
        campaigns: Arc<FakeCampaignStore>,
        accounts: Arc<FakeAccountStore>,
        steps: Arc<FakeStepStore>,
        provider: Arc<FakeProviderClient>,
        alert: Arc<FakeAlertSink>,
    }

    fn harness(
        campaign: crate::models::campaign::Campaign,
        account: crate::models::account::ConnectedAccount,
        lead: crate::models::lead::Lead,
        step: WorkflowStep,
        provider: FakeProviderClient,
        rate_limit_config: RateLimitConfig,
    ) -> (Harness, Uuid) {
        let step_id = step.id;
        let campaigns = Arc::new(FakeCampaignStore::with(campaign));
        let accounts = Arc::new(FakeAccountStore::with(account));
        let leads = Arc::new(FakeLeadStore::with(vec![lead]));
        let steps = Arc::new(FakeStepStore::with(vec![step]));
        let provider = Arc::new(provider);
        let workflows = Arc::new(FakeWorkflowSource { workflow: workflow_with_connection_request() });
        let alert = Arc::new(FakeAlertSink::default());

        let executor = StepExecutor::new(
            campaigns.clone(),
            leads,
            accounts.clone(),
            steps.clone(),
            provider.clone(),
            workflows,
            rate_limit_config,
            alert.clone(),
        );
        (Harness { executor, campaigns, accounts, steps, provider, alert }, step_id)
    }

    #[tokio::test]
    async fn cooldown_gate_defers_the_step_without_calling_the_provider() {
        let campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;
        let account_id = account.id;
        let blocked_until = Utc::now() + chrono::Duration::hours(12);
        account.metadata = serde_json::to_value(AccountMetadata {
            connection_request_blocked_until: Some(blocked_until),
            ..Default::default()
        })
        .unwrap();

        let lead = lead_fixture(campaign.id);
        let step = connection_request_step(campaign.id, lead.id, campaign.organization_id);

        let (h, step_id) = harness(campaign, account, lead, step, FakeProviderClient::default(), RateLimitConfig::default());
        h.executor.execute_step(step_id).await.unwrap();

        let after = h.steps.get_snapshot(step_id);
        assert_eq!(after.status, "pending");
        assert_eq!(after.execute_after, blocked_until.timestamp());
        assert!(h.provider.calls.lock().unwrap().is_empty());

        let account_after = h.accounts.get_snapshot(account_id);
        assert!(account_after.is_connection_blocked(Utc::now()).is_some());
    }

    #[tokio::test]
    async fn rate_limit_gate_defers_the_step_without_calling_the_provider() {
        let campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;

        let lead = lead_fixture(campaign.id);
        let step = connection_request_step(campaign.id, lead.id, campaign.organization_id);

        let config = RateLimitConfig { daily_limit: 0, weekly_limit: 200 };
        let (h, step_id) = harness(campaign, account, lead, step, FakeProviderClient::default(), config);
        h.executor.execute_step(step_id).await.unwrap();

        let after = h.steps.get_snapshot(step_id);
        assert_eq!(after.status, "pending");
        assert!(after.execute_after > 0);
        assert!(h.provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_connection_request_increments_counters_and_schedules_a_poll() {
        let campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        let campaign_id = campaign.id;
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;

        let lead = lead_fixture(campaign.id);
        let step = connection_request_step(campaign.id, lead.id, campaign.organization_id);

        let (h, step_id) = harness(campaign, account, lead, step, FakeProviderClient::default(), RateLimitConfig::default());
        h.executor.execute_step(step_id).await.unwrap();

        let after = h.steps.get_snapshot(step_id);
        assert_eq!(after.status, "complete");

        let campaign_after = h.campaigns.get_snapshot(campaign_id);
        assert_eq!(campaign_after.requests_sent_this_day, 1);
        assert_eq!(campaign_after.requests_sent_this_week, 1);

        let all_steps = h.steps.all();
        assert_eq!(all_steps.len(), 2);
        let polling = all_steps.iter().find(|s| s.id != step_id).unwrap();
        assert_eq!(polling.step_type, "check_connection_status");
        assert_eq!(polling.id_in_workflow, "a");
    }

    #[tokio::test]
    async fn cannot_resend_yet_applies_sender_cooldown_and_defers_other_pending_requests() {
        let campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;
        let account_id = account.id;

        let lead = lead_fixture(campaign.id);
        let step = connection_request_step(campaign.id, lead.id, campaign.organization_id);
        let step_id = step.id;

        let other_lead = lead_fixture(campaign.id);
        let other_step = connection_request_step(campaign.id, other_lead.id, campaign.organization_id);
        let other_step_id = other_step.id;

        let campaigns = Arc::new(FakeCampaignStore::with(campaign.clone()));
        let accounts = Arc::new(FakeAccountStore::with(account));
        let leads = Arc::new(FakeLeadStore::with(vec![lead, other_lead]));
        let steps = Arc::new(FakeStepStore::with(vec![step, other_step]));
        let provider = Arc::new(FakeProviderClient {
            send_invitation_error: Some(EngineError::provider("cannot_resend_yet", "try later")),
            ..FakeProviderClient::default()
        });
        let workflows = Arc::new(FakeWorkflowSource { workflow: workflow_with_connection_request() });
        let alert = Arc::new(FakeAlertSink::default());

        let executor = StepExecutor::new(
            campaigns.clone(),
            leads,
            accounts.clone(),
            steps.clone(),
            provider,
            workflows,
            RateLimitConfig::default(),
            alert,
        );

        executor.execute_step(step_id).await.unwrap();

        let failed = steps.get_snapshot(step_id);
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.retries, 1);

        let blocked_account = accounts.get_snapshot(account_id);
        assert!(blocked_account.is_connection_blocked(Utc::now()).is_some());

        let other_after = steps.get_snapshot(other_step_id);
        assert!(other_after.execute_after > 0);
        assert_eq!(other_after.status, "pending");
    }

    #[tokio::test]
    async fn paused_campaign_leaves_the_step_untouched() {
        let mut campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        campaign.status = "paused".to_string();
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;

        let lead = lead_fixture(campaign.id);
        let step = connection_request_step(campaign.id, lead.id, campaign.organization_id);

        let (h, step_id) = harness(campaign, account, lead, step, FakeProviderClient::default(), RateLimitConfig::default());
        h.executor.execute_step(step_id).await.unwrap();

        let after = h.steps.get_snapshot(step_id);
        assert_eq!(after.status, "pending");
        assert_eq!(after.execute_after, 0);
        assert!(h.provider.calls.lock().unwrap().is_empty());
        assert!(h.alert.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn check_message_reply_reads_raw_response_without_calling_the_provider() {
        let campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;

        let lead = lead_fixture(campaign.id);
        let now = Utc::now();
        let mut step = connection_request_step(campaign.id, lead.id, campaign.organization_id);
        step.step_type = "check_message_reply".to_string();
        step.id_in_workflow = "b".to_string();
        step.raw_response = json!({
            "hasReplied": true,
            "providerId": "p1",
            "nextStepsInfo": [],
            "pollingStartedAt": now.timestamp(),
        });

        let (h, step_id) = harness(campaign, account, lead, step, FakeProviderClient::default(), RateLimitConfig::default());
        h.executor.execute_step(step_id).await.unwrap();

        let after = h.steps.get_snapshot(step_id);
        assert_eq!(after.status, "complete");
        assert_eq!(after.raw_response.get("hasReplied").and_then(Value::as_bool), Some(true));
        assert!(h.provider.calls.lock().unwrap().is_empty());
    }

    /// Regression coverage for spec scenario 2 (timeout takes the
    /// `not_accepted` path): the accepted branch's `delayMs`, carried in
    /// `raw_response.nextStepsInfo` the same way the planner writes it, must
    /// actually be read back to compute the timeout window.
    fn next_steps_info_with_accepted_delay(delay_ms: i64) -> Value {
        serde_json::to_value(vec![crate::graph::NextStepInfo {
            node_id: "b".to_string(),
            edge_id: "e1".to_string(),
            delay_ms,
            is_conditional: true,
            conditional_type: Some(crate::graph::ConditionalTypeWire::Accepted),
        }])
        .unwrap()
    }

    fn check_connection_status_step(
        campaign_id: Uuid,
        lead_id: Uuid,
        organization_id: Uuid,
        polling_started_at: i64,
        delay_ms: i64,
    ) -> WorkflowStep {
        let mut step = connection_request_step(campaign_id, lead_id, organization_id);
        step.step_type = "check_connection_status".to_string();
        step.raw_response = json!({
            "providerId": "p1",
            "nextStepsInfo": next_steps_info_with_accepted_delay(delay_ms),
            "pollingStartedAt": polling_started_at,
        });
        step
    }

    #[tokio::test]
    async fn check_connection_status_before_the_accepted_window_keeps_polling() {
        let campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;
        let lead = lead_fixture(campaign.id);

        let two_days_ms = 2 * 24 * 3_600 * 1_000;
        let polling_started_at = (Utc::now() - chrono::Duration::hours(1)).timestamp();
        let step = check_connection_status_step(campaign.id, lead.id, campaign.organization_id, polling_started_at, two_days_ms);

        let provider = FakeProviderClient { is_connected: false, ..FakeProviderClient::default() };
        let (h, step_id) = harness(campaign, account, lead, step, provider, RateLimitConfig::default());
        h.executor.execute_step(step_id).await.unwrap();

        let after = h.steps.get_snapshot(step_id);
        assert_eq!(after.raw_response.get("hasTimedOut").and_then(Value::as_bool), Some(false));
        assert_eq!(after.raw_response.get("shouldContinuePolling").and_then(Value::as_bool), Some(true));
    }

    #[tokio::test]
    async fn check_connection_status_past_the_accepted_window_times_out() {
        let campaign = campaign_fixture(Uuid::new_v4(), Uuid::new_v4());
        let mut account = account_fixture();
        account.id = campaign.sender_account_id;
        let lead = lead_fixture(campaign.id);

        let two_days_ms = 2 * 24 * 3_600 * 1_000;
        let polling_started_at = (Utc::now() - chrono::Duration::days(2) - chrono::Duration::hours(1)).timestamp();
        let step = check_connection_status_step(campaign.id, lead.id, campaign.organization_id, polling_started_at, two_days_ms);

        let provider = FakeProviderClient { is_connected: false, ..FakeProviderClient::default() };
        let (h, step_id) = harness(campaign, account, lead, step, provider, RateLimitConfig::default());
        h.executor.execute_step(step_id).await.unwrap();

        let after = h.steps.get_snapshot(step_id);
        assert_eq!(after.raw_response.get("hasTimedOut").and_then(Value::as_bool), Some(true));
        assert_eq!(after.raw_response.get("shouldContinuePolling").and_then(Value::as_bool), Some(false));
    }
}
