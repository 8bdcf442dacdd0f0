//! Tick Driver: the four periodic tasks that fan out across campaigns and
//! due steps. Each task runs on its own cadence in its own loop; an
//! overlapping firing is skipped rather than queued.
//!
//! Errors within one unit (a campaign, a step) are caught, logged, and
//! optionally forwarded to the alert sink; they never abort the rest of the
//! tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::executor::StepExecutor;
use crate::models::campaign::Campaign;
use crate::orchestrator::CampaignOrchestrator;
use crate::services::alert::AlertSink;
use crate::store::{CampaignStore, LeadStore, StepStore};

pub struct TickDriver {
    campaigns: Arc<dyn CampaignStore>,
    leads: Arc<dyn LeadStore>,
    steps: Arc<dyn StepStore>,
    orchestrator: Arc<CampaignOrchestrator>,
    executor: Arc<StepExecutor>,
    alert: Arc<dyn AlertSink>,
}

impl TickDriver {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        leads: Arc<dyn LeadStore>,
        steps: Arc<dyn StepStore>,
        orchestrator: Arc<CampaignOrchestrator>,
        executor: Arc<StepExecutor>,
        alert: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            campaigns,
            leads,
            steps,
            orchestrator,
            executor,
            alert,
        }
    }

    /// `check-scheduled-campaigns` (hourly): every campaign in
    /// `SCHEDULED`/`DRAFT` with a non-null `start_date <= now` is started.
    async fn check_scheduled_campaigns(&self) {
        let now = Utc::now();
        let due = match self.campaigns.due_scheduled(now).await {
            Ok(campaigns) => campaigns,
            Err(e) => {
                self.log_and_alert("check-scheduled-campaigns", &e.to_string());
                return;
            }
        };
        for campaign in due {
            if let Err(e) = self.orchestrator.start_campaign(campaign.id).await {
                self.log_and_alert(
                    "check-scheduled-campaigns",
                    &format!("campaign {} failed to start: {e}", campaign.id),
                );
            }
        }
    }

    /// `start-daily-leads` (once daily): admits up to `leads_per_day`
    /// unstarted leads per `IN_PROGRESS` campaign.
    async fn start_daily_leads(&self) {
        let campaigns = match self.campaigns.in_progress().await {
            Ok(c) => c,
            Err(e) => {
                self.log_and_alert("start-daily-leads", &e.to_string());
                return;
            }
        };
        for campaign in &campaigns {
            if let Err(e) = self.orchestrator.admit_daily_leads(campaign).await {
                self.log_and_alert(
                    "start-daily-leads",
                    &format!("campaign {} admission failed: {e}", campaign.id),
                );
            }
        }
    }

    /// `process-daily-leads` (every minute): executes every due `PENDING`
    /// step one at a time, in store order — the safe default because the
    /// rate-limit gate and the sender cooldown are read-modify-write
    /// operations.
    async fn process_daily_leads(&self) {
        let now = Utc::now().timestamp();
        let due = match self.steps.due_pending(now).await {
            Ok(steps) => steps,
            Err(e) => {
                self.log_and_alert("process-daily-leads", &e.to_string());
                return;
            }
        };
        for step in due {
            if let Err(e) = self.executor.execute_step(step.id).await {
                self.log_and_alert(
                    "process-daily-leads",
                    &format!("step {} failed: {e}", step.id),
                );
            }
        }
    }

    /// `retry-failed-steps` (hourly): re-arms `FAILED` steps of
    /// `IN_PROGRESS` campaigns to `PENDING` and re-executes them
    /// immediately.
    async fn retry_failed_steps(&self) {
        let campaigns = match self.campaigns.in_progress().await {
            Ok(c) => c,
            Err(e) => {
                self.log_and_alert("retry-failed-steps", &e.to_string());
                return;
            }
        };
        for campaign in &campaigns {
            if let Err(e) = self.retry_failed_steps_for_campaign(campaign).await {
                self.log_and_alert(
                    "retry-failed-steps",
                    &format!("campaign {} retry pass failed: {e}", campaign.id),
                );
            }
        }
    }

    async fn retry_failed_steps_for_campaign(&self, campaign: &Campaign) -> crate::error::EngineResult<()> {
        let leads = self.leads.list_for_campaign(campaign.id).await?;
        let lead_ids: Vec<Uuid> = leads.iter().map(|l| l.id).collect();
        let failed = self.steps.failed_for_leads(&lead_ids).await?;
        let now = Utc::now().timestamp();
        for step in failed {
            if let Err(e) = self.steps.rearm(step.id, now).await {
                self.log_and_alert("retry-failed-steps", &format!("step {} rearm failed: {e}", step.id));
                continue;
            }
            if let Err(e) = self.executor.execute_step(step.id).await {
                self.log_and_alert("retry-failed-steps", &format!("step {} retry failed: {e}", step.id));
            }
        }
        Ok(())
    }

    fn log_and_alert(&self, task: &str, message: &str) {
        warn!(task, message, "tick task error");
        self.alert.alert(task, message);
    }
}

/// Handles for the four spawned task loops, used to drive graceful shutdown:
/// stop the cron driver, wait up to a grace period, then force exit.
pub struct TickDriverHandle {
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl TickDriverHandle {
    /// Aborts all four loops and waits up to `grace` for them to unwind.
    pub async fn shutdown(self, grace: Duration) {
        for task in &self.tasks {
            task.abort();
        }
        let _ = tokio::time::timeout(grace, futures_util::future::join_all(self.tasks)).await;
    }
}

const HOURLY: Duration = Duration::from_secs(3600);
const EVERY_MINUTE: Duration = Duration::from_secs(60);
const DAILY: Duration = Duration::from_secs(86_400);

/// Spawns the four periodic tasks, each on its own tokio task with its own
/// cadence and its own overlap guard.
pub fn spawn(driver: Arc<TickDriver>) -> TickDriverHandle {
    let tasks = vec![
        spawn_loop(driver.clone(), HOURLY, "check-scheduled-campaigns", |d| {
            Box::pin(async move { d.check_scheduled_campaigns().await })
        }),
        spawn_loop(driver.clone(), DAILY, "start-daily-leads", |d| {
            Box::pin(async move { d.start_daily_leads().await })
        }),
        spawn_loop(driver.clone(), EVERY_MINUTE, "process-daily-leads", |d| {
            Box::pin(async move { d.process_daily_leads().await })
        }),
        spawn_loop(driver.clone(), HOURLY, "retry-failed-steps", |d| {
            Box::pin(async move { d.retry_failed_steps().await })
        }),
    ];
    TickDriverHandle { tasks }
}

type BoxedTickFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>>;

fn spawn_loop(
    driver: Arc<TickDriver>,
    period: Duration,
    name: &'static str,
    task: impl Fn(Arc<TickDriver>) -> BoxedTickFuture<'static> + Send + Sync + 'static,
) -> tokio::task::JoinHandle<()> {
    let in_flight = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if in_flight.swap(true, Ordering::SeqCst) {
                warn!(task = name, "tick skipped: previous run still in flight");
                continue;
            }
            info!(task = name, "tick started");
            task(driver.clone()).await;
            info!(task = name, "tick finished");
            in_flight.store(false, Ordering::SeqCst);
        }
    })
}
