use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use outreachiq::config::EngineConfig;
use outreachiq::executor::StepExecutor;
use outreachiq::orchestrator::CampaignOrchestrator;
use outreachiq::provider::linkedin_client::LinkedinProviderClient;
use outreachiq::provider::ProviderClient;
use outreachiq::services::alert::{AlertSink, TracingAlertSink};
use outreachiq::services::encryption::EncryptionService;
use outreachiq::store::postgres::{PgAccountStore, PgCampaignStore, PgLeadCreator, PgLeadStore, PgProspectListSource, PgStepStore};
use outreachiq::store::{AccountStore, CampaignStore, LeadStore, StepStore};
use outreachiq::tick::{self, TickDriver};
use outreachiq::workflow_source::{HttpWorkflowSource, WorkflowSource};

/// `outreachiq-worker`: the Tick Driver process. Runs the four periodic
/// tasks on their own cadences until told to shut down, at which point it
/// stops the driver, waits up to `TICK_SHUTDOWN_GRACE_SECS`, and then exits.
#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to create database pool");
    let pool = Arc::new(pool);

    let campaigns: Arc<dyn CampaignStore> = Arc::new(PgCampaignStore::new(pool.clone()));
    let leads: Arc<dyn LeadStore> = Arc::new(PgLeadStore::new(pool.clone()));
    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));
    let steps: Arc<dyn StepStore> = Arc::new(PgStepStore::new(pool.clone()));

    let prospect_lists = Arc::new(PgProspectListSource::new(pool.clone()));
    let lead_creator = Arc::new(PgLeadCreator::new(pool.clone()));
    let workflows: Arc<dyn WorkflowSource> = Arc::new(HttpWorkflowSource::new());

    let encryption = if config.encryption_key.is_some() {
        Some(Arc::new(
            EncryptionService::new().expect("ENCRYPTION_KEY is configured but invalid"),
        ))
    } else {
        None
    };

    let provider: Arc<dyn ProviderClient> = Arc::new(LinkedinProviderClient::new(
        config.provider_base_url.clone(),
        config.provider_api_key.clone(),
        accounts.clone(),
        encryption,
    ));
    let alert: Arc<dyn AlertSink> = Arc::new(TracingAlertSink);

    let orchestrator = Arc::new(CampaignOrchestrator::new(
        campaigns.clone(),
        leads.clone(),
        steps.clone(),
        accounts.clone(),
        prospect_lists,
        lead_creator,
        workflows.clone(),
    ));

    let executor = Arc::new(StepExecutor::new(
        campaigns.clone(),
        leads.clone(),
        accounts.clone(),
        steps.clone(),
        provider,
        workflows,
        config.rate_limit,
        alert.clone(),
    ));

    let driver = Arc::new(TickDriver::new(
        campaigns,
        leads,
        steps,
        orchestrator,
        executor,
        alert,
    ));

    tracing::info!("OutreachIQ worker started");
    let handle = tick::spawn(driver);

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }

    tracing::info!("shutdown requested, stopping tick driver");
    handle.shutdown(config.tick_shutdown_grace).await;
    tracing::info!("tick driver stopped, exiting");
}
