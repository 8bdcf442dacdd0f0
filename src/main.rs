use std::sync::Arc;

use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use outreachiq::api;
use outreachiq::config::EngineConfig;
use outreachiq::orchestrator::CampaignOrchestrator;
use outreachiq::store::postgres::{PgAccountStore, PgCampaignStore, PgLeadCreator, PgLeadStore, PgProspectListSource, PgStepStore};
use outreachiq::store::{AccountStore, CampaignStore, LeadStore, StepStore};
use outreachiq::workflow_source::{HttpWorkflowSource, WorkflowSource};

/// `outreachiq-api`: the thin `actix-web` surface exposing only the
/// operations that are genuinely part of workflow progression. General CRUD
/// lives in an external collaborator and is not implemented here.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
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
    let steps: Arc<dyn StepStore> = Arc::new(PgStepStore::new(pool.clone()));
    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));

    let prospect_lists = Arc::new(PgProspectListSource::new(pool.clone()));
    let lead_creator = Arc::new(PgLeadCreator::new(pool.clone()));
    let workflows: Arc<dyn WorkflowSource> = Arc::new(HttpWorkflowSource::new());

    let orchestrator = Arc::new(CampaignOrchestrator::new(
        campaigns.clone(),
        leads.clone(),
        steps.clone(),
        accounts,
        prospect_lists,
        lead_creator,
        workflows,
    ));

    tracing::info!("OutreachIQ API starting on http://0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(orchestrator.clone()))
            .app_data(web::Data::new(steps.clone()))
            .wrap(actix_middleware::Logger::default())
            .service(web::scope("/api").configure(api::configure))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
