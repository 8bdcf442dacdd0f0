//! `POST /campaigns/{id}/start|pause|resume`, `GET /campaigns/{id}/status`.
//! These are the only campaign operations this engine owns; campaign
//! authoring/CRUD lives in an external collaborator.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::orchestrator::CampaignOrchestrator;

use super::engine_error_response;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/start", web::post().to(start_campaign))
        .route("/{id}/pause", web::post().to(pause_campaign))
        .route("/{id}/resume", web::post().to(resume_campaign))
        .route("/{id}/status", web::get().to(get_campaign_status));
}

async fn start_campaign(
    orchestrator: web::Data<Arc<CampaignOrchestrator>>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match orchestrator.start_campaign(path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "started": true })),
        Err(e) => engine_error_response(&e),
    }
}

async fn pause_campaign(
    orchestrator: web::Data<Arc<CampaignOrchestrator>>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match orchestrator.pause_campaign(path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "paused": true })),
        Err(e) => engine_error_response(&e),
    }
}

async fn resume_campaign(
    orchestrator: web::Data<Arc<CampaignOrchestrator>>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match orchestrator.resume_campaign(path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "resumed": true })),
        Err(e) => engine_error_response(&e),
    }
}

async fn get_campaign_status(
    orchestrator: web::Data<Arc<CampaignOrchestrator>>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match orchestrator.campaign_status(path.into_inner()).await {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => engine_error_response(&e),
    }
}
