//! The HTTP surface: only the operations that are part of workflow
//! progression. General CRUD (lead import, campaign authoring, billing,
//! analytics) is an external collaborator and is not implemented here.

pub mod campaigns;
pub mod webhook;

use actix_web::{web, HttpResponse};

use crate::error::EngineError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/campaigns").configure(campaigns::configure))
        .service(web::scope("/webhooks").configure(webhook::configure))
        .route("/health", web::get().to(health));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Maps the engine's error taxonomy onto HTTP status codes. Callers of
/// start/pause/resume receive structured errors; the body always carries
/// `error_code` alongside the human-readable message.
pub fn engine_error_response(err: &EngineError) -> HttpResponse {
    let body = serde_json::json!({
        "error_code": err.error_code(),
        "message": err.to_string(),
    });
    match err {
        EngineError::NotFound(_) => HttpResponse::NotFound().json(body),
        EngineError::Validation(_) => HttpResponse::BadRequest().json(body),
        EngineError::Forbidden(_) => HttpResponse::Forbidden().json(body),
        EngineError::Conflict(_) => HttpResponse::Conflict().json(body),
        EngineError::RateLimited { .. } => HttpResponse::TooManyRequests().json(body),
        EngineError::ProviderError { .. } | EngineError::Transient(_) => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}
