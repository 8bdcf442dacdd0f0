//! Inbound reply webhook: a POST carrying `attendees[].attendee_provider_id`;
//! every `PENDING` `check_message_reply` step whose `raw_response.providerId`
//! matches one of those attendees gets `raw_response.hasReplied = true`.
//! Never fails the request on bookkeeping errors: it always returns
//! `{captured: true}` and logs.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::error;

use crate::store::StepStore;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/reply", web::post().to(receive_reply));
}

#[derive(Debug, Deserialize)]
struct Attendee {
    attendee_provider_id: String,
}

#[derive(Debug, Deserialize)]
struct ReplyWebhookPayload {
    #[serde(default)]
    attendees: Vec<Attendee>,
}

async fn receive_reply(
    steps: web::Data<Arc<dyn StepStore>>,
    body: web::Json<ReplyWebhookPayload>,
) -> HttpResponse {
    let provider_ids: Vec<String> = body
        .attendees
        .iter()
        .map(|a| a.attendee_provider_id.clone())
        .collect();

    if !provider_ids.is_empty() {
        match steps.pending_message_reply_steps_for_provider_ids(&provider_ids).await {
            Ok(matching) => {
                for step in matching {
                    let mut raw_response = step.raw_response.clone();
                    if let Some(obj) = raw_response.as_object_mut() {
                        obj.insert("hasReplied".to_string(), serde_json::Value::Bool(true));
                    }
                    if let Err(e) = steps.set_raw_response(step.id, raw_response).await {
                        error!(step_id = %step.id, error = %e, "failed to record reply on step");
                    }
                }
            }
            Err(e) => error!(error = %e, "failed to look up message-reply steps for webhook"),
        }
    }

    HttpResponse::Ok().json(serde_json::json!({ "captured": true }))
}
