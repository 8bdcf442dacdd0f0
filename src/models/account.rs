use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The sender account used to execute a campaign's steps. `metadata` is a
/// free-form JSON map; the fields the engine reads out of it are modeled by
/// `AccountMetadata` below rather than hand-rolled JSON-pointer lookups
/// scattered across the executor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConnectedAccount {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountMetadata {
    #[serde(default)]
    pub connection_request_blocked_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub daily_usage: i32,
    #[serde(default)]
    pub usage_reset_at: Option<DateTime<Utc>>,
    /// AES-256-GCM ciphertext of the provider session credential, base64
    /// encoded for JSON storage (see `services::encryption`).
    #[serde(default)]
    pub session_token_encrypted: Option<String>,
    #[serde(default)]
    pub encryption_key_id: Option<String>,
}

impl ConnectedAccount {
    pub fn parsed_metadata(&self) -> AccountMetadata {
        serde_json::from_value(self.metadata.clone()).unwrap_or_default()
    }

    /// While `now < connection_request_blocked_until`, no
    /// `send_connection_request` step for this sender may execute.
    pub fn is_connection_blocked(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let meta = self.parsed_metadata();
        meta.connection_request_blocked_until
            .filter(|&blocked_until| now < blocked_until)
    }
}
