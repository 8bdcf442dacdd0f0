use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::services::encryption::EncryptionService;
use crate::store::AccountStore;

use super::{Invitation, Post, ProviderClient, ProviderProfile, ReactionType};

/// Resolved calling context for one provider request: which sender account
/// to act as, and its decrypted session credential when the account carries
/// one.
struct SenderContext {
    provider_account_id: String,
    session_token: Option<String>,
}

/// `reqwest`-based implementation of [`ProviderClient`] against the external
/// LinkedIn-automation API: a single shared `Client`, a `headers()` helper
/// carrying auth, and one method per endpoint that maps non-2xx bodies onto
/// a typed error.
pub struct LinkedinProviderClient {
    http: Client,
    base_url: String,
    api_key: String,
    accounts: Arc<dyn AccountStore>,
    encryption: Option<Arc<EncryptionService>>,
}

impl LinkedinProviderClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        accounts: Arc<dyn AccountStore>,
        encryption: Option<Arc<EncryptionService>>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            accounts,
            encryption,
        }
    }

    fn headers_for(&self, ctx: &SenderContext) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, "OutreachIQ/1.0".parse().unwrap());
        headers.insert(reqwest::header::ACCEPT, "application/json".parse().unwrap());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", self.api_key).parse().unwrap(),
        );
        if let Some(token) = &ctx.session_token {
            if let Ok(value) = token.parse() {
                headers.insert("X-Provider-Session-Token", value);
            }
        }
        headers
    }

    /// Resolves the sender account and, when it carries an encrypted
    /// session credential and an `EncryptionService` is configured, decrypts
    /// it on demand. An account with no encrypted token, or a client with no
    /// encryption key configured, proceeds on the app-level API key alone.
    async fn sender_context(&self, account_id: Uuid) -> EngineResult<SenderContext> {
        let account = self.accounts.get(account_id).await?;
        if account.status != "connected" {
            return Err(EngineError::provider(
                "disconnected_account",
                format!("account {account_id} is not connected"),
            ));
        }
        let meta = account.parsed_metadata();
        let session_token = match (meta.session_token_encrypted.as_deref(), &self.encryption) {
            (Some(encrypted_b64), Some(service)) => {
                let raw = BASE64
                    .decode(encrypted_b64)
                    .map_err(|e| EngineError::Transient(format!("invalid encrypted session token: {e}")))?;
                let token = service
                    .decrypt(&raw)
                    .map_err(EngineError::Transient)?;
                Some(token)
            }
            _ => None,
        };
        Ok(SenderContext {
            provider_account_id: account.provider_account_id,
            session_token,
        })
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> EngineResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("provider API error: {} - {}", status, body);
            let code = extract_provider_code(&body).unwrap_or_else(|| "other".to_string());
            return Err(EngineError::provider(code, format!("{status}: {body}")));
        }
        let parsed = response.json::<T>().await?;
        Ok(parsed)
    }

    async fn handle_ack(response: reqwest::Response) -> EngineResult<()> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("provider API error: {} - {}", status, body);
            let code = extract_provider_code(&body).unwrap_or_else(|| "other".to_string());
            return Err(EngineError::provider(code, format!("{status}: {body}")));
        }
        Ok(())
    }
}

fn extract_provider_code(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("code")?.as_str().map(str::to_string)
}

#[async_trait]
impl ProviderClient for LinkedinProviderClient {
    async fn visit_profile(
        &self,
        account_id: Uuid,
        identifier: &str,
        notify: bool,
    ) -> EngineResult<ProviderProfile> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!("{}/v1/profiles/visit", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers_for(&ctx))
            .json(&json!({ "sender": sender, "identifier": identifier, "notify": notify }))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn send_invitation(&self, account_id: Uuid, provider_id: &str, message: &str) -> EngineResult<()> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!("{}/v1/invitations/send", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers_for(&ctx))
            .json(&json!({ "sender": sender, "providerId": provider_id, "message": message }))
            .send()
            .await?;
        Self::handle_ack(response).await
    }

    async fn start_or_continue_chat(
        &self,
        account_id: Uuid,
        provider_ids: &[String],
        text: &str,
    ) -> EngineResult<()> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!("{}/v1/messages/send", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers_for(&ctx))
            .json(&json!({ "sender": sender, "providerIds": provider_ids, "text": text }))
            .send()
            .await?;
        Self::handle_ack(response).await
    }

    async fn react_to_post(&self, account_id: Uuid, post_id: &str, reaction_type: ReactionType) -> EngineResult<()> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!("{}/v1/posts/react", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers_for(&ctx))
            .json(&json!({ "sender": sender, "postId": post_id, "reactionType": reaction_type }))
            .send()
            .await?;
        Self::handle_ack(response).await
    }

    async fn comment_post(&self, account_id: Uuid, post_id: &str, text: &str) -> EngineResult<()> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!("{}/v1/posts/comment", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers_for(&ctx))
            .json(&json!({ "sender": sender, "postId": post_id, "text": text }))
            .send()
            .await?;
        Self::handle_ack(response).await
    }

    async fn list_recent_posts(
        &self,
        account_id: Uuid,
        identifier: &str,
        last_days: i64,
        limit: usize,
    ) -> EngineResult<Vec<Post>> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!(
            "{}/v1/posts/recent?sender={}&identifier={}&lastDays={}&limit={}",
            self.base_url, sender, identifier, last_days, limit
        );
        let response = self.http.get(&url).headers(self.headers_for(&ctx)).send().await?;
        Self::handle_response(response).await
    }

    async fn list_invitations_sent(&self, account_id: Uuid) -> EngineResult<Vec<Invitation>> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!("{}/v1/invitations/sent?sender={}", self.base_url, sender);
        let response = self.http.get(&url).headers(self.headers_for(&ctx)).send().await?;
        Self::handle_response(response).await
    }

    async fn cancel_invitation(&self, account_id: Uuid, invitation_id: &str) -> EngineResult<()> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!("{}/v1/invitations/cancel", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers_for(&ctx))
            .json(&json!({ "sender": sender, "invitationId": invitation_id }))
            .send()
            .await?;
        Self::handle_ack(response).await
    }

    async fn is_connected(&self, account_id: Uuid, identifier: &str) -> EngineResult<bool> {
        let ctx = self.sender_context(account_id).await?;
        let sender = ctx.provider_account_id.clone();
        let url = format!(
            "{}/v1/relations/is-connected?sender={}&identifier={}",
            self.base_url, sender, identifier
        );
        let response = self.http.get(&url).headers(self.headers_for(&ctx)).send().await?;
        #[derive(Deserialize)]
        struct IsConnectedResponse {
            connected: bool,
        }
        let parsed: IsConnectedResponse = Self::handle_response(response).await?;
        Ok(parsed.connected)
    }
}
