//! The provider client contract: a thin, typed wrapper around the external
//! messaging provider's API. This module only defines the contract and wire
//! types; `linkedin_client` supplies the concrete `reqwest`-based
//! implementation.
//!
//! Deliberately out of scope: the provider SDK itself is an external
//! collaborator. What lives here is only the seam the executor depends on,
//! so it can be faked in tests.

pub mod linkedin_client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub headline: Option<String>,
    pub current_company: Option<String>,
    pub location: Option<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub author_identifier: String,
    pub author_first_name: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub invitation_id: String,
    pub recipient_provider_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    Like,
    Celebrate,
    Support,
    Love,
    Insightful,
    Funny,
}

impl Default for ReactionType {
    fn default() -> Self {
        Self::Like
    }
}

/// External-facing wrapper over profile, invitation, message, reaction,
/// comment, withdraw, and relation-list operations. Every call may fail
/// with `EngineError::ProviderError` carrying one of the provider codes the
/// engine reacts to (`cannot_resend_yet`, `disconnected_account`,
/// `not_configured`).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn visit_profile(
        &self,
        account_id: uuid::Uuid,
        identifier: &str,
        notify: bool,
    ) -> EngineResult<ProviderProfile>;

    async fn send_invitation(
        &self,
        account_id: uuid::Uuid,
        provider_id: &str,
        message: &str,
    ) -> EngineResult<()>;

    async fn start_or_continue_chat(
        &self,
        account_id: uuid::Uuid,
        provider_ids: &[String],
        text: &str,
    ) -> EngineResult<()>;

    async fn react_to_post(
        &self,
        account_id: uuid::Uuid,
        post_id: &str,
        reaction_type: ReactionType,
    ) -> EngineResult<()>;

    async fn comment_post(
        &self,
        account_id: uuid::Uuid,
        post_id: &str,
        text: &str,
    ) -> EngineResult<()>;

    async fn list_recent_posts(
        &self,
        account_id: uuid::Uuid,
        identifier: &str,
        last_days: i64,
        limit: usize,
    ) -> EngineResult<Vec<Post>>;

    async fn list_invitations_sent(&self, account_id: uuid::Uuid) -> EngineResult<Vec<Invitation>>;

    async fn cancel_invitation(
        &self,
        account_id: uuid::Uuid,
        invitation_id: &str,
    ) -> EngineResult<()>;

    async fn is_connected(&self, account_id: uuid::Uuid, identifier: &str) -> EngineResult<bool>;
}
