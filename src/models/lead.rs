use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A lead imported into a campaign. Attribute fields are enriched in place
/// by `profile_visit` execution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub campaign_id: Uuid,
    pub linkedin_url: String,
    pub public_identifier: Option<String>,
    pub linkedin_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enrichment produced by `provider.visit_profile`(
/// `profile_visit`): "upsert enriched lead attributes (name split, email[0],
/// phone[0], headline as title, current company, location, provider
/// identifiers)".
#[derive(Debug, Clone, Default)]
pub struct LeadEnrichment {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin_id: Option<String>,
    pub public_identifier: Option<String>,
}

impl Lead {
    /// Name used for `{{first_name}}` / `{{last_name}}` template
    /// substitution (`send_followup`, `comment_post`).
    pub fn first_name_or_default(&self) -> &str {
        self.first_name.as_deref().unwrap_or("there")
    }
}
