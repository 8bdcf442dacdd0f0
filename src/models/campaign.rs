use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    InProgress,
    Paused,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::InProgress => "in_progress",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "in_progress" => Ok(CampaignStatus::InProgress),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(format!("unknown campaign status: {other}")),
        }
    }
}

/// A persistent outreach workflow owned by an organization, tied to a
/// sender account, a prospect list, and an immutable workflow JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sender_account_id: Uuid,
    pub prospect_list_id: Uuid,
    pub workflow_file_location: String,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub leads_per_day: i32,
    pub requests_sent_this_day: i32,
    pub requests_sent_this_week: i32,
    pub last_daily_requests_reset: DateTime<Utc>,
    pub last_weekly_requests_reset: DateTime<Utc>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn status(&self) -> Result<CampaignStatus, String> {
        self.status.parse()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignStatusView {
    pub status: CampaignStatus,
    pub is_running: bool,
    pub is_paused: bool,
}

impl From<CampaignStatus> for CampaignStatusView {
    fn from(status: CampaignStatus) -> Self {
        Self {
            status,
            is_running: status == CampaignStatus::InProgress,
            is_paused: status == CampaignStatus::Paused,
        }
    }
}
