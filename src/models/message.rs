//! Email campaign models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Draft,
    Scheduled,
    Sending,
    Sent,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Sending => write!(f, "sending"),
            Self::Sent => write!(f, "sent"),
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            _ => Err(anyhow::anyhow!("Invalid message status: {}", s)),
        }
    }
}

/// Per-recipient delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Sent => write!(f, "sent"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(anyhow::anyhow!("Invalid recipient status: {}", s)),
        }
    }
}

/// Bulk email campaign. Subject and body hold template syntax rendered per
/// recipient at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub subject: String,
    pub body: String,
    pub status: MessageStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(subject: String, body: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            subject,
            body,
            status: MessageStatus::Draft,
            scheduled_at: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One delivery attempt target within a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecipient {
    pub id: i64,
    pub message_id: i64,
    pub guest_id: i64,
    pub email: String,
    pub status: RecipientStatus,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Input for creating a campaign
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageInput {
    pub subject: String,
    pub body: String,
}

/// Input for updating a campaign
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessageInput {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}
