//! Survey models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Survey question kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurveyBlockKind {
    #[default]
    Text,
    Choice,
}

impl std::fmt::Display for SurveyBlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Choice => write!(f, "choice"),
        }
    }
}

impl std::str::FromStr for SurveyBlockKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "choice" => Ok(Self::Choice),
            _ => Err(anyhow::anyhow!("Invalid survey block kind: {}", s)),
        }
    }
}

/// A survey question shown on the public RSVP page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyBlock {
    pub id: i64,
    pub question: String,
    pub kind: SurveyBlockKind,
    /// Choice options for `choice` blocks, stored as a JSON array
    pub options: Option<serde_json::Value>,
    pub sort_order: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl SurveyBlock {
    pub fn new(question: String, kind: SurveyBlockKind) -> Self {
        Self {
            id: 0,
            question,
            kind,
            options: None,
            sort_order: 0,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// A guest's answer to one survey block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: i64,
    pub block_id: i64,
    pub guest_id: Option<i64>,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a survey block
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSurveyBlockInput {
    pub question: String,
    #[serde(default)]
    pub kind: SurveyBlockKind,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default)]
    pub sort_order: i32,
}

/// Input for updating a survey block
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSurveyBlockInput {
    pub question: Option<String>,
    pub kind: Option<SurveyBlockKind>,
    pub options: Option<serde_json::Value>,
    pub sort_order: Option<i32>,
    pub active: Option<bool>,
}
