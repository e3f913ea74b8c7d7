//! Email template model
//!
//! A template is a subject/body pair per locale. Both fields may contain
//! `{{variable}}` placeholders and `{{#if}}` / `{{#unless}}` blocks that are
//! rendered per recipient at send time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub locale: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(name: String, locale: String, subject: String, body: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            locale,
            subject,
            body,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a template
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateInput {
    pub name: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub subject: String,
    pub body: String,
}

fn default_locale() -> String {
    "en".to_string()
}

/// Input for updating a template
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplateInput {
    pub subject: Option<String>,
    pub body: Option<String>,
}
