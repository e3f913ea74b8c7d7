//! CMS page models
//!
//! A page is a slug plus one translation per locale; deleting a page
//! cascades to its translations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub slug: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Translations are attached by the repository when requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<PageTranslation>,
}

impl Page {
    pub fn new(slug: String, sort_order: i32) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug,
            sort_order,
            created_at: now,
            updated_at: now,
            translations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTranslation {
    pub id: i64,
    pub page_id: i64,
    pub locale: String,
    pub title: String,
    pub content: String,
}

/// Input for creating or updating a page
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPageInput {
    pub slug: String,
    #[serde(default)]
    pub sort_order: i32,
}

/// Input for creating or replacing a translation
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertTranslationInput {
    pub locale: String,
    pub title: String,
    pub content: String,
}
