//! CMS page repository
//!
//! Pages carry their translations; fetching a page attaches every locale row
//! so the frontend can pick one client-side.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Page, PageTranslation};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, page: &Page) -> Result<Page>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Page>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>>;
    async fn list(&self) -> Result<Vec<Page>>;
    async fn update(&self, page: &Page) -> Result<Page>;
    async fn delete(&self, id: i64) -> Result<()>;
    /// Insert or replace the translation for one locale of a page.
    async fn upsert_translation(
        &self,
        page_id: i64,
        locale: &str,
        title: &str,
        content: &str,
    ) -> Result<PageTranslation>;
    async fn delete_translation(&self, page_id: i64, locale: &str) -> Result<()>;
}

pub struct SqlxPageRepository {
    pool: DynDatabasePool,
}

impl SqlxPageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create(&self, page: &Page) -> Result<Page> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), page).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), page).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_slug_sqlite(self.pool.as_sqlite().unwrap(), slug).await
            }
            DatabaseDriver::Mysql => get_by_slug_mysql(self.pool.as_mysql().unwrap(), slug).await,
        }
    }

    async fn list(&self) -> Result<Vec<Page>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn update(&self, page: &Page) -> Result<Page> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), page).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), page).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn upsert_translation(
        &self,
        page_id: i64,
        locale: &str,
        title: &str,
        content: &str,
    ) -> Result<PageTranslation> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                upsert_translation_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    page_id,
                    locale,
                    title,
                    content,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                upsert_translation_mysql(
                    self.pool.as_mysql().unwrap(),
                    page_id,
                    locale,
                    title,
                    content,
                )
                .await
            }
        }
    }

    async fn delete_translation(&self, page_id: i64, locale: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_translation_sqlite(self.pool.as_sqlite().unwrap(), page_id, locale).await
            }
            DatabaseDriver::Mysql => {
                delete_translation_mysql(self.pool.as_mysql().unwrap(), page_id, locale).await
            }
        }
    }
}

// SQLite implementations

async fn create_sqlite(pool: &SqlitePool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO pages (slug, sort_order, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&page.slug)
    .bind(page.sort_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        translations: Vec::new(),
        ..page.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Page>> {
    let row = sqlx::query(
        "SELECT id, slug, sort_order, created_at, updated_at FROM pages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get page")?;
    match row {
        Some(r) => {
            let mut page = row_to_page_sqlite(&r);
            page.translations = translations_sqlite(pool, page.id).await?;
            Ok(Some(page))
        }
        None => Ok(None),
    }
}

async fn get_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Page>> {
    let row = sqlx::query(
        "SELECT id, slug, sort_order, created_at, updated_at FROM pages WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get page by slug")?;
    match row {
        Some(r) => {
            let mut page = row_to_page_sqlite(&r);
            page.translations = translations_sqlite(pool, page.id).await?;
            Ok(Some(page))
        }
        None => Ok(None),
    }
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Page>> {
    let rows = sqlx::query(
        "SELECT id, slug, sort_order, created_at, updated_at FROM pages ORDER BY sort_order, slug",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list pages")?;
    let mut pages = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut page = row_to_page_sqlite(row);
        page.translations = translations_sqlite(pool, page.id).await?;
        pages.push(page);
    }
    Ok(pages)
}

async fn update_sqlite(pool: &SqlitePool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    sqlx::query("UPDATE pages SET slug = ?, sort_order = ?, updated_at = ? WHERE id = ?")
        .bind(&page.slug)
        .bind(page.sort_order)
        .bind(now)
        .bind(page.id)
        .execute(pool)
        .await
        .context("Failed to update page")?;
    get_by_id_sqlite(pool, page.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Page not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM pages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete page")?;
    Ok(())
}

async fn upsert_translation_sqlite(
    pool: &SqlitePool,
    page_id: i64,
    locale: &str,
    title: &str,
    content: &str,
) -> Result<PageTranslation> {
    sqlx::query(
        "INSERT INTO page_translations (page_id, locale, title, content) VALUES (?, ?, ?, ?) \
         ON CONFLICT(page_id, locale) DO UPDATE SET title = excluded.title, content = excluded.content",
    )
    .bind(page_id)
    .bind(locale)
    .bind(title)
    .bind(content)
    .execute(pool)
    .await
    .context("Failed to upsert translation")?;

    let row = sqlx::query(
        "SELECT id, page_id, locale, title, content FROM page_translations WHERE page_id = ? AND locale = ?",
    )
    .bind(page_id)
    .bind(locale)
    .fetch_one(pool)
    .await?;
    Ok(row_to_translation_sqlite(&row))
}

async fn delete_translation_sqlite(pool: &SqlitePool, page_id: i64, locale: &str) -> Result<()> {
    sqlx::query("DELETE FROM page_translations WHERE page_id = ? AND locale = ?")
        .bind(page_id)
        .bind(locale)
        .execute(pool)
        .await
        .context("Failed to delete translation")?;
    Ok(())
}

async fn translations_sqlite(pool: &SqlitePool, page_id: i64) -> Result<Vec<PageTranslation>> {
    let rows = sqlx::query(
        "SELECT id, page_id, locale, title, content FROM page_translations WHERE page_id = ? ORDER BY locale",
    )
    .bind(page_id)
    .fetch_all(pool)
    .await
    .context("Failed to load translations")?;
    Ok(rows.iter().map(row_to_translation_sqlite).collect())
}

fn row_to_page_sqlite(row: &sqlx::sqlite::SqliteRow) -> Page {
    Page {
        id: row.get("id"),
        slug: row.get("slug"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        translations: Vec::new(),
    }
}

fn row_to_translation_sqlite(row: &sqlx::sqlite::SqliteRow) -> PageTranslation {
    PageTranslation {
        id: row.get("id"),
        page_id: row.get("page_id"),
        locale: row.get("locale"),
        title: row.get("title"),
        content: row.get("content"),
    }
}

// MySQL implementations

async fn create_mysql(pool: &MySqlPool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO pages (slug, sort_order, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&page.slug)
    .bind(page.sort_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        translations: Vec::new(),
        ..page.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Page>> {
    let row = sqlx::query(
        "SELECT id, slug, sort_order, created_at, updated_at FROM pages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get page")?;
    match row {
        Some(r) => {
            let mut page = row_to_page_mysql(&r);
            page.translations = translations_mysql(pool, page.id).await?;
            Ok(Some(page))
        }
        None => Ok(None),
    }
}

async fn get_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Page>> {
    let row = sqlx::query(
        "SELECT id, slug, sort_order, created_at, updated_at FROM pages WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get page by slug")?;
    match row {
        Some(r) => {
            let mut page = row_to_page_mysql(&r);
            page.translations = translations_mysql(pool, page.id).await?;
            Ok(Some(page))
        }
        None => Ok(None),
    }
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Page>> {
    let rows = sqlx::query(
        "SELECT id, slug, sort_order, created_at, updated_at FROM pages ORDER BY sort_order, slug",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list pages")?;
    let mut pages = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut page = row_to_page_mysql(row);
        page.translations = translations_mysql(pool, page.id).await?;
        pages.push(page);
    }
    Ok(pages)
}

async fn update_mysql(pool: &MySqlPool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    sqlx::query("UPDATE pages SET slug = ?, sort_order = ?, updated_at = ? WHERE id = ?")
        .bind(&page.slug)
        .bind(page.sort_order)
        .bind(now)
        .bind(page.id)
        .execute(pool)
        .await
        .context("Failed to update page")?;
    get_by_id_mysql(pool, page.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Page not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM pages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete page")?;
    Ok(())
}

async fn upsert_translation_mysql(
    pool: &MySqlPool,
    page_id: i64,
    locale: &str,
    title: &str,
    content: &str,
) -> Result<PageTranslation> {
    sqlx::query(
        "INSERT INTO page_translations (page_id, locale, title, content) VALUES (?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE title = VALUES(title), content = VALUES(content)",
    )
    .bind(page_id)
    .bind(locale)
    .bind(title)
    .bind(content)
    .execute(pool)
    .await
    .context("Failed to upsert translation")?;

    let row = sqlx::query(
        "SELECT id, page_id, locale, title, content FROM page_translations WHERE page_id = ? AND locale = ?",
    )
    .bind(page_id)
    .bind(locale)
    .fetch_one(pool)
    .await?;
    Ok(row_to_translation_mysql(&row))
}

async fn delete_translation_mysql(pool: &MySqlPool, page_id: i64, locale: &str) -> Result<()> {
    sqlx::query("DELETE FROM page_translations WHERE page_id = ? AND locale = ?")
        .bind(page_id)
        .bind(locale)
        .execute(pool)
        .await
        .context("Failed to delete translation")?;
    Ok(())
}

async fn translations_mysql(pool: &MySqlPool, page_id: i64) -> Result<Vec<PageTranslation>> {
    let rows = sqlx::query(
        "SELECT id, page_id, locale, title, content FROM page_translations WHERE page_id = ? ORDER BY locale",
    )
    .bind(page_id)
    .fetch_all(pool)
    .await
    .context("Failed to load translations")?;
    Ok(rows.iter().map(row_to_translation_mysql).collect())
}

fn row_to_page_mysql(row: &sqlx::mysql::MySqlRow) -> Page {
    Page {
        id: row.get("id"),
        slug: row.get("slug"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        translations: Vec::new(),
    }
}

fn row_to_translation_mysql(row: &sqlx::mysql::MySqlRow) -> PageTranslation {
    PageTranslation {
        id: row.get("id"),
        page_id: row.get("page_id"),
        locale: row.get("locale"),
        title: row.get("title"),
        content: row.get("content"),
    }
}
