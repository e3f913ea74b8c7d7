//! Email template repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Template;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create(&self, template: &Template) -> Result<Template>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Template>>;
    async fn get_by_name(&self, name: &str, locale: &str) -> Result<Option<Template>>;
    async fn list(&self) -> Result<Vec<Template>>;
    async fn update(&self, template: &Template) -> Result<Template>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn exists(&self, name: &str, locale: &str) -> Result<bool>;
}

pub struct SqlxTemplateRepository {
    pool: DynDatabasePool,
}

impl SqlxTemplateRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TemplateRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TemplateRepository for SqlxTemplateRepository {
    async fn create(&self, template: &Template) -> Result<Template> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), template).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), template).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Template>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_name(&self, name: &str, locale: &str) -> Result<Option<Template>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_name_sqlite(self.pool.as_sqlite().unwrap(), name, locale).await
            }
            DatabaseDriver::Mysql => {
                get_by_name_mysql(self.pool.as_mysql().unwrap(), name, locale).await
            }
        }
    }

    async fn list(&self) -> Result<Vec<Template>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn update(&self, template: &Template) -> Result<Template> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), template).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), template).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn exists(&self, name: &str, locale: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exists_sqlite(self.pool.as_sqlite().unwrap(), name, locale).await
            }
            DatabaseDriver::Mysql => {
                exists_mysql(self.pool.as_mysql().unwrap(), name, locale).await
            }
        }
    }
}

// SQLite implementations

async fn create_sqlite(pool: &SqlitePool, template: &Template) -> Result<Template> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO templates (name, locale, subject, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&template.name)
    .bind(&template.locale)
    .bind(&template.subject)
    .bind(&template.body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create template")?;

    Ok(Template {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..template.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Template>> {
    let row = sqlx::query(
        "SELECT id, name, locale, subject, body, created_at, updated_at FROM templates WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get template")?;
    Ok(row.map(|r| row_to_template_sqlite(&r)))
}

async fn get_by_name_sqlite(pool: &SqlitePool, name: &str, locale: &str) -> Result<Option<Template>> {
    let row = sqlx::query(
        "SELECT id, name, locale, subject, body, created_at, updated_at FROM templates WHERE name = ? AND locale = ?",
    )
    .bind(name)
    .bind(locale)
    .fetch_optional(pool)
    .await
    .context("Failed to get template by name")?;
    Ok(row.map(|r| row_to_template_sqlite(&r)))
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Template>> {
    let rows = sqlx::query(
        "SELECT id, name, locale, subject, body, created_at, updated_at FROM templates ORDER BY name, locale",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list templates")?;
    Ok(rows.iter().map(row_to_template_sqlite).collect())
}

async fn update_sqlite(pool: &SqlitePool, template: &Template) -> Result<Template> {
    let now = Utc::now();
    sqlx::query("UPDATE templates SET subject = ?, body = ?, updated_at = ? WHERE id = ?")
        .bind(&template.subject)
        .bind(&template.body)
        .bind(now)
        .bind(template.id)
        .execute(pool)
        .await
        .context("Failed to update template")?;
    get_by_id_sqlite(pool, template.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Template not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM templates WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete template")?;
    Ok(())
}

async fn exists_sqlite(pool: &SqlitePool, name: &str, locale: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM templates WHERE name = ? AND locale = ?")
        .bind(name)
        .bind(locale)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>("count") > 0)
}

fn row_to_template_sqlite(row: &sqlx::sqlite::SqliteRow) -> Template {
    Template {
        id: row.get("id"),
        name: row.get("name"),
        locale: row.get("locale"),
        subject: row.get("subject"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// MySQL implementations

async fn create_mysql(pool: &MySqlPool, template: &Template) -> Result<Template> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO templates (name, locale, subject, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&template.name)
    .bind(&template.locale)
    .bind(&template.subject)
    .bind(&template.body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create template")?;

    Ok(Template {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..template.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Template>> {
    let row = sqlx::query(
        "SELECT id, name, locale, subject, body, created_at, updated_at FROM templates WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get template")?;
    Ok(row.map(|r| row_to_template_mysql(&r)))
}

async fn get_by_name_mysql(pool: &MySqlPool, name: &str, locale: &str) -> Result<Option<Template>> {
    let row = sqlx::query(
        "SELECT id, name, locale, subject, body, created_at, updated_at FROM templates WHERE name = ? AND locale = ?",
    )
    .bind(name)
    .bind(locale)
    .fetch_optional(pool)
    .await
    .context("Failed to get template by name")?;
    Ok(row.map(|r| row_to_template_mysql(&r)))
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Template>> {
    let rows = sqlx::query(
        "SELECT id, name, locale, subject, body, created_at, updated_at FROM templates ORDER BY name, locale",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list templates")?;
    Ok(rows.iter().map(row_to_template_mysql).collect())
}

async fn update_mysql(pool: &MySqlPool, template: &Template) -> Result<Template> {
    let now = Utc::now();
    sqlx::query("UPDATE templates SET subject = ?, body = ?, updated_at = ? WHERE id = ?")
        .bind(&template.subject)
        .bind(&template.body)
        .bind(now)
        .bind(template.id)
        .execute(pool)
        .await
        .context("Failed to update template")?;
    get_by_id_mysql(pool, template.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Template not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM templates WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete template")?;
    Ok(())
}

async fn exists_mysql(pool: &MySqlPool, name: &str, locale: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM templates WHERE name = ? AND locale = ?")
        .bind(name)
        .bind(locale)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>("count") > 0)
}

fn row_to_template_mysql(row: &sqlx::mysql::MySqlRow) -> Template {
    Template {
        id: row.get("id"),
        name: row.get("name"),
        locale: row.get("locale"),
        subject: row.get("subject"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
