//! Guest repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Guest, RsvpStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const GUEST_COLUMNS: &str = "id, code, name, email, is_primary, parent_id, plus_one_allowed, \
     status, dietary, notes, rsvp_deadline, responded_at, created_at, updated_at";

#[async_trait]
pub trait GuestRepository: Send + Sync {
    async fn create(&self, guest: &Guest) -> Result<Guest>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Guest>>;
    /// Primary guest for a group code
    async fn get_primary_by_code(&self, code: &str) -> Result<Option<Guest>>;
    /// Dependent (plus-one) linked to a primary guest, if any
    async fn get_dependent(&self, parent_id: i64) -> Result<Option<Guest>>;
    async fn list(&self) -> Result<Vec<Guest>>;
    /// Primary guests with an email address, the audience of a campaign
    async fn list_recipients(&self) -> Result<Vec<Guest>>;
    async fn update(&self, guest: &Guest) -> Result<Guest>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn code_exists(&self, code: &str) -> Result<bool>;
}

pub struct SqlxGuestRepository {
    pool: DynDatabasePool,
}

impl SqlxGuestRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GuestRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GuestRepository for SqlxGuestRepository {
    async fn create(&self, guest: &Guest) -> Result<Guest> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), guest).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), guest).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Guest>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_primary_by_code(&self, code: &str) -> Result<Option<Guest>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_primary_by_code_sqlite(self.pool.as_sqlite().unwrap(), code).await
            }
            DatabaseDriver::Mysql => {
                get_primary_by_code_mysql(self.pool.as_mysql().unwrap(), code).await
            }
        }
    }

    async fn get_dependent(&self, parent_id: i64) -> Result<Option<Guest>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_dependent_sqlite(self.pool.as_sqlite().unwrap(), parent_id).await
            }
            DatabaseDriver::Mysql => {
                get_dependent_mysql(self.pool.as_mysql().unwrap(), parent_id).await
            }
        }
    }

    async fn list(&self) -> Result<Vec<Guest>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn list_recipients(&self) -> Result<Vec<Guest>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_recipients_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_recipients_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn update(&self, guest: &Guest) -> Result<Guest> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), guest).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), guest).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => code_exists_sqlite(self.pool.as_sqlite().unwrap(), code).await,
            DatabaseDriver::Mysql => code_exists_mysql(self.pool.as_mysql().unwrap(), code).await,
        }
    }
}

// SQLite implementations

async fn create_sqlite(pool: &SqlitePool, guest: &Guest) -> Result<Guest> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO guests (code, name, email, is_primary, parent_id, plus_one_allowed, status, dietary, notes, rsvp_deadline, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&guest.code)
    .bind(&guest.name)
    .bind(&guest.email)
    .bind(guest.is_primary)
    .bind(guest.parent_id)
    .bind(guest.plus_one_allowed)
    .bind(guest.status.to_string())
    .bind(&guest.dietary)
    .bind(&guest.notes)
    .bind(guest.rsvp_deadline)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create guest")?;

    Ok(Guest {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..guest.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Guest>> {
    let row = sqlx::query(&format!("SELECT {} FROM guests WHERE id = ?", GUEST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get guest")?;
    row.map(|r| row_to_guest_sqlite(&r)).transpose()
}

async fn get_primary_by_code_sqlite(pool: &SqlitePool, code: &str) -> Result<Option<Guest>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM guests WHERE code = ? AND is_primary = 1",
        GUEST_COLUMNS
    ))
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get guest by code")?;
    row.map(|r| row_to_guest_sqlite(&r)).transpose()
}

async fn get_dependent_sqlite(pool: &SqlitePool, parent_id: i64) -> Result<Option<Guest>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM guests WHERE parent_id = ? LIMIT 1",
        GUEST_COLUMNS
    ))
    .bind(parent_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get dependent guest")?;
    row.map(|r| row_to_guest_sqlite(&r)).transpose()
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Guest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM guests ORDER BY is_primary DESC, name",
        GUEST_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list guests")?;
    rows.iter().map(row_to_guest_sqlite).collect()
}

async fn list_recipients_sqlite(pool: &SqlitePool) -> Result<Vec<Guest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM guests WHERE is_primary = 1 AND email IS NOT NULL AND email != '' ORDER BY name",
        GUEST_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list recipients")?;
    rows.iter().map(row_to_guest_sqlite).collect()
}

async fn update_sqlite(pool: &SqlitePool, guest: &Guest) -> Result<Guest> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE guests SET name = ?, email = ?, plus_one_allowed = ?, status = ?, dietary = ?, notes = ?, rsvp_deadline = ?, responded_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&guest.name)
    .bind(&guest.email)
    .bind(guest.plus_one_allowed)
    .bind(guest.status.to_string())
    .bind(&guest.dietary)
    .bind(&guest.notes)
    .bind(guest.rsvp_deadline)
    .bind(guest.responded_at)
    .bind(now)
    .bind(guest.id)
    .execute(pool)
    .await
    .context("Failed to update guest")?;
    get_by_id_sqlite(pool, guest.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Guest not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM guests WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete guest")?;
    Ok(())
}

async fn code_exists_sqlite(pool: &SqlitePool, code: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM guests WHERE code = ?")
        .bind(code)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>("count") > 0)
}

fn row_to_guest_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Guest> {
    let status_str: String = row.get("status");
    Ok(Guest {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        email: row.get("email"),
        is_primary: row.get("is_primary"),
        parent_id: row.get("parent_id"),
        plus_one_allowed: row.get("plus_one_allowed"),
        status: status_str.parse().unwrap_or(RsvpStatus::Pending),
        dietary: row.get("dietary"),
        notes: row.get("notes"),
        rsvp_deadline: row.get("rsvp_deadline"),
        responded_at: row.get("responded_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// MySQL implementations

async fn create_mysql(pool: &MySqlPool, guest: &Guest) -> Result<Guest> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO guests (code, name, email, is_primary, parent_id, plus_one_allowed, status, dietary, notes, rsvp_deadline, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&guest.code)
    .bind(&guest.name)
    .bind(&guest.email)
    .bind(guest.is_primary)
    .bind(guest.parent_id)
    .bind(guest.plus_one_allowed)
    .bind(guest.status.to_string())
    .bind(&guest.dietary)
    .bind(&guest.notes)
    .bind(guest.rsvp_deadline)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create guest")?;

    Ok(Guest {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..guest.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Guest>> {
    let row = sqlx::query(&format!("SELECT {} FROM guests WHERE id = ?", GUEST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get guest")?;
    row.map(|r| row_to_guest_mysql(&r)).transpose()
}

async fn get_primary_by_code_mysql(pool: &MySqlPool, code: &str) -> Result<Option<Guest>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM guests WHERE code = ? AND is_primary = 1",
        GUEST_COLUMNS
    ))
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get guest by code")?;
    row.map(|r| row_to_guest_mysql(&r)).transpose()
}

async fn get_dependent_mysql(pool: &MySqlPool, parent_id: i64) -> Result<Option<Guest>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM guests WHERE parent_id = ? LIMIT 1",
        GUEST_COLUMNS
    ))
    .bind(parent_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get dependent guest")?;
    row.map(|r| row_to_guest_mysql(&r)).transpose()
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Guest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM guests ORDER BY is_primary DESC, name",
        GUEST_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list guests")?;
    rows.iter().map(row_to_guest_mysql).collect()
}

async fn list_recipients_mysql(pool: &MySqlPool) -> Result<Vec<Guest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM guests WHERE is_primary = 1 AND email IS NOT NULL AND email != '' ORDER BY name",
        GUEST_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list recipients")?;
    rows.iter().map(row_to_guest_mysql).collect()
}

async fn update_mysql(pool: &MySqlPool, guest: &Guest) -> Result<Guest> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE guests SET name = ?, email = ?, plus_one_allowed = ?, status = ?, dietary = ?, notes = ?, rsvp_deadline = ?, responded_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&guest.name)
    .bind(&guest.email)
    .bind(guest.plus_one_allowed)
    .bind(guest.status.to_string())
    .bind(&guest.dietary)
    .bind(&guest.notes)
    .bind(guest.rsvp_deadline)
    .bind(guest.responded_at)
    .bind(now)
    .bind(guest.id)
    .execute(pool)
    .await
    .context("Failed to update guest")?;
    get_by_id_mysql(pool, guest.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Guest not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM guests WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete guest")?;
    Ok(())
}

async fn code_exists_mysql(pool: &MySqlPool, code: &str) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM guests WHERE code = ?")
        .bind(code)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>("count") > 0)
}

fn row_to_guest_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Guest> {
    let status_str: String = row.get("status");
    Ok(Guest {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        email: row.get("email"),
        is_primary: row.get("is_primary"),
        parent_id: row.get("parent_id"),
        plus_one_allowed: row.get("plus_one_allowed"),
        status: status_str.parse().unwrap_or(RsvpStatus::Pending),
        dietary: row.get("dietary"),
        notes: row.get("notes"),
        rsvp_deadline: row.get("rsvp_deadline"),
        responded_at: row.get("responded_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn repo() -> SqlxGuestRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxGuestRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_by_code() {
        let repo = repo().await;
        let guest = Guest::new_primary("ABC123".into(), "Jane".into(), Some("j@e.com".into()));
        let created = repo.create(&guest).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_primary_by_code("ABC123").await.unwrap().unwrap();
        assert_eq!(found.name, "Jane");
        assert_eq!(found.status, RsvpStatus::Pending);

        assert!(repo.get_primary_by_code("NOPE42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dependent_lookup() {
        let repo = repo().await;
        let primary = repo
            .create(&Guest::new_primary("ABC123".into(), "Jane".into(), None))
            .await
            .unwrap();
        assert!(repo.get_dependent(primary.id).await.unwrap().is_none());

        let dep = repo
            .create(&Guest::new_dependent(&primary, "John".into()))
            .await
            .unwrap();
        let found = repo.get_dependent(primary.id).await.unwrap().unwrap();
        assert_eq!(found.id, dep.id);
        assert_eq!(found.code, "ABC123");
    }

    #[tokio::test]
    async fn test_update_status() {
        let repo = repo().await;
        let mut guest = repo
            .create(&Guest::new_primary("ABC123".into(), "Jane".into(), None))
            .await
            .unwrap();

        guest.status = RsvpStatus::Attending;
        guest.dietary = Some("vegetarian".into());
        let updated = repo.update(&guest).await.unwrap();
        assert_eq!(updated.status, RsvpStatus::Attending);
        assert_eq!(updated.dietary.as_deref(), Some("vegetarian"));
    }

    #[tokio::test]
    async fn test_code_exists() {
        let repo = repo().await;
        assert!(!repo.code_exists("ABC123").await.unwrap());
        repo.create(&Guest::new_primary("ABC123".into(), "Jane".into(), None))
            .await
            .unwrap();
        assert!(repo.code_exists("ABC123").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_recipients_skips_missing_email() {
        let repo = repo().await;
        repo.create(&Guest::new_primary("AAA111".into(), "Jane".into(), Some("j@e.com".into())))
            .await
            .unwrap();
        repo.create(&Guest::new_primary("BBB222".into(), "NoMail".into(), None))
            .await
            .unwrap();

        let recipients = repo.list_recipients().await.unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].name, "Jane");
    }

    #[tokio::test]
    async fn test_delete_cascades_to_dependent() {
        let repo = repo().await;
        let primary = repo
            .create(&Guest::new_primary("ABC123".into(), "Jane".into(), None))
            .await
            .unwrap();
        repo.create(&Guest::new_dependent(&primary, "John".into()))
            .await
            .unwrap();

        repo.delete(primary.id).await.unwrap();
        assert!(repo.get_primary_by_code("ABC123").await.unwrap().is_none());
        assert!(repo.get_dependent(primary.id).await.unwrap().is_none());
    }
}
