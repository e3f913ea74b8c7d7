//! Email campaign repository
//!
//! Covers both the `messages` table and its `message_recipients` children.
//! Recipient rows are snapshotted at send time so a later guest edit does not
//! rewrite campaign history.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Message, MessageRecipient, MessageStatus, RecipientStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &Message) -> Result<Message>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Message>>;
    async fn list(&self) -> Result<Vec<Message>>;
    async fn update(&self, message: &Message) -> Result<Message>;
    async fn delete(&self, id: i64) -> Result<()>;
    /// Campaigns with status `scheduled` whose scheduled_at is at or before `now`.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Message>>;
    async fn add_recipient(&self, message_id: i64, guest_id: i64, email: &str) -> Result<i64>;
    async fn list_recipients(&self, message_id: i64) -> Result<Vec<MessageRecipient>>;
    async fn mark_recipient(
        &self,
        recipient_id: i64,
        status: RecipientStatus,
        error: Option<&str>,
    ) -> Result<()>;
}

pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), message).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), message).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Message>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn update(&self, message: &Message) -> Result<Message> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), message).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), message).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Message>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_due_sqlite(self.pool.as_sqlite().unwrap(), now).await,
            DatabaseDriver::Mysql => list_due_mysql(self.pool.as_mysql().unwrap(), now).await,
        }
    }

    async fn add_recipient(&self, message_id: i64, guest_id: i64, email: &str) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_recipient_sqlite(self.pool.as_sqlite().unwrap(), message_id, guest_id, email)
                    .await
            }
            DatabaseDriver::Mysql => {
                add_recipient_mysql(self.pool.as_mysql().unwrap(), message_id, guest_id, email)
                    .await
            }
        }
    }

    async fn list_recipients(&self, message_id: i64) -> Result<Vec<MessageRecipient>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_recipients_sqlite(self.pool.as_sqlite().unwrap(), message_id).await
            }
            DatabaseDriver::Mysql => {
                list_recipients_mysql(self.pool.as_mysql().unwrap(), message_id).await
            }
        }
    }

    async fn mark_recipient(
        &self,
        recipient_id: i64,
        status: RecipientStatus,
        error: Option<&str>,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                mark_recipient_sqlite(self.pool.as_sqlite().unwrap(), recipient_id, status, error)
                    .await
            }
            DatabaseDriver::Mysql => {
                mark_recipient_mysql(self.pool.as_mysql().unwrap(), recipient_id, status, error)
                    .await
            }
        }
    }
}

const MESSAGE_COLUMNS: &str =
    "id, subject, body, status, scheduled_at, sent_at, created_at, updated_at";

// SQLite implementations

async fn create_sqlite(pool: &SqlitePool, message: &Message) -> Result<Message> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO messages (subject, body, status, scheduled_at, sent_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.subject)
    .bind(&message.body)
    .bind(message.status.to_string())
    .bind(message.scheduled_at)
    .bind(message.sent_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create message")?;

    Ok(Message {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..message.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Message>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM messages WHERE id = ?",
        MESSAGE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get message")?;
    Ok(row.map(|r| row_to_message_sqlite(&r)))
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Message>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM messages ORDER BY created_at DESC",
        MESSAGE_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list messages")?;
    Ok(rows.iter().map(row_to_message_sqlite).collect())
}

async fn update_sqlite(pool: &SqlitePool, message: &Message) -> Result<Message> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE messages SET subject = ?, body = ?, status = ?, scheduled_at = ?, sent_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&message.subject)
    .bind(&message.body)
    .bind(message.status.to_string())
    .bind(message.scheduled_at)
    .bind(message.sent_at)
    .bind(now)
    .bind(message.id)
    .execute(pool)
    .await
    .context("Failed to update message")?;
    get_by_id_sqlite(pool, message.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Message not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete message")?;
    Ok(())
}

async fn list_due_sqlite(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Message>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM messages WHERE status = 'scheduled' AND scheduled_at <= ? ORDER BY scheduled_at",
        MESSAGE_COLUMNS
    ))
    .bind(now)
    .fetch_all(pool)
    .await
    .context("Failed to list due messages")?;
    Ok(rows.iter().map(row_to_message_sqlite).collect())
}

async fn add_recipient_sqlite(
    pool: &SqlitePool,
    message_id: i64,
    guest_id: i64,
    email: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO message_recipients (message_id, guest_id, email, status) VALUES (?, ?, ?, 'pending')",
    )
    .bind(message_id)
    .bind(guest_id)
    .bind(email)
    .execute(pool)
    .await
    .context("Failed to add recipient")?;
    Ok(result.last_insert_rowid())
}

async fn list_recipients_sqlite(
    pool: &SqlitePool,
    message_id: i64,
) -> Result<Vec<MessageRecipient>> {
    let rows = sqlx::query(
        "SELECT id, message_id, guest_id, email, status, error, sent_at FROM message_recipients WHERE message_id = ? ORDER BY id",
    )
    .bind(message_id)
    .fetch_all(pool)
    .await
    .context("Failed to list recipients")?;
    Ok(rows.iter().map(row_to_recipient_sqlite).collect())
}

async fn mark_recipient_sqlite(
    pool: &SqlitePool,
    recipient_id: i64,
    status: RecipientStatus,
    error: Option<&str>,
) -> Result<()> {
    let sent_at = matches!(status, RecipientStatus::Sent).then(Utc::now);
    sqlx::query("UPDATE message_recipients SET status = ?, error = ?, sent_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(error)
        .bind(sent_at)
        .bind(recipient_id)
        .execute(pool)
        .await
        .context("Failed to mark recipient")?;
    Ok(())
}

fn row_to_message_sqlite(row: &sqlx::sqlite::SqliteRow) -> Message {
    let status: String = row.get("status");
    Message {
        id: row.get("id"),
        subject: row.get("subject"),
        body: row.get("body"),
        status: status.parse().unwrap_or(MessageStatus::Draft),
        scheduled_at: row.get("scheduled_at"),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_recipient_sqlite(row: &sqlx::sqlite::SqliteRow) -> MessageRecipient {
    let status: String = row.get("status");
    MessageRecipient {
        id: row.get("id"),
        message_id: row.get("message_id"),
        guest_id: row.get("guest_id"),
        email: row.get("email"),
        status: status.parse().unwrap_or(RecipientStatus::Pending),
        error: row.get("error"),
        sent_at: row.get("sent_at"),
    }
}

// MySQL implementations

async fn create_mysql(pool: &MySqlPool, message: &Message) -> Result<Message> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO messages (subject, body, status, scheduled_at, sent_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.subject)
    .bind(&message.body)
    .bind(message.status.to_string())
    .bind(message.scheduled_at)
    .bind(message.sent_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create message")?;

    Ok(Message {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..message.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Message>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM messages WHERE id = ?",
        MESSAGE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get message")?;
    Ok(row.map(|r| row_to_message_mysql(&r)))
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Message>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM messages ORDER BY created_at DESC",
        MESSAGE_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list messages")?;
    Ok(rows.iter().map(row_to_message_mysql).collect())
}

async fn update_mysql(pool: &MySqlPool, message: &Message) -> Result<Message> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE messages SET subject = ?, body = ?, status = ?, scheduled_at = ?, sent_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&message.subject)
    .bind(&message.body)
    .bind(message.status.to_string())
    .bind(message.scheduled_at)
    .bind(message.sent_at)
    .bind(now)
    .bind(message.id)
    .execute(pool)
    .await
    .context("Failed to update message")?;
    get_by_id_mysql(pool, message.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Message not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete message")?;
    Ok(())
}

async fn list_due_mysql(pool: &MySqlPool, now: DateTime<Utc>) -> Result<Vec<Message>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM messages WHERE status = 'scheduled' AND scheduled_at <= ? ORDER BY scheduled_at",
        MESSAGE_COLUMNS
    ))
    .bind(now)
    .fetch_all(pool)
    .await
    .context("Failed to list due messages")?;
    Ok(rows.iter().map(row_to_message_mysql).collect())
}

async fn add_recipient_mysql(
    pool: &MySqlPool,
    message_id: i64,
    guest_id: i64,
    email: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO message_recipients (message_id, guest_id, email, status) VALUES (?, ?, ?, 'pending')",
    )
    .bind(message_id)
    .bind(guest_id)
    .bind(email)
    .execute(pool)
    .await
    .context("Failed to add recipient")?;
    Ok(result.last_insert_id() as i64)
}

async fn list_recipients_mysql(
    pool: &MySqlPool,
    message_id: i64,
) -> Result<Vec<MessageRecipient>> {
    let rows = sqlx::query(
        "SELECT id, message_id, guest_id, email, status, error, sent_at FROM message_recipients WHERE message_id = ? ORDER BY id",
    )
    .bind(message_id)
    .fetch_all(pool)
    .await
    .context("Failed to list recipients")?;
    Ok(rows.iter().map(row_to_recipient_mysql).collect())
}

async fn mark_recipient_mysql(
    pool: &MySqlPool,
    recipient_id: i64,
    status: RecipientStatus,
    error: Option<&str>,
) -> Result<()> {
    let sent_at = matches!(status, RecipientStatus::Sent).then(Utc::now);
    sqlx::query("UPDATE message_recipients SET status = ?, error = ?, sent_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(error)
        .bind(sent_at)
        .bind(recipient_id)
        .execute(pool)
        .await
        .context("Failed to mark recipient")?;
    Ok(())
}

fn row_to_message_mysql(row: &sqlx::mysql::MySqlRow) -> Message {
    let status: String = row.get("status");
    Message {
        id: row.get("id"),
        subject: row.get("subject"),
        body: row.get("body"),
        status: status.parse().unwrap_or(MessageStatus::Draft),
        scheduled_at: row.get("scheduled_at"),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_recipient_mysql(row: &sqlx::mysql::MySqlRow) -> MessageRecipient {
    let status: String = row.get("status");
    MessageRecipient {
        id: row.get("id"),
        message_id: row.get("message_id"),
        guest_id: row.get("guest_id"),
        email: row.get("email"),
        status: status.parse().unwrap_or(RecipientStatus::Pending),
        error: row.get("error"),
        sent_at: row.get("sent_at"),
    }
}
