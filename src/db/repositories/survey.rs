//! Survey repository
//!
//! Blocks are the admin-defined questions; responses reference a block and
//! optionally the answering guest. Guest deletion nulls out guest_id so
//! anonymized answers survive.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{SurveyBlock, SurveyBlockKind, SurveyResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SurveyRepository: Send + Sync {
    async fn create_block(&self, block: &SurveyBlock) -> Result<SurveyBlock>;
    async fn get_block(&self, id: i64) -> Result<Option<SurveyBlock>>;
    /// All blocks; `active_only` filters to what the public form shows.
    async fn list_blocks(&self, active_only: bool) -> Result<Vec<SurveyBlock>>;
    async fn update_block(&self, block: &SurveyBlock) -> Result<SurveyBlock>;
    async fn delete_block(&self, id: i64) -> Result<()>;
    async fn add_response(
        &self,
        block_id: i64,
        guest_id: Option<i64>,
        answer: &str,
    ) -> Result<SurveyResponse>;
    async fn list_responses(&self, block_id: i64) -> Result<Vec<SurveyResponse>>;
}

pub struct SqlxSurveyRepository {
    pool: DynDatabasePool,
}

impl SqlxSurveyRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SurveyRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SurveyRepository for SqlxSurveyRepository {
    async fn create_block(&self, block: &SurveyBlock) -> Result<SurveyBlock> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_block_sqlite(self.pool.as_sqlite().unwrap(), block).await
            }
            DatabaseDriver::Mysql => {
                create_block_mysql(self.pool.as_mysql().unwrap(), block).await
            }
        }
    }

    async fn get_block(&self, id: i64) -> Result<Option<SurveyBlock>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_block_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_block_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_blocks(&self, active_only: bool) -> Result<Vec<SurveyBlock>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_blocks_sqlite(self.pool.as_sqlite().unwrap(), active_only).await
            }
            DatabaseDriver::Mysql => {
                list_blocks_mysql(self.pool.as_mysql().unwrap(), active_only).await
            }
        }
    }

    async fn update_block(&self, block: &SurveyBlock) -> Result<SurveyBlock> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_block_sqlite(self.pool.as_sqlite().unwrap(), block).await
            }
            DatabaseDriver::Mysql => {
                update_block_mysql(self.pool.as_mysql().unwrap(), block).await
            }
        }
    }

    async fn delete_block(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_block_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_block_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn add_response(
        &self,
        block_id: i64,
        guest_id: Option<i64>,
        answer: &str,
    ) -> Result<SurveyResponse> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_response_sqlite(self.pool.as_sqlite().unwrap(), block_id, guest_id, answer)
                    .await
            }
            DatabaseDriver::Mysql => {
                add_response_mysql(self.pool.as_mysql().unwrap(), block_id, guest_id, answer).await
            }
        }
    }

    async fn list_responses(&self, block_id: i64) -> Result<Vec<SurveyResponse>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_responses_sqlite(self.pool.as_sqlite().unwrap(), block_id).await
            }
            DatabaseDriver::Mysql => {
                list_responses_mysql(self.pool.as_mysql().unwrap(), block_id).await
            }
        }
    }
}

// SQLite implementations

async fn create_block_sqlite(pool: &SqlitePool, block: &SurveyBlock) -> Result<SurveyBlock> {
    let now = Utc::now();
    let options = block
        .options
        .as_ref()
        .map(serde_json::Value::to_string);
    let result = sqlx::query(
        "INSERT INTO survey_blocks (question, kind, options, sort_order, active, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&block.question)
    .bind(block.kind.to_string())
    .bind(options)
    .bind(block.sort_order)
    .bind(block.active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create survey block")?;

    Ok(SurveyBlock {
        id: result.last_insert_rowid(),
        created_at: now,
        ..block.clone()
    })
}

async fn get_block_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<SurveyBlock>> {
    let row = sqlx::query(
        "SELECT id, question, kind, options, sort_order, active, created_at FROM survey_blocks WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get survey block")?;
    Ok(row.map(|r| row_to_block_sqlite(&r)))
}

async fn list_blocks_sqlite(pool: &SqlitePool, active_only: bool) -> Result<Vec<SurveyBlock>> {
    let sql = if active_only {
        "SELECT id, question, kind, options, sort_order, active, created_at FROM survey_blocks WHERE active = 1 ORDER BY sort_order, id"
    } else {
        "SELECT id, question, kind, options, sort_order, active, created_at FROM survey_blocks ORDER BY sort_order, id"
    };
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .context("Failed to list survey blocks")?;
    Ok(rows.iter().map(row_to_block_sqlite).collect())
}

async fn update_block_sqlite(pool: &SqlitePool, block: &SurveyBlock) -> Result<SurveyBlock> {
    let options = block
        .options
        .as_ref()
        .map(serde_json::Value::to_string);
    sqlx::query(
        "UPDATE survey_blocks SET question = ?, kind = ?, options = ?, sort_order = ?, active = ? WHERE id = ?",
    )
    .bind(&block.question)
    .bind(block.kind.to_string())
    .bind(options)
    .bind(block.sort_order)
    .bind(block.active)
    .bind(block.id)
    .execute(pool)
    .await
    .context("Failed to update survey block")?;
    get_block_sqlite(pool, block.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Survey block not found after update"))
}

async fn delete_block_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM survey_blocks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete survey block")?;
    Ok(())
}

async fn add_response_sqlite(
    pool: &SqlitePool,
    block_id: i64,
    guest_id: Option<i64>,
    answer: &str,
) -> Result<SurveyResponse> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO survey_responses (block_id, guest_id, answer, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(block_id)
    .bind(guest_id)
    .bind(answer)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add survey response")?;

    Ok(SurveyResponse {
        id: result.last_insert_rowid(),
        block_id,
        guest_id,
        answer: answer.to_string(),
        created_at: now,
    })
}

async fn list_responses_sqlite(pool: &SqlitePool, block_id: i64) -> Result<Vec<SurveyResponse>> {
    let rows = sqlx::query(
        "SELECT id, block_id, guest_id, answer, created_at FROM survey_responses WHERE block_id = ? ORDER BY id",
    )
    .bind(block_id)
    .fetch_all(pool)
    .await
    .context("Failed to list survey responses")?;
    Ok(rows.iter().map(row_to_response_sqlite).collect())
}

fn row_to_block_sqlite(row: &sqlx::sqlite::SqliteRow) -> SurveyBlock {
    let kind: String = row.get("kind");
    let options: Option<String> = row.get("options");
    SurveyBlock {
        id: row.get("id"),
        question: row.get("question"),
        kind: kind.parse().unwrap_or(SurveyBlockKind::Text),
        options: options.and_then(|s| serde_json::from_str(&s).ok()),
        sort_order: row.get("sort_order"),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

fn row_to_response_sqlite(row: &sqlx::sqlite::SqliteRow) -> SurveyResponse {
    SurveyResponse {
        id: row.get("id"),
        block_id: row.get("block_id"),
        guest_id: row.get("guest_id"),
        answer: row.get("answer"),
        created_at: row.get("created_at"),
    }
}

// MySQL implementations

async fn create_block_mysql(pool: &MySqlPool, block: &SurveyBlock) -> Result<SurveyBlock> {
    let now = Utc::now();
    let options = block
        .options
        .as_ref()
        .map(serde_json::Value::to_string);
    let result = sqlx::query(
        "INSERT INTO survey_blocks (question, kind, options, sort_order, active, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&block.question)
    .bind(block.kind.to_string())
    .bind(options)
    .bind(block.sort_order)
    .bind(block.active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create survey block")?;

    Ok(SurveyBlock {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..block.clone()
    })
}

async fn get_block_mysql(pool: &MySqlPool, id: i64) -> Result<Option<SurveyBlock>> {
    let row = sqlx::query(
        "SELECT id, question, kind, options, sort_order, active, created_at FROM survey_blocks WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get survey block")?;
    Ok(row.map(|r| row_to_block_mysql(&r)))
}

async fn list_blocks_mysql(pool: &MySqlPool, active_only: bool) -> Result<Vec<SurveyBlock>> {
    let sql = if active_only {
        "SELECT id, question, kind, options, sort_order, active, created_at FROM survey_blocks WHERE active = 1 ORDER BY sort_order, id"
    } else {
        "SELECT id, question, kind, options, sort_order, active, created_at FROM survey_blocks ORDER BY sort_order, id"
    };
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .context("Failed to list survey blocks")?;
    Ok(rows.iter().map(row_to_block_mysql).collect())
}

async fn update_block_mysql(pool: &MySqlPool, block: &SurveyBlock) -> Result<SurveyBlock> {
    let options = block
        .options
        .as_ref()
        .map(serde_json::Value::to_string);
    sqlx::query(
        "UPDATE survey_blocks SET question = ?, kind = ?, options = ?, sort_order = ?, active = ? WHERE id = ?",
    )
    .bind(&block.question)
    .bind(block.kind.to_string())
    .bind(options)
    .bind(block.sort_order)
    .bind(block.active)
    .bind(block.id)
    .execute(pool)
    .await
    .context("Failed to update survey block")?;
    get_block_mysql(pool, block.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Survey block not found after update"))
}

async fn delete_block_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM survey_blocks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete survey block")?;
    Ok(())
}

async fn add_response_mysql(
    pool: &MySqlPool,
    block_id: i64,
    guest_id: Option<i64>,
    answer: &str,
) -> Result<SurveyResponse> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO survey_responses (block_id, guest_id, answer, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(block_id)
    .bind(guest_id)
    .bind(answer)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add survey response")?;

    Ok(SurveyResponse {
        id: result.last_insert_id() as i64,
        block_id,
        guest_id,
        answer: answer.to_string(),
        created_at: now,
    })
}

async fn list_responses_mysql(pool: &MySqlPool, block_id: i64) -> Result<Vec<SurveyResponse>> {
    let rows = sqlx::query(
        "SELECT id, block_id, guest_id, answer, created_at FROM survey_responses WHERE block_id = ? ORDER BY id",
    )
    .bind(block_id)
    .fetch_all(pool)
    .await
    .context("Failed to list survey responses")?;
    Ok(rows.iter().map(row_to_response_mysql).collect())
}

fn row_to_block_mysql(row: &sqlx::mysql::MySqlRow) -> SurveyBlock {
    let kind: String = row.get("kind");
    let options: Option<String> = row.get("options");
    SurveyBlock {
        id: row.get("id"),
        question: row.get("question"),
        kind: kind.parse().unwrap_or(SurveyBlockKind::Text),
        options: options.and_then(|s| serde_json::from_str(&s).ok()),
        sort_order: row.get("sort_order"),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

fn row_to_response_mysql(row: &sqlx::mysql::MySqlRow) -> SurveyResponse {
    SurveyResponse {
        id: row.get("id"),
        block_id: row.get("block_id"),
        guest_id: row.get("guest_id"),
        answer: row.get("answer"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use serde_json::json;

    async fn repo() -> SqlxSurveyRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxSurveyRepository::new(pool)
    }

    #[tokio::test]
    async fn test_choice_block_roundtrips_options() {
        let repo = repo().await;
        let mut block = SurveyBlock::new("Song request?".into(), SurveyBlockKind::Choice);
        block.options = Some(json!(["Rock", "Pop", "Jazz"]));

        let created = repo.create_block(&block).await.unwrap();
        let found = repo.get_block(created.id).await.unwrap().unwrap();
        assert_eq!(found.kind, SurveyBlockKind::Choice);
        assert_eq!(found.options, Some(json!(["Rock", "Pop", "Jazz"])));
    }

    #[tokio::test]
    async fn test_active_filter() {
        let repo = repo().await;
        let active = repo
            .create_block(&SurveyBlock::new("Visible".into(), SurveyBlockKind::Text))
            .await
            .unwrap();
        let mut hidden = SurveyBlock::new("Hidden".into(), SurveyBlockKind::Text);
        hidden.active = false;
        repo.create_block(&hidden).await.unwrap();

        let public = repo.list_blocks(true).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, active.id);

        let all = repo.list_blocks(false).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_anonymous_response() {
        let repo = repo().await;
        let block = repo
            .create_block(&SurveyBlock::new("Comments?".into(), SurveyBlockKind::Text))
            .await
            .unwrap();

        repo.add_response(block.id, None, "Congrats!").await.unwrap();
        let responses = repo.list_responses(block.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].guest_id.is_none());
        assert_eq!(responses[0].answer, "Congrats!");
    }

    #[tokio::test]
    async fn test_block_delete_cascades_responses() {
        let repo = repo().await;
        let block = repo
            .create_block(&SurveyBlock::new("Q".into(), SurveyBlockKind::Text))
            .await
            .unwrap();
        repo.add_response(block.id, None, "A").await.unwrap();

        repo.delete_block(block.id).await.unwrap();
        assert!(repo.get_block(block.id).await.unwrap().is_none());
        assert!(repo.list_responses(block.id).await.unwrap().is_empty());
    }
}
