//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! supported dialect, so a single binary can bring up either backend.
//! Applied versions are tracked in a `_migrations` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations for the rsvply schema.
pub const MIGRATIONS: &[Migration] = &[
    // Migration 1: guests. One row per invitee; dependents (plus-one, kids)
    // share the primary guest's code and point at it via parent_id.
    Migration {
        version: 1,
        name: "create_guests",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS guests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code VARCHAR(16) NOT NULL,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(255),
                is_primary INTEGER NOT NULL DEFAULT 1,
                parent_id INTEGER,
                plus_one_allowed INTEGER NOT NULL DEFAULT 0,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                dietary TEXT,
                notes TEXT,
                rsvp_deadline TIMESTAMP,
                responded_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (parent_id) REFERENCES guests(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_guests_code ON guests(code);
            CREATE INDEX IF NOT EXISTS idx_guests_parent_id ON guests(parent_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_guests_primary_code
                ON guests(code) WHERE is_primary = 1;
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS guests (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                code VARCHAR(16) NOT NULL,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(255),
                is_primary TINYINT(1) NOT NULL DEFAULT 1,
                parent_id BIGINT,
                plus_one_allowed TINYINT(1) NOT NULL DEFAULT 0,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                dietary TEXT,
                notes TEXT,
                rsvp_deadline TIMESTAMP NULL,
                responded_at TIMESTAMP NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (parent_id) REFERENCES guests(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_guests_code ON guests(code);
            CREATE INDEX idx_guests_parent_id ON guests(parent_id)
        "#,
    },
    // Migration 2: email templates, one subject/body pair per (name, locale)
    Migration {
        version: 2,
        name: "create_templates",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL,
                locale VARCHAR(10) NOT NULL DEFAULT 'en',
                subject VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (name, locale)
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS templates (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) NOT NULL,
                locale VARCHAR(10) NOT NULL DEFAULT 'en',
                subject VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                UNIQUE KEY uq_templates_name_locale (name, locale)
            )
        "#,
    },
    // Migration 3: bulk email campaigns and per-recipient delivery status
    Migration {
        version: 3,
        name: "create_messages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMP,
                sent_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_messages_status ON messages(status);
            CREATE TABLE IF NOT EXISTS message_recipients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL,
                guest_id INTEGER NOT NULL,
                email VARCHAR(255) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                error TEXT,
                sent_at TIMESTAMP,
                FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE,
                FOREIGN KEY (guest_id) REFERENCES guests(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_message_recipients_message_id
                ON message_recipients(message_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS messages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                subject VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMP NULL,
                sent_at TIMESTAMP NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_messages_status ON messages(status);
            CREATE TABLE IF NOT EXISTS message_recipients (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                message_id BIGINT NOT NULL,
                guest_id BIGINT NOT NULL,
                email VARCHAR(255) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                error TEXT,
                sent_at TIMESTAMP NULL,
                FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE,
                FOREIGN KEY (guest_id) REFERENCES guests(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_message_recipients_message_id ON message_recipients(message_id)
        "#,
    },
    // Migration 4: CMS pages with per-locale translations
    Migration {
        version: 4,
        name: "create_pages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(100) NOT NULL UNIQUE,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS page_translations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                locale VARCHAR(10) NOT NULL,
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                UNIQUE (page_id, locale)
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS pages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(100) NOT NULL UNIQUE,
                sort_order INT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS page_translations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                page_id BIGINT NOT NULL,
                locale VARCHAR(10) NOT NULL,
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                UNIQUE KEY uq_page_translations (page_id, locale)
            )
        "#,
    },
    // Migration 5: survey blocks and responses
    Migration {
        version: 5,
        name: "create_surveys",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS survey_blocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question VARCHAR(500) NOT NULL,
                kind VARCHAR(20) NOT NULL DEFAULT 'text',
                options TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS survey_responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                block_id INTEGER NOT NULL,
                guest_id INTEGER,
                answer TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (block_id) REFERENCES survey_blocks(id) ON DELETE CASCADE,
                FOREIGN KEY (guest_id) REFERENCES guests(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_survey_responses_block_id
                ON survey_responses(block_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS survey_blocks (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                question VARCHAR(500) NOT NULL,
                kind VARCHAR(20) NOT NULL DEFAULT 'text',
                options TEXT,
                sort_order INT NOT NULL DEFAULT 0,
                active TINYINT(1) NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS survey_responses (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                block_id BIGINT NOT NULL,
                guest_id BIGINT NULL,
                answer TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (block_id) REFERENCES survey_blocks(id) ON DELETE CASCADE,
                FOREIGN KEY (guest_id) REFERENCES guests(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_survey_responses_block_id ON survey_responses(block_id)
        "#,
    },
];

/// Get a migration by version number
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

/// Run all pending migrations, returning the number applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// List of already applied migrations
pub async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            applied_rows_sqlite(pool.as_sqlite().expect("sqlite pool")).await
        }
        DatabaseDriver::Mysql => applied_rows_mysql(pool.as_mysql().expect("mysql pool")).await,
    }
}

async fn applied_rows_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn applied_rows_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            let sqlite = pool.as_sqlite().expect("sqlite pool");
            for statement in split_sql_statements(migration.up_sqlite) {
                sqlx::query(statement)
                    .execute(sqlite)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(sqlite)
                .await?;
        }
        DatabaseDriver::Mysql => {
            let mysql = pool.as_mysql().expect("mysql pool");
            for statement in split_sql_statements(migration.up_mysql) {
                sqlx::query(statement)
                    .execute(mysql)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(mysql)
                .await?;
        }
    }

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(stmt: &str) -> bool {
    stmt.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}
