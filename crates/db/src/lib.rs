//! SQLite connection pool and schema bootstrap.
//!
//! [`Database`] wraps a `sqlx::SqlitePool` opened in WAL mode with a busy
//! timeout. Schema changes come from the modules' [`Migration`]s; each one is
//! applied once and recorded in the `_readlog_migrations` ledger table, so
//! booting against an existing file is a no-op.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use readlog_kernel::settings::DatabaseSettings;
use readlog_kernel::Migration;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

const LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS _readlog_migrations (
    module     TEXT NOT NULL,
    id         TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (module, id)
)
"#;

/// Holds a connection pool to the SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file described by `settings`.
    pub async fn open(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        if let Some(parent) = settings.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&settings.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(settings.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database {}", settings.path.display()))?;

        tracing::info!(path = %settings.path.display(), "database opened");

        let db = Self { pool };
        db.ensure_ledger().await?;
        Ok(db)
    }

    /// Create a private in-memory database.
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every new SQLite memory connection would start from an empty schema.
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("invalid in-memory connection string")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open in-memory database")?;

        let db = Self { pool };
        db.ensure_ledger().await?;
        Ok(db)
    }

    async fn ensure_ledger(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(LEDGER_DDL)
            .execute(&self.pool)
            .await
            .context("failed to create migration ledger")?;
        Ok(())
    }

    /// Apply every migration not yet recorded in the ledger.
    /// Returns the number of migrations applied by this call.
    pub async fn apply_migrations(
        &self,
        migrations: &[(String, Migration)],
    ) -> anyhow::Result<usize> {
        let mut applied = 0;

        for (module, migration) in migrations {
            let mut tx = self.pool.begin().await?;

            let seen: Option<(String,)> =
                sqlx::query_as("SELECT id FROM _readlog_migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&mut *tx)
                    .await?;

            if seen.is_some() {
                continue;
            }

            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| {
                    format!("migration '{}' of module '{}' failed", migration.id, module)
                })?;

            sqlx::query("INSERT INTO _readlog_migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::info!(module = %module, migration = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
