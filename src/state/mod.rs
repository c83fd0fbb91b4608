//! Sync state storage using SQLite
//!
//! This module holds everything that must survive between runs:
//! - The watermark (lower bound for the next incremental fetch)
//! - The ledger of source item ids that have ever been synced
//! - Run history
//!
//! The watermark, the ledger additions and the run's completion record are
//! written together in one transaction by [`StateDb::commit`].

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::SyncStats;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sync run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(Error::Other(format!("Unknown run status: {}", s))),
        }
    }
}

/// One row of run history
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub items_fetched: i64,
    pub created: i64,
    pub updated: i64,
    pub skipped: i64,
    pub failed: i64,
    pub highlights_appended: i64,
    pub summary_json: Option<String>,
    pub error: Option<String>,
}

impl SyncRun {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: format_timestamp(started_at),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            items_fetched: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            highlights_appended: 0,
            summary_json: None,
            error: None,
        }
    }

    pub fn get_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

/// Sortable textual form used for every stored timestamp
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// State database handle
#[derive(Clone)]
pub struct StateDb {
    pool: SqlitePool,
}

impl StateDb {
    /// Connect to the state database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing state database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='sync_runs'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Watermark =====

    /// Last committed watermark.
    ///
    /// `None` means a full sync: either no run has committed yet or the stored
    /// value cannot be parsed.
    pub async fn load_watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM watermark WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        let Some(value) = value else {
            debug!("No watermark stored");
            return Ok(None);
        };

        match DateTime::parse_from_rfc3339(value.trim()) {
            Ok(at) => Ok(Some(at.with_timezone(&Utc))),
            Err(e) => {
                warn!(value = %value, error = %e, "Unreadable watermark, falling back to full sync");
                Ok(None)
            }
        }
    }

    // ===== Synced-item ledger =====

    /// Every source item id that has ever been synced
    pub async fn synced_ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT external_id FROM synced_items")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn ledger_size(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM synced_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    // ===== Run history =====

    /// Record the start of a run
    pub async fn start_run(&self, started_at: DateTime<Utc>) -> Result<SyncRun> {
        let run = SyncRun::new(started_at);
        sqlx::query("INSERT INTO sync_runs (id, started_at, status) VALUES (?, ?, ?)")
            .bind(&run.id)
            .bind(&run.started_at)
            .bind(&run.status)
            .execute(&self.pool)
            .await?;
        Ok(run)
    }

    /// Mark a run as aborted. The watermark is not touched.
    pub async fn fail_run(&self, run_id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE sync_runs SET completed_at = ?, status = ?, error = ? WHERE id = ?")
            .bind(format_timestamp(Utc::now()))
            .bind(RunStatus::Failed.to_string())
            .bind(error)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist the outcome of a completed reconciliation pass.
    ///
    /// Advances the watermark, extends the ledger and completes the run row
    /// in a single transaction. Nothing is written if any statement fails.
    pub async fn commit(
        &self,
        run_id: &str,
        watermark: DateTime<Utc>,
        synced_ids: &[String],
        stats: &SyncStats,
    ) -> Result<()> {
        let now = format_timestamp(Utc::now());
        let value = format_timestamp(watermark);
        let summary_json = serde_json::to_string(stats)?;

        let mut tx = self.pool.begin().await?;

        for id in synced_ids {
            sqlx::query(
                r#"
                INSERT INTO synced_items (external_id, first_synced_at, last_synced_at)
                VALUES (?, ?, ?)
                ON CONFLICT(external_id) DO UPDATE SET last_synced_at = excluded.last_synced_at
                "#,
            )
            .bind(id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE sync_runs SET
                completed_at = ?,
                status = ?,
                items_fetched = ?,
                created = ?,
                updated = ?,
                skipped = ?,
                failed = ?,
                highlights_appended = ?,
                summary_json = ?
            WHERE id = ?
            "#,
        )
        .bind(&now)
        .bind(RunStatus::Completed.to_string())
        .bind(stats.items_fetched as i64)
        .bind(stats.created as i64)
        .bind(stats.updated as i64)
        .bind(stats.skipped as i64)
        .bind(stats.failed as i64)
        .bind(stats.highlights_appended as i64)
        .bind(&summary_json)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO watermark (id, value, updated_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&value)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(watermark = %value, "Committed sync state");
        Ok(())
    }

    /// Most recent run, whatever its outcome
    pub async fn latest_run(&self) -> Result<Option<SyncRun>> {
        let run = sqlx::query_as::<_, SyncRun>(
            "SELECT * FROM sync_runs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    #[cfg(test)]
    pub(crate) async fn set_raw_watermark(&self, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watermark (id, value, updated_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(value)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
