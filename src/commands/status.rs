//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::state::{StateDb, SyncRun};
use serde::Serialize;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub database_id: Option<String>,
    pub readwise_token_set: bool,
    pub notion_token_set: bool,
    pub watermark: Option<String>,
    pub days_to_sync: Option<u32>,
    pub respect_deletions: bool,
    pub synced_items: usize,
    pub last_run: Option<SyncRun>,
}

/// Get sync status
pub async fn cmd_status(config: &Config, db: &StateDb) -> Result<StatusInfo> {
    info!("Getting status");

    let watermark = db.load_watermark().await?.map(|w| w.to_rfc3339());

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        database_id: config.database_id().ok(),
        readwise_token_set: config.readwise_token().is_ok(),
        notion_token_set: config.notion_token().is_ok(),
        watermark,
        days_to_sync: config.sync.days_to_sync,
        respect_deletions: config.sync.respect_deletions,
        synced_items: db.ledger_size().await?,
        last_run: db.latest_run().await?,
    })
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "set"
    } else {
        "missing"
    }
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 readwise-notion-sync Status\n");
    println!("Configuration: {}", status.config_path);
    println!("State: {}", status.db_path);
    println!("\nCredentials:");
    println!("  Readwise token: {}", yes_no(status.readwise_token_set));
    println!("  Notion token: {}", yes_no(status.notion_token_set));
    println!(
        "  Notion database: {}",
        status.database_id.as_deref().unwrap_or("missing")
    );
    println!("\nSync:");
    println!(
        "  Watermark: {}",
        status.watermark.as_deref().unwrap_or("none (next run is a full sync)")
    );
    if let Some(days) = status.days_to_sync {
        println!("  Days to sync: {}", days);
    }
    println!("  Respect deletions: {}", status.respect_deletions);
    println!("  Items ever synced: {}", status.synced_items);

    if let Some(run) = &status.last_run {
        println!("\nLast run:");
        println!("  Started: {}", run.started_at);
        println!("  Status: {}", run.status);
        if let Some(completed) = &run.completed_at {
            println!("  Finished: {}", completed);
        }
        println!(
            "  Created: {}  Updated: {}  Skipped: {}  Failed: {}",
            run.created, run.updated, run.skipped, run.failed
        );
        if let Some(error) = &run.error {
            println!("  Error: {}", error);
        }
    }
}
