//! Run summary

use serde::{Deserialize, Serialize};

/// One item that could not be reconciled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub title: String,
    pub error: String,
}

/// Sync statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub items_fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub highlights_appended: usize,
    /// Data-integrity warnings (duplicate ids, count regressions, unmapped categories)
    pub anomalies: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl SyncStats {
    pub fn record_failure(&mut self, id: &str, title: &str, error: impl std::fmt::Display) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            id: id.to_string(),
            title: title.to_string(),
            error: error.to_string(),
        });
    }

    pub fn record_anomaly(&mut self, message: impl Into<String>) {
        self.anomalies.push(message.into());
    }
}

/// Print sync stats to console
pub fn print_sync_stats(stats: &SyncStats) {
    println!("\n🔄 Sync Complete\n");
    println!("Items fetched: {}", stats.items_fetched);
    println!("Pages created: {}", stats.created);
    println!("Pages updated: {}", stats.updated);
    println!("Items skipped: {}", stats.skipped);
    println!("Highlights appended: {}", stats.highlights_appended);
    if stats.failed > 0 {
        println!("Items failed: {}", stats.failed);
    }

    if !stats.anomalies.is_empty() {
        println!("\nWarnings:");
        for anomaly in &stats.anomalies {
            println!("- {}", anomaly);
        }
    }

    if !stats.failures.is_empty() {
        println!("\nErrors:");
        for failure in &stats.failures {
            println!("- {} ({}): {}", failure.title, failure.id, failure.error);
        }
    }
}
