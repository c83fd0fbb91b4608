//! SQLite schema definition

/// SQL schema for the sync state database
pub const SCHEMA_SQL: &str = r#"
-- Watermark: single row, RFC 3339 UTC timestamp of the last committed run start
CREATE TABLE IF NOT EXISTS watermark (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Synced items: every source item id that has ever been mirrored
CREATE TABLE IF NOT EXISTS synced_items (
    external_id TEXT PRIMARY KEY,
    first_synced_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

-- Sync runs: tracking history
CREATE TABLE IF NOT EXISTS sync_runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    items_fetched INTEGER DEFAULT 0,
    created INTEGER DEFAULT 0,
    updated INTEGER DEFAULT 0,
    skipped INTEGER DEFAULT 0,
    failed INTEGER DEFAULT 0,
    highlights_appended INTEGER DEFAULT 0,
    summary_json TEXT,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_started ON sync_runs(started_at);
"#;
