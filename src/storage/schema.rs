//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY,
            run_id TEXT NOT NULL,
            timestamp TEXT NOT NULL UNIQUE,
            passed INTEGER NOT NULL,
            failed INTEGER NOT NULL,
            broken INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            unknown INTEGER NOT NULL DEFAULT 0,
            total_duration_ms INTEGER NOT NULL,
            min_duration_ms INTEGER NOT NULL DEFAULT 0,
            max_duration_ms INTEGER NOT NULL DEFAULT 0,
            avg_duration_ms REAL NOT NULL DEFAULT 0,
            total_retries INTEGER NOT NULL DEFAULT 0,
            flaky_tests INTEGER NOT NULL DEFAULT 0,
            flaky_ids_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS screen_timings (
            id INTEGER PRIMARY KEY,
            run_rowid INTEGER NOT NULL,
            screen TEXT NOT NULL,
            min_ms REAL NOT NULL,
            max_ms REAL NOT NULL,
            avg_ms REAL NOT NULL,
            samples_json TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (run_rowid) REFERENCES runs(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_runs_timestamp ON runs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_screen_timings_run ON screen_timings(run_rowid);",
    )?;

    Ok(())
}
