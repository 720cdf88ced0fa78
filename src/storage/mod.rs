//! SQLite storage layer -- schema, queries, migrations.
//!
//! The run history is append-only: records enter through [`append_run`],
//! which enforces the strictly-increasing-timestamp invariant, and leave
//! only as ordered query results.

pub mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::ingest::{RunRecord, ScreenTiming};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run {run_id} at {timestamp} does not advance the history (latest stored run is at {latest})")]
    NonMonotonicTimestamp {
        run_id: String,
        timestamp: String,
        latest: String,
    },
}

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data directory: {}", parent.display()))?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Append one run to the history.
///
/// Fails without mutating the store when the run's timestamp is not strictly
/// greater than the latest stored run's timestamp.
pub fn append_run(pool: &Pool, run: &RunRecord) -> Result<i64> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    if let Some(latest) = latest_timestamp(&tx)? {
        if run.timestamp <= latest {
            anyhow::bail!(StoreError::NonMonotonicTimestamp {
                run_id: run.run_id.clone(),
                timestamp: run.timestamp.to_rfc3339(),
                latest: latest.to_rfc3339(),
            });
        }
    }

    let flaky_ids_json = serde_json::to_string(&run.flaky_test_ids)?;
    tx.execute(
        "INSERT INTO runs (run_id, timestamp, passed, failed, broken, skipped, unknown,
                           total_duration_ms, min_duration_ms, max_duration_ms,
                           avg_duration_ms, total_retries, flaky_tests, flaky_ids_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            run.run_id,
            run.timestamp.to_rfc3339(),
            run.passed,
            run.failed,
            run.broken,
            run.skipped,
            run.unknown,
            run.total_duration_ms as i64,
            run.min_duration_ms as i64,
            run.max_duration_ms as i64,
            run.avg_duration_ms,
            run.total_retries,
            run.flaky_tests,
            flaky_ids_json,
        ],
    )?;
    let run_rowid = tx.last_insert_rowid();

    for screen in &run.screens {
        let samples_json = serde_json::to_string(&screen.samples)?;
        tx.execute(
            "INSERT INTO screen_timings (run_rowid, screen, min_ms, max_ms, avg_ms, samples_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_rowid,
                screen.screen,
                screen.min_ms,
                screen.max_ms,
                screen.avg_ms,
                samples_json,
            ],
        )?;
    }

    tx.commit()?;

    tracing::info!(run_id = %run.run_id, timestamp = %run.timestamp, "run appended to history");
    Ok(run_rowid)
}

/// Query runs within an optional time range, ordered by timestamp ascending,
/// with their screen timings attached.
pub fn query_runs(
    pool: &Pool,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<Vec<RunRecord>> {
    let conn = pool.get()?;

    let since_str = since.map(|t| t.to_rfc3339());
    let until_str = until.map(|t| t.to_rfc3339());

    let mut stmt = conn.prepare(
        "SELECT id, run_id, timestamp, passed, failed, broken, skipped, unknown,
                total_duration_ms, min_duration_ms, max_duration_ms, avg_duration_ms,
                total_retries, flaky_tests, flaky_ids_json
         FROM runs
         WHERE (?1 IS NULL OR timestamp >= ?1)
           AND (?2 IS NULL OR timestamp <= ?2)
         ORDER BY timestamp ASC",
    )?;

    let raw: Vec<RawRun> = stmt
        .query_map(params![since_str, until_str], |row| {
            Ok(RawRun {
                rowid: row.get(0)?,
                run_id: row.get(1)?,
                timestamp: row.get(2)?,
                passed: row.get(3)?,
                failed: row.get(4)?,
                broken: row.get(5)?,
                skipped: row.get(6)?,
                unknown: row.get(7)?,
                total_duration_ms: row.get(8)?,
                min_duration_ms: row.get(9)?,
                max_duration_ms: row.get(10)?,
                avg_duration_ms: row.get(11)?,
                total_retries: row.get(12)?,
                flaky_tests: row.get(13)?,
                flaky_ids_json: row.get(14)?,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;

    let mut runs = Vec::with_capacity(raw.len());
    for r in raw {
        let screens = load_screen_timings(&conn, r.rowid)?;
        runs.push(r.into_record(screens)?);
    }

    Ok(runs)
}

/// Number of runs recorded in the history.
pub fn run_count(pool: &Pool) -> Result<u64> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
    Ok(count as u64)
}

struct RawRun {
    rowid: i64,
    run_id: String,
    timestamp: String,
    passed: i64,
    failed: i64,
    broken: i64,
    skipped: i64,
    unknown: i64,
    total_duration_ms: i64,
    min_duration_ms: i64,
    max_duration_ms: i64,
    avg_duration_ms: f64,
    total_retries: i64,
    flaky_tests: i64,
    flaky_ids_json: String,
}

impl RawRun {
    fn into_record(self, screens: Vec<ScreenTiming>) -> Result<RunRecord> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .with_context(|| format!("malformed timestamp in runs table: {}", self.timestamp))?
            .with_timezone(&Utc);
        let flaky_test_ids: Vec<String> = serde_json::from_str(&self.flaky_ids_json)
            .context("malformed flaky_ids_json in runs table")?;

        Ok(RunRecord {
            run_id: self.run_id,
            timestamp,
            passed: self.passed as u32,
            failed: self.failed as u32,
            broken: self.broken as u32,
            skipped: self.skipped as u32,
            unknown: self.unknown as u32,
            total_duration_ms: self.total_duration_ms as u64,
            min_duration_ms: self.min_duration_ms as u64,
            max_duration_ms: self.max_duration_ms as u64,
            avg_duration_ms: self.avg_duration_ms,
            total_retries: self.total_retries as u32,
            flaky_tests: self.flaky_tests as u32,
            flaky_test_ids,
            screens,
        })
    }
}

fn load_screen_timings(conn: &Connection, run_rowid: i64) -> Result<Vec<ScreenTiming>> {
    let mut stmt = conn.prepare(
        "SELECT screen, min_ms, max_ms, avg_ms, samples_json
         FROM screen_timings
         WHERE run_rowid = ?1
         ORDER BY screen ASC",
    )?;

    let raw: Vec<(String, f64, f64, f64, String)> = stmt
        .query_map(params![run_rowid], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?
        .collect::<std::result::Result<_, _>>()?;

    let mut screens = Vec::with_capacity(raw.len());
    for (screen, min_ms, max_ms, avg_ms, samples_json) in raw {
        let samples: Vec<f64> = serde_json::from_str(&samples_json)
            .context("malformed samples_json in screen_timings table")?;
        screens.push(ScreenTiming {
            screen,
            min_ms,
            max_ms,
            avg_ms,
            samples,
        });
    }

    Ok(screens)
}

fn latest_timestamp(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let latest: Option<String> = conn
        .query_row(
            "SELECT timestamp FROM runs ORDER BY timestamp DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match latest {
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(&raw)
                .with_context(|| format!("malformed timestamp in runs table: {raw}"))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("test.db");
        let pool = open_pool(db.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn sample_run(run_id: &str, secs: i64) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            passed: 90,
            failed: 10,
            broken: 1,
            skipped: 2,
            unknown: 0,
            total_duration_ms: 600_000,
            min_duration_ms: 50,
            max_duration_ms: 30_000,
            avg_duration_ms: 5825.24,
            total_retries: 4,
            flaky_tests: 2,
            flaky_test_ids: vec!["test_send".into(), "test_swap".into()],
            screens: vec![ScreenTiming {
                screen: "wallet".into(),
                min_ms: 900.0,
                max_ms: 1400.0,
                avg_ms: 1100.0,
                samples: vec![900.0, 1000.0, 1400.0],
            }],
        }
    }

    #[test]
    fn test_append_and_query_roundtrip() {
        let (_dir, pool) = test_pool();

        append_run(&pool, &sample_run("aaa1111", 100)).unwrap();
        append_run(&pool, &sample_run("bbb2222", 200)).unwrap();

        let runs = query_runs(&pool, None, None).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "aaa1111");
        assert_eq!(runs[1].run_id, "bbb2222");
        assert!(runs[0].timestamp < runs[1].timestamp);

        // Full record fidelity, screen timings included.
        assert_eq!(runs[0], sample_run("aaa1111", 100));
    }

    #[test]
    fn test_non_monotonic_append_rejected_without_mutation() {
        let (_dir, pool) = test_pool();

        append_run(&pool, &sample_run("aaa1111", 200)).unwrap();

        // Equal timestamp
        let err = append_run(&pool, &sample_run("bbb2222", 200)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NonMonotonicTimestamp { .. })
        ));

        // Earlier timestamp
        let err = append_run(&pool, &sample_run("ccc3333", 100)).unwrap_err();
        assert!(err.downcast_ref::<StoreError>().is_some());

        // The rejected appends must not have touched the store.
        assert_eq!(run_count(&pool).unwrap(), 1);
        let runs = query_runs(&pool, None, None).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "aaa1111");
    }

    #[test]
    fn test_query_time_range() {
        let (_dir, pool) = test_pool();
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            append_run(&pool, &sample_run(id, (i as i64 + 1) * 100)).unwrap();
        }

        let since = Utc.timestamp_opt(200, 0).unwrap();
        let until = Utc.timestamp_opt(300, 0).unwrap();

        let runs = query_runs(&pool, Some(since), Some(until)).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "b");
        assert_eq!(runs[1].run_id, "c");

        let tail = query_runs(&pool, Some(since), None).unwrap();
        assert_eq!(tail.len(), 3);
    }

    #[test]
    fn test_empty_store() {
        let (_dir, pool) = test_pool();
        assert_eq!(run_count(&pool).unwrap(), 0);
        assert!(query_runs(&pool, None, None).unwrap().is_empty());
    }
}
