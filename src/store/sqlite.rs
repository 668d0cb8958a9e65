use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{merge_ranking, JobResult, RankingEntry, ResultStore};
use crate::config::RankingPolicy;
use crate::error::StoreError;
use crate::rating::Tier;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_results (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id              TEXT    NOT NULL,
    participant_key     TEXT    NOT NULL,
    display_name        TEXT    NOT NULL,
    functional_score    INTEGER NOT NULL,
    functional_status   TEXT    NOT NULL,
    availability_tier   INTEGER NOT NULL,
    availability_status TEXT    NOT NULL,
    total_score         INTEGER NOT NULL,
    executed_at_ms      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS job_results_participant ON job_results(participant_key);

CREATE TABLE IF NOT EXISTS rankings (
    display_name   TEXT PRIMARY KEY,
    score          INTEGER NOT NULL,
    executed_at_ms INTEGER NOT NULL
);
"#;

/// SQLite-backed store. Statements run on the blocking pool, one at a time.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "Opened result database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Task("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn insert_result(&self, result: &JobResult) -> Result<(), StoreError> {
        let result = result.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO job_results (
                    job_id, participant_key, display_name,
                    functional_score, functional_status,
                    availability_tier, availability_status,
                    total_score, executed_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    result.job_id.to_string(),
                    result.participant_key,
                    result.display_name,
                    to_sql_int(result.functional_score),
                    result.functional_status,
                    to_sql_int(result.availability_tier.value()),
                    result.availability_status,
                    to_sql_int(result.total_score),
                    result.executed_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_ranking(
        &self,
        entry: RankingEntry,
        policy: RankingPolicy,
    ) -> Result<RankingEntry, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(
                    "SELECT display_name, score, executed_at_ms FROM rankings WHERE display_name = ?1",
                    params![entry.display_name],
                    read_ranking_row,
                )
                .optional()?;

            let merged = merge_ranking(existing.as_ref(), entry, policy);
            tx.execute(
                r#"
                INSERT INTO rankings (display_name, score, executed_at_ms)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(display_name) DO UPDATE SET
                    score = excluded.score,
                    executed_at_ms = excluded.executed_at_ms
                "#,
                params![
                    merged.display_name,
                    to_sql_int(merged.score),
                    merged.executed_at.timestamp_millis(),
                ],
            )?;
            tx.commit()?;
            Ok(merged)
        })
        .await
    }

    async fn results(&self, participant_key: Option<&str>) -> Result<Vec<JobResult>, StoreError> {
        let participant_key = participant_key.map(str::to_string);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT job_id, participant_key, display_name,
                       functional_score, functional_status,
                       availability_tier, availability_status,
                       total_score, executed_at_ms
                FROM job_results
                WHERE ?1 IS NULL OR participant_key = ?1
                ORDER BY id
                "#,
            )?;
            let rows = stmt.query_map(params![participant_key], read_result_row)?;
            let results = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(results)
        })
        .await
    }

    async fn rankings(&self) -> Result<Vec<RankingEntry>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT display_name, score, executed_at_ms
                FROM rankings
                ORDER BY score DESC, executed_at_ms ASC, display_name ASC
                "#,
            )?;
            let rows = stmt.query_map([], read_ranking_row)?;
            let entries = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }
}

fn read_result_row(row: &rusqlite::Row<'_>) -> Result<JobResult, rusqlite::Error> {
    let job_id: String = row.get(0)?;
    let tier: i64 = row.get(5)?;
    Ok(JobResult {
        job_id: Uuid::parse_str(&job_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        participant_key: row.get(1)?,
        display_name: row.get(2)?,
        functional_score: from_sql_int(row.get(3)?),
        functional_status: row.get(4)?,
        availability_tier: Tier::from_value(from_sql_int(tier))
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(5, tier))?,
        availability_status: row.get(6)?,
        total_score: from_sql_int(row.get(7)?),
        executed_at: timestamp(8, row.get(8)?)?,
    })
}

fn read_ranking_row(row: &rusqlite::Row<'_>) -> Result<RankingEntry, rusqlite::Error> {
    Ok(RankingEntry {
        display_name: row.get(0)?,
        score: from_sql_int(row.get(1)?),
        executed_at: timestamp(2, row.get(2)?)?,
    })
}

fn timestamp(idx: usize, ms: i64) -> Result<DateTime<Utc>, rusqlite::Error> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
