//! Repository Implementation

use crate::StorageError;
use chrono::{DateTime, Utc};
use record_builder::{DerivedRecord, SwingMetrics};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS swing_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(name) > 0),
    swings_competitive INTEGER,
    percent_swings_competitive REAL,
    contact INTEGER,
    avg_bat_speed REAL,
    hard_swing_rate REAL,
    squared_up_per_bat_contact REAL,
    squared_up_per_swing REAL,
    blast_per_bat_contact REAL,
    blast_per_swing REAL,
    swing_length REAL,
    swords INTEGER,
    batter_run_value REAL,
    whiffs INTEGER,
    whiff_per_swing REAL,
    batted_ball_events INTEGER,
    batted_ball_event_per_swing REAL,
    features TEXT NOT NULL,
    signal INTEGER NOT NULL,
    signal_is_derived INTEGER NOT NULL,
    timestamp_ms INTEGER NOT NULL
)";

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_swing_stats_timestamp ON swing_stats (timestamp_ms)",
    "CREATE INDEX IF NOT EXISTS idx_swing_stats_name ON swing_stats (name)",
];

const INSERT: &str = "INSERT INTO swing_stats (
    name, swings_competitive, percent_swings_competitive, contact, avg_bat_speed,
    hard_swing_rate, squared_up_per_bat_contact, squared_up_per_swing,
    blast_per_bat_contact, blast_per_swing, swing_length, swords, batter_run_value,
    whiffs, whiff_per_swing, batted_ball_events, batted_ball_event_per_swing,
    features, signal, signal_is_derived, timestamp_ms
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SELECT_RECENT: &str =
    "SELECT * FROM swing_stats ORDER BY timestamp_ms DESC, id DESC LIMIT ?";

/// A persisted record with its storage id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: DerivedRecord,
}

/// In-memory record log
struct MemoryStore {
    records: Mutex<VecDeque<StoredRecord>>,
    next_id: Mutex<i64>,
    max_records: usize,
}

enum Backend {
    Memory(MemoryStore),
    Sqlite(SqlitePool),
}

/// Repository for derived records
pub struct Repository {
    backend: Backend,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::with_capacity(100_000)
    }

    /// Create an in-memory repository that retains at most `max_records`
    pub fn with_capacity(max_records: usize) -> Self {
        info!("Creating in-memory repository (retention {})", max_records);
        Self {
            backend: Backend::Memory(MemoryStore {
                records: Mutex::new(VecDeque::with_capacity(max_records.min(10_000))),
                next_id: Mutex::new(1),
                max_records,
            }),
        }
    }

    /// Open a SQLite database and create the schema if needed
    pub async fn with_sqlite(db_url: &str) -> Result<Self, StorageError> {
        let in_memory = db_url.contains(":memory:") || db_url.contains("mode=memory");
        let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);

        // An in-memory database lives as long as its only connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement).execute(&pool).await?;
        }

        info!("Opened SQLite repository at {}", db_url);
        Ok(Self {
            backend: Backend::Sqlite(pool),
        })
    }

    /// Open the repository named by a URL; `memory` selects the in-memory backend
    pub async fn connect(db_url: &str) -> Result<Self, StorageError> {
        if db_url == "memory" {
            Ok(Self::new())
        } else {
            Self::with_sqlite(db_url).await
        }
    }

    /// Persist a batch as one unit, returning the assigned ids.
    ///
    /// Either every record is stored or none is.
    pub async fn insert_batch(&self, records: &[DerivedRecord]) -> Result<Vec<i64>, StorageError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(bad) = records.iter().position(|r| r.name.trim().is_empty()) {
            return Err(StorageError::ConstraintViolation(format!(
                "record {} has an empty name",
                bad
            )));
        }

        let ids = match &self.backend {
            Backend::Memory(store) => store.insert_batch(records)?,
            Backend::Sqlite(pool) => insert_sqlite(pool, records).await?,
        };

        debug!("Committed batch of {} records", ids.len());
        Ok(ids)
    }

    /// Most recent records, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, StorageError> {
        match &self.backend {
            Backend::Memory(store) => store.recent(limit),
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(SELECT_RECENT)
                    .bind(limit as i64)
                    .fetch_all(pool)
                    .await?;
                rows.iter().map(decode_row).collect()
            }
        }
    }

    /// Get total record count
    pub async fn count(&self) -> Result<usize, StorageError> {
        match &self.backend {
            Backend::Memory(store) => {
                let len = store.lock()?.len();
                Ok(len)
            }
            Backend::Sqlite(pool) => {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM swing_stats")
                    .fetch_one(pool)
                    .await?;
                Ok(count as usize)
            }
        }
    }

    /// Release the connection pool
    pub async fn close(&self) {
        if let Backend::Sqlite(pool) = &self.backend {
            pool.close().await;
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<StoredRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }

    fn insert_batch(&self, records: &[DerivedRecord]) -> Result<Vec<i64>, StorageError> {
        let mut log = self.lock()?;
        let mut next_id = self
            .next_id
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            // Enforce retention
            while log.len() >= self.max_records {
                log.pop_front();
            }

            ids.push(*next_id);
            log.push_back(StoredRecord {
                id: *next_id,
                record: record.clone(),
            });
            *next_id += 1;
        }

        Ok(ids)
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, StorageError> {
        let log = self.lock()?;
        let mut records: Vec<_> = log.iter().cloned().collect();
        records.sort_by(|a, b| {
            b.record
                .timestamp
                .cmp(&a.record.timestamp)
                .then(b.id.cmp(&a.id))
        });
        records.truncate(limit);
        Ok(records)
    }
}

async fn insert_sqlite(pool: &SqlitePool, records: &[DerivedRecord]) -> Result<Vec<i64>, StorageError> {
    // Dropping the transaction on any early return rolls it back
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(records.len());

    for record in records {
        let m = &record.metrics;
        let features = serde_json::to_string(&record.features)?;
        let result = sqlx::query(INSERT)
            .bind(record.name.as_str())
            .bind(m.swings_competitive)
            .bind(m.percent_swings_competitive)
            .bind(m.contact)
            .bind(m.avg_bat_speed)
            .bind(m.hard_swing_rate)
            .bind(m.squared_up_per_bat_contact)
            .bind(m.squared_up_per_swing)
            .bind(m.blast_per_bat_contact)
            .bind(m.blast_per_swing)
            .bind(m.swing_length)
            .bind(m.swords)
            .bind(m.batter_run_value)
            .bind(m.whiffs)
            .bind(m.whiff_per_swing)
            .bind(m.batted_ball_events)
            .bind(m.batted_ball_event_per_swing)
            .bind(features)
            .bind(record.signal)
            .bind(record.signal_is_derived)
            .bind(record.timestamp.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        ids.push(result.last_insert_rowid());
    }

    tx.commit().await?;
    Ok(ids)
}

fn decode_row(row: &SqliteRow) -> Result<StoredRecord, StorageError> {
    let features_json: String = row.try_get("features")?;
    let features: BTreeMap<String, Option<f64>> = serde_json::from_str(&features_json)?;

    let timestamp_ms: i64 = row.try_get("timestamp_ms")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
        StorageError::SerializationError(format!("timestamp out of range: {}", timestamp_ms))
    })?;

    let metrics = SwingMetrics {
        swings_competitive: row.try_get("swings_competitive")?,
        percent_swings_competitive: row.try_get("percent_swings_competitive")?,
        contact: row.try_get("contact")?,
        avg_bat_speed: row.try_get("avg_bat_speed")?,
        hard_swing_rate: row.try_get("hard_swing_rate")?,
        squared_up_per_bat_contact: row.try_get("squared_up_per_bat_contact")?,
        squared_up_per_swing: row.try_get("squared_up_per_swing")?,
        blast_per_bat_contact: row.try_get("blast_per_bat_contact")?,
        blast_per_swing: row.try_get("blast_per_swing")?,
        swing_length: row.try_get("swing_length")?,
        swords: row.try_get("swords")?,
        batter_run_value: row.try_get("batter_run_value")?,
        whiffs: row.try_get("whiffs")?,
        whiff_per_swing: row.try_get("whiff_per_swing")?,
        batted_ball_events: row.try_get("batted_ball_events")?,
        batted_ball_event_per_swing: row.try_get("batted_ball_event_per_swing")?,
    };

    Ok(StoredRecord {
        id: row.try_get("id")?,
        record: DerivedRecord {
            name: row.try_get("name")?,
            metrics,
            features,
            signal: row.try_get("signal")?,
            signal_is_derived: row.try_get("signal_is_derived")?,
            timestamp,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(name: &str, minutes: i64) -> DerivedRecord {
        let mut features = BTreeMap::new();
        features.insert(DerivedRecord::delta_key("avg_bat_speed"), Some(-0.5));
        features.insert(DerivedRecord::oscillator_key("avg_bat_speed"), None);
        DerivedRecord {
            name: name.to_string(),
            metrics: SwingMetrics {
                avg_bat_speed: Some(72.5),
                contact: Some(118),
                ..Default::default()
            },
            features,
            signal: false,
            signal_is_derived: false,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes),
        }
    }

    async fn sqlite() -> Repository {
        Repository::with_sqlite("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_memory_insert_and_recent() {
        let repo = Repository::new();
        let ids = repo
            .insert_batch(&[record("A", 0), record("B", 2), record("C", 1)])
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);

        let recent = repo.recent(2).await.unwrap();
        let names: Vec<_> = recent.iter().map(|r| r.record.name.as_str()).collect();
        assert_eq!(names, ["B", "C"]);
    }

    #[tokio::test]
    async fn test_memory_retention_limit() {
        let repo = Repository::with_capacity(5);
        let batch: Vec<_> = (0..10).map(|i| record(&format!("P{i}"), i)).collect();
        repo.insert_batch(&batch).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_empty_name_rejects_whole_batch() {
        let repo = Repository::new();
        let err = repo
            .insert_batch(&[record("A", 0), record(" ", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let repo = sqlite().await;
        let original = record("Ohtani", 0);
        let ids = repo.insert_batch(&[original.clone()]).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, ids[0]);
        assert_eq!(recent[0].record, original);
    }

    #[tokio::test]
    async fn test_sqlite_recent_ordering_and_limit() {
        let repo = sqlite().await;
        repo.insert_batch(&[record("A", 0), record("B", 5), record("C", 3)])
            .await
            .unwrap();

        let recent = repo.recent(2).await.unwrap();
        let names: Vec<_> = recent.iter().map(|r| r.record.name.as_str()).collect();
        assert_eq!(names, ["B", "C"]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sqlite_closed_pool_fails() {
        let repo = sqlite().await;
        repo.insert_batch(&[record("Existing", 0)]).await.unwrap();

        repo.close().await;
        let result = repo.insert_batch(&[record("A", 1), record("B", 2)]).await;
        assert!(matches!(result, Err(StorageError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_sqlite_constraint_rolls_back_batch() {
        let repo = sqlite().await;
        let pool = match &repo.backend {
            Backend::Sqlite(pool) => pool.clone(),
            Backend::Memory(_) => unreachable!(),
        };

        // Bypass the up-front check to hit the table constraint mid-batch
        let result = insert_sqlite(&pool, &[record("A", 0), record("", 1)]).await;
        assert!(result.is_err());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let repo = Repository::new();
        assert!(repo.insert_batch(&[]).await.unwrap().is_empty());
    }
}
