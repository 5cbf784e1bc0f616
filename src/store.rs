//! ==============================================================================
//! store.rs - persistence gateway (sqlite via sqlx)
//! ==============================================================================
//!
//! purpose:
//!     owns the durable reading history. the ingestion worker is the only
//!     writer; the query service only reads.
//!
//! relationships:
//!     - used by: ingest.rs (append), query.rs (recent, snapshot)
//!     - schema: created idempotently on connect, no migrations
//!
//! timestamps are stored as unix milliseconds so ordering and month
//! extraction stay plain integer work for sqlite.
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::domain::{ExtremeMonth, Measurement, RawStats, Reading};
use crate::error::StorageError;

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sensor_readings (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    temperature REAL    NOT NULL,
    humidity    REAL    NOT NULL,
    light       REAL    NOT NULL,
    recorded_at INTEGER NOT NULL
);
";

const CREATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sensor_readings_recorded_at
    ON sensor_readings (recorded_at);
";

const READING_COLUMNS: &str = "id, temperature, humidity, light, recorded_at";

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: i64,
    temperature: f64,
    humidity: f64,
    light: f64,
    recorded_at: i64,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = StorageError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        let recorded_at = DateTime::<Utc>::from_timestamp_millis(row.recorded_at)
            .ok_or(StorageError::InvalidTimestamp(row.recorded_at))?;
        Ok(Reading {
            id: row.id,
            temperature: row.temperature,
            humidity: row.humidity,
            light: row.light,
            recorded_at,
        })
    }
}

fn into_readings(rows: Vec<ReadingRow>) -> Result<Vec<Reading>, StorageError> {
    rows.into_iter().map(Reading::try_from).collect()
}

/// cheap to clone; every clone shares one connection pool
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// open (or create) the database named in `config` and ensure the schema
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!(url = %config.url, "Store ready");
        Ok(store)
    }

    /// private in-memory database on a single pinned connection (for testing)
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // the database lives and dies with its connection, so never recycle it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
        sqlx::query(CREATE_INDEX).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// insert one reading and return its id
    ///
    /// `recorded_at` defaults to now when the caller did not stamp it.
    pub async fn append(
        &self,
        measurement: &Measurement,
        recorded_at: Option<DateTime<Utc>>,
    ) -> Result<i64, StorageError> {
        let recorded_at = recorded_at.unwrap_or_else(Utc::now);

        let result = sqlx::query(
            "INSERT INTO sensor_readings (temperature, humidity, light, recorded_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(measurement.temperature)
        .bind(measurement.humidity)
        .bind(measurement.light)
        .bind(recorded_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, "Reading appended");
        Ok(id)
    }

    /// newest first, at most `limit` rows
    pub async fn recent(&self, limit: u32) -> Result<Vec<Reading>, StorageError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM sensor_readings \
             ORDER BY recorded_at DESC, id DESC LIMIT ?1"
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        into_readings(rows)
    }

    #[cfg(test)]
    pub(crate) async fn count(&self) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensor_readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// start a read transaction for the summary queries
    ///
    /// the pooled connection goes back when the snapshot is finished or dropped.
    pub async fn snapshot(&self) -> Result<Snapshot, StorageError> {
        Ok(Snapshot {
            tx: self.pool.begin().await?,
        })
    }

    /// close the pool; later calls fail with `StorageError::Database`
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ==============================================================================
// snapshot - one read transaction spanning the summary queries
// ==============================================================================
// in wal mode sqlite pins the read snapshot at the first select, so the
// maxima from aggregate() are still the maxima when matching() runs.

pub struct Snapshot {
    tx: Transaction<'static, Sqlite>,
}

impl Snapshot {
    /// max/min/avg temperature and max humidity over the whole history
    pub async fn aggregate(&mut self) -> Result<RawStats, StorageError> {
        let (max_temp, min_temp, avg_temp, max_humidity, rows): (
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            i64,
        ) = sqlx::query_as(
            "SELECT MAX(temperature), MIN(temperature), AVG(temperature), MAX(humidity), COUNT(*) \
             FROM sensor_readings",
        )
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(RawStats {
            max_temp,
            min_temp,
            avg_temp,
            max_humidity,
            rows,
        })
    }

    /// rows whose temperature or humidity equals the given values, oldest first
    pub async fn matching(
        &mut self,
        temperature: f64,
        humidity: f64,
    ) -> Result<Vec<Reading>, StorageError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM sensor_readings \
             WHERE temperature = ?1 OR humidity = ?2 \
             ORDER BY recorded_at ASC, id ASC"
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(temperature)
            .bind(humidity)
            .fetch_all(&mut *self.tx)
            .await?;
        into_readings(rows)
    }

    /// distinct `M-YYYY` values of the same rows, in order of first appearance
    pub async fn distinct_months(
        &mut self,
        temperature: f64,
        humidity: f64,
    ) -> Result<Vec<ExtremeMonth>, StorageError> {
        let months: Vec<(String,)> = sqlx::query_as(
            "SELECT CAST(strftime('%m', recorded_at / 1000, 'unixepoch') AS INTEGER) \
                    || '-' || strftime('%Y', recorded_at / 1000, 'unixepoch') AS month_year \
             FROM sensor_readings \
             WHERE temperature = ?1 OR humidity = ?2 \
             GROUP BY month_year \
             ORDER BY MIN(recorded_at) ASC",
        )
        .bind(temperature)
        .bind(humidity)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(months
            .into_iter()
            .map(|(month_year,)| ExtremeMonth { month_year })
            .collect())
    }

    pub async fn finish(self) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }
}
