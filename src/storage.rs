//! SQLite storage layer for Airwatch.
//!
//! Persistence is append-only and strictly best-effort: one row per
//! successful reading, annotated with a server-assigned timestamp. Write
//! failures are logged by the caller and never surface to the reading flow.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::Reading;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

/// A persisted reading row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredReading {
    pub label: String,
    pub value: i64,
    pub observed_at: String,
    pub tier: String,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:airwatch.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                value INTEGER NOT NULL,
                observed_at TEXT NOT NULL,
                tier TEXT NOT NULL,
                recorded_ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Index for time-ordered retrieval
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_readings_recorded_ts
            ON readings(recorded_ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one reading with a server-assigned timestamp.
    pub async fn insert_reading(
        &self,
        reading: &Reading,
        recorded_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO readings (label, value, observed_at, tier, recorded_ts)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reading.label)
        .bind(reading.value)
        .bind(&reading.observed_at)
        .bind(reading.tier.label())
        .bind(recorded_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recently persisted readings, newest first.
    pub async fn recent_readings(&self, limit: u32) -> anyhow::Result<Vec<StoredReading>> {
        let rows = sqlx::query(
            r#"
            SELECT label, value, observed_at, tier, recorded_ts
            FROM readings
            ORDER BY recorded_ts DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| StoredReading {
                label: r.get("label"),
                value: r.get("value"),
                observed_at: r.get("observed_at"),
                tier: r.get("tier"),
                recorded_at: Utc.timestamp_opt(r.get::<i64, _>("recorded_ts"), 0).single(),
            })
            .collect())
    }

    /// Total number of persisted readings.
    pub async fn reading_count(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
