//! Append-only record sinks.
//!
//! Every record is persisted immediately after extraction, one at a time;
//! there is no batching and no rollback. The JSONL sink is duplicate-tolerant
//! like the original output file; the memory sink can deduplicate by case
//! number and the Postgres sink relies on `ON CONFLICT DO NOTHING`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::model::CaseRecord;

#[async_trait]
pub trait RecordSink {
    /// Appends one record. Implementations may silently drop duplicates.
    async fn append(&mut self, record: &CaseRecord) -> Result<()>;
}

#[async_trait]
impl RecordSink for Box<dyn RecordSink + Send> {
    async fn append(&mut self, record: &CaseRecord) -> Result<()> {
        (**self).append(record).await
    }
}

// ============================================================================
// JSONL File Sink
// ============================================================================

/// One JSON object per line, opened in append mode so successive runs add to
/// the same file. Duplicate case numbers are not rejected.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output file {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn append(&mut self, record: &CaseRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        writeln!(self.writer, "{line}").context("Failed to write record")?;
        // One record per flush: a crash mid-run must not lose persisted rows.
        self.writer.flush().context("Failed to flush output file")?;
        Ok(())
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// In-memory sink, used for dry runs and tests. With deduplication enabled,
/// re-appending an already-seen case number is a no-op.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<CaseRecord>,
    dedup: bool,
    seen: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deduplicating() -> Self {
        Self {
            dedup: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&mut self, record: &CaseRecord) -> Result<()> {
        if self.dedup && !self.seen.insert(record.case_number.clone()) {
            debug!(case = %record.case_number, "duplicate record dropped");
            return Ok(());
        }
        self.records.push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Postgres Sink
// ============================================================================

/// Database sink: one insert per record, movements and party sets stored as
/// jsonb. Re-extracting a case number quietly does nothing.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connects and makes sure the target table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to database")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cases (
                case_number TEXT PRIMARY KEY,
                jurisdiction TEXT NOT NULL,
                department TEXT NOT NULL,
                status TEXT NOT NULL,
                caption TEXT NOT NULL,
                movements JSONB NOT NULL,
                actors JSONB NOT NULL,
                defendants JSONB NOT NULL,
                partial BOOLEAN NOT NULL,
                extracted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to ensure cases table")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn append(&mut self, record: &CaseRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cases
                (case_number, jurisdiction, department, status, caption,
                 movements, actors, defendants, partial)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (case_number) DO NOTHING
            "#,
        )
        .bind(&record.case_number)
        .bind(&record.jurisdiction)
        .bind(&record.department)
        .bind(&record.status)
        .bind(&record.caption)
        .bind(serde_json::to_value(&record.movements)?)
        .bind(serde_json::to_value(&record.actors)?)
        .bind(serde_json::to_value(&record.defendants)?)
        .bind(record.partial)
        .execute(&self.pool)
        .await
        .context("Failed to insert record")?;

        debug!(case = %record.case_number, "record stored");
        Ok(())
    }
}
