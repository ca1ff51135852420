//! Sequential identifier allocation
//!
//! One named counter per logical entity type, persisted in the
//! `counters` table. `next` is a single atomic upsert, so two callers
//! can never be handed the same value; callers still use the value
//! optimistically (insert, and on a unique-id collision call `next`
//! again). A failed counter update is an infrastructure error and is
//! not retried here.

use crate::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Logical entity types with sequential identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Search,
    CrimeList,
    User,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::Search => "search",
            Counter::CrimeList => "crime_list",
            Counter::User => "user",
        }
    }
}

/// Allocator over the persistent counters table
#[derive(Clone)]
pub struct SequentialIdAllocator {
    db: SqlitePool,
}

impl SequentialIdAllocator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Atomically increment the named counter and return the new value.
    pub async fn next(&self, counter: Counter) -> Result<i64> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, seq) VALUES (?, 1)
            ON CONFLICT(name) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(counter.as_str())
        .fetch_one(&self.db)
        .await?;

        debug!(counter = counter.as_str(), seq, "Allocated sequential id");
        Ok(seq)
    }

    /// Remove the named counter so the sequence restarts from 1.
    /// Explicit resets only; nothing else ever deletes a counter.
    pub async fn reset(&self, counter: Counter) -> Result<()> {
        sqlx::query("DELETE FROM counters WHERE name = ?")
            .bind(counter.as_str())
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
