//! Database access: pool initialization, models, and typed queries

pub mod init;
pub mod models;
pub mod queries;

pub use init::{create_schema, init_database, init_in_memory};

/// True when the error is a SQLite unique-key violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed")
    )
}

/// True when the error is a unique-key violation on the named column
/// (e.g. `"searches.postcode"`).
pub fn unique_violation_on(err: &sqlx::Error, column: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if db.message().contains("UNIQUE constraint failed")
                && db.message().contains(column)
    )
}
