//! Database initialization
//!
//! Creates the SQLite database on first run and applies the idempotent
//! schema. Natural-key uniqueness is enforced here: postcode code,
//! authority code, stop long code, crime external id, crime-list
//! latitude, search postcode reference, and user username/email.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize the database connection pool and create tables if needed.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests. A single connection keeps every query
/// on the same ephemeral database.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Apply the schema (idempotent, safe to call multiple times).
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_counters_table(pool).await?;
    create_postcodes_table(pool).await?;
    create_authorities_table(pool).await?;
    create_stops_table(pool).await?;
    create_crime_lists_table(pool).await?;
    create_crimes_table(pool).await?;
    create_searches_table(pool).await?;
    create_users_table(pool).await?;
    Ok(())
}

async fn create_counters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            seq INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_postcodes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS postcodes (
            code TEXT PRIMARY KEY,
            county TEXT,
            district TEXT,
            ward TEXT,
            parish TEXT,
            constituency TEXT,
            region TEXT,
            country TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            easting INTEGER,
            northing INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_authorities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS authorities (
            code TEXT PRIMARY KEY,
            location TEXT NOT NULL,
            region TEXT,
            alt_names TEXT NOT NULL DEFAULT '[]',
            stop_refs TEXT NOT NULL DEFAULT '[]',
            fully_resolved INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stops_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stops (
            long_code TEXT PRIMARY KEY,
            short_code TEXT,
            name TEXT NOT NULL,
            street TEXT,
            latitude REAL,
            longitude REAL,
            authority_code TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stops_authority ON stops (authority_code)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_crime_lists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crime_lists (
            id INTEGER PRIMARY KEY,
            latitude REAL NOT NULL UNIQUE,
            longitude REAL NOT NULL,
            count INTEGER NOT NULL,
            crime_refs TEXT NOT NULL DEFAULT '[]',
            month TEXT,
            empty_data INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_crimes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crimes (
            external_id INTEGER PRIMARY KEY,
            latitude REAL,
            longitude REAL,
            category TEXT NOT NULL,
            month TEXT,
            outcome_category TEXT,
            outcome_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_searches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS searches (
            id INTEGER PRIMARY KEY,
            postcode TEXT NOT NULL UNIQUE REFERENCES postcodes(code),
            latitude REAL,
            longitude REAL,
            easting INTEGER,
            northing INTEGER,
            authority_code TEXT,
            crime_list_id INTEGER,
            stop_refs TEXT NOT NULL DEFAULT '[]',
            crime_refs TEXT NOT NULL DEFAULT '[]',
            reverse_lookup INTEGER NOT NULL DEFAULT 0,
            links TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
