//! Typed find/create/update helpers for each entity
//!
//! JSON-array columns go through `sqlx::types::Json`; everything else is
//! mapped row by row.

use crate::db::models::{Authority, CrimeList, CrimeRecord, Postcode, SearchRecord, Stop, User};
use crate::Result;
use sqlx::types::Json;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

// ============================================================================
// Postcodes
// ============================================================================

pub async fn find_postcode(pool: &SqlitePool, code: &str) -> Result<Option<Postcode>> {
    let row = sqlx::query("SELECT * FROM postcodes WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    row.map(postcode_from_row).transpose()
}

pub async fn insert_postcode(pool: &SqlitePool, postcode: &Postcode) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO postcodes
            (code, county, district, ward, parish, constituency, region, country,
             latitude, longitude, easting, northing, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&postcode.code)
    .bind(&postcode.county)
    .bind(&postcode.district)
    .bind(&postcode.ward)
    .bind(&postcode.parish)
    .bind(&postcode.constituency)
    .bind(&postcode.region)
    .bind(&postcode.country)
    .bind(postcode.latitude)
    .bind(postcode.longitude)
    .bind(postcode.easting)
    .bind(postcode.northing)
    .bind(postcode.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

fn postcode_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Postcode> {
    Ok(Postcode {
        code: row.try_get("code")?,
        county: row.try_get("county")?,
        district: row.try_get("district")?,
        ward: row.try_get("ward")?,
        parish: row.try_get("parish")?,
        constituency: row.try_get("constituency")?,
        region: row.try_get("region")?,
        country: row.try_get("country")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        easting: row.try_get("easting")?,
        northing: row.try_get("northing")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Authorities
// ============================================================================

pub async fn find_authority(pool: &SqlitePool, code: &str) -> Result<Option<Authority>> {
    let row = sqlx::query("SELECT * FROM authorities WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    row.map(authority_from_row).transpose()
}

/// Exact match on the stored location name.
pub async fn find_authority_by_location(
    pool: &SqlitePool,
    location: &str,
) -> Result<Option<Authority>> {
    let row = sqlx::query("SELECT * FROM authorities WHERE location = ?")
        .bind(location)
        .fetch_optional(pool)
        .await?;

    row.map(authority_from_row).transpose()
}

pub async fn all_authorities(pool: &SqlitePool) -> Result<Vec<Authority>> {
    let rows = sqlx::query("SELECT * FROM authorities ORDER BY code")
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(authority_from_row).collect()
}

pub async fn count_authorities(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authorities")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn insert_authority(pool: &SqlitePool, authority: &Authority) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO authorities (code, location, region, alt_names, stop_refs, fully_resolved)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&authority.code)
    .bind(&authority.location)
    .bind(&authority.region)
    .bind(Json(&authority.alt_names))
    .bind(Json(&authority.stop_refs))
    .bind(authority.fully_resolved)
    .execute(pool)
    .await?;

    Ok(())
}

/// Attach the full stop-reference list and latch `fully_resolved`.
pub async fn update_authority_stops(
    pool: &SqlitePool,
    code: &str,
    stop_refs: &[String],
) -> Result<()> {
    sqlx::query("UPDATE authorities SET stop_refs = ?, fully_resolved = 1 WHERE code = ?")
        .bind(Json(stop_refs))
        .bind(code)
        .execute(pool)
        .await?;

    Ok(())
}

fn authority_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Authority> {
    Ok(Authority {
        code: row.try_get("code")?,
        location: row.try_get("location")?,
        region: row.try_get("region")?,
        alt_names: row.try_get::<Json<Vec<String>>, _>("alt_names")?.0,
        stop_refs: row.try_get::<Json<Vec<String>>, _>("stop_refs")?.0,
        fully_resolved: row.try_get("fully_resolved")?,
    })
}

// ============================================================================
// Stops
// ============================================================================

pub async fn find_stop(pool: &SqlitePool, long_code: &str) -> Result<Option<Stop>> {
    let row = sqlx::query("SELECT * FROM stops WHERE long_code = ?")
        .bind(long_code)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Stop {
        long_code: row.get("long_code"),
        short_code: row.get("short_code"),
        name: row.get("name"),
        street: row.get("street"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        authority_code: row.get("authority_code"),
    }))
}

/// Long codes already present in the store, for pre-insert deduplication.
pub async fn existing_stop_codes(pool: &SqlitePool, authority_code: &str) -> Result<Vec<String>> {
    let codes = sqlx::query_scalar("SELECT long_code FROM stops WHERE authority_code = ?")
        .bind(authority_code)
        .fetch_all(pool)
        .await?;
    Ok(codes)
}

/// Bulk insert inside one transaction. `OR IGNORE` keeps a concurrent
/// populate of the same authority from failing the whole batch.
pub async fn insert_stops(pool: &SqlitePool, stops: &[Stop]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for stop in stops {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO stops
                (long_code, short_code, name, street, latitude, longitude, authority_code)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stop.long_code)
        .bind(&stop.short_code)
        .bind(&stop.name)
        .bind(&stop.street)
        .bind(stop.latitude)
        .bind(stop.longitude)
        .bind(&stop.authority_code)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

// ============================================================================
// Crime lists and crimes
// ============================================================================

pub async fn find_crime_list_by_latitude(
    pool: &SqlitePool,
    latitude: f64,
) -> Result<Option<CrimeList>> {
    let row = sqlx::query("SELECT * FROM crime_lists WHERE latitude = ?")
        .bind(latitude)
        .fetch_optional(pool)
        .await?;

    row.map(crime_list_from_row).transpose()
}

pub async fn insert_crime_list(pool: &SqlitePool, list: &CrimeList) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO crime_lists (id, latitude, longitude, count, crime_refs, month, empty_data)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(list.id)
    .bind(list.latitude)
    .bind(list.longitude)
    .bind(list.count)
    .bind(Json(&list.crime_refs))
    .bind(&list.month)
    .bind(list.empty_data)
    .execute(pool)
    .await?;

    Ok(())
}

fn crime_list_from_row(row: sqlx::sqlite::SqliteRow) -> Result<CrimeList> {
    Ok(CrimeList {
        id: row.try_get("id")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        count: row.try_get("count")?,
        crime_refs: row.try_get::<Json<Vec<i64>>, _>("crime_refs")?.0,
        month: row.try_get("month")?,
        empty_data: row.try_get("empty_data")?,
    })
}

pub async fn find_crime(pool: &SqlitePool, external_id: i64) -> Result<Option<CrimeRecord>> {
    let row = sqlx::query("SELECT * FROM crimes WHERE external_id = ?")
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| CrimeRecord {
        external_id: row.get("external_id"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        category: row.get("category"),
        month: row.get("month"),
        outcome_category: row.get("outcome_category"),
        outcome_date: row.get("outcome_date"),
    }))
}

pub async fn insert_crime(pool: &SqlitePool, crime: &CrimeRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO crimes
            (external_id, latitude, longitude, category, month, outcome_category, outcome_date)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(crime.external_id)
    .bind(crime.latitude)
    .bind(crime.longitude)
    .bind(&crime.category)
    .bind(&crime.month)
    .bind(&crime.outcome_category)
    .bind(&crime.outcome_date)
    .execute(pool)
    .await?;

    Ok(())
}

// ============================================================================
// Searches
// ============================================================================

pub async fn find_search_by_postcode(
    pool: &SqlitePool,
    postcode: &str,
) -> Result<Option<SearchRecord>> {
    let row = sqlx::query("SELECT * FROM searches WHERE postcode = ?")
        .bind(postcode)
        .fetch_optional(pool)
        .await?;

    row.map(search_from_row).transpose()
}

pub async fn find_search_by_id(pool: &SqlitePool, id: i64) -> Result<Option<SearchRecord>> {
    let row = sqlx::query("SELECT * FROM searches WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(search_from_row).transpose()
}

pub async fn insert_search(pool: &SqlitePool, search: &SearchRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO searches
            (id, postcode, latitude, longitude, easting, northing, authority_code,
             crime_list_id, stop_refs, crime_refs, reverse_lookup, links, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(search.id)
    .bind(&search.postcode)
    .bind(search.latitude)
    .bind(search.longitude)
    .bind(search.easting)
    .bind(search.northing)
    .bind(&search.authority_code)
    .bind(search.crime_list_id)
    .bind(Json(&search.stop_refs))
    .bind(Json(&search.crime_refs))
    .bind(search.reverse_lookup)
    .bind(Json(&search.links))
    .bind(search.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist the mutable portion of a search record. The sequential id and
/// the postcode reference never change after insert.
pub async fn update_search(pool: &SqlitePool, search: &SearchRecord) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE searches
        SET authority_code = ?, crime_list_id = ?, stop_refs = ?, crime_refs = ?, links = ?
        WHERE id = ?
        "#,
    )
    .bind(&search.authority_code)
    .bind(search.crime_list_id)
    .bind(Json(&search.stop_refs))
    .bind(Json(&search.crime_refs))
    .bind(Json(&search.links))
    .bind(search.id)
    .execute(pool)
    .await?;

    Ok(())
}

fn search_from_row(row: sqlx::sqlite::SqliteRow) -> Result<SearchRecord> {
    Ok(SearchRecord {
        id: row.try_get("id")?,
        postcode: row.try_get("postcode")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        easting: row.try_get("easting")?,
        northing: row.try_get("northing")?,
        authority_code: row.try_get("authority_code")?,
        crime_list_id: row.try_get("crime_list_id")?,
        stop_refs: row.try_get::<Json<Vec<String>>, _>("stop_refs")?.0,
        crime_refs: row.try_get::<Json<Vec<i64>>, _>("crime_refs")?.0,
        reverse_lookup: row.try_get("reverse_lookup")?,
        links: row.try_get::<Json<BTreeMap<String, String>>, _>("links")?.0,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Users
// ============================================================================

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: row.get("role"),
    }))
}

pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query("INSERT INTO users (id, username, email, role) VALUES (?, ?, ?, ?)")
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.role)
        .execute(pool)
        .await?;

    Ok(())
}
