//! Database models
//!
//! Natural keys: `Postcode.code`, `Authority.code`, `Stop.long_code`,
//! `CrimeRecord.external_id`, `CrimeList.latitude`, `SearchRecord.postcode`,
//! `User.username` / `User.email`. List- and map-valued fields are stored
//! as JSON text columns and decoded by the query layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cached postcode record; immutable after first successful lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Postcode {
    /// Normalized code, e.g. "SW1A 1AA"
    pub code: String,
    pub county: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub parish: Option<String>,
    pub constituency: Option<String>,
    pub region: Option<String>,
    pub country: String,
    /// WGS84 coordinates; absent for a handful of non-geographic codes
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// British National Grid easting/northing
    pub easting: Option<i64>,
    pub northing: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Local transport authority from the stop registry master list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authority {
    pub code: String,
    pub location: String,
    pub region: Option<String>,
    /// Alternate location spellings used by the resolver fallback
    pub alt_names: Vec<String>,
    /// Long codes of every cached stop for this authority; populated
    /// together with `fully_resolved`
    pub stop_refs: Vec<String>,
    /// Once true, no further stop fetches occur for this code
    pub fully_resolved: bool,
}

/// Public transport access point, keyed by its registry long code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub long_code: String,
    pub short_code: Option<String>,
    pub name: String,
    pub street: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub authority_code: String,
}

/// Per-latitude crime summary (latitude alone is the cache key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrimeList {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Total number of crimes in the upstream response
    pub count: i64,
    /// External ids of the persisted records (at most 5)
    pub crime_refs: Vec<i64>,
    pub month: Option<String>,
    /// Sentinel flag: true when the upstream response was empty, so the
    /// area is never re-queried
    pub empty_data: bool,
}

/// Individual crime, keyed by the upstream external id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrimeRecord {
    pub external_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category: String,
    pub month: Option<String>,
    pub outcome_category: Option<String>,
    pub outcome_date: Option<String>,
}

/// Aggregate search result; one per distinct postcode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Sequential id, assigned once and never changed
    pub id: i64,
    /// Normalized postcode this aggregate was built for
    pub postcode: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub easting: Option<i64>,
    pub northing: Option<i64>,
    pub authority_code: Option<String>,
    pub crime_list_id: Option<i64>,
    /// First stop references of the linked authority (at most 5)
    pub stop_refs: Vec<String>,
    /// Crime references copied from the linked crime list (at most 5)
    pub crime_refs: Vec<i64>,
    /// True when the record was created through reverse geocoding
    pub reverse_lookup: bool,
    /// Hypermedia links describing this record and its neighbours
    pub links: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl SearchRecord {
    /// Fresh, unlinked record for a resolved postcode.
    pub fn new(id: i64, postcode: &Postcode, reverse_lookup: bool) -> Self {
        Self {
            id,
            postcode: postcode.code.clone(),
            latitude: postcode.latitude,
            longitude: postcode.longitude,
            easting: postcode.easting,
            northing: postcode.northing,
            authority_code: None,
            crime_list_id: None,
            stop_refs: Vec::new(),
            crime_refs: Vec::new(),
            reverse_lookup,
            links: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// Minimal identity record; credential material is out of scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
}
