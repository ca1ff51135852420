//! External service clients
//!
//! The pipeline consumes three abstract capabilities: postcode lookup,
//! the transit stop registry, and street-level crime data. Each is a
//! trait here so tests can drive the pipeline with mocks; the reqwest
//! implementations target the public UK services.

mod crime_client;
mod postcode_client;
mod transit_client;

pub use crime_client::PoliceUkClient;
pub use postcode_client::PostcodesIoClient;
pub use transit_client::NaptanClient;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Postcode payload as returned by the lookup service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostcodeData {
    pub postcode: String,
    pub county: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub parish: Option<String>,
    pub constituency: Option<String>,
    pub region: Option<String>,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub easting: Option<i64>,
    pub northing: Option<i64>,
}

/// One row of the bulk stop table, before filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRow {
    pub long_code: String,
    pub short_code: Option<String>,
    pub name: String,
    pub street: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
}

/// One crime from the crime data service, in response order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrimeData {
    pub external_id: i64,
    pub category: String,
    pub month: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub outcome_category: Option<String>,
    pub outcome_date: Option<String>,
}

/// Postcode lookup capability: validation, resolution, reverse
/// geocoding, and random selection.
#[async_trait]
pub trait PostcodeLookupService: Send + Sync {
    /// True when the code is a real, currently-valid postcode.
    async fn validate(&self, code: &str) -> Result<bool>;

    /// Full administrative record for a valid postcode.
    async fn lookup(&self, code: &str) -> Result<PostcodeData>;

    /// Nearest postcode to the coordinates, if any.
    async fn reverse_geocode(&self, latitude: f64, longitude: f64)
        -> Result<Option<PostcodeData>>;

    /// A random valid postcode.
    async fn random(&self) -> Result<PostcodeData>;
}

/// Transit stop registry capability.
#[async_trait]
pub trait TransitDataService: Send + Sync {
    /// Raw authority master-list entries, one `"Location / Region (Code)"`
    /// string per authority.
    async fn list_authority_entries(&self) -> Result<Vec<String>>;

    /// Bulk stop table for one authority area code.
    async fn fetch_stops_table(&self, authority_code: &str) -> Result<Vec<StopRow>>;
}

/// Street-level crime data capability.
#[async_trait]
pub trait CrimeDataService: Send + Sync {
    /// Crimes near a point for the most recent available month, in
    /// upstream response order.
    async fn fetch_crimes(&self, latitude: f64, longitude: f64) -> Result<Vec<CrimeData>>;
}
