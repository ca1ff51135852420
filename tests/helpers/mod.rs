//! Shared test fixtures: in-memory database and mock external services
#![allow(dead_code)]

use async_trait::async_trait;
use postlocal::db::init_in_memory;
use postlocal::services::{
    CrimeData, CrimeDataService, PostcodeData, PostcodeLookupService, StopRow, TransitDataService,
};
use postlocal::{Error, Result, SearchService};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Route tracing output through the test harness so `--nocapture`
/// shows the structured logs. Safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fixture builders
// ============================================================================

/// English postcode with a district and coordinates; tests adjust fields.
pub fn postcode_data(code: &str) -> PostcodeData {
    PostcodeData {
        postcode: code.to_string(),
        county: None,
        district: Some("Test District".to_string()),
        ward: None,
        parish: None,
        constituency: None,
        region: None,
        country: "England".to_string(),
        latitude: Some(52.0),
        longitude: Some(-1.0),
        easting: Some(430000),
        northing: Some(280000),
    }
}

pub fn stop_row(long_code: &str, name: &str) -> StopRow {
    StopRow {
        long_code: long_code.to_string(),
        short_code: Some(format!("sc{}", long_code)),
        name: name.to_string(),
        street: Some("High Street".to_string()),
        latitude: Some(52.01),
        longitude: Some(-1.01),
        status: "active".to_string(),
    }
}

pub fn crime_data(external_id: i64, category: &str) -> CrimeData {
    CrimeData {
        external_id,
        category: category.to_string(),
        month: Some("2024-01".to_string()),
        latitude: Some(52.0),
        longitude: Some(-1.0),
        outcome_category: Some("Under investigation".to_string()),
        outcome_date: Some("2024-02".to_string()),
    }
}

// ============================================================================
// Mock postcode lookup
// ============================================================================

#[derive(Default)]
pub struct MockPostcodeService {
    postcodes: HashMap<String, PostcodeData>,
    reverse_result: Option<String>,
    random_result: Option<String>,
    pub validate_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
}

impl MockPostcodeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_postcode(mut self, data: PostcodeData) -> Self {
        self.postcodes
            .insert(postlocal::caches::normalize_postcode(&data.postcode), data);
        self
    }

    /// Postcode returned by reverse geocoding, regardless of coordinates.
    pub fn with_reverse_result(mut self, code: &str) -> Self {
        self.reverse_result = Some(code.to_string());
        self
    }

    pub fn with_random_result(mut self, code: &str) -> Self {
        self.random_result = Some(code.to_string());
        self
    }

    fn known(&self, code: &str) -> Option<PostcodeData> {
        self.postcodes
            .get(&postlocal::caches::normalize_postcode(code))
            .cloned()
    }
}

#[async_trait]
impl PostcodeLookupService for MockPostcodeService {
    async fn validate(&self, code: &str) -> Result<bool> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.known(code).is_some())
    }

    async fn lookup(&self, code: &str) -> Result<PostcodeData> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.known(code)
            .ok_or_else(|| Error::NotFound(format!("postcode {}", code)))
    }

    async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> Result<Option<PostcodeData>> {
        Ok(self
            .reverse_result
            .as_deref()
            .and_then(|code| self.known(code)))
    }

    async fn random(&self) -> Result<PostcodeData> {
        self.random_result
            .as_deref()
            .and_then(|code| self.known(code))
            .ok_or_else(|| Error::Upstream("no random postcode configured".to_string()))
    }
}

// ============================================================================
// Mock transit data
// ============================================================================

#[derive(Default)]
pub struct MockTransitService {
    entries: Vec<String>,
    stops: HashMap<String, Vec<StopRow>>,
    fail_stop_fetches: bool,
    pub list_calls: AtomicUsize,
    pub stop_fetch_calls: AtomicUsize,
}

impl MockTransitService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, raw: &str) -> Self {
        self.entries.push(raw.to_string());
        self
    }

    pub fn with_stops(mut self, authority_code: &str, stops: Vec<StopRow>) -> Self {
        self.stops.insert(authority_code.to_string(), stops);
        self
    }

    pub fn failing_stop_fetches(mut self) -> Self {
        self.fail_stop_fetches = true;
        self
    }
}

#[async_trait]
impl TransitDataService for MockTransitService {
    async fn list_authority_entries(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.clone())
    }

    async fn fetch_stops_table(&self, authority_code: &str) -> Result<Vec<StopRow>> {
        self.stop_fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop_fetches {
            return Err(Error::Upstream("stop registry unavailable".to_string()));
        }
        Ok(self.stops.get(authority_code).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Mock crime data
// ============================================================================

#[derive(Default)]
pub struct MockCrimeService {
    crimes: Vec<CrimeData>,
    fail: bool,
    pub fetch_calls: AtomicUsize,
}

impl MockCrimeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crimes(mut self, crimes: Vec<CrimeData>) -> Self {
        self.crimes = crimes;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl CrimeDataService for MockCrimeService {
    async fn fetch_crimes(&self, _lat: f64, _lon: f64) -> Result<Vec<CrimeData>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Upstream("crime service unavailable".to_string()));
        }
        Ok(self.crimes.clone())
    }
}

// ============================================================================
// Service wiring
// ============================================================================

/// In-memory service over the given mocks. The mocks stay observable
/// through the returned Arcs.
pub async fn test_service(
    postcode: MockPostcodeService,
    transit: MockTransitService,
    crime: MockCrimeService,
) -> (
    SearchService,
    Arc<MockPostcodeService>,
    Arc<MockTransitService>,
    Arc<MockCrimeService>,
) {
    init_tracing();
    let db = init_in_memory().await.expect("in-memory database");
    let postcode = Arc::new(postcode);
    let transit = Arc::new(transit);
    let crime = Arc::new(crime);

    let service = SearchService::with_services(
        db,
        postcode.clone(),
        transit.clone(),
        crime.clone(),
    );

    (service, postcode, transit, crime)
}
