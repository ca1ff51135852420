//! Authority resolution heuristics: ordered fallbacks, the London
//! special case, and the Northern Ireland short-circuit.

mod helpers;

use chrono::Utc;
use helpers::*;
use postlocal::caches::{AuthorityCache, StopCache};
use postlocal::db::init_in_memory;
use postlocal::db::models::Postcode;
use postlocal::resolver::AuthorityResolver;
use sqlx::SqlitePool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn postcode(
    code: &str,
    county: Option<&str>,
    district: Option<&str>,
    region: Option<&str>,
    constituency: Option<&str>,
    country: &str,
) -> Postcode {
    Postcode {
        code: code.to_string(),
        county: county.map(str::to_string),
        district: district.map(str::to_string),
        ward: None,
        parish: None,
        constituency: constituency.map(str::to_string),
        region: region.map(str::to_string),
        country: country.to_string(),
        latitude: Some(52.0),
        longitude: Some(-1.0),
        easting: None,
        northing: None,
        created_at: Utc::now(),
    }
}

fn resolver_over(db: &SqlitePool, transit: Arc<MockTransitService>) -> AuthorityResolver {
    let authorities = AuthorityCache::new(db.clone(), transit.clone());
    let stops = StopCache::new(db.clone(), transit);
    AuthorityResolver::new(db.clone(), authorities, stops)
}

fn standard_entries() -> MockTransitService {
    MockTransitService::new()
        .with_entry("Aberdeenshire / Scotland (630)")
        .with_entry("City of Edinburgh / Scotland (620)")
        .with_entry("Greater London / London (490)")
        .with_entry("Leicester / East Midlands (260)")
        .with_entry("North East Lincolnshire / Yorkshire (228)")
}

#[tokio::test]
async fn northern_ireland_is_unresolved_without_touching_the_registry() {
    let db = init_in_memory().await.unwrap();
    let transit = Arc::new(standard_entries());
    let resolver = resolver_over(&db, transit.clone());

    let result = resolver
        .resolve(&postcode(
            "BT23 6SA",
            Some("Down"),
            None,
            None,
            None,
            "Northern Ireland",
        ))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(transit.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn county_matches_by_exact_location() {
    let db = init_in_memory().await.unwrap();
    let resolver = resolver_over(&db, Arc::new(standard_entries()));

    let result = resolver
        .resolve(&postcode(
            "AB51 3QX",
            Some("Aberdeenshire"),
            None,
            None,
            None,
            "Scotland",
        ))
        .await
        .unwrap();

    assert_eq!(result.unwrap().code, "630");
}

#[tokio::test]
async fn county_falls_back_to_alternate_names() {
    let db = init_in_memory().await.unwrap();
    let resolver = resolver_over(&db, Arc::new(standard_entries()));

    // "City of Edinburgh" derives the alternate name "Edinburgh".
    let result = resolver
        .resolve(&postcode(
            "EH1 1YZ",
            Some("Edinburgh"),
            None,
            None,
            None,
            "Scotland",
        ))
        .await
        .unwrap();

    assert_eq!(result.unwrap().code, "620");
}

#[tokio::test]
async fn unmatched_county_stops_resolution_despite_other_fields() {
    let db = init_in_memory().await.unwrap();
    let resolver = resolver_over(&db, Arc::new(standard_entries()));

    // The constituency would match, but the county branch is terminal.
    let result = resolver
        .resolve(&postcode(
            "LE1 6ZG",
            Some("Unknownshire"),
            Some("Leicester"),
            None,
            Some("Leicester"),
            "England",
        ))
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn district_matches_by_exact_location() {
    let db = init_in_memory().await.unwrap();
    let resolver = resolver_over(&db, Arc::new(standard_entries()));

    let result = resolver
        .resolve(&postcode(
            "LE1 6ZG",
            None,
            Some("Leicester"),
            Some("East Midlands"),
            None,
            "England",
        ))
        .await
        .unwrap();

    assert_eq!(result.unwrap().code, "260");
}

#[tokio::test]
async fn london_borough_resolves_to_greater_london() {
    let db = init_in_memory().await.unwrap();
    let resolver = resolver_over(&db, Arc::new(standard_entries()));

    // Lambeth has no master-list entry of its own.
    let result = resolver
        .resolve(&postcode(
            "SW2 1JF",
            None,
            Some("Lambeth"),
            Some("London"),
            None,
            "England",
        ))
        .await
        .unwrap();

    let authority = result.unwrap();
    assert_eq!(authority.code, "490");
    assert_eq!(authority.location, "Greater London");
}

#[tokio::test]
async fn district_falls_back_to_constituency() {
    let db = init_in_memory().await.unwrap();
    let resolver = resolver_over(&db, Arc::new(standard_entries()));

    let result = resolver
        .resolve(&postcode(
            "DN31 1UZ",
            None,
            Some("Great Grimsby Borough"),
            Some("Yorkshire"),
            Some("North East Lincolnshire"),
            "England",
        ))
        .await
        .unwrap();

    assert_eq!(result.unwrap().code, "228");
}

#[tokio::test]
async fn no_county_or_district_is_unresolved() {
    let db = init_in_memory().await.unwrap();
    let resolver = resolver_over(&db, Arc::new(standard_entries()));

    let result = resolver
        .resolve(&postcode("XX1 1XX", None, None, None, None, "England"))
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn a_match_triggers_the_stop_fetch_exactly_once() {
    let db = init_in_memory().await.unwrap();
    let transit = Arc::new(standard_entries().with_stops(
        "630",
        vec![
            stop_row("630000001", "Market Cross"),
            stop_row("630000002", "Station Road"),
        ],
    ));
    let resolver = resolver_over(&db, transit.clone());

    let aberdeenshire = postcode(
        "AB51 3QX",
        Some("Aberdeenshire"),
        None,
        None,
        None,
        "Scotland",
    );
    let first = resolver.resolve(&aberdeenshire).await.unwrap().unwrap();
    let second = resolver.resolve(&aberdeenshire).await.unwrap().unwrap();

    assert_eq!(first.stop_refs.len(), 2);
    assert!(second.fully_resolved);
    assert_eq!(transit.stop_fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_stop_fetch_degrades_to_an_authority_without_stops() {
    let db = init_in_memory().await.unwrap();
    let transit = Arc::new(standard_entries());
    // Master list loads first, then stop fetches start failing.
    let resolver = resolver_over(&db, transit.clone());
    resolver
        .resolve(&postcode("XX1 1XX", None, None, None, None, "England"))
        .await
        .unwrap();

    let failing = Arc::new(
        MockTransitService::new()
            .with_entry("Aberdeenshire / Scotland (630)")
            .failing_stop_fetches(),
    );
    let resolver = resolver_over(&db, failing);

    let result = resolver
        .resolve(&postcode(
            "AB51 3QX",
            Some("Aberdeenshire"),
            None,
            None,
            None,
            "Scotland",
        ))
        .await
        .unwrap();

    let authority = result.unwrap();
    assert_eq!(authority.code, "630");
    assert!(!authority.fully_resolved);
    assert!(authority.stop_refs.is_empty());
}
