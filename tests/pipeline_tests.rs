//! End-to-end pipeline behavior: find-or-create idempotence, id
//! allocation under concurrency, and graceful degradation.

mod helpers;

use helpers::*;
use postlocal::caches::MAX_LINKED_REFS;
use postlocal::db::queries;
use postlocal::services::PostcodeData;
use postlocal::{Error, RequestContext};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn lambeth_postcode() -> PostcodeData {
    let mut data = postcode_data("SW2 1JF");
    data.district = Some("Lambeth".to_string());
    data.region = Some("London".to_string());
    data
}

fn ni_postcode() -> PostcodeData {
    let mut data = postcode_data("BT23 6SA");
    data.country = "Northern Ireland".to_string();
    data.district = Some("Ards and North Down".to_string());
    data
}

fn london_transit() -> MockTransitService {
    MockTransitService::new()
        .with_entry("Greater London / London (490)")
        .with_stops(
            "490",
            (1..=8)
                .map(|n| stop_row(&format!("49000000{}", n), &format!("Stop {}", n)))
                .collect(),
        )
}

#[tokio::test]
async fn repeated_searches_return_the_same_sequential_id() {
    let (service, _, transit, crime) = test_service(
        MockPostcodeService::new().with_postcode(lambeth_postcode()),
        london_transit(),
        MockCrimeService::new().with_crimes(vec![crime_data(31, "burglary")]),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let first = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await.unwrap();
    let second = service.pipeline.search_by_postcode(&ctx, "sw21jf").await.unwrap();
    let third = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await.unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 1);
    assert_eq!(third.id, 1);

    // The existing record is only re-linked, never re-resolved.
    assert_eq!(transit.stop_fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(crime.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_new_search_is_fully_populated() -> anyhow::Result<()> {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new().with_postcode(lambeth_postcode()),
        london_transit(),
        MockCrimeService::new().with_crimes(vec![
            crime_data(41, "burglary"),
            crime_data(42, "drugs"),
        ]),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let search = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await?;

    assert_eq!(search.postcode, "SW2 1JF");
    assert_eq!(search.authority_code.as_deref(), Some("490"));
    assert_eq!(search.crime_refs, vec![41, 42]);
    assert!(!search.reverse_lookup);
    assert_eq!(search.links.get("self").unwrap(), "/searches/1");
    assert_eq!(search.links.get("authority").unwrap(), "/authorities/490");
    assert!(search.links.contains_key("crime_list"));

    // Persisted state matches the returned aggregate, by either key.
    let stored = queries::find_search_by_postcode(&service.db, "SW2 1JF")
        .await?
        .unwrap();
    assert_eq!(stored.authority_code, search.authority_code);
    assert_eq!(stored.links, search.links);

    let by_id = queries::find_search_by_id(&service.db, search.id)
        .await?
        .unwrap();
    assert_eq!(by_id.postcode, "SW2 1JF");
    Ok(())
}

#[tokio::test]
async fn stop_links_truncate_to_five_in_stored_order() {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new().with_postcode(lambeth_postcode()),
        london_transit(),
        MockCrimeService::new(),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let search = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await.unwrap();

    // Eight stops cached, first five copied verbatim.
    let authority = queries::find_authority(&service.db, "490").await.unwrap().unwrap();
    assert_eq!(authority.stop_refs.len(), 8);
    assert_eq!(search.stop_refs.len(), MAX_LINKED_REFS);
    assert_eq!(
        search.stop_refs,
        vec!["490000001", "490000002", "490000003", "490000004", "490000005"]
    );
}

#[tokio::test]
async fn northern_ireland_search_has_no_authority_and_empty_crimes() {
    let (service, _, transit, crime) = test_service(
        MockPostcodeService::new().with_postcode(ni_postcode()),
        london_transit(),
        MockCrimeService::new().with_crimes(vec![crime_data(51, "burglary")]),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let search = service.pipeline.search_by_postcode(&ctx, "BT23 6SA").await.unwrap();

    assert_eq!(search.authority_code, None);
    assert_eq!(search.crime_list_id, None);
    assert!(search.stop_refs.is_empty());
    assert!(search.crime_refs.is_empty());
    assert_eq!(transit.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(crime.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_searches_for_distinct_postcodes_get_distinct_gap_free_ids() {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new()
            .with_postcode(lambeth_postcode())
            .with_postcode(postcode_data("LE1 6ZG")),
        london_transit(),
        MockCrimeService::new(),
    )
    .await;
    let service = Arc::new(service);
    let ctx = RequestContext::anonymous();

    let a = {
        let service = service.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await })
    };
    let b = {
        let service = service.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { service.pipeline.search_by_postcode(&ctx, "LE1 6ZG").await })
    };

    let first = a.await.unwrap().unwrap();
    let second = b.await.unwrap().unwrap();

    let mut ids = vec![first.id, second.id];
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn invalid_postcode_is_a_validation_error() {
    let (service, postcodes, _, _) = test_service(
        MockPostcodeService::new(),
        MockTransitService::new(),
        MockCrimeService::new(),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let err = service.pipeline.search_by_postcode(&ctx, "NOT A CODE").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(postcodes.lookup_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn coordinates_without_a_postcode_are_not_found() {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new(),
        MockTransitService::new(),
        MockCrimeService::new(),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let err = service
        .pipeline
        .search_by_coordinates(&ctx, 52.0, -1.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn out_of_range_coordinates_are_rejected_before_any_lookup() {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new(),
        MockTransitService::new(),
        MockCrimeService::new(),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let err = service
        .pipeline
        .search_by_coordinates(&ctx, 152.0, -1.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn reverse_geocoded_searches_carry_the_reverse_lookup_flag() {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new()
            .with_postcode(lambeth_postcode())
            .with_reverse_result("SW2 1JF"),
        london_transit(),
        MockCrimeService::new(),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let search = service
        .pipeline
        .search_by_coordinates(&ctx, 51.45, -0.12)
        .await
        .unwrap();

    assert!(search.reverse_lookup);
    assert_eq!(search.postcode, "SW2 1JF");

    // The postcode path reuses the same record and keeps the flag.
    let again = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await.unwrap();
    assert_eq!(again.id, search.id);
    assert!(again.reverse_lookup);
}

#[tokio::test]
async fn random_search_follows_the_find_or_create_path() {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new()
            .with_postcode(lambeth_postcode())
            .with_random_result("SW2 1JF"),
        london_transit(),
        MockCrimeService::new(),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let random = service.pipeline.search_random(&ctx).await.unwrap();
    let direct = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await.unwrap();

    assert_eq!(random.id, direct.id);
    assert!(!random.reverse_lookup);
}

#[tokio::test]
async fn crime_service_failure_degrades_to_an_empty_crime_list() {
    let (service, _, _, crime) = test_service(
        MockPostcodeService::new().with_postcode(lambeth_postcode()),
        london_transit(),
        MockCrimeService::new().failing(),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let search = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await.unwrap();

    // The record is still created and the enrichment is left empty.
    assert_eq!(search.authority_code.as_deref(), Some("490"));
    assert_eq!(search.crime_list_id, None);
    assert!(search.crime_refs.is_empty());
    assert_eq!(crime.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transit_failure_still_returns_a_search_with_empty_stops() {
    let (service, _, _, _) = test_service(
        MockPostcodeService::new().with_postcode(lambeth_postcode()),
        MockTransitService::new()
            .with_entry("Greater London / London (490)")
            .failing_stop_fetches(),
        MockCrimeService::new().with_crimes(vec![crime_data(61, "burglary")]),
    )
    .await;
    let ctx = RequestContext::anonymous();

    let search = service.pipeline.search_by_postcode(&ctx, "SW2 1JF").await.unwrap();

    assert_eq!(search.authority_code.as_deref(), Some("490"));
    assert!(search.stop_refs.is_empty());
    assert_eq!(search.crime_refs, vec![61]);
}
