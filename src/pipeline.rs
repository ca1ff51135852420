//! Find-or-create search entry points
//!
//! Three idempotent ways into the same path: by postcode, by reverse-
//! geocoded coordinates, or by a random postcode. An existing record is
//! only re-linked (`refresh_links`); a new one gets a sequential id
//! (with collision retry) and the full four-step population sequence.

use crate::aggregator::SearchAggregator;
use crate::allocator::{Counter, SequentialIdAllocator};
use crate::caches::PostcodeCache;
use crate::context::RequestContext;
use crate::db::models::SearchRecord;
use crate::db::{self, queries};
use crate::services::PostcodeLookupService;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level search pipeline
pub struct SearchPipeline {
    db: SqlitePool,
    allocator: SequentialIdAllocator,
    postcodes: PostcodeCache,
    postcode_service: Arc<dyn PostcodeLookupService>,
    aggregator: SearchAggregator,
}

impl SearchPipeline {
    pub fn new(
        db: SqlitePool,
        allocator: SequentialIdAllocator,
        postcodes: PostcodeCache,
        postcode_service: Arc<dyn PostcodeLookupService>,
        aggregator: SearchAggregator,
    ) -> Self {
        Self {
            db,
            allocator,
            postcodes,
            postcode_service,
            aggregator,
        }
    }

    /// Find or create the search aggregate for a postcode.
    pub async fn search_by_postcode(
        &self,
        ctx: &RequestContext,
        code: &str,
    ) -> Result<SearchRecord> {
        info!(user = %ctx.username, postcode = %code, "Search by postcode");
        self.find_or_create(code, false).await
    }

    /// Reverse-geocode the coordinates to a postcode and delegate to the
    /// postcode path. Fails with NotFound when no postcode is near the
    /// point, and with a validation error for out-of-range coordinates.
    pub async fn search_by_coordinates(
        &self,
        ctx: &RequestContext,
        latitude: f64,
        longitude: f64,
    ) -> Result<SearchRecord> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::Validation(format!(
                "coordinates out of range: {}, {}",
                latitude, longitude
            )));
        }

        info!(user = %ctx.username, latitude, longitude, "Search by coordinates");

        let data = self
            .postcode_service
            .reverse_geocode(latitude, longitude)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("no postcode near {}, {}", latitude, longitude))
            })?;

        self.find_or_create(&data.postcode, true).await
    }

    /// Find or create the search aggregate for a random valid postcode.
    pub async fn search_random(&self, ctx: &RequestContext) -> Result<SearchRecord> {
        info!(user = %ctx.username, "Search by random postcode");
        let data = self.postcode_service.random().await?;
        self.find_or_create(&data.postcode, false).await
    }

    async fn find_or_create(&self, code: &str, reverse_lookup: bool) -> Result<SearchRecord> {
        // Postcode resolution is the primary path: validation and lookup
        // failures here are fatal, not degraded.
        let postcode = self.postcodes.resolve(code).await?;

        if let Some(mut existing) =
            queries::find_search_by_postcode(&self.db, &postcode.code).await?
        {
            debug!(id = existing.id, postcode = %postcode.code, "Existing search, refreshing links");
            self.aggregator.refresh_links(&mut existing).await?;
            return Ok(existing);
        }

        let mut search = self.insert_with_fresh_id(&postcode, reverse_lookup).await?;
        match search {
            Some(ref mut record) => {
                self.aggregator.run_all(record).await?;
                info!(
                    id = record.id,
                    postcode = %record.postcode,
                    authority = record.authority_code.as_deref().unwrap_or("-"),
                    stops = record.stop_refs.len(),
                    crimes = record.crime_refs.len(),
                    "Created search"
                );
                Ok(record.clone())
            }
            // Lost the postcode key to a concurrent create; the winner's
            // record only needs its links refreshed.
            None => {
                let mut existing = queries::find_search_by_postcode(&self.db, &postcode.code)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("search for {}", postcode.code)))?;
                self.aggregator.refresh_links(&mut existing).await?;
                Ok(existing)
            }
        }
    }

    /// Insert a fresh record under a newly allocated sequential id,
    /// re-allocating for as long as the id is already taken. Returns
    /// `None` when the postcode key was taken instead, which means a
    /// concurrent request created the record first.
    async fn insert_with_fresh_id(
        &self,
        postcode: &crate::db::models::Postcode,
        reverse_lookup: bool,
    ) -> Result<Option<SearchRecord>> {
        loop {
            let id = self.allocator.next(Counter::Search).await?;
            let candidate = SearchRecord::new(id, postcode, reverse_lookup);

            match queries::insert_search(&self.db, &candidate).await {
                Ok(()) => return Ok(Some(candidate)),
                Err(Error::Database(e)) if db::unique_violation_on(&e, "searches.postcode") => {
                    return Ok(None);
                }
                Err(Error::Database(e)) if db::is_unique_violation(&e) => {
                    debug!(id, "Sequential id already taken, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
