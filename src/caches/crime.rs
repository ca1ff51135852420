//! Latitude-keyed crime list cache
//!
//! One crime list per latitude value (latitude alone is the natural
//! key; longitude is stored but not part of it). An empty upstream
//! response persists a sentinel record so the same area is never
//! re-queried.

use super::MAX_LINKED_REFS;
use crate::allocator::{Counter, SequentialIdAllocator};
use crate::db::models::{CrimeList, CrimeRecord};
use crate::db::{self, queries};
use crate::services::{CrimeData, CrimeDataService};
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Find-or-fetch cache over the crime_lists table
pub struct CrimeCache {
    db: SqlitePool,
    service: Arc<dyn CrimeDataService>,
    allocator: SequentialIdAllocator,
}

impl CrimeCache {
    pub fn new(
        db: SqlitePool,
        service: Arc<dyn CrimeDataService>,
        allocator: SequentialIdAllocator,
    ) -> Self {
        Self {
            db,
            service,
            allocator,
        }
    }

    /// Resolve the crime list for a coordinate pair.
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> Result<CrimeList> {
        if let Some(list) = queries::find_crime_list_by_latitude(&self.db, latitude).await? {
            debug!(latitude, empty = list.empty_data, "Crime list cache hit");
            return Ok(list);
        }

        let crimes = self.service.fetch_crimes(latitude, longitude).await?;

        if crimes.is_empty() {
            // Sentinel record: the empty result is itself cached.
            let list = self
                .insert_with_fresh_id(CrimeList {
                    id: 0,
                    latitude,
                    longitude,
                    count: 0,
                    crime_refs: Vec::new(),
                    month: None,
                    empty_data: true,
                })
                .await?;
            info!(latitude, "Cached empty-area crime sentinel");
            return Ok(list);
        }

        // First records in response order, deduplicated by external id.
        let total = crimes.len() as i64;
        let month = crimes[0].month.clone();
        let mut seen = HashSet::new();
        let mut crime_refs = Vec::new();
        for crime in crimes.into_iter().take(MAX_LINKED_REFS) {
            if !seen.insert(crime.external_id) {
                continue;
            }
            crime_refs.push(crime.external_id);
            queries::insert_crime(&self.db, &record_from_data(crime)).await?;
        }

        let list = self
            .insert_with_fresh_id(CrimeList {
                id: 0,
                latitude,
                longitude,
                count: total,
                crime_refs,
                month,
                empty_data: false,
            })
            .await?;

        info!(latitude, count = list.count, linked = list.crime_refs.len(), "Cached crime list");
        Ok(list)
    }

    /// Allocate a sequential id and insert, retrying on id collision.
    /// Losing the latitude key to a concurrent resolve returns the
    /// winner's record instead.
    async fn insert_with_fresh_id(&self, mut list: CrimeList) -> Result<CrimeList> {
        loop {
            list.id = self.allocator.next(Counter::CrimeList).await?;
            match queries::insert_crime_list(&self.db, &list).await {
                Ok(()) => return Ok(list),
                Err(Error::Database(e)) if db::unique_violation_on(&e, "crime_lists.latitude") => {
                    return queries::find_crime_list_by_latitude(&self.db, list.latitude)
                        .await?
                        .ok_or_else(|| {
                            Error::NotFound(format!("crime list at latitude {}", list.latitude))
                        });
                }
                Err(Error::Database(e)) if db::is_unique_violation(&e) => {
                    debug!(id = list.id, "Crime list id already taken, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn record_from_data(data: CrimeData) -> CrimeRecord {
    CrimeRecord {
        external_id: data.external_id,
        latitude: data.latitude,
        longitude: data.longitude,
        category: data.category,
        month: data.month,
        outcome_category: data.outcome_category,
        outcome_date: data.outcome_date,
    }
}
