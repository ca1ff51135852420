//! Per-authority stop cache
//!
//! Bulk fetch of one authority's stop table, run at most once per code:
//! `fully_resolved` latches after the first successful populate and
//! suppresses every later fetch.

use crate::db::models::{Authority, Stop};
use crate::db::queries;
use crate::services::{StopRow, TransitDataService};
use crate::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// A table row worth persisting: active, named, and positioned.
fn is_usable(row: &StopRow) -> bool {
    row.status.eq_ignore_ascii_case("active")
        && !row.name.is_empty()
        && row.latitude.is_some()
        && row.longitude.is_some()
}

/// Bulk fetch-and-persist cache over the stops table
pub struct StopCache {
    db: SqlitePool,
    transit: Arc<dyn TransitDataService>,
}

impl StopCache {
    pub fn new(db: SqlitePool, transit: Arc<dyn TransitDataService>) -> Self {
        Self { db, transit }
    }

    /// Fetch and persist the authority's stops, then latch
    /// `fully_resolved` and attach the full stop-reference list.
    /// A no-op returning the stored record when already resolved.
    pub async fn populate(&self, authority: &Authority) -> Result<Authority> {
        if authority.fully_resolved {
            debug!(code = %authority.code, "Stops already resolved, skipping fetch");
            return Ok(authority.clone());
        }

        let rows = self.transit.fetch_stops_table(&authority.code).await?;
        let total = rows.len();

        // Filter to usable rows and deduplicate: first within the batch,
        // then against stops already cached for this authority.
        let mut seen: HashSet<String> =
            queries::existing_stop_codes(&self.db, &authority.code)
                .await?
                .into_iter()
                .collect();
        let mut stop_refs: Vec<String> = seen.iter().cloned().collect();
        stop_refs.sort();

        let mut new_stops = Vec::new();
        for row in rows.into_iter().filter(is_usable) {
            if !seen.insert(row.long_code.clone()) {
                continue;
            }
            stop_refs.push(row.long_code.clone());
            new_stops.push(Stop {
                long_code: row.long_code,
                short_code: row.short_code,
                name: row.name,
                street: row.street,
                latitude: row.latitude,
                longitude: row.longitude,
                authority_code: authority.code.clone(),
            });
        }

        let inserted = queries::insert_stops(&self.db, &new_stops).await?;
        queries::update_authority_stops(&self.db, &authority.code, &stop_refs).await?;

        info!(
            code = %authority.code,
            rows = total,
            inserted,
            stops = stop_refs.len(),
            "Populated authority stops"
        );

        let mut resolved = authority.clone();
        resolved.stop_refs = stop_refs;
        resolved.fully_resolved = true;
        Ok(resolved)
    }
}
