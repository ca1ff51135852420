//! Authority resolution heuristic
//!
//! Maps a postcode's administrative fields to a cached transport
//! authority through an ordered fallback chain. "No match" is a valid
//! terminal state, not an error: the stop registry simply has no entry
//! for the area (Northern Ireland in particular is not covered).

use crate::caches::{AuthorityCache, StopCache};
use crate::db::models::{Authority, Postcode};
use crate::db::queries;
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, warn};

pub const COUNTRY_NORTHERN_IRELAND: &str = "Northern Ireland";
const REGION_LONDON: &str = "London";
const LOCATION_GREATER_LONDON: &str = "Greater London";

/// Heuristic matcher from postcode administrative fields to an authority
pub struct AuthorityResolver {
    db: SqlitePool,
    authorities: AuthorityCache,
    stops: StopCache,
}

impl AuthorityResolver {
    pub fn new(db: SqlitePool, authorities: AuthorityCache, stops: StopCache) -> Self {
        Self {
            db,
            authorities,
            stops,
        }
    }

    /// Resolve the authority for a postcode. `Ok(None)` means no match.
    ///
    /// On a match the authority's stop cache is triggered (a no-op once
    /// `fully_resolved`); a failed stop fetch degrades to the authority
    /// record without stops rather than failing the resolution.
    pub async fn resolve(&self, postcode: &Postcode) -> Result<Option<Authority>> {
        if postcode.country == COUNTRY_NORTHERN_IRELAND {
            debug!(code = %postcode.code, "Stop registry does not cover Northern Ireland");
            return Ok(None);
        }

        self.authorities.ensure_master_list().await?;

        let matched = if let Some(county) = non_empty(&postcode.county) {
            // A county either matches or the postcode stays unresolved;
            // no further fallbacks apply.
            self.match_by_name(county).await?
        } else if let Some(district) = non_empty(&postcode.district) {
            let mut matched = self.match_by_name(district).await?;

            // London boroughs are not individually represented in the
            // master list; the region carries the match instead.
            if matched.is_none() && postcode.region.as_deref() == Some(REGION_LONDON) {
                matched = self.match_by_name(LOCATION_GREATER_LONDON).await?;
            }

            if matched.is_none() {
                if let Some(constituency) = non_empty(&postcode.constituency) {
                    matched = self.match_by_name(constituency).await?;
                }
            }

            matched
        } else {
            None
        };

        let Some(authority) = matched else {
            debug!(code = %postcode.code, "No authority match");
            return Ok(None);
        };

        debug!(code = %postcode.code, authority = %authority.code, "Resolved authority");

        match self.stops.populate(&authority).await {
            Ok(resolved) => Ok(Some(resolved)),
            Err(Error::Upstream(e)) => {
                warn!(
                    authority = %authority.code,
                    error = %e,
                    "Stop fetch failed; returning authority without stops"
                );
                Ok(Some(authority))
            }
            Err(e) => Err(e),
        }
    }

    /// Exact location match first, then the alternate-name lists.
    async fn match_by_name(&self, name: &str) -> Result<Option<Authority>> {
        if let Some(authority) = queries::find_authority_by_location(&self.db, name).await? {
            return Ok(Some(authority));
        }

        let all = queries::all_authorities(&self.db).await?;
        Ok(all
            .into_iter()
            .find(|a| a.alt_names.iter().any(|alt| alt == name)))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
