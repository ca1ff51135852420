//! Search aggregation steps
//!
//! Four independently re-runnable steps populate a search record:
//! authority, stops, crimes, and hypermedia links. Each step persists
//! the record immediately after mutating it, so a crash between steps
//! leaves a partially populated but internally consistent record and
//! re-running the sequence is always safe: every step either no-ops on
//! already-set state or recomputes deterministically.

use crate::caches::{CrimeCache, MAX_LINKED_REFS};
use crate::db::models::SearchRecord;
use crate::db::queries;
use crate::resolver::{AuthorityResolver, COUNTRY_NORTHERN_IRELAND};
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Orchestrates the resolver and caches to populate a search record
pub struct SearchAggregator {
    db: SqlitePool,
    resolver: AuthorityResolver,
    crimes: CrimeCache,
}

impl SearchAggregator {
    pub fn new(db: SqlitePool, resolver: AuthorityResolver, crimes: CrimeCache) -> Self {
        Self {
            db,
            resolver,
            crimes,
        }
    }

    /// Run the full population sequence, in order.
    pub async fn run_all(&self, search: &mut SearchRecord) -> Result<()> {
        self.link_authority(search).await?;
        self.link_stops(search).await?;
        self.link_crimes(search).await?;
        self.refresh_links(search).await?;
        Ok(())
    }

    /// Resolve and link the authority for the search's postcode.
    /// No-op without error when already linked or when the resolver
    /// finds no match; an upstream failure leaves the link unset.
    pub async fn link_authority(&self, search: &mut SearchRecord) -> Result<()> {
        if search.authority_code.is_some() {
            return Ok(());
        }

        let postcode = queries::find_postcode(&self.db, &search.postcode)
            .await?
            .ok_or_else(|| Error::NotFound(format!("postcode {}", search.postcode)))?;

        match self.resolver.resolve(&postcode).await {
            Ok(Some(authority)) => {
                search.authority_code = Some(authority.code);
            }
            Ok(None) => {}
            Err(Error::Upstream(e)) => {
                warn!(
                    search = search.id,
                    error = %e,
                    "Authority resolution degraded; leaving authority unset"
                );
            }
            Err(e) => return Err(e),
        }

        queries::update_search(&self.db, search).await?;
        Ok(())
    }

    /// Copy the first stop references from the linked authority,
    /// verbatim in the authority's stored order. Requires a linked
    /// authority; otherwise a no-op.
    pub async fn link_stops(&self, search: &mut SearchRecord) -> Result<()> {
        let Some(code) = search.authority_code.clone() else {
            debug!(search = search.id, "No linked authority, skipping stops");
            return Ok(());
        };
        if !search.stop_refs.is_empty() {
            return Ok(());
        }

        let authority = queries::find_authority(&self.db, &code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("authority {}", code)))?;

        search.stop_refs = authority
            .stop_refs
            .iter()
            .take(MAX_LINKED_REFS)
            .cloned()
            .collect();

        queries::update_search(&self.db, search).await?;
        Ok(())
    }

    /// Resolve the crime list for the search coordinates and copy its
    /// crime references. Northern Ireland postcodes get an empty list
    /// without any external call; an upstream failure leaves the list
    /// empty. Requires coordinates; otherwise a no-op.
    pub async fn link_crimes(&self, search: &mut SearchRecord) -> Result<()> {
        let postcode = queries::find_postcode(&self.db, &search.postcode)
            .await?
            .ok_or_else(|| Error::NotFound(format!("postcode {}", search.postcode)))?;

        if postcode.country == COUNTRY_NORTHERN_IRELAND {
            search.crime_refs = Vec::new();
            queries::update_search(&self.db, search).await?;
            return Ok(());
        }

        if search.crime_list_id.is_some() {
            return Ok(());
        }

        let (Some(latitude), Some(longitude)) = (search.latitude, search.longitude) else {
            debug!(search = search.id, "No coordinates, skipping crimes");
            return Ok(());
        };

        match self.crimes.resolve(latitude, longitude).await {
            Ok(list) => {
                search.crime_list_id = Some(list.id);
                search.crime_refs = list.crime_refs.iter().take(MAX_LINKED_REFS).copied().collect();
            }
            Err(Error::Upstream(e)) => {
                warn!(
                    search = search.id,
                    error = %e,
                    "Crime lookup degraded; leaving crimes empty"
                );
            }
            Err(e) => return Err(e),
        }

        queries::update_search(&self.db, search).await?;
        Ok(())
    }

    /// Recompute the hypermedia links from current state, always
    /// overwriting previous values.
    pub async fn refresh_links(&self, search: &mut SearchRecord) -> Result<()> {
        search.links = build_links(search);
        queries::update_search(&self.db, search).await?;
        Ok(())
    }
}

/// Resource links for a search record's current state.
fn build_links(search: &SearchRecord) -> BTreeMap<String, String> {
    let mut links = BTreeMap::new();
    links.insert("self".to_string(), format!("/searches/{}", search.id));
    links.insert(
        "postcode".to_string(),
        format!("/postcodes/{}", search.postcode.replace(' ', "")),
    );

    if let Some(code) = &search.authority_code {
        links.insert("authority".to_string(), format!("/authorities/{}", code));
        links.insert("stops".to_string(), format!("/searches/{}/stops", search.id));
    }
    if let Some(list_id) = search.crime_list_id {
        links.insert("crime_list".to_string(), format!("/crimelists/{}", list_id));
        links.insert("crimes".to_string(), format!("/searches/{}/crimes", search.id));
    }

    links
}
