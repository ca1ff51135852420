//! Authority cache: master-list entries parsed and persisted by code
//!
//! Raw entries have the form `"Location / Region (Code)"`. Parsing is
//! strict: a missing separator or a missing parenthesized code is a
//! hard failure, never silently skipped.

use crate::db::models::Authority;
use crate::db::{self, queries};
use crate::services::TransitDataService;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// Fields extracted from one raw master-list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthority {
    pub code: String,
    pub location: String,
    pub region: String,
}

/// Parse a raw `"Location / Region (Code)"` entry.
pub fn parse_authority_entry(raw: &str) -> Result<ParsedAuthority> {
    let (location, rest) = raw
        .split_once('/')
        .ok_or_else(|| Error::Validation(format!("authority entry missing '/': {:?}", raw)))?;

    let location = location.trim();
    let rest = rest.trim();
    if location.is_empty() {
        return Err(Error::Validation(format!(
            "authority entry has no location: {:?}",
            raw
        )));
    }

    let open = rest.rfind('(').ok_or_else(|| {
        Error::Validation(format!("authority entry missing '(code)': {:?}", raw))
    })?;
    if !rest.ends_with(')') {
        return Err(Error::Validation(format!(
            "authority entry missing '(code)': {:?}",
            raw
        )));
    }

    let region = rest[..open].trim();
    let code = rest[open + 1..rest.len() - 1].trim();
    if code.is_empty() {
        return Err(Error::Validation(format!(
            "authority entry has an empty code: {:?}",
            raw
        )));
    }

    Ok(ParsedAuthority {
        code: code.to_string(),
        location: location.to_string(),
        region: region.to_string(),
    })
}

/// Alternate location spellings the resolver may match against.
fn derive_alt_names(location: &str) -> Vec<String> {
    let mut names = Vec::new();

    if let Some(stripped) = location.strip_prefix("City of ") {
        names.push(stripped.to_string());
    }
    if let Some(stripped) = location.strip_suffix(", City of") {
        names.push(stripped.to_string());
    }
    if location.contains(" & ") {
        names.push(location.replace(" & ", " and "));
    }

    names
}

/// Find-or-create cache over the authorities table
pub struct AuthorityCache {
    db: SqlitePool,
    transit: Arc<dyn TransitDataService>,
}

impl AuthorityCache {
    pub fn new(db: SqlitePool, transit: Arc<dyn TransitDataService>) -> Self {
        Self { db, transit }
    }

    /// Resolve one raw entry: parse the code, return the stored record
    /// or create it. Re-processing an entry never duplicates a code.
    pub async fn resolve_entry(&self, raw: &str) -> Result<Authority> {
        let parsed = parse_authority_entry(raw)?;

        if let Some(authority) = queries::find_authority(&self.db, &parsed.code).await? {
            debug!(code = %parsed.code, "Authority cache hit");
            return Ok(authority);
        }

        let record = Authority {
            code: parsed.code.clone(),
            location: parsed.location.clone(),
            region: Some(parsed.region),
            alt_names: derive_alt_names(&parsed.location),
            stop_refs: Vec::new(),
            fully_resolved: false,
        };

        match queries::insert_authority(&self.db, &record).await {
            Ok(()) => {
                debug!(code = %record.code, location = %record.location, "Cached authority");
                Ok(record)
            }
            Err(Error::Database(e)) if db::unique_violation_on(&e, "authorities.code") => {
                queries::find_authority(&self.db, &record.code)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("authority {}", record.code)))
            }
            Err(e) => Err(e),
        }
    }

    /// Load the full master list on first use. A non-empty authorities
    /// table means the list was already processed; nothing is fetched.
    pub async fn ensure_master_list(&self) -> Result<()> {
        if queries::count_authorities(&self.db).await? > 0 {
            return Ok(());
        }

        let entries = self.transit.list_authority_entries().await?;
        info!(entries = entries.len(), "Loading authority master list");

        for entry in &entries {
            self.resolve_entry(entry).await?;
        }

        Ok(())
    }
}
