//! Postcode cache: validate, fetch, persist once per normalized code

use crate::db::models::Postcode;
use crate::db::{self, queries};
use crate::services::{PostcodeData, PostcodeLookupService};
use crate::{Error, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// Canonical postcode form: uppercase, no interior whitespace except a
/// single space before the three-character inward part.
pub fn normalize_postcode(raw: &str) -> String {
    let compact: Vec<char> = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    if compact.len() > 3 {
        let (outward, inward) = compact.split_at(compact.len() - 3);
        let mut code: String = outward.iter().collect();
        code.push(' ');
        code.extend(inward.iter());
        code
    } else {
        compact.into_iter().collect()
    }
}

/// Find-or-fetch cache over the postcodes table
pub struct PostcodeCache {
    db: SqlitePool,
    service: Arc<dyn PostcodeLookupService>,
}

impl PostcodeCache {
    pub fn new(db: SqlitePool, service: Arc<dyn PostcodeLookupService>) -> Self {
        Self { db, service }
    }

    /// Resolve a raw postcode string to its cached record.
    ///
    /// An unseen code is validated against the external source before
    /// any fetch; an invalid code fails with a validation error and is
    /// never cached.
    pub async fn resolve(&self, raw: &str) -> Result<Postcode> {
        let code = normalize_postcode(raw);
        if code.is_empty() {
            return Err(Error::Validation("empty postcode".to_string()));
        }

        if let Some(postcode) = queries::find_postcode(&self.db, &code).await? {
            debug!(code = %code, "Postcode cache hit");
            return Ok(postcode);
        }

        if !self.service.validate(&code).await? {
            return Err(Error::Validation(format!("invalid postcode: {}", raw)));
        }

        let data = self.service.lookup(&code).await?;
        let record = record_from_data(data);

        match queries::insert_postcode(&self.db, &record).await {
            Ok(()) => {
                info!(code = %record.code, country = %record.country, "Cached postcode");
                Ok(record)
            }
            // Lost a concurrent create for the same code: the winner's
            // record is authoritative.
            Err(Error::Database(e)) if db::unique_violation_on(&e, "postcodes.code") => {
                queries::find_postcode(&self.db, &record.code)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("postcode {}", record.code)))
            }
            Err(e) => Err(e),
        }
    }
}

fn record_from_data(data: PostcodeData) -> Postcode {
    Postcode {
        code: normalize_postcode(&data.postcode),
        county: data.county,
        district: data.district,
        ward: data.ward,
        parish: data.parish,
        constituency: data.constituency,
        region: data.region,
        country: data.country,
        latitude: data.latitude,
        longitude: data.longitude,
        easting: data.easting,
        northing: data.northing,
        created_at: Utc::now(),
    }
}
